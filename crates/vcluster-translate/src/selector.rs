//! Label selector rewriting across the virtual/host boundary
//!
//! Only keys move across the boundary. Operators and values are passed
//! through untouched.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};

/// What to do with a host key that has no known virtual equivalent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmappedKeys {
    /// Keep the host key as-is
    #[default]
    Keep,
    /// Remove the match label or requirement using the key
    Drop,
}

/// Result of a host -> virtual selector rewrite
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectorRewrite {
    /// The rewritten selector
    pub selector: LabelSelector,
    /// Host keys with no known virtual equivalent, in encounter order
    pub unmapped: Vec<String>,
}

impl SelectorRewrite {
    /// Whether every key had a known translation
    pub fn is_complete(&self) -> bool {
        self.unmapped.is_empty()
    }
}

/// Rewrite a virtual selector for the host.
///
/// `translate` always produces a key; forward translation has no miss.
pub fn host_label_selector(
    selector: &LabelSelector,
    mut translate: impl FnMut(&str) -> String,
) -> LabelSelector {
    let match_labels = selector.match_labels.as_ref().map(|labels| {
        labels
            .iter()
            .map(|(k, v)| (translate(k), v.clone()))
            .collect::<BTreeMap<_, _>>()
    });

    let match_expressions = selector.match_expressions.as_ref().map(|exprs| {
        exprs
            .iter()
            .map(|r| LabelSelectorRequirement {
                key: translate(&r.key),
                operator: r.operator.clone(),
                values: r.values.clone(),
            })
            .collect::<Vec<_>>()
    });

    LabelSelector {
        match_labels,
        match_expressions,
    }
}

/// Rewrite a host selector for the virtual cluster.
///
/// `translate` returns `None` when a host key has no known virtual
/// equivalent. Such keys are reported in [`SelectorRewrite::unmapped`] and
/// kept or dropped according to `unmapped`.
pub fn virtual_label_selector(
    selector: &LabelSelector,
    mut translate: impl FnMut(&str) -> Option<String>,
    unmapped: UnmappedKeys,
) -> SelectorRewrite {
    let mut missing = Vec::new();
    let mut rewrite = |key: &str| -> Option<String> {
        match translate(key) {
            Some(k) => Some(k),
            None => {
                missing.push(key.to_string());
                match unmapped {
                    UnmappedKeys::Keep => Some(key.to_string()),
                    UnmappedKeys::Drop => None,
                }
            }
        }
    };

    let match_labels = selector.match_labels.as_ref().map(|labels| {
        labels
            .iter()
            .filter_map(|(k, v)| rewrite(k).map(|key| (key, v.clone())))
            .collect::<BTreeMap<_, _>>()
    });

    let match_expressions = selector.match_expressions.as_ref().map(|exprs| {
        exprs
            .iter()
            .filter_map(|r| {
                rewrite(&r.key).map(|key| LabelSelectorRequirement {
                    key,
                    operator: r.operator.clone(),
                    values: r.values.clone(),
                })
            })
            .collect::<Vec<_>>()
    });

    SelectorRewrite {
        selector: LabelSelector {
            match_labels,
            match_expressions,
        },
        unmapped: missing,
    }
}

/// Union of several selectors.
///
/// Later match labels win on key conflicts; requirements are concatenated.
pub fn merge_label_selectors<'a>(
    selectors: impl IntoIterator<Item = &'a LabelSelector>,
) -> LabelSelector {
    let mut out = LabelSelector::default();
    for selector in selectors {
        if let Some(labels) = selector.match_labels.as_ref().filter(|l| !l.is_empty()) {
            out.match_labels
                .get_or_insert_with(BTreeMap::new)
                .extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if let Some(exprs) = selector.match_expressions.as_ref().filter(|e| !e.is_empty()) {
            out.match_expressions
                .get_or_insert_with(Vec::new)
                .extend(exprs.iter().cloned());
        }
    }
    out
}
