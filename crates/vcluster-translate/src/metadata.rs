//! Ownership-aware merge of labels and annotations
//!
//! One side (the source) is authoritative for every key it defines. Keys it
//! defined in an earlier sync are recorded in a bookkeeping annotation on
//! the target, so a key removed on the source side is removed from the
//! target while keys the source never claimed survive untouched.
//!
//! Example: source `{a:1, b:2}` merged into target `{b:9, c:3}` yields
//! `{a:1, b:2, c:3}` with managed keys `a\nb`. Merging source `{a:1}` into
//! that result afterwards yields `{a:1, c:3}`.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use vcluster_common::{
    BOOKKEEPING_ANNOTATIONS, MANAGED_ANNOTATIONS_ANNOTATION, MANAGED_LABELS_ANNOTATION,
    SYSTEM_LABELS,
};

/// Label or annotation map
pub type StringMap = BTreeMap<String, String>;

/// Separator of the managed-key bookkeeping value
const MANAGED_KEYS_SEPARATOR: &str = "\n";

/// Result of [`merge_maps`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The merged map to store on the target
    pub merged: StringMap,
    /// Keys the source manages after this merge, sorted
    pub managed_keys: BTreeSet<String>,
}

impl MergeOutcome {
    /// Bookkeeping value: sorted keys joined by newline, `""` when none
    pub fn managed_keys_value(&self) -> String {
        join_managed_keys(&self.managed_keys)
    }
}

/// Parse a bookkeeping value into its keys
pub fn split_managed_keys(value: Option<&str>) -> BTreeSet<String> {
    value
        .unwrap_or_default()
        .split(MANAGED_KEYS_SEPARATOR)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render managed keys as a bookkeeping value
pub fn join_managed_keys(keys: &BTreeSet<String>) -> String {
    keys.iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(MANAGED_KEYS_SEPARATOR)
}

/// Merge `source` into `target`.
///
/// - Source entries not in `excluded` are copied and become managed.
/// - Target entries in `excluded` are always copied through.
/// - Target entries that are managed now, or were managed before
///   (`previously_managed`) but are gone from the source, are dropped.
/// - Every other target entry is preserved.
pub fn merge_maps(
    source: &StringMap,
    target: &StringMap,
    previously_managed: &BTreeSet<String>,
    excluded: &[&str],
) -> MergeOutcome {
    let is_excluded = |key: &str| excluded.contains(&key);
    let mut merged = StringMap::new();
    let mut managed_keys = BTreeSet::new();

    for (key, value) in source {
        if is_excluded(key) {
            continue;
        }
        merged.insert(key.clone(), value.clone());
        managed_keys.insert(key.clone());
    }

    for (key, value) in target {
        if is_excluded(key) {
            merged.insert(key.clone(), value.clone());
        } else if managed_keys.contains(key) || previously_managed.contains(key) {
            continue;
        } else {
            merged.insert(key.clone(), value.clone());
        }
    }

    MergeOutcome {
        merged,
        managed_keys,
    }
}

fn store_managed_keys(annotations: &mut StringMap, bookkeeping_key: &str, value: String) {
    if value.is_empty() {
        annotations.remove(bookkeeping_key);
    } else {
        annotations.insert(bookkeeping_key.to_string(), value);
    }
}

/// Merge annotations, tracking managed keys in the managed-annotations
/// bookkeeping annotation of the result.
///
/// Bookkeeping annotations and `excluded` never become managed.
pub fn apply_annotations(from: &StringMap, to: &StringMap, excluded: &[&str]) -> StringMap {
    let previously_managed =
        split_managed_keys(to.get(MANAGED_ANNOTATIONS_ANNOTATION).map(String::as_str));
    let mut excluded_keys: Vec<&str> = BOOKKEEPING_ANNOTATIONS.to_vec();
    excluded_keys.extend_from_slice(excluded);

    let outcome = merge_maps(from, to, &previously_managed, &excluded_keys);
    let value = outcome.managed_keys_value();
    let mut merged = outcome.merged;
    store_managed_keys(&mut merged, MANAGED_ANNOTATIONS_ANNOTATION, value);
    merged
}

/// Merge labels, tracking managed keys in the managed-labels bookkeeping
/// annotation of `to_annotations`.
///
/// System labels (ownership marker, namespace marker, controller) never
/// become managed and always keep their target value.
pub fn apply_labels(
    from_labels: &StringMap,
    to_labels: &StringMap,
    to_annotations: &StringMap,
) -> (StringMap, StringMap) {
    let previously_managed = split_managed_keys(
        to_annotations
            .get(MANAGED_LABELS_ANNOTATION)
            .map(String::as_str),
    );

    let outcome = merge_maps(from_labels, to_labels, &previously_managed, SYSTEM_LABELS);
    let value = outcome.managed_keys_value();
    let mut annotations = to_annotations.clone();
    store_managed_keys(&mut annotations, MANAGED_LABELS_ANNOTATION, value);
    (outcome.merged, annotations)
}

/// Update-path merge of both labels and annotations.
///
/// Returns `(labels, annotations)` for the target.
pub fn apply_metadata(
    from_annotations: &StringMap,
    to_annotations: &StringMap,
    from_labels: &StringMap,
    to_labels: &StringMap,
    excluded_annotations: &[&str],
) -> (StringMap, StringMap) {
    let merged_annotations =
        apply_annotations(from_annotations, to_annotations, excluded_annotations);
    apply_labels(from_labels, to_labels, &merged_annotations)
}

/// Copy every non-excluded entry of `from`, plus the excluded entries the
/// target already carries.
///
/// Used on the reverse path, where the target's reserved keys must survive.
pub fn copy_maps(
    from: &StringMap,
    to: Option<&StringMap>,
    exclude: impl Fn(&str) -> bool,
) -> StringMap {
    let mut merged: StringMap = from
        .iter()
        .filter(|(k, _)| !exclude(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    if let Some(to) = to {
        for (key, value) in to {
            if exclude(key) {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

/// Reset server-populated metadata, keeping name, namespace, labels and
/// annotations.
pub fn reset_object_metadata(meta: &mut ObjectMeta) {
    meta.generate_name = None;
    meta.self_link = None;
    meta.uid = None;
    meta.resource_version = None;
    meta.generation = None;
    meta.creation_timestamp = None;
    meta.deletion_timestamp = None;
    meta.deletion_grace_period_seconds = None;
    meta.owner_references = None;
    meta.finalizers = None;
    meta.managed_fields = None;
}
