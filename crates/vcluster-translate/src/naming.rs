//! Deterministic, length-bounded host identifiers
//!
//! Every identifier synthesized for the host side goes through
//! [`safe_concat_name`], so the 63-character limit and the shortening rule
//! are applied identically everywhere.

use std::fmt::{self, Write};

use aws_lc_rs::digest;
use vcluster_common::MAX_IDENTIFIER_LENGTH;

/// Characters of the naive join kept when shortening
const SHORTENED_PREFIX_LENGTH: usize = 52;

/// Hex characters of the digest appended when shortening
const SHORTENED_DIGEST_LENGTH: usize = 10;

/// Hex characters of each namespace digest
const NAMESPACE_DIGEST_LENGTH: usize = 8;

/// Separator between the host namespace and the vcluster name in digests
const SUFFIX_SEPARATOR: &str = "x";

/// Name plus optional namespace (`None` = cluster-scoped)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespacedName {
    /// Object name
    pub name: String,
    /// Object namespace
    pub namespace: Option<String>,
}

impl NamespacedName {
    /// A namespaced identity
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            name: name.into(),
            namespace: (!namespace.is_empty()).then_some(namespace),
        }
    }

    /// A cluster-scoped identity
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    /// Namespace or `""` when cluster-scoped
    pub fn namespace_str(&self) -> &str {
        self.namespace.as_deref().unwrap_or_default()
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// First `len` hex characters of the SHA-256 digest of `input`.
pub fn digest_hex(input: &str, len: usize) -> String {
    let hash = digest::digest(&digest::SHA256, input.as_bytes());
    let mut hex = hash
        .as_ref()
        .iter()
        .take(len.div_ceil(2))
        .fold(String::with_capacity(len + 1), |mut s, b| {
            let _ = write!(s, "{:02x}", b);
            s
        });
    hex.truncate(len);
    hex
}

/// Join `parts` with `-`, shortening to at most 63 bytes.
///
/// Joins of 63 bytes or fewer are returned unchanged. Longer joins keep
/// their first 52 bytes (backing off to a char boundary), followed by `-`
/// and the first 10 hex characters of the SHA-256 of the full join. Any
/// `.-` produced at the cut is collapsed to `-`.
pub fn safe_concat_name(parts: &[&str]) -> String {
    let full = parts.join("-");
    if full.len() <= MAX_IDENTIFIER_LENGTH {
        return full;
    }

    let mut cut = SHORTENED_PREFIX_LENGTH;
    while !full.is_char_boundary(cut) {
        cut -= 1;
    }
    let shortened = format!(
        "{}-{}",
        &full[..cut],
        digest_hex(&full, SHORTENED_DIGEST_LENGTH)
    );
    shortened.replace(".-", "-")
}

/// Digest identifying one vcluster instance: `sha256(currentNamespace + "x" + vclusterName)[..8]`
pub fn namespace_suffix(current_namespace: &str, vcluster_name: &str) -> String {
    digest_hex(
        &format!("{}{}{}", current_namespace, SUFFIX_SEPARATOR, vcluster_name),
        NAMESPACE_DIGEST_LENGTH,
    )
}

/// Hashed host namespace for a virtual namespace in multi-namespace mode.
///
/// `{prefix}-{sha256(virtualNamespace)[..8]}-{suffix}` where `suffix` is
/// [`namespace_suffix`]. The two digests are independent, so equal virtual
/// namespace names from different vcluster instances never collide.
pub fn hashed_host_namespace(prefix: &str, virtual_namespace: &str, suffix: &str) -> String {
    format!(
        "{}-{}-{}",
        prefix,
        digest_hex(virtual_namespace, NAMESPACE_DIGEST_LENGTH),
        suffix
    )
}

/// Hashed host label key for a virtual label key.
///
/// `SafeConcat(prefix, qualifier, "x", vclusterName, "x", sha256(key)[..10])`.
/// The qualifier is the host namespace for cluster-scoped keys and the
/// virtual namespace for namespaced keys.
pub fn hashed_label_key(prefix: &str, qualifier: &str, vcluster_name: &str, key: &str) -> String {
    let digest = digest_hex(key, SHORTENED_DIGEST_LENGTH);
    safe_concat_name(&[
        prefix,
        qualifier,
        SUFFIX_SEPARATOR,
        vcluster_name,
        SUFFIX_SEPARATOR,
        &digest,
    ])
}
