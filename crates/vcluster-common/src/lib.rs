//! Common types for vcluster translation: errors, configuration, reserved keys
//!
//! Everything in this crate is shared between the pure translation primitives
//! (`vcluster-translate`) and the schema mirroring reconciler
//! (`vcluster-schema`).

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod retry;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum length of a Kubernetes name, label value or DNS-1123 label
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

// =============================================================================
// Reserved label keys
// =============================================================================
// Stamped on host objects. Never part of the managed-key bookkeeping.

/// Prefix shared by every key this system reserves for itself
pub const RESERVED_KEY_PREFIX: &str = "vcluster.loft.sh/";

/// Ownership marker: which vcluster instance produced the host object
pub const MARKER_LABEL: &str = "vcluster.loft.sh/managed-by";

/// Originating virtual namespace of a namespaced host object
pub const NAMESPACE_LABEL: &str = "vcluster.loft.sh/namespace";

/// Controller label, carried over from the host object untouched
pub const CONTROLLER_LABEL: &str = "vcluster.loft.sh/controlled-by";

/// Prefix of hashed label keys derived from virtual keys
pub const LABEL_PREFIX: &str = "vcluster.loft.sh/label";

/// Prefix of namespace labels copied onto host objects
pub const NAMESPACE_LABEL_PREFIX: &str = "vcluster.loft.sh/ns-label";

// =============================================================================
// Reserved annotation keys
// =============================================================================

/// Name of the originating virtual object
pub const NAME_ANNOTATION: &str = "vcluster.loft.sh/object-name";

/// Unique identifier of the originating virtual object
pub const UID_ANNOTATION: &str = "vcluster.loft.sh/object-uid";

/// Namespace of the originating virtual object (absent if cluster-scoped)
pub const NAMESPACE_ANNOTATION: &str = "vcluster.loft.sh/object-namespace";

/// Group/version/kind of the originating virtual object
pub const KIND_ANNOTATION: &str = "vcluster.loft.sh/object-kind";

/// Newline-joined, sorted annotation keys managed by the virtual side
pub const MANAGED_ANNOTATIONS_ANNOTATION: &str = "vcluster.loft.sh/managed-annotations";

/// Newline-joined, sorted label keys managed by the virtual side
pub const MANAGED_LABELS_ANNOTATION: &str = "vcluster.loft.sh/managed-labels";

/// Back-reference annotations re-stamped on every host sync
pub const BACK_REFERENCE_ANNOTATIONS: &[&str] = &[
    NAME_ANNOTATION,
    UID_ANNOTATION,
    NAMESPACE_ANNOTATION,
    KIND_ANNOTATION,
];

/// Bookkeeping annotations recording the managed key sets
pub const BOOKKEEPING_ANNOTATIONS: &[&str] =
    &[MANAGED_ANNOTATIONS_ANNOTATION, MANAGED_LABELS_ANNOTATION];

/// System labels excluded from label ownership tracking
pub const SYSTEM_LABELS: &[&str] = &[MARKER_LABEL, NAMESPACE_LABEL, CONTROLLER_LABEL];
