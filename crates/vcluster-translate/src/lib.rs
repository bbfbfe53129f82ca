//! Identity translation between a virtual cluster and its host cluster
//!
//! Maps names, namespaces, labels, annotations, selectors and owner
//! references of virtual objects onto the host cluster's object space and
//! back. Everything here is synchronous and side-effect free apart from the
//! [`MappingStore`], which memoizes forward label-key derivations so they
//! can be inverted later.
//!
//! Typical use:
//!
//! ```ignore
//! let translator = Translator::from_config(config)?;
//! let host_id = translator.host_identity(&NamespacedName::new("web", "default"));
//! let host_obj = translator.host_metadata(&virtual_obj, &host_id, owner.as_ref(), &[]);
//! ```

#![deny(missing_docs)]

pub mod mapping;
pub mod metadata;
pub mod naming;
pub mod owner;
pub mod selector;
pub mod translator;

pub use mapping::{
    EvictionPolicy, InMemoryMappingStore, KeyScope, MappingStore, NamespaceMapping,
    StaticNamespaceMapping,
};
pub use metadata::{apply_metadata, merge_maps, MergeOutcome, StringMap};
pub use naming::{safe_concat_name, NamespacedName};
pub use owner::{owner_references, HostOwner};
pub use selector::{merge_label_selectors, SelectorRewrite, UnmappedKeys};
pub use translator::{kind_annotation_value, Mode, Translator, TranslatorBuilder};
