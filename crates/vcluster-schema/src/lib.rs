//! Schema mirroring from the host cluster into a virtual cluster
//!
//! Before a custom resource can be synced, the virtual cluster must serve
//! its kind. [`SchemaReconciler::ensure_from_host`] copies the host's
//! CustomResourceDefinition, reduced to the one requested version, and
//! waits for it to become Established.
//!
//! Cluster access goes through two seams, [`ApiDiscovery`] and
//! [`DefinitionStore`], so the reconciler can run against mocks.

#![deny(missing_docs)]

pub mod discovery;
pub mod reconciler;
pub mod store;

pub use discovery::{describe, find_resource, resolve_kind, ApiDiscovery, KubeDiscovery};
pub use reconciler::{
    mirror_definition, ClusterApis, SchemaInfo, SchemaPhase, SchemaReconciler,
};
pub use store::{CreateOutcome, DefinitionStore, KubeDefinitionStore};
