//! Controller-owner back-references from host objects
//!
//! The owner is passed in explicitly by the caller; there is no
//! process-wide "current owner".

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};

/// The object that owns the virtual-to-host relationship
/// (typically the vcluster's own workload on the host).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOwner {
    /// API version of the owner (e.g. "apps/v1")
    pub api_version: String,
    /// Kind of the owner (e.g. "StatefulSet")
    pub kind: String,
    /// Name of the owner
    pub name: String,
    /// Unique identifier of the owner
    pub uid: String,
}

impl HostOwner {
    /// Build from any typed resource.
    ///
    /// Returns `None` when the resource has no name or uid yet.
    pub fn from_resource<K>(owner: &K) -> Option<Self>
    where
        K: Resource,
        K::DynamicType: Default,
    {
        let dt = K::DynamicType::default();
        let name = owner.meta().name.clone().filter(|n| !n.is_empty())?;
        let uid = owner.uid().filter(|u| !u.is_empty())?;
        Some(Self {
            api_version: K::api_version(&dt).into_owned(),
            kind: K::kind(&dt).into_owned(),
            name,
            uid,
        })
    }

    fn is_complete(&self) -> bool {
        !self.api_version.is_empty()
            && !self.kind.is_empty()
            && !self.name.is_empty()
            && !self.uid.is_empty()
    }
}

/// Whether `meta` already has a controller owner reference
pub fn has_controller(meta: &ObjectMeta) -> bool {
    meta.owner_references
        .as_ref()
        .is_some_and(|refs| refs.iter().any(|r| r.controller == Some(true)))
}

/// Owner references to put on a host object.
///
/// Returns `None` when there is no owner or the owner is incomplete. The
/// reference is flagged as controller only when the source object itself
/// is controlled by something, mirroring its controlled-ness on the host.
pub fn owner_references(
    owner: Option<&HostOwner>,
    source: Option<&ObjectMeta>,
) -> Option<Vec<OwnerReference>> {
    let owner = owner.filter(|o| o.is_complete())?;
    let is_controller = source.is_some_and(has_controller);
    Some(vec![OwnerReference {
        api_version: owner.api_version.clone(),
        kind: owner.kind.clone(),
        name: owner.name.clone(),
        uid: owner.uid.clone(),
        controller: Some(is_controller),
        block_owner_deletion: None,
    }])
}
