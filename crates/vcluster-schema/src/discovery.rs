//! API discovery seam
//!
//! Resolves a kind to the resource that serves it. Mocked in tests;
//! [`KubeDiscovery`] talks to a real API server.

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResource;
use kube::core::GroupVersionKind;
use kube::Client;
use tracing::debug;
use vcluster_common::error::ClusterSide;
use vcluster_common::Error;

#[cfg(test)]
use mockall::automock;

/// `"group/version"`, or just `"version"` for the core group
pub fn group_version(gvk: &GroupVersionKind) -> String {
    if gvk.group.is_empty() {
        gvk.version.clone()
    } else {
        format!("{}/{}", gvk.group, gvk.version)
    }
}

/// `"group/version, Kind=kind"`, the form used in logs and errors
pub fn describe(gvk: &GroupVersionKind) -> String {
    format!("{}/{}, Kind={}", gvk.group, gvk.version, gvk.kind)
}

/// Lists the resources an API server serves for a group/version
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ApiDiscovery: Send + Sync {
    /// Resources served under `group_version` (`"example.com/v1"`, or
    /// `"v1"` for the core group).
    ///
    /// An unknown group/version is [`Error::NotFound`].
    async fn resources_for(&self, group_version: &str) -> Result<Vec<APIResource>, Error>;
}

/// The top-level resource serving `kind`, ignoring sub-resources
pub fn find_resource<'a>(resources: &'a [APIResource], kind: &str) -> Option<&'a APIResource> {
    resources
        .iter()
        .find(|r| r.kind == kind && !r.name.contains('/'))
}

/// Resolve `gvk` to its resource through `discovery`.
///
/// A group/version or kind the cluster does not serve is
/// [`Error::NotFound`]; transport errors are returned as-is.
pub async fn resolve_kind(
    discovery: &dyn ApiDiscovery,
    gvk: &GroupVersionKind,
    side: ClusterSide,
) -> Result<APIResource, Error> {
    let resources = discovery.resources_for(&group_version(gvk)).await?;
    find_resource(&resources, &gvk.kind)
        .cloned()
        .ok_or_else(|| Error::not_found(describe(gvk), side))
}

/// Discovery over a kube client
#[derive(Clone)]
pub struct KubeDiscovery {
    client: Client,
    side: ClusterSide,
}

impl KubeDiscovery {
    /// Create discovery for the cluster behind `client`
    pub fn new(client: Client, side: ClusterSide) -> Self {
        Self { client, side }
    }
}

#[async_trait]
impl ApiDiscovery for KubeDiscovery {
    async fn resources_for(&self, group_version: &str) -> Result<Vec<APIResource>, Error> {
        let result = if group_version.contains('/') {
            self.client.list_api_group_resources(group_version).await
        } else {
            self.client.list_core_api_resources(group_version).await
        };

        match result {
            Ok(list) => {
                debug!(
                    side = %self.side,
                    group_version,
                    resources = list.resources.len(),
                    "discovered resources"
                );
                Ok(list.resources)
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                Err(Error::not_found(group_version, self.side))
            }
            Err(e) => Err(e.into()),
        }
    }
}
