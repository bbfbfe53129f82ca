//! Type-definition store seam
//!
//! Get/create of CustomResourceDefinitions on one cluster. Mocked in tests;
//! [`KubeDefinitionStore`] talks to a real API server.

use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, PostParams};
use kube::Client;
use tracing::debug;
use vcluster_common::error::ClusterSide;
use vcluster_common::Error;

#[cfg(test)]
use mockall::automock;

/// Result of a create call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The definition was created
    Created,
    /// A definition with the same name already existed
    AlreadyExists,
}

/// CustomResourceDefinitions of one cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    /// Fetch a definition by name, `None` when absent
    async fn get(&self, name: &str) -> Result<Option<CustomResourceDefinition>, Error>;

    /// Create a definition
    async fn create(&self, definition: &CustomResourceDefinition) -> Result<CreateOutcome, Error>;
}

/// Definition store over a kube client
#[derive(Clone)]
pub struct KubeDefinitionStore {
    api: Api<CustomResourceDefinition>,
    side: ClusterSide,
}

impl KubeDefinitionStore {
    /// Create a store for the cluster behind `client`
    pub fn new(client: Client, side: ClusterSide) -> Self {
        Self {
            api: Api::all(client),
            side,
        }
    }
}

#[async_trait]
impl DefinitionStore for KubeDefinitionStore {
    async fn get(&self, name: &str) -> Result<Option<CustomResourceDefinition>, Error> {
        Ok(self.api.get_opt(name).await?)
    }

    async fn create(&self, definition: &CustomResourceDefinition) -> Result<CreateOutcome, Error> {
        match self.api.create(&PostParams::default(), definition).await {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                debug!(
                    side = %self.side,
                    crd = definition.metadata.name.as_deref().unwrap_or_default(),
                    "CRD already exists"
                );
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }
}
