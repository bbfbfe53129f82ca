//! Schema reconciler: mirror a host CRD into the virtual cluster
//!
//! Phases of one `ensure_from_host` call:
//!
//! ```text
//! Absent ──(virtual cluster already serves the kind)──────────────> Established
//!   │
//!   ├─ resolve kind on host, fetch CRD, strip it to one version
//!   v
//! Created ──> WaitingEstablished ──(Established=True)──> Established
//!   │                 │
//!   └─────────────────┴──(fatal error / cancellation)──> Failed
//! ```
//!
//! The reconciler holds no state between calls, so re-running it against an
//! already mirrored kind returns immediately without creating anything.

use std::fmt;
use std::sync::Arc;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResource;
use kube::core::GroupVersionKind;
use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use vcluster_common::error::ClusterSide;
use vcluster_common::retry::{poll_with_backoff, RetryConfig};
use vcluster_common::{Error, Result};

use crate::discovery::{describe, resolve_kind, ApiDiscovery, KubeDiscovery};
use crate::store::{CreateOutcome, DefinitionStore, KubeDefinitionStore};

/// CRD condition reporting that the definition is servable
const ESTABLISHED_CONDITION: &str = "Established";

/// Scope value of cluster-scoped CRDs
const CLUSTER_SCOPE: &str = "Cluster";

/// Where a mirroring attempt is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaPhase {
    /// The virtual cluster does not serve the kind yet
    Absent,
    /// The stripped definition has been submitted to the virtual cluster
    Created,
    /// Polling the virtual cluster until the definition is Established
    WaitingEstablished,
    /// The kind is servable in the virtual cluster
    Established,
    /// Mirroring failed; the error says why
    Failed,
}

impl SchemaPhase {
    /// Phase name used in logs and errors
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaPhase::Absent => "Absent",
            SchemaPhase::Created => "Created",
            SchemaPhase::WaitingEstablished => "WaitingEstablished",
            SchemaPhase::Established => "Established",
            SchemaPhase::Failed => "Failed",
        }
    }
}

impl fmt::Display for SchemaPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a kind as served by the virtual cluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaInfo {
    /// The kind has no namespace
    pub cluster_scoped: bool,
    /// The requested version declares a status sub-resource
    pub has_status_subresource: bool,
}

/// Discovery and definition store of one cluster
#[derive(Clone)]
pub struct ClusterApis {
    discovery: Arc<dyn ApiDiscovery>,
    definitions: Arc<dyn DefinitionStore>,
}

impl ClusterApis {
    /// Bundle the two seams
    pub fn new(discovery: Arc<dyn ApiDiscovery>, definitions: Arc<dyn DefinitionStore>) -> Self {
        Self {
            discovery,
            definitions,
        }
    }

    /// Seams backed by a kube client
    pub fn from_client(client: Client, side: ClusterSide) -> Self {
        Self::new(
            Arc::new(KubeDiscovery::new(client.clone(), side)),
            Arc::new(KubeDefinitionStore::new(client, side)),
        )
    }
}

/// CRD name for a resource: `<plural>.<group>`, or just the plural for the
/// core group
pub fn definition_name(plural: &str, group: &str) -> String {
    if group.is_empty() {
        plural.to_string()
    } else {
        format!("{}.{}", plural, group)
    }
}

/// Whether `version` of `definition` declares a status sub-resource
pub fn version_has_status(definition: &CustomResourceDefinition, version: &str) -> bool {
    definition
        .spec
        .versions
        .iter()
        .find(|v| v.name == version)
        .and_then(|v| v.subresources.as_ref())
        .is_some_and(|s| s.status.is_some())
}

/// Strip a host CRD for creation in the virtual cluster.
///
/// Identity fields and status are removed, unknown-field preservation and
/// conversion are disabled, and only `version` is kept, marked both served
/// and storage. Returns `None` when the definition has no such version;
/// otherwise the stripped definition and whether the version declares a
/// status sub-resource.
pub fn mirror_definition(
    host: &CustomResourceDefinition,
    version: &str,
) -> Option<(CustomResourceDefinition, bool)> {
    let mut mirrored = host.clone();

    mirrored.metadata.uid = None;
    mirrored.metadata.resource_version = None;
    mirrored.metadata.managed_fields = None;
    mirrored.metadata.owner_references = None;
    mirrored.status = None;
    mirrored.spec.preserve_unknown_fields = Some(false);
    mirrored.spec.conversion = None;

    let mut kept = mirrored
        .spec
        .versions
        .iter()
        .find(|v| v.name == version)
        .cloned()?;
    kept.served = true;
    kept.storage = true;
    let has_status = kept
        .subresources
        .as_ref()
        .is_some_and(|s| s.status.is_some());
    mirrored.spec.versions = vec![kept];

    Some((mirrored, has_status))
}

fn is_established(definition: &CustomResourceDefinition) -> bool {
    definition
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or_default()
        .iter()
        .any(|c| c.type_ == ESTABLISHED_CONDITION && c.status == "True")
}

fn established_message(definition: &CustomResourceDefinition) -> String {
    definition
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or_default()
        .iter()
        .find(|c| c.type_ == ESTABLISHED_CONDITION)
        .map(|c| {
            format!(
                "status={} reason={} message={}",
                c.status,
                c.reason.as_deref().unwrap_or_default(),
                c.message.as_deref().unwrap_or_default()
            )
        })
        .unwrap_or_default()
}

/// Mirrors host CRDs into the virtual cluster.
#[derive(Clone)]
pub struct SchemaReconciler {
    host: ClusterApis,
    virtual_cluster: ClusterApis,
    retry: RetryConfig,
}

impl SchemaReconciler {
    /// Create a reconciler over the given host and virtual cluster seams
    pub fn new(host: ClusterApis, virtual_cluster: ClusterApis) -> Self {
        Self {
            host,
            virtual_cluster,
            retry: RetryConfig::crd_established(),
        }
    }

    /// Create a reconciler over two kube clients
    pub fn from_clients(host: Client, virtual_cluster: Client) -> Self {
        Self::new(
            ClusterApis::from_client(host, ClusterSide::Host),
            ClusterApis::from_client(virtual_cluster, ClusterSide::Virtual),
        )
    }

    /// Override the readiness backoff
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Make sure the virtual cluster serves `gvk`, copying its definition
    /// from the host cluster if needed.
    ///
    /// Discovery and fetch failures are returned immediately. Transient
    /// errors while waiting for the definition to become Established are
    /// retried; `cancel` aborts the wait with [`Error::Cancelled`].
    #[instrument(skip(self, gvk, cancel), fields(kind = %describe(gvk)))]
    pub async fn ensure_from_host(
        &self,
        gvk: &GroupVersionKind,
        cancel: &CancellationToken,
    ) -> Result<SchemaInfo> {
        let kind = describe(gvk);

        match resolve_kind(
            self.virtual_cluster.discovery.as_ref(),
            gvk,
            ClusterSide::Virtual,
        )
        .await
        {
            Ok(resource) => return Ok(self.existing_schema(gvk, &resource).await),
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                return Err(Error::schema(
                    &kind,
                    SchemaPhase::Absent.as_str(),
                    format!("check virtual cluster kind: {}", e),
                ))
            }
        }

        let host_lookup = resolve_kind(self.host.discovery.as_ref(), gvk, ClusterSide::Host).await;
        let resource = match host_lookup {
            Ok(resource) => resource,
            Err(e) if e.is_not_found() => {
                return Err(Error::schema(
                    &kind,
                    SchemaPhase::Absent.as_str(),
                    "resource is not available in the host cluster or vcluster has no access to it",
                ))
            }
            Err(e) => return Err(e),
        };

        let name = definition_name(&resource.name, &gvk.group);
        let host_definition = self.host.definitions.get(&name).await?.ok_or_else(|| {
            Error::schema(
                &kind,
                SchemaPhase::Absent.as_str(),
                format!("CRD {} not found in host cluster", name),
            )
        })?;
        let (definition, has_status_subresource) = mirror_definition(&host_definition, &gvk.version)
            .ok_or_else(|| {
                Error::schema(
                    &kind,
                    SchemaPhase::Absent.as_str(),
                    format!("CRD {} has no version {}", name, gvk.version),
                )
            })?;

        match self.virtual_cluster.definitions.create(&definition).await {
            Ok(CreateOutcome::Created) => {
                info!(
                    crd = %name,
                    phase = %SchemaPhase::Created,
                    "Created CRD in virtual cluster"
                );
            }
            Ok(CreateOutcome::AlreadyExists) => {
                info!(
                    crd = %name,
                    phase = %SchemaPhase::Created,
                    "CRD already exists in virtual cluster"
                );
            }
            Err(e) => {
                warn!(crd = %name, phase = %SchemaPhase::Failed, error = %e, "CRD creation failed");
                return Err(Error::schema(
                    &kind,
                    SchemaPhase::Created.as_str(),
                    format!("create crd in virtual cluster: {}", e),
                ));
            }
        }

        info!(
            crd = %name,
            phase = %SchemaPhase::WaitingEstablished,
            "Waiting for CRD to become ready"
        );
        match self.wait_established(&kind, &name, cancel).await {
            Ok(()) => {}
            Err(e @ Error::Cancelled { .. }) => return Err(e),
            Err(e) => {
                warn!(
                    crd = %name,
                    phase = %SchemaPhase::Failed,
                    error = %e,
                    "CRD never became ready"
                );
                return Err(Error::schema(
                    &kind,
                    SchemaPhase::WaitingEstablished.as_str(),
                    format!("failed to wait for CRD {} to become ready: {}", kind, e),
                ));
            }
        }

        let info = SchemaInfo {
            cluster_scoped: definition.spec.scope == CLUSTER_SCOPE,
            has_status_subresource,
        };
        info!(
            crd = %name,
            phase = %SchemaPhase::Established,
            cluster_scoped = info.cluster_scoped,
            has_status_subresource,
            "CRD established in virtual cluster"
        );
        Ok(info)
    }

    /// The virtual cluster already serves the kind: report its shape.
    ///
    /// An unreadable definition is logged and reported without a status
    /// sub-resource.
    async fn existing_schema(&self, gvk: &GroupVersionKind, resource: &APIResource) -> SchemaInfo {
        let group = resource
            .group
            .as_deref()
            .filter(|g| !g.is_empty())
            .unwrap_or(gvk.group.as_str());
        let name = definition_name(&resource.name, group);
        info!(
            crd = %name,
            phase = %SchemaPhase::Established,
            "CRD already served by virtual cluster"
        );

        let has_status_subresource = match self.virtual_cluster.definitions.get(&name).await {
            Ok(Some(definition)) => version_has_status(&definition, &gvk.version),
            Ok(None) => {
                warn!(crd = %name, "CRD served but not readable in virtual cluster");
                false
            }
            Err(e) => {
                warn!(crd = %name, error = %e, "Failed to read CRD in virtual cluster");
                false
            }
        };

        SchemaInfo {
            cluster_scoped: !resource.namespaced,
            has_status_subresource,
        }
    }

    async fn wait_established(
        &self,
        kind: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let definitions = self.virtual_cluster.definitions.clone();
        let operation = format!("wait for CRD {} established", kind);
        poll_with_backoff(&self.retry, &operation, cancel, || {
            let definitions = definitions.clone();
            let name = name.to_string();
            async move {
                let definition = definitions
                    .get(&name)
                    .await?
                    .ok_or_else(|| {
                        Error::not_found(format!("CRD {}", name), ClusterSide::Virtual)
                    })?;
                if is_established(&definition) {
                    return Ok(true);
                }
                info!(
                    crd = %name,
                    message = %established_message(&definition),
                    "CRD is not ready yet"
                );
                Ok(false)
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::MockApiDiscovery;
    use crate::store::MockDefinitionStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn foo_gvk() -> GroupVersionKind {
        GroupVersionKind::gvk("example.com", "v1", "Foo")
    }

    fn foo_resource(namespaced: bool) -> APIResource {
        APIResource {
            name: "foos".to_string(),
            kind: "Foo".to_string(),
            namespaced,
            verbs: vec!["get".to_string(), "list".to_string()],
            ..Default::default()
        }
    }

    /// Host CRD serving v1 (with status) and v2 (storage), with a
    /// conversion webhook and host identity fields.
    fn host_crd() -> CustomResourceDefinition {
        serde_json::from_value(json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": {
                "name": "foos.example.com",
                "uid": "host-uid",
                "resourceVersion": "7",
                "ownerReferences": [{
                    "apiVersion": "v1",
                    "kind": "Namespace",
                    "name": "operators",
                    "uid": "ns-uid"
                }],
                "managedFields": [{"manager": "kubectl", "operation": "Apply"}]
            },
            "spec": {
                "group": "example.com",
                "names": {"plural": "foos", "singular": "foo", "kind": "Foo", "listKind": "FooList"},
                "scope": "Namespaced",
                "preserveUnknownFields": true,
                "conversion": {
                    "strategy": "Webhook",
                    "webhook": {
                        "conversionReviewVersions": ["v1"],
                        "clientConfig": {"url": "https://convert.example.com"}
                    }
                },
                "versions": [
                    {
                        "name": "v1",
                        "served": true,
                        "storage": false,
                        "schema": {"openAPIV3Schema": {"type": "object"}},
                        "subresources": {"status": {}}
                    },
                    {
                        "name": "v2",
                        "served": true,
                        "storage": true,
                        "schema": {"openAPIV3Schema": {"type": "object"}}
                    }
                ]
            },
            "status": {
                "acceptedNames": {"plural": "foos", "kind": "Foo"},
                "storedVersions": ["v2"],
                "conditions": [{"type": "Established", "status": "True"}]
            }
        }))
        .unwrap()
    }

    /// The mirrored CRD as the virtual cluster reports it
    fn virtual_crd(established: bool) -> CustomResourceDefinition {
        let (mut crd, _) = mirror_definition(&host_crd(), "v1").unwrap();
        crd.status = Some(
            serde_json::from_value(json!({
                "acceptedNames": {"plural": "foos", "kind": "Foo"},
                "conditions": [{
                    "type": "Established",
                    "status": if established { "True" } else { "False" },
                    "reason": "Installing",
                    "message": "the initial names have not been accepted"
                }]
            }))
            .unwrap(),
        );
        crd
    }

    fn reconciler(
        host_discovery: MockApiDiscovery,
        host_definitions: MockDefinitionStore,
        virtual_discovery: MockApiDiscovery,
        virtual_definitions: MockDefinitionStore,
    ) -> SchemaReconciler {
        SchemaReconciler::new(
            ClusterApis::new(Arc::new(host_discovery), Arc::new(host_definitions)),
            ClusterApis::new(Arc::new(virtual_discovery), Arc::new(virtual_definitions)),
        )
    }

    fn virtual_kind_absent() -> MockApiDiscovery {
        let mut discovery = MockApiDiscovery::new();
        discovery
            .expect_resources_for()
            .returning(|gv| Err(Error::not_found(gv, ClusterSide::Virtual)));
        discovery
    }

    fn host_serving_foo() -> (MockApiDiscovery, MockDefinitionStore) {
        let mut discovery = MockApiDiscovery::new();
        discovery
            .expect_resources_for()
            .withf(|gv| gv == "example.com/v1")
            .returning(|_| Ok(vec![foo_resource(true)]));
        let mut definitions = MockDefinitionStore::new();
        definitions
            .expect_get()
            .withf(|name| name == "foos.example.com")
            .returning(|_| Ok(Some(host_crd())));
        (discovery, definitions)
    }

    // ==========================================================================
    // Story Tests: mirroring a host kind
    // ==========================================================================

    /// Story: only the requested version is mirrored, stripped of host
    /// machinery, and the reconciler waits until it is Established
    #[tokio::test(start_paused = true)]
    async fn story_mirrors_only_the_requested_version() {
        let (host_discovery, host_definitions) = host_serving_foo();

        let created = Arc::new(Mutex::new(None));
        let sink = created.clone();
        let polls = Arc::new(AtomicU32::new(0));
        let counter = polls.clone();

        let mut virtual_definitions = MockDefinitionStore::new();
        virtual_definitions
            .expect_create()
            .times(1)
            .returning(move |crd| {
                *sink.lock().unwrap() = Some(crd.clone());
                Ok(CreateOutcome::Created)
            });
        virtual_definitions.expect_get().returning(move |_| {
            let poll = counter.fetch_add(1, Ordering::SeqCst);
            Ok(Some(virtual_crd(poll >= 2)))
        });

        let reconciler = reconciler(
            host_discovery,
            host_definitions,
            virtual_kind_absent(),
            virtual_definitions,
        );
        let info = reconciler
            .ensure_from_host(&foo_gvk(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            info,
            SchemaInfo {
                cluster_scoped: false,
                has_status_subresource: true,
            }
        );
        assert_eq!(polls.load(Ordering::SeqCst), 3);

        let created = created.lock().unwrap().clone().unwrap();
        assert_eq!(created.spec.versions.len(), 1);
        let version = &created.spec.versions[0];
        assert_eq!(version.name, "v1");
        assert!(version.served);
        assert!(version.storage);
        assert!(created.spec.conversion.is_none());
        assert_eq!(created.spec.preserve_unknown_fields, Some(false));
        assert!(created.status.is_none());
        assert_eq!(created.metadata.uid, None);
        assert_eq!(created.metadata.resource_version, None);
        assert_eq!(created.metadata.owner_references, None);
        assert_eq!(created.metadata.managed_fields, None);
        assert_eq!(created.metadata.name.as_deref(), Some("foos.example.com"));
    }

    /// Story: re-running against a mirrored kind is a no-op
    #[tokio::test]
    async fn story_reentry_is_idempotent() {
        let mut host_discovery = MockApiDiscovery::new();
        host_discovery.expect_resources_for().never();
        let mut host_definitions = MockDefinitionStore::new();
        host_definitions.expect_get().never();

        let mut virtual_discovery = MockApiDiscovery::new();
        virtual_discovery
            .expect_resources_for()
            .returning(|_| Ok(vec![foo_resource(true)]));
        let mut virtual_definitions = MockDefinitionStore::new();
        virtual_definitions.expect_create().never();
        virtual_definitions
            .expect_get()
            .withf(|name| name == "foos.example.com")
            .returning(|_| Ok(Some(virtual_crd(true))));

        let reconciler = reconciler(
            host_discovery,
            host_definitions,
            virtual_discovery,
            virtual_definitions,
        );
        let cancel = CancellationToken::new();
        let first = reconciler.ensure_from_host(&foo_gvk(), &cancel).await.unwrap();
        let second = reconciler.ensure_from_host(&foo_gvk(), &cancel).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first,
            SchemaInfo {
                cluster_scoped: false,
                has_status_subresource: true,
            }
        );
    }

    #[tokio::test]
    async fn existing_kind_with_unreadable_definition_reports_discovery_scope() {
        let mut virtual_discovery = MockApiDiscovery::new();
        virtual_discovery
            .expect_resources_for()
            .returning(|_| Ok(vec![foo_resource(false)]));
        let mut virtual_definitions = MockDefinitionStore::new();
        virtual_definitions
            .expect_get()
            .returning(|_| Err(Error::internal("connection reset")));

        let reconciler = reconciler(
            MockApiDiscovery::new(),
            MockDefinitionStore::new(),
            virtual_discovery,
            virtual_definitions,
        );
        let info = reconciler
            .ensure_from_host(&foo_gvk(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            info,
            SchemaInfo {
                cluster_scoped: true,
                has_status_subresource: false,
            }
        );
    }

    // ==========================================================================
    // Failures
    // ==========================================================================

    #[tokio::test]
    async fn kind_missing_on_host_is_fatal() {
        let mut host_discovery = MockApiDiscovery::new();
        host_discovery.expect_resources_for().returning(|_| Ok(vec![]));
        let mut virtual_definitions = MockDefinitionStore::new();
        virtual_definitions.expect_create().never();

        let reconciler = reconciler(
            host_discovery,
            MockDefinitionStore::new(),
            virtual_kind_absent(),
            virtual_definitions,
        );
        let err = reconciler
            .ensure_from_host(&foo_gvk(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Schema { .. }), "{err}");
        assert!(!err.is_retryable());
        assert_eq!(err.context(), Some("Absent"));
    }

    #[tokio::test]
    async fn transient_discovery_error_propagates_immediately() {
        let mut host_discovery = MockApiDiscovery::new();
        host_discovery
            .expect_resources_for()
            .times(1)
            .returning(|_| Err(Error::internal("connection reset")));

        let reconciler = reconciler(
            host_discovery,
            MockDefinitionStore::new(),
            virtual_kind_absent(),
            MockDefinitionStore::new(),
        );
        let err = reconciler
            .ensure_from_host(&foo_gvk(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal { .. }), "{err}");
    }

    #[tokio::test]
    async fn create_failure_is_fatal() {
        let (host_discovery, host_definitions) = host_serving_foo();
        let mut virtual_definitions = MockDefinitionStore::new();
        virtual_definitions
            .expect_create()
            .returning(|_| Err(Error::internal("admission denied")));
        virtual_definitions.expect_get().never();

        let reconciler = reconciler(
            host_discovery,
            host_definitions,
            virtual_kind_absent(),
            virtual_definitions,
        );
        let err = reconciler
            .ensure_from_host(&foo_gvk(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.context(), Some("Created"));
    }

    #[tokio::test(start_paused = true)]
    async fn already_exists_counts_as_created() {
        let (host_discovery, host_definitions) = host_serving_foo();
        let mut virtual_definitions = MockDefinitionStore::new();
        virtual_definitions
            .expect_create()
            .returning(|_| Ok(CreateOutcome::AlreadyExists));
        virtual_definitions
            .expect_get()
            .returning(|_| Ok(Some(virtual_crd(true))));

        let reconciler = reconciler(
            host_discovery,
            host_definitions,
            virtual_kind_absent(),
            virtual_definitions,
        );
        assert!(reconciler
            .ensure_from_host(&foo_gvk(), &CancellationToken::new())
            .await
            .is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_wait_errors_are_retried() {
        let (host_discovery, host_definitions) = host_serving_foo();
        let polls = Arc::new(AtomicU32::new(0));
        let counter = polls.clone();

        let mut virtual_definitions = MockDefinitionStore::new();
        virtual_definitions
            .expect_create()
            .returning(|_| Ok(CreateOutcome::Created));
        virtual_definitions.expect_get().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::internal("etcd leader changed"))
            } else {
                Ok(Some(virtual_crd(true)))
            }
        });

        let reconciler = reconciler(
            host_discovery,
            host_definitions,
            virtual_kind_absent(),
            virtual_definitions,
        );
        reconciler
            .ensure_from_host(&foo_gvk(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn definitive_wait_error_aborts_with_kind_in_message() {
        let (host_discovery, host_definitions) = host_serving_foo();
        let mut virtual_definitions = MockDefinitionStore::new();
        virtual_definitions
            .expect_create()
            .returning(|_| Ok(CreateOutcome::Created));
        virtual_definitions
            .expect_get()
            .times(1)
            .returning(|_| Ok(None));

        let reconciler = reconciler(
            host_discovery,
            host_definitions,
            virtual_kind_absent(),
            virtual_definitions,
        );
        let err = reconciler
            .ensure_from_host(&foo_gvk(), &CancellationToken::new())
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(
            message.contains("failed to wait for CRD example.com/v1, Kind=Foo to become ready"),
            "{message}"
        );
        assert_eq!(err.context(), Some("WaitingEstablished"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_the_wait_promptly() {
        let (host_discovery, host_definitions) = host_serving_foo();
        let mut virtual_definitions = MockDefinitionStore::new();
        virtual_definitions
            .expect_create()
            .returning(|_| Ok(CreateOutcome::Created));
        virtual_definitions
            .expect_get()
            .returning(|_| Ok(Some(virtual_crd(false))));

        let reconciler = reconciler(
            host_discovery,
            host_definitions,
            virtual_kind_absent(),
            virtual_definitions,
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let err = reconciler
            .ensure_from_host(&foo_gvk(), &cancel)
            .await
            .unwrap_err();

        match &err {
            Error::Cancelled { operation } => {
                assert!(operation.contains("example.com/v1, Kind=Foo"), "{operation}")
            }
            other => panic!("Expected Cancelled, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(31));
    }

    // ==========================================================================
    // Definition stripping
    // ==========================================================================

    #[test]
    fn mirror_requires_the_requested_version() {
        assert!(mirror_definition(&host_crd(), "v3").is_none());

        let (mirrored, has_status) = mirror_definition(&host_crd(), "v2").unwrap();
        assert!(!has_status);
        assert_eq!(mirrored.spec.versions.len(), 1);
        assert!(mirrored.spec.versions[0].storage);
    }

    #[test]
    fn established_condition_detection() {
        assert!(is_established(&virtual_crd(true)));
        assert!(!is_established(&virtual_crd(false)));
        assert!(established_message(&virtual_crd(false)).contains("Installing"));
        assert!(!is_established(&mirror_definition(&host_crd(), "v1").unwrap().0));
    }

    #[test]
    fn definition_names() {
        assert_eq!(definition_name("foos", "example.com"), "foos.example.com");
        assert_eq!(definition_name("pods", ""), "pods");
    }
}
