//! Translator: the per-process translation policy
//!
//! The mode decides how identities move across the boundary:
//!
//! - **Single-namespace**: names, namespaces and label keys pass through
//!   unchanged. Ownership is carried by the marker label.
//! - **Multi-namespace**: every virtual namespace lands in a hashed host
//!   namespace, cluster-scoped names are isolated per vcluster instance and
//!   label keys are hashed. Forward key derivations are recorded in the
//!   [`MappingStore`] so the reverse direction can find them.
//!
//! All methods are synchronous and take `&self`; a `Translator` can be
//! shared across sync workers behind an `Arc`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::Resource;
use tracing::{debug, info};
use vcluster_common::config::{SyncMode, TranslatorConfig};
use vcluster_common::{
    Error, Result, BACK_REFERENCE_ANNOTATIONS, BOOKKEEPING_ANNOTATIONS, CONTROLLER_LABEL,
    KIND_ANNOTATION, LABEL_PREFIX, MARKER_LABEL, NAMESPACE_ANNOTATION, NAMESPACE_LABEL,
    NAMESPACE_LABEL_PREFIX, NAME_ANNOTATION, RESERVED_KEY_PREFIX, SYSTEM_LABELS, UID_ANNOTATION,
};

use crate::mapping::{
    EvictionPolicy, InMemoryMappingStore, KeyScope, MappingStore, NamespaceMapping,
    StaticNamespaceMapping,
};
use crate::metadata::{apply_annotations, copy_maps, reset_object_metadata, StringMap};
use crate::naming::{
    hashed_host_namespace, hashed_label_key, namespace_suffix, safe_concat_name, NamespacedName,
};
use crate::owner::{owner_references, HostOwner};
use crate::selector::{host_label_selector, virtual_label_selector, SelectorRewrite, UnmappedKeys};

/// Leading literal of cluster-scoped host names in multi-namespace mode
const CLUSTER_NAME_PREFIX: &str = "vcluster";

/// Separator literal between identity parts
const SEPARATOR: &str = "x";

/// Value of the origin-kind annotation for `K`: `"{group}/{version}, Kind={kind}"`.
///
/// Core types have an empty group, e.g. `"/v1, Kind=Pod"`.
pub fn kind_annotation_value<K>() -> String
where
    K: Resource,
    K::DynamicType: Default,
{
    let dt = K::DynamicType::default();
    format!("{}/{}, Kind={}", K::group(&dt), K::version(&dt), K::kind(&dt))
}

/// Translation mode
#[derive(Debug, Clone)]
pub enum Mode {
    /// Identity translation into one host namespace
    SingleNamespace,
    /// Hashed translation into per-namespace host namespaces
    MultiNamespace(MultiNamespace),
}

/// State owned by multi-namespace mode
#[derive(Clone)]
pub struct MultiNamespace {
    namespace_prefix: String,
    namespace_suffix: String,
    store: Arc<dyn MappingStore>,
}

impl MultiNamespace {
    /// Prefix of hashed host namespaces
    pub fn namespace_prefix(&self) -> &str {
        &self.namespace_prefix
    }

    /// Digest identifying this vcluster instance in host namespace names
    pub fn namespace_suffix(&self) -> &str {
        &self.namespace_suffix
    }

    /// The mapping store recording forward key derivations
    pub fn store(&self) -> &Arc<dyn MappingStore> {
        &self.store
    }
}

impl fmt::Debug for MultiNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiNamespace")
            .field("namespace_prefix", &self.namespace_prefix)
            .field("namespace_suffix", &self.namespace_suffix)
            .field("recorded_keys", &self.store.len())
            .finish()
    }
}

/// Builder for [`Translator`]
pub struct TranslatorBuilder {
    config: TranslatorConfig,
    store: Option<Arc<dyn MappingStore>>,
    namespace_mapping: Option<Arc<dyn NamespaceMapping>>,
}

impl TranslatorBuilder {
    /// Use the given mapping store (required in multi-namespace mode)
    pub fn mapping_store(mut self, store: Arc<dyn MappingStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use the given namespace pins instead of the ones in the config
    pub fn namespace_mapping(mut self, mapping: Arc<dyn NamespaceMapping>) -> Self {
        self.namespace_mapping = Some(mapping);
        self
    }

    /// Validate the config and build the translator.
    ///
    /// Multi-namespace mode without a mapping store is a configuration
    /// error: reverse key lookups would silently fail forever.
    pub fn build(self) -> Result<Translator> {
        let config = self.config;
        config.validate()?;

        let mode = match config.mode {
            SyncMode::SingleNamespace => Mode::SingleNamespace,
            SyncMode::MultiNamespace => {
                let store = self.store.ok_or_else(|| {
                    Error::config_field(
                        "mappingStore",
                        "multi-namespace translation requires a mapping store",
                    )
                })?;
                Mode::MultiNamespace(MultiNamespace {
                    namespace_suffix: namespace_suffix(
                        &config.current_namespace,
                        &config.vcluster_name,
                    ),
                    namespace_prefix: config.namespace_prefix,
                    store,
                })
            }
        };

        let namespace_mapping: Arc<dyn NamespaceMapping> = match self.namespace_mapping {
            Some(mapping) => mapping,
            None => Arc::new(StaticNamespaceMapping::new(config.namespace_mappings)),
        };

        info!(
            vcluster = %config.vcluster_name,
            namespace = %config.current_namespace,
            mode = ?config.mode,
            "translator configured"
        );

        Ok(Translator {
            vcluster_name: config.vcluster_name,
            current_namespace: config.current_namespace,
            mode,
            namespace_mapping,
            synced_labels: config.synced_labels,
        })
    }
}

/// Immutable translation policy for one vcluster instance.
#[derive(Clone)]
pub struct Translator {
    vcluster_name: String,
    current_namespace: String,
    mode: Mode,
    namespace_mapping: Arc<dyn NamespaceMapping>,
    synced_labels: Vec<String>,
}

impl fmt::Debug for Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translator")
            .field("vcluster_name", &self.vcluster_name)
            .field("current_namespace", &self.current_namespace)
            .field("mode", &self.mode)
            .field("synced_labels", &self.synced_labels)
            .finish()
    }
}

fn non_empty_namespace(meta: &ObjectMeta) -> Option<&str> {
    meta.namespace.as_deref().filter(|ns| !ns.is_empty())
}

fn get<'a>(map: &'a Option<BTreeMap<String, String>>, key: &str) -> Option<&'a str> {
    map.as_ref().and_then(|m| m.get(key)).map(String::as_str)
}

/// Re-add host labels outside the reserved prefix that are not set yet
fn keep_host_only_labels(labels: &mut StringMap, host_labels: &StringMap) {
    for (key, value) in host_labels {
        if key.starts_with(RESERVED_KEY_PREFIX) {
            continue;
        }
        labels.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

/// Clone `obj` under a new identity with server-populated metadata reset
fn copy_object_with_name<K>(obj: &K, name: &NamespacedName) -> K
where
    K: Resource + Clone,
{
    let mut target = obj.clone();
    let meta = target.meta_mut();
    reset_object_metadata(meta);
    meta.name = Some(name.name.clone());
    if non_empty_namespace(obj.meta()).is_some() {
        meta.namespace = name.namespace.clone();
    }
    target
}

impl Translator {
    /// Start building a translator from config
    pub fn builder(config: TranslatorConfig) -> TranslatorBuilder {
        TranslatorBuilder {
            config,
            store: None,
            namespace_mapping: None,
        }
    }

    /// Build a translator with an in-memory mapping store sized from config
    pub fn from_config(config: TranslatorConfig) -> Result<Self> {
        let store = InMemoryMappingStore::new(EvictionPolicy::from(&config.mapping_store));
        Self::builder(config).mapping_store(Arc::new(store)).build()
    }

    /// Identity of this vcluster instance
    pub fn vcluster_name(&self) -> &str {
        &self.vcluster_name
    }

    /// Host namespace the vcluster control plane runs in
    pub fn current_namespace(&self) -> &str {
        &self.current_namespace
    }

    /// Translation mode
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Whether virtual namespaces are spread over hashed host namespaces
    pub fn is_multi_namespace(&self) -> bool {
        matches!(self.mode, Mode::MultiNamespace(_))
    }

    fn is_synced_label(&self, key: &str) -> bool {
        self.synced_labels
            .iter()
            .any(|pattern| match pattern.strip_suffix('*') {
                Some(prefix) => key.starts_with(prefix),
                None => pattern == key,
            })
    }

    fn is_pinned(&self, virtual_namespace: &str) -> bool {
        self.namespace_mapping
            .virtual_namespace_override(virtual_namespace)
            .is_some()
    }

    // =========================================================================
    // Names and namespaces
    // =========================================================================

    /// Host name of a namespaced object. Names never change; only the
    /// namespace moves.
    pub fn host_name(&self, name: &str, _virtual_namespace: &str) -> String {
        name.to_string()
    }

    /// Host name of a cluster-scoped object.
    ///
    /// In multi-namespace mode:
    /// `SafeConcat("vcluster", name, "x", currentNamespace, "x", vclusterName)`.
    /// An empty name stays empty.
    pub fn host_name_cluster(&self, name: &str) -> String {
        match &self.mode {
            Mode::SingleNamespace => name.to_string(),
            Mode::MultiNamespace(_) if name.is_empty() => String::new(),
            Mode::MultiNamespace(_) => safe_concat_name(&[
                CLUSTER_NAME_PREFIX,
                name,
                SEPARATOR,
                &self.current_namespace,
                SEPARATOR,
                &self.vcluster_name,
            ]),
        }
    }

    /// Host namespace of a virtual namespace.
    ///
    /// Pinned namespaces bypass hashing in multi-namespace mode.
    pub fn host_namespace(&self, virtual_namespace: &str) -> String {
        match &self.mode {
            Mode::SingleNamespace => virtual_namespace.to_string(),
            Mode::MultiNamespace(multi) => self
                .namespace_mapping
                .virtual_namespace_override(virtual_namespace)
                .unwrap_or_else(|| {
                    hashed_host_namespace(
                        &multi.namespace_prefix,
                        virtual_namespace,
                        &multi.namespace_suffix,
                    )
                }),
        }
    }

    /// Host identity of a virtual identity
    pub fn host_identity(&self, virtual_name: &NamespacedName) -> NamespacedName {
        match &virtual_name.namespace {
            Some(ns) => NamespacedName::new(
                self.host_name(&virtual_name.name, ns),
                self.host_namespace(ns),
            ),
            None => NamespacedName::cluster(self.host_name_cluster(&virtual_name.name)),
        }
    }

    /// Marker label value of cluster-scoped host objects owned by this instance
    pub fn marker_label_cluster(&self) -> String {
        safe_concat_name(&[&self.current_namespace, SEPARATOR, &self.vcluster_name])
    }

    /// Whether a host namespace can hold objects of this instance
    pub fn is_targeted_namespace(&self, host_namespace: &str) -> bool {
        match &self.mode {
            Mode::SingleNamespace => true,
            Mode::MultiNamespace(multi) => {
                self.namespace_mapping
                    .host_namespace_override(host_namespace)
                    .is_some()
                    || (host_namespace.starts_with(&multi.namespace_prefix)
                        && host_namespace.ends_with(&multi.namespace_suffix))
            }
        }
    }

    /// Whether `host_obj` was produced by this vcluster instance.
    ///
    /// - Cluster-scoped: the marker label equals [`Self::marker_label_cluster`].
    /// - Single-namespace: the marker label equals the vcluster name.
    /// - Multi-namespace: the namespace is targeted, the origin-name
    ///   annotation is set and the origin-kind annotation, when set,
    ///   matches `K`.
    pub fn is_managed<K>(&self, host_obj: &K) -> bool
    where
        K: Resource,
        K::DynamicType: Default,
    {
        let meta = host_obj.meta();
        let Some(namespace) = non_empty_namespace(meta) else {
            return get(&meta.labels, MARKER_LABEL)
                == Some(self.marker_label_cluster().as_str());
        };

        match &self.mode {
            Mode::SingleNamespace => {
                get(&meta.labels, MARKER_LABEL) == Some(self.vcluster_name.as_str())
            }
            Mode::MultiNamespace(_) => {
                if !self.is_targeted_namespace(namespace)
                    || get(&meta.annotations, NAME_ANNOTATION)
                        .unwrap_or_default()
                        .is_empty()
                {
                    return false;
                }
                match get(&meta.annotations, KIND_ANNOTATION).filter(|k| !k.is_empty()) {
                    Some(kind) => kind == kind_annotation_value::<K>(),
                    None => true,
                }
            }
        }
    }

    /// Virtual identity a host object was synced from.
    ///
    /// Read from the origin annotations; in single-namespace mode a host
    /// object without them maps to itself.
    pub fn virtual_name(&self, host_meta: &ObjectMeta) -> Option<NamespacedName> {
        if let Some(name) =
            get(&host_meta.annotations, NAME_ANNOTATION).filter(|n| !n.is_empty())
        {
            let namespace =
                get(&host_meta.annotations, NAMESPACE_ANNOTATION).unwrap_or_default();
            return Some(NamespacedName::new(name, namespace));
        }

        match &self.mode {
            Mode::SingleNamespace => {
                let name = host_meta.name.as_deref().filter(|n| !n.is_empty())?;
                Some(NamespacedName::new(
                    name,
                    non_empty_namespace(host_meta).unwrap_or_default(),
                ))
            }
            Mode::MultiNamespace(_) => None,
        }
    }

    /// Virtual namespace of a host namespace.
    ///
    /// Hashed namespaces cannot be inverted; only pins are known in
    /// multi-namespace mode.
    pub fn virtual_namespace(&self, host_namespace: &str) -> Option<String> {
        match &self.mode {
            Mode::SingleNamespace => Some(host_namespace.to_string()),
            Mode::MultiNamespace(_) => self
                .namespace_mapping
                .host_namespace_override(host_namespace),
        }
    }

    // =========================================================================
    // Label keys
    // =========================================================================

    fn lookup_virtual_key(
        &self,
        store: &dyn MappingStore,
        scope: KeyScope,
        host_key: &str,
    ) -> Option<String> {
        match store.lookup_reverse_key(&scope, host_key) {
            Some(virtual_key) => {
                // keep the forward entry alive alongside the reverse one
                store.record_forward_key(&scope, &virtual_key, host_key);
                Some(virtual_key)
            }
            None => {
                debug!(%scope, host_key, "no recorded virtual key");
                None
            }
        }
    }

    /// Host key of a label on an object in `virtual_namespace`
    pub fn host_label(&self, key: &str, virtual_namespace: &str) -> String {
        let Mode::MultiNamespace(multi) = &self.mode else {
            return key.to_string();
        };
        if self.is_synced_label(key) || self.is_pinned(virtual_namespace) {
            return key.to_string();
        }

        let host_key =
            hashed_label_key(LABEL_PREFIX, virtual_namespace, &self.vcluster_name, key);
        multi.store.record_forward_key(
            &KeyScope::Namespaced(virtual_namespace.to_string()),
            key,
            &host_key,
        );
        host_key
    }

    /// Virtual key of a host label on an object in `virtual_namespace`.
    ///
    /// `None` means no known virtual equivalent.
    pub fn virtual_label(&self, host_key: &str, virtual_namespace: &str) -> Option<String> {
        let Mode::MultiNamespace(multi) = &self.mode else {
            return Some(host_key.to_string());
        };
        if self.is_synced_label(host_key)
            || self.is_pinned(virtual_namespace)
            || !host_key.starts_with(LABEL_PREFIX)
        {
            return Some(host_key.to_string());
        }

        self.lookup_virtual_key(
            multi.store.as_ref(),
            KeyScope::Namespaced(virtual_namespace.to_string()),
            host_key,
        )
    }

    /// Host key of a label on a cluster-scoped object.
    ///
    /// In multi-namespace mode:
    /// `SafeConcat(labelPrefix, currentNamespace, "x", vclusterName, "x", sha256(key)[..10])`,
    /// recorded in the mapping store on every call.
    pub fn host_label_cluster(&self, key: &str) -> String {
        let Mode::MultiNamespace(multi) = &self.mode else {
            return key.to_string();
        };
        if self.is_synced_label(key) {
            return key.to_string();
        }

        let host_key = hashed_label_key(
            LABEL_PREFIX,
            &self.current_namespace,
            &self.vcluster_name,
            key,
        );
        multi.store.record_forward_key(&KeyScope::Cluster, key, &host_key);
        host_key
    }

    /// Virtual key of a host label on a cluster-scoped object.
    ///
    /// Synced labels and keys outside the hashed-label prefix pass through.
    /// `None` means no known virtual equivalent.
    pub fn virtual_label_cluster(&self, host_key: &str) -> Option<String> {
        let Mode::MultiNamespace(multi) = &self.mode else {
            return Some(host_key.to_string());
        };
        if self.is_synced_label(host_key) || !host_key.starts_with(LABEL_PREFIX) {
            return Some(host_key.to_string());
        }

        self.lookup_virtual_key(multi.store.as_ref(), KeyScope::Cluster, host_key)
    }

    // =========================================================================
    // Label maps
    // =========================================================================

    /// Host labels for a namespaced object.
    ///
    /// Keys are translated, the ownership and origin-namespace markers are
    /// stamped, the controller label and unreserved host-only labels are
    /// carried over from `host_labels`.
    pub fn host_labels_map(
        &self,
        virtual_labels: &StringMap,
        host_labels: Option<&StringMap>,
        virtual_namespace: &str,
    ) -> StringMap {
        if self.is_multi_namespace() && self.is_pinned(virtual_namespace) {
            return virtual_labels.clone();
        }

        let mut labels: StringMap = virtual_labels
            .iter()
            .map(|(k, v)| (self.host_label(k, virtual_namespace), v.clone()))
            .collect();

        labels.insert(MARKER_LABEL.to_string(), self.vcluster_name.clone());
        if virtual_namespace.is_empty() {
            labels.remove(NAMESPACE_LABEL);
        } else {
            labels.insert(NAMESPACE_LABEL.to_string(), virtual_namespace.to_string());
        }

        if let Some(host_labels) = host_labels {
            if let Some(controller) = host_labels
                .get(CONTROLLER_LABEL)
                .filter(|c| !c.is_empty())
            {
                labels.insert(CONTROLLER_LABEL.to_string(), controller.clone());
            }
            keep_host_only_labels(&mut labels, host_labels);
        }
        labels
    }

    /// Host labels for a cluster-scoped object
    pub fn host_labels_map_cluster(
        &self,
        virtual_labels: &StringMap,
        host_labels: Option<&StringMap>,
    ) -> StringMap {
        let mut labels: StringMap = virtual_labels
            .iter()
            .map(|(k, v)| (self.host_label_cluster(k), v.clone()))
            .collect();

        if let Some(controller) = host_labels
            .and_then(|l| l.get(CONTROLLER_LABEL))
            .filter(|c| !c.is_empty())
        {
            labels.insert(CONTROLLER_LABEL.to_string(), controller.clone());
        }
        labels.insert(MARKER_LABEL.to_string(), self.marker_label_cluster());
        labels
    }

    /// Virtual labels for a namespaced object.
    ///
    /// System labels, namespace labels and `excluded` keys are not synced
    /// back; the virtual object's own values for them are kept. Keys with no
    /// known virtual equivalent are dropped.
    pub fn virtual_labels_map(
        &self,
        host_labels: &StringMap,
        virtual_labels: Option<&StringMap>,
        virtual_namespace: &str,
        excluded: &[&str],
    ) -> StringMap {
        if self.is_multi_namespace() && self.is_pinned(virtual_namespace) {
            return host_labels.clone();
        }

        copy_maps(host_labels, virtual_labels, |key| {
            SYSTEM_LABELS.contains(&key)
                || excluded.contains(&key)
                || key.starts_with(NAMESPACE_LABEL_PREFIX)
        })
        .into_iter()
        .filter_map(|(k, v)| self.virtual_label(&k, virtual_namespace).map(|vk| (vk, v)))
        .collect()
    }

    /// Virtual labels for a cluster-scoped object
    pub fn virtual_labels_map_cluster(
        &self,
        host_labels: &StringMap,
        virtual_labels: Option<&StringMap>,
        excluded: &[&str],
    ) -> StringMap {
        let mut labels: StringMap = copy_maps(host_labels, virtual_labels, |key| {
            key == MARKER_LABEL
                || key == CONTROLLER_LABEL
                || excluded.contains(&key)
                || key.starts_with(NAMESPACE_LABEL_PREFIX)
        })
        .into_iter()
        .filter_map(|(k, v)| self.virtual_label_cluster(&k).map(|vk| (vk, v)))
        .collect();

        keep_host_only_labels(&mut labels, host_labels);
        labels
    }

    /// Host labels for `virtual_obj`, merged with an existing host object
    pub fn host_labels<K: Resource>(&self, virtual_obj: &K, host_obj: Option<&K>) -> StringMap {
        let empty = StringMap::new();
        let meta = virtual_obj.meta();
        let virtual_labels = meta.labels.as_ref().unwrap_or(&empty);
        let host_labels = host_obj.and_then(|o| o.meta().labels.as_ref());

        match non_empty_namespace(meta) {
            Some(ns) => self.host_labels_map(virtual_labels, host_labels, ns),
            None => self.host_labels_map_cluster(virtual_labels, host_labels),
        }
    }

    /// Virtual labels for `host_obj`, merged with an existing virtual object
    pub fn virtual_labels<K: Resource>(
        &self,
        host_obj: &K,
        virtual_obj: Option<&K>,
        virtual_namespace: &str,
    ) -> StringMap {
        let empty = StringMap::new();
        let meta = host_obj.meta();
        let host_labels = meta.labels.as_ref().unwrap_or(&empty);
        let virtual_labels = virtual_obj.and_then(|o| o.meta().labels.as_ref());

        match non_empty_namespace(meta) {
            Some(_) => self.virtual_labels_map(host_labels, virtual_labels, virtual_namespace, &[]),
            None => self.virtual_labels_map_cluster(host_labels, virtual_labels, &[]),
        }
    }

    // =========================================================================
    // Annotations and whole-object metadata
    // =========================================================================

    /// Host annotations for `virtual_obj`.
    ///
    /// Merges with the existing host object's annotations, then re-stamps the
    /// origin name, uid, namespace and kind annotations.
    pub fn host_annotations<K>(
        &self,
        virtual_obj: &K,
        host_obj: Option<&K>,
        excluded: &[&str],
    ) -> StringMap
    where
        K: Resource,
        K::DynamicType: Default,
    {
        let empty = StringMap::new();
        let meta = virtual_obj.meta();
        let from = meta.annotations.as_ref().unwrap_or(&empty);
        let to = host_obj
            .and_then(|o| o.meta().annotations.as_ref())
            .unwrap_or(&empty);

        let mut excluded_keys = BACK_REFERENCE_ANNOTATIONS.to_vec();
        excluded_keys.extend_from_slice(excluded);
        let mut annotations = apply_annotations(from, to, &excluded_keys);

        annotations.insert(
            NAME_ANNOTATION.to_string(),
            meta.name.clone().unwrap_or_default(),
        );
        annotations.insert(
            UID_ANNOTATION.to_string(),
            meta.uid.clone().unwrap_or_default(),
        );
        match non_empty_namespace(meta) {
            Some(ns) => {
                annotations.insert(NAMESPACE_ANNOTATION.to_string(), ns.to_string());
            }
            None => {
                annotations.remove(NAMESPACE_ANNOTATION);
            }
        }
        annotations.insert(KIND_ANNOTATION.to_string(), kind_annotation_value::<K>());
        annotations
    }

    /// Virtual annotations for `host_obj`.
    ///
    /// Reserved annotations never reach the virtual side; the virtual
    /// object's own values for excluded keys are kept.
    pub fn virtual_annotations<K: Resource>(
        &self,
        host_obj: &K,
        virtual_obj: Option<&K>,
        excluded: &[&str],
    ) -> StringMap {
        let empty = StringMap::new();
        let from = host_obj.meta().annotations.as_ref().unwrap_or(&empty);
        let to = virtual_obj.and_then(|o| o.meta().annotations.as_ref());

        copy_maps(from, to, |key| {
            excluded.contains(&key)
                || BACK_REFERENCE_ANNOTATIONS.contains(&key)
                || BOOKKEEPING_ANNOTATIONS.contains(&key)
        })
    }

    /// Host copy of `virtual_obj` named `name`.
    ///
    /// Server-populated metadata is reset. Namespaced objects get an owner
    /// reference to `owner` when one is given.
    pub fn host_metadata<K>(
        &self,
        virtual_obj: &K,
        name: &NamespacedName,
        owner: Option<&HostOwner>,
        excluded_annotations: &[&str],
    ) -> K
    where
        K: Resource + Clone,
        K::DynamicType: Default,
    {
        let mut host = copy_object_with_name(virtual_obj, name);
        let annotations = self.host_annotations(virtual_obj, None, excluded_annotations);
        let labels = self.host_labels(virtual_obj, None);

        let meta = host.meta_mut();
        if non_empty_namespace(virtual_obj.meta()).is_some() {
            meta.owner_references = owner_references(owner, Some(virtual_obj.meta()));
        }
        meta.annotations = Some(annotations);
        meta.labels = Some(labels);
        host
    }

    /// Virtual copy of `host_obj` named `name`
    pub fn virtual_metadata<K>(
        &self,
        host_obj: &K,
        name: &NamespacedName,
        excluded_annotations: &[&str],
    ) -> K
    where
        K: Resource + Clone,
    {
        let mut virt = copy_object_with_name(host_obj, name);
        let annotations = self.virtual_annotations(host_obj, None, excluded_annotations);
        let labels = self.virtual_labels(host_obj, None, name.namespace_str());

        let meta = virt.meta_mut();
        meta.annotations = Some(annotations);
        meta.labels = Some(labels);
        virt
    }

    // =========================================================================
    // Selectors
    // =========================================================================

    /// Host selector for a selector on an object in `virtual_namespace`
    pub fn host_label_selector(
        &self,
        selector: &LabelSelector,
        virtual_namespace: &str,
    ) -> LabelSelector {
        host_label_selector(selector, |key| self.host_label(key, virtual_namespace))
    }

    /// Host selector for a selector on a cluster-scoped object
    pub fn host_label_selector_cluster(&self, selector: &LabelSelector) -> LabelSelector {
        host_label_selector(selector, |key| self.host_label_cluster(key))
    }

    /// Virtual selector for a host selector on an object in `virtual_namespace`
    pub fn virtual_label_selector(
        &self,
        selector: &LabelSelector,
        virtual_namespace: &str,
        unmapped: UnmappedKeys,
    ) -> SelectorRewrite {
        virtual_label_selector(
            selector,
            |key| self.virtual_label(key, virtual_namespace),
            unmapped,
        )
    }

    /// Virtual selector for a host selector on a cluster-scoped object
    pub fn virtual_label_selector_cluster(
        &self,
        selector: &LabelSelector,
        unmapped: UnmappedKeys,
    ) -> SelectorRewrite {
        virtual_label_selector(selector, |key| self.virtual_label_cluster(key), unmapped)
    }
}
