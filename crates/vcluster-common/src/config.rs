//! Translator configuration
//!
//! Loaded from a JSON file and/or the process environment. The environment
//! is read through the [`EnvSource`] trait so tests never touch global state.
//!
//! Environment overlay (highest priority):
//! 1. `VCLUSTER_NAME`
//! 2. `VCLUSTER_NAMESPACE`, falling back to `POD_NAMESPACE`
//! 3. `VCLUSTER_MULTI_NAMESPACE` (`true`/`false`)
//! 4. `VCLUSTER_NAMESPACE_PREFIX`

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const VCLUSTER_NAME_ENV: &str = "VCLUSTER_NAME";
const VCLUSTER_NAMESPACE_ENV: &str = "VCLUSTER_NAMESPACE";
const POD_NAMESPACE_ENV: &str = "POD_NAMESPACE";
const MULTI_NAMESPACE_ENV: &str = "VCLUSTER_MULTI_NAMESPACE";
const NAMESPACE_PREFIX_ENV: &str = "VCLUSTER_NAMESPACE_PREFIX";

/// Default prefix of host namespaces in multi-namespace mode
pub const DEFAULT_NAMESPACE_PREFIX: &str = "vcluster";

/// How virtual namespaces land on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncMode {
    /// All objects land in exactly one host namespace
    #[default]
    SingleNamespace,
    /// Every virtual namespace gets its own hashed host namespace
    MultiNamespace,
}

/// Mapping store sizing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingStoreConfig {
    /// Upper bound on recorded key mappings (absent = unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<u64>,
}

/// Immutable per-process translation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatorConfig {
    /// Identity of this vcluster instance
    pub vcluster_name: String,
    /// Host namespace the vcluster control plane runs in
    pub current_namespace: String,
    /// Single- or multi-namespace translation
    #[serde(default)]
    pub mode: SyncMode,
    /// Prefix of hashed host namespaces (multi-namespace mode)
    #[serde(default = "default_namespace_prefix")]
    pub namespace_prefix: String,
    /// Administrator pins: virtual namespace -> host namespace
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub namespace_mappings: BTreeMap<String, String>,
    /// Label keys that always cross the boundary unchanged.
    /// An entry ending in `*` matches by prefix.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synced_labels: Vec<String>,
    /// Mapping store sizing
    #[serde(default)]
    pub mapping_store: MappingStoreConfig,
}

fn default_namespace_prefix() -> String {
    DEFAULT_NAMESPACE_PREFIX.to_string()
}

impl TranslatorConfig {
    /// Create a config with defaults for everything but the identity
    pub fn new(vcluster_name: impl Into<String>, current_namespace: impl Into<String>) -> Self {
        Self {
            vcluster_name: vcluster_name.into(),
            current_namespace: current_namespace.into(),
            mode: SyncMode::default(),
            namespace_prefix: default_namespace_prefix(),
            namespace_mappings: BTreeMap::new(),
            synced_labels: Vec::new(),
            mapping_store: MappingStoreConfig::default(),
        }
    }

    /// Switch to the given mode
    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    /// Pin a virtual namespace to a fixed host namespace
    pub fn with_namespace_mapping(
        mut self,
        virtual_namespace: impl Into<String>,
        host_namespace: impl Into<String>,
    ) -> Self {
        self.namespace_mappings
            .insert(virtual_namespace.into(), host_namespace.into());
        self
    }

    /// Add a label key (or `prefix*`) that always passes through
    pub fn with_synced_label(mut self, key: impl Into<String>) -> Self {
        self.synced_labels.push(key.into());
        self
    }

    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|e| {
            Error::serialization(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Build a config purely from the environment
    pub fn from_env(env: &dyn EnvSource) -> Result<Self> {
        let mut config = Self::new(String::new(), String::new());
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment values on top of this config
    pub fn apply_env(&mut self, env: &dyn EnvSource) -> Result<()> {
        if let Some(name) = env.var(VCLUSTER_NAME_ENV) {
            self.vcluster_name = name;
        }
        if let Some(ns) = env
            .var(VCLUSTER_NAMESPACE_ENV)
            .or_else(|| env.var(POD_NAMESPACE_ENV))
        {
            self.current_namespace = ns;
        }
        if let Some(multi) = env.var(MULTI_NAMESPACE_ENV) {
            self.mode = match multi.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => SyncMode::MultiNamespace,
                "false" | "0" | "" => SyncMode::SingleNamespace,
                other => {
                    return Err(Error::config_field(
                        MULTI_NAMESPACE_ENV,
                        format!("expected true or false, got '{}'", other),
                    ))
                }
            };
        }
        if let Some(prefix) = env.var(NAMESPACE_PREFIX_ENV) {
            self.namespace_prefix = prefix;
        }
        Ok(())
    }

    /// Check the config is usable
    pub fn validate(&self) -> Result<()> {
        if self.vcluster_name.is_empty() {
            return Err(Error::config_field("vclusterName", "must not be empty"));
        }
        if self.current_namespace.is_empty() {
            return Err(Error::config_field("currentNamespace", "must not be empty"));
        }
        if self.mode == SyncMode::MultiNamespace && self.namespace_prefix.is_empty() {
            return Err(Error::config_field(
                "namespacePrefix",
                "must not be empty in multi-namespace mode",
            ));
        }

        let mut hosts = BTreeSet::new();
        for (virtual_ns, host_ns) in &self.namespace_mappings {
            if virtual_ns.is_empty() || host_ns.is_empty() {
                return Err(Error::config_field(
                    "namespaceMappings",
                    "namespace names must not be empty",
                ));
            }
            if !hosts.insert(host_ns.as_str()) {
                return Err(Error::config_field(
                    "namespaceMappings",
                    format!("host namespace '{}' is pinned more than once", host_ns),
                ));
            }
        }

        if self.mapping_store.max_entries == Some(0) {
            return Err(Error::config_field(
                "mappingStore.maxEntries",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Source of environment variables
#[cfg_attr(test, mockall::automock)]
pub trait EnvSource: Send + Sync {
    /// Read a variable, `None` when unset
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment
#[derive(Clone, Default)]
pub struct OsEnv;

impl EnvSource for OsEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}
