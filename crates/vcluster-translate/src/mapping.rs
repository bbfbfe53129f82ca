//! Mapping store and namespace pins
//!
//! Forward label-key translation is a one-way hash. Every forward
//! derivation is recorded here so the reverse direction can find the
//! original key later. The store is the only shared mutable state in the
//! translation core; both implementations are safe for concurrent sync
//! workers and recording the same pair twice is a no-op.

use std::collections::BTreeMap;
use std::fmt;

use dashmap::DashMap;
use moka::sync::Cache;
use tracing::debug;
use vcluster_common::config::MappingStoreConfig;

/// Which key space a label translation belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyScope {
    /// Labels of cluster-scoped objects
    Cluster,
    /// Labels of objects in the given virtual namespace
    Namespaced(String),
}

impl fmt::Display for KeyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyScope::Cluster => f.write_str("cluster"),
            KeyScope::Namespaced(ns) => write!(f, "namespace/{}", ns),
        }
    }
}

/// Lookup table of virtual <-> host label keys.
///
/// A miss is never an error: it means "no known virtual equivalent".
pub trait MappingStore: Send + Sync {
    /// Record that `virtual_key` translates to `host_key` in `scope`
    fn record_forward_key(&self, scope: &KeyScope, virtual_key: &str, host_key: &str);

    /// Find the virtual key a host key was derived from
    fn lookup_reverse_key(&self, scope: &KeyScope, host_key: &str) -> Option<String>;

    /// Find the host key recorded for a virtual key
    fn lookup_forward_key(&self, scope: &KeyScope, virtual_key: &str) -> Option<String>;

    /// Number of recorded forward mappings
    fn len(&self) -> usize;

    /// Whether nothing has been recorded yet
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How the in-memory store bounds its growth.
///
/// Growth is proportional to the number of distinct label keys ever
/// translated, not to the number of objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Keep every mapping for the life of the process
    #[default]
    Unbounded,
    /// Keep at most `max_entries` mappings per direction, evicting the
    /// least recently used entries first
    Bounded {
        /// Capacity per direction
        max_entries: u64,
    },
}

impl From<&MappingStoreConfig> for EvictionPolicy {
    fn from(config: &MappingStoreConfig) -> Self {
        match config.max_entries {
            Some(max_entries) => EvictionPolicy::Bounded { max_entries },
            None => EvictionPolicy::Unbounded,
        }
    }
}

type ScopedKey = (KeyScope, String);

enum Table {
    Unbounded(DashMap<ScopedKey, String>),
    Bounded(Cache<ScopedKey, String>),
}

impl Table {
    fn new(policy: EvictionPolicy) -> Self {
        match policy {
            EvictionPolicy::Unbounded => Table::Unbounded(DashMap::new()),
            EvictionPolicy::Bounded { max_entries } => {
                Table::Bounded(
                    Cache::builder()
                        .max_capacity(max_entries)
                        .eviction_policy(moka::policy::EvictionPolicy::lru())
                        .build(),
                )
            }
        }
    }

    fn get(&self, key: &ScopedKey) -> Option<String> {
        match self {
            Table::Unbounded(map) => map.get(key).map(|v| v.clone()),
            Table::Bounded(cache) => cache.get(key),
        }
    }

    fn insert(&self, key: ScopedKey, value: String) {
        match self {
            Table::Unbounded(map) => {
                map.insert(key, value);
            }
            Table::Bounded(cache) => cache.insert(key, value),
        }
    }

    /// Apply evictions the bounded cache has queued
    fn settle(&self) {
        if let Table::Bounded(cache) = self {
            cache.run_pending_tasks();
        }
    }

    fn len(&self) -> usize {
        self.settle();
        match self {
            Table::Unbounded(map) => map.len(),
            Table::Bounded(cache) => cache.entry_count() as usize,
        }
    }
}

/// Process-local mapping store.
pub struct InMemoryMappingStore {
    policy: EvictionPolicy,
    forward: Table,
    reverse: Table,
}

impl InMemoryMappingStore {
    /// Create a store with the given eviction policy
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            policy,
            forward: Table::new(policy),
            reverse: Table::new(policy),
        }
    }

    /// Create an unbounded store
    pub fn unbounded() -> Self {
        Self::new(EvictionPolicy::Unbounded)
    }

    /// The eviction policy in force
    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }
}

impl Default for InMemoryMappingStore {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl MappingStore for InMemoryMappingStore {
    fn record_forward_key(&self, scope: &KeyScope, virtual_key: &str, host_key: &str) {
        if virtual_key.is_empty() || host_key.is_empty() {
            return;
        }
        let forward_key = (scope.clone(), virtual_key.to_string());
        if self.forward.get(&forward_key).as_deref() != Some(host_key) {
            debug!(%scope, virtual_key, host_key, "recording label key mapping");
        }
        self.forward.insert(forward_key, host_key.to_string());
        self.reverse
            .insert((scope.clone(), host_key.to_string()), virtual_key.to_string());
    }

    fn lookup_reverse_key(&self, scope: &KeyScope, host_key: &str) -> Option<String> {
        self.reverse.get(&(scope.clone(), host_key.to_string()))
    }

    fn lookup_forward_key(&self, scope: &KeyScope, virtual_key: &str) -> Option<String> {
        self.forward.get(&(scope.clone(), virtual_key.to_string()))
    }

    fn len(&self) -> usize {
        self.reverse.settle();
        self.forward.len()
    }
}

/// Administrator-declared virtual namespace -> host namespace pins.
///
/// Pinned namespaces bypass hashing entirely.
pub trait NamespaceMapping: Send + Sync {
    /// Host namespace pinned for a virtual namespace
    fn virtual_namespace_override(&self, virtual_namespace: &str) -> Option<String>;

    /// Virtual namespace pinned to a host namespace
    fn host_namespace_override(&self, host_namespace: &str) -> Option<String>;
}

/// Pins known at startup, answering both directions.
#[derive(Debug, Clone, Default)]
pub struct StaticNamespaceMapping {
    virtual_to_host: BTreeMap<String, String>,
    host_to_virtual: BTreeMap<String, String>,
}

impl StaticNamespaceMapping {
    /// Build from virtual -> host pins
    pub fn new(pins: BTreeMap<String, String>) -> Self {
        let host_to_virtual = pins
            .iter()
            .map(|(v, h)| (h.clone(), v.clone()))
            .collect();
        Self {
            virtual_to_host: pins,
            host_to_virtual,
        }
    }
}

impl NamespaceMapping for StaticNamespaceMapping {
    fn virtual_namespace_override(&self, virtual_namespace: &str) -> Option<String> {
        self.virtual_to_host.get(virtual_namespace).cloned()
    }

    fn host_namespace_override(&self, host_namespace: &str) -> Option<String> {
        self.host_to_virtual.get(host_namespace).cloned()
    }
}
