// ============================================================================
// Entity Store
// ============================================================================
//
// Referential integrity on top of a backing store that is only atomic per
// item (plus bounded transactions):
//
// - Create validates the parent, reserves unique values and writes the
//   relationship edge in one transaction
// - Update uses optimistic versioning and swaps unique reservations atomically
// - Delete is a TTL tombstone; the cascade coordinator propagates it
// - Child enumeration fans out over the configured relationship shards
//
// ============================================================================

mod children;
mod create;
mod delete;
mod read;
mod update;

pub mod config;
pub mod entity;
pub mod item;
mod plan;
pub mod registry;
pub mod ttl;

pub use config::{DEFAULT_RELATIONSHIP_TABLE, DEFAULT_UNIQUE_TABLE, StoreConfig};
pub use delete::DeleteOptions;
pub use entity::{Entity, EntityDescriptor, ParentCheck, ParentLink, entity_ref};
pub use item::{ChildRef, StoredItem};
pub use read::QueryInput;
pub use registry::{Relationship, RelationshipRegistry};
pub use ttl::{is_deleted, now_unix, parent_exists_condition, tombstone_filter};

use std::sync::Arc;

use crate::backend::{BackingStore, TableSchema};
use crate::shard;

/// Entry point for all entity operations.
///
/// Cloning is cheap: clones share the backing store handle and registry.
///
/// ```
/// # tokio_test::block_on(async {
/// use std::sync::Arc;
/// use trellis::prelude::*;
///
/// let backend = Arc::new(InMemoryBackingStore::new());
/// let store = EntityStore::new(backend.clone(), StoreConfig::default());
/// backend.create_table(store.relationship_table_schema()).await?;
/// backend.create_table(store.unique_table_schema()).await?;
/// backend
///     .create_table(TableSchema::new("organizations", "id").with_ttl("ttl"))
///     .await?;
///
/// let org = EntityDescriptor::new("organization", "organizations", "o1");
/// store.create(&org, Attributes::new()).await?;
/// assert_eq!(store.get("organizations", &org.key()).await?.version, 1);
/// # Ok::<(), TrellisError>(())
/// # }).unwrap();
/// ```
#[derive(Clone)]
pub struct EntityStore {
    backend: Arc<dyn BackingStore>,
    config: StoreConfig,
    registry: Option<Arc<RelationshipRegistry>>,
}

impl EntityStore {
    pub fn new(backend: Arc<dyn BackingStore>, config: StoreConfig) -> Self {
        Self {
            backend,
            config: config.normalized(),
            registry: None,
        }
    }

    pub fn with_registry(
        backend: Arc<dyn BackingStore>,
        config: StoreConfig,
        registry: RelationshipRegistry,
    ) -> Self {
        let mut store = Self::new(backend, config);
        store.set_registry(registry);
        store
    }

    pub fn set_registry(&mut self, registry: RelationshipRegistry) {
        self.registry = Some(Arc::new(registry));
    }

    pub fn registry(&self) -> Option<&RelationshipRegistry> {
        self.registry.as_deref()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn BackingStore> {
        &self.backend
    }

    /// Partition key of the edge between `parent_ref` and `child_ref` under
    /// the configured shard count.
    pub fn relationship_key(&self, parent_ref: &str, child_ref: &str) -> String {
        shard::relationship_partition_key(parent_ref, child_ref, self.config.shard_count)
    }

    /// Schema the relationship table must be declared with.
    pub fn relationship_table_schema(&self) -> TableSchema {
        TableSchema::new(self.config.relationship_table.clone(), item::EDGE_PARTITION_KEY)
            .with_sort_key(item::EDGE_CHILD_REF)
            .with_ttl(item::ATTR_TTL)
    }

    /// Schema the unique-constraint table must be declared with.
    pub fn unique_table_schema(&self) -> TableSchema {
        TableSchema::new(self.config.unique_table.clone(), item::CONSTRAINT_PARTITION_KEY)
            .with_sort_key(item::CONSTRAINT_SORT_KEY)
            .with_ttl(item::ATTR_TTL)
    }
}
