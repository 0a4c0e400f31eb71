// ============================================================================
// Trellis
// ============================================================================
//
// Hierarchical entities with referential integrity on top of a key-value
// store that is only atomic per item (plus bounded transactions):
//
// - `shard`   relationship and unique-constraint partition keys
// - `backend` backing-store contract and the in-memory implementation
// - `store`   EntityStore: create / get / query / update / delete / TTL
// - `stream`  change events and the cascade coordinator
//
// ============================================================================

pub mod backend;
pub mod core;
pub mod prelude;
pub mod shard;
pub mod store;
pub mod stream;

pub use crate::core::{
    Attributes, BackendError, CancellationReason, ErrorKind, ItemKey, KeyScalar, Result,
    TrellisError,
};
pub use backend::{BackingStore, Condition, InMemoryBackingStore, MemoryStoreOptions, TableSchema};
pub use store::{
    ChildRef, DeleteOptions, Entity, EntityDescriptor, EntityStore, ParentCheck, ParentLink,
    QueryInput, Relationship, RelationshipRegistry, StoreConfig, StoredItem,
};
pub use stream::{CascadeCoordinator, CascadeOutcome, CascadeSummary, ChangeEvent, ChangeEventType};
