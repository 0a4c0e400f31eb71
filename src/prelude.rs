//! Everything an application needs to define entities and run the store.
//!
//! `use trellis::prelude::*;` brings in the entity contract, the store and
//! its options, the cascade coordinator and the in-memory backing store.

pub use crate::backend::{
    BackingStore, Condition, InMemoryBackingStore, KeyCondition, MemoryStoreOptions, SortCondition,
    TableSchema,
};
pub use crate::core::{Attributes, ErrorKind, ItemKey, Result, TrellisError};
pub use crate::store::{
    ChildRef, DeleteOptions, Entity, EntityDescriptor, EntityStore, ParentLink, QueryInput,
    Relationship, RelationshipRegistry, StoreConfig, StoredItem, entity_ref,
};
pub use crate::stream::{CascadeCoordinator, CascadeOutcome, ChangeEvent};
