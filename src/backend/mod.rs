// ============================================================================
// Backing Store Contract
// ============================================================================
//
// The store layer only relies on single-item conditional writes, bounded
// multi-item transactions, partition queries and native TTL. Everything is
// expressed through the `BackingStore` trait so concrete stores stay
// pluggable; `InMemoryBackingStore` is the embedded implementation.
//
// ============================================================================

pub mod condition;
pub mod memory;
pub mod request;

pub use condition::Condition;
pub use memory::{InMemoryBackingStore, MemoryStoreOptions};
pub use request::{
    KeyCondition, QueryPage, QueryRequest, SortCondition, TableSchema, TransactItem,
    UpdateAction, UpdateRequest,
};

use crate::core::{Attributes, BackendResult, ItemKey};
use async_trait::async_trait;

/// Default item-count ceiling of one atomic transaction.
pub const DEFAULT_MAX_TRANSACTION_ITEMS: usize = 100;

#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Reads one item by key. Returns `None` when the item does not exist.
    async fn get_item(&self, table: &str, key: &ItemKey) -> BackendResult<Option<Attributes>>;

    /// Applies a single-item update, creating the item when it is absent and
    /// the condition allows it.
    ///
    /// A false condition is reported as `BackendError::ConditionalCheckFailed`.
    async fn update_item(&self, request: UpdateRequest) -> BackendResult<()>;

    /// Applies all items atomically or none of them.
    ///
    /// On abort returns `BackendError::TransactionCanceled` with one reason
    /// per submitted item, in submission order.
    async fn transact_write(&self, items: Vec<TransactItem>) -> BackendResult<()>;

    /// Returns one page of a partition query.
    async fn query(&self, request: QueryRequest) -> BackendResult<QueryPage>;

    /// Maximum number of items accepted by `transact_write`.
    fn max_transaction_items(&self) -> usize {
        DEFAULT_MAX_TRANSACTION_ITEMS
    }
}
