use super::{
    BackingStore, Condition, DEFAULT_MAX_TRANSACTION_ITEMS, QueryPage, QueryRequest, TableSchema,
    TransactItem, UpdateAction, UpdateRequest,
};
use crate::core::{
    Attributes, BackendError, BackendResult, CancellationReason, ItemKey, KeyScalar, int_attr,
};
use crate::stream::ChangeEvent;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::RwLock;
use tracing::{Level, event};

type SortSlot = Option<KeyScalar>;
type Location = (KeyScalar, SortSlot);

/// Tunables of the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStoreOptions {
    /// Item-count ceiling of one transaction.
    pub max_transaction_items: usize,
    /// Maximum number of items evaluated per query page.
    pub page_size: usize,
}

impl Default for MemoryStoreOptions {
    fn default() -> Self {
        Self {
            max_transaction_items: DEFAULT_MAX_TRANSACTION_ITEMS,
            page_size: 100,
        }
    }
}

struct MemoryTable {
    schema: TableSchema,
    partitions: HashMap<KeyScalar, BTreeMap<SortSlot, Attributes>>,
}

impl MemoryTable {
    fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            partitions: HashMap::new(),
        }
    }

    fn locate(&self, attributes: &Attributes) -> BackendResult<Location> {
        let partition = self.key_part(attributes, &self.schema.partition_key)?;
        let sort = match &self.schema.sort_key {
            Some(name) => Some(self.key_part(attributes, name)?),
            None => None,
        };
        Ok((partition, sort))
    }

    fn key_part(&self, attributes: &Attributes, name: &str) -> BackendResult<KeyScalar> {
        attributes
            .get(name)
            .and_then(KeyScalar::from_json)
            .ok_or_else(|| {
                BackendError::Validation(format!(
                    "missing or invalid key attribute '{}' for table '{}'",
                    name, self.schema.name
                ))
            })
    }

    fn key_of(&self, location: &Location) -> ItemKey {
        let mut key = ItemKey::single(self.schema.partition_key.clone(), location.0.to_json());
        if let (Some(name), Some(sort)) = (&self.schema.sort_key, &location.1) {
            key = key.with(name.clone(), sort.to_json());
        }
        key
    }

    fn get(&self, location: &Location) -> Option<&Attributes> {
        self.partitions
            .get(&location.0)
            .and_then(|partition| partition.get(&location.1))
    }

    fn write(&mut self, location: Location, next: Option<Attributes>) -> Option<Attributes> {
        match next {
            Some(item) => self
                .partitions
                .entry(location.0)
                .or_default()
                .insert(location.1, item),
            None => {
                let partition = self.partitions.get_mut(&location.0)?;
                let previous = partition.remove(&location.1);
                if partition.is_empty() {
                    self.partitions.remove(&location.0);
                }
                previous
            }
        }
    }

    fn reject_key_attribute(&self, name: &str) -> BackendResult<()> {
        if self.schema.is_key_attribute(name) {
            return Err(BackendError::Validation(format!(
                "cannot update key attribute '{}' of table '{}'",
                name, self.schema.name
            )));
        }
        Ok(())
    }

    fn apply_actions(
        &self,
        current: Option<&Attributes>,
        key: &ItemKey,
        actions: &[UpdateAction],
    ) -> BackendResult<Attributes> {
        let mut next = current
            .cloned()
            .unwrap_or_else(|| key.attributes().clone());
        for action in actions {
            match action {
                UpdateAction::Set(name, value) => {
                    self.reject_key_attribute(name)?;
                    next.insert(name.clone(), value.clone());
                }
                UpdateAction::Remove(name) => {
                    self.reject_key_attribute(name)?;
                    next.remove(name);
                }
                UpdateAction::Increment(name, delta) => {
                    self.reject_key_attribute(name)?;
                    let base = match next.get(name) {
                        None => 0,
                        Some(value) => value.as_i64().ok_or_else(|| {
                            BackendError::Validation(format!(
                                "attribute '{}' is not an integer",
                                name
                            ))
                        })?,
                    };
                    next.insert(name.clone(), Value::from(base.saturating_add(*delta)));
                }
            }
        }
        Ok(next)
    }
}

/// A write that passed its condition and is ready to be applied.
struct PlannedWrite {
    table: String,
    location: Location,
    next: Option<Attributes>,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, MemoryTable>,
    changes: VecDeque<ChangeEvent>,
    sequence: u64,
}

impl MemoryState {
    fn table(&self, name: &str) -> BackendResult<&MemoryTable> {
        self.tables
            .get(name)
            .ok_or_else(|| BackendError::TableNotFound(name.to_string()))
    }

    /// Resolves an item's target and next state.
    ///
    /// Returns `Ok(None)` for condition checks, which never write.
    fn plan(&self, item: &TransactItem) -> BackendResult<Option<PlannedWrite>> {
        let table = self.table(item.table())?;
        let (location, next) = match item {
            TransactItem::ConditionCheck { key, .. } => (table.locate(key.attributes())?, None),
            TransactItem::Put { item, .. } => (table.locate(item)?, Some(item.clone())),
            TransactItem::Delete { key, .. } => (table.locate(key.attributes())?, None),
            TransactItem::Update(request) => {
                let location = table.locate(request.key.attributes())?;
                let next =
                    table.apply_actions(table.get(&location), &request.key, &request.actions)?;
                (location, Some(next))
            }
        };

        let current = table.get(&location);
        if let Some(condition) = item.condition() {
            if !condition.evaluate(current) {
                return Err(BackendError::ConditionalCheckFailed);
            }
        }

        if matches!(item, TransactItem::ConditionCheck { .. }) {
            return Ok(None);
        }
        Ok(Some(PlannedWrite {
            table: item.table().to_string(),
            location,
            next,
        }))
    }

    fn commit(&mut self, write: PlannedWrite) -> BackendResult<()> {
        let table = self
            .tables
            .get_mut(&write.table)
            .ok_or_else(|| BackendError::TableNotFound(write.table.clone()))?;
        let keys = table.key_of(&write.location);
        let stream_enabled = table.schema.stream_enabled;
        let previous = table.write(write.location, write.next.clone());

        if stream_enabled && previous != write.next {
            self.sequence += 1;
            self.changes.push_back(ChangeEvent::new(
                self.sequence,
                write.table,
                keys,
                previous,
                write.next,
            ));
        }
        Ok(())
    }
}

/// Embedded backing store keeping every table in process memory.
///
/// All tables live behind one lock, which is what makes `transact_write`
/// atomic. Mutations of stream-enabled tables are appended to an internal
/// change log that a delivery loop drains with `drain_changes`.
pub struct InMemoryBackingStore {
    state: RwLock<MemoryState>,
    options: MemoryStoreOptions,
    failing_queries: AtomicUsize,
    failing_updates: AtomicUsize,
    failing_partitions: Mutex<HashMap<KeyScalar, usize>>,
}

impl Default for InMemoryBackingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackingStore {
    pub fn new() -> Self {
        Self::with_options(MemoryStoreOptions::default())
    }

    pub fn with_options(options: MemoryStoreOptions) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            options,
            failing_queries: AtomicUsize::new(0),
            failing_updates: AtomicUsize::new(0),
            failing_partitions: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &MemoryStoreOptions {
        &self.options
    }

    pub async fn create_table(&self, schema: TableSchema) -> BackendResult<()> {
        let mut state = self.state.write().await;
        if state.tables.contains_key(&schema.name) {
            return Err(BackendError::Validation(format!(
                "table '{}' already exists",
                schema.name
            )));
        }
        state
            .tables
            .insert(schema.name.clone(), MemoryTable::new(schema));
        Ok(())
    }

    pub async fn table_exists(&self, name: &str) -> bool {
        self.state.read().await.tables.contains_key(name)
    }

    /// Every item currently stored in a table, tombstoned ones included.
    pub async fn scan_table(&self, name: &str) -> BackendResult<Vec<Attributes>> {
        let state = self.state.read().await;
        let table = state.table(name)?;
        Ok(table
            .partitions
            .values()
            .flat_map(|partition| partition.values().cloned())
            .collect())
    }

    pub async fn item_count(&self, name: &str) -> BackendResult<usize> {
        let state = self.state.read().await;
        let table = state.table(name)?;
        Ok(table.partitions.values().map(BTreeMap::len).sum())
    }

    /// Takes every undelivered change event, oldest first.
    pub async fn drain_changes(&self) -> Vec<ChangeEvent> {
        let mut state = self.state.write().await;
        state.changes.drain(..).collect()
    }

    pub async fn pending_changes(&self) -> usize {
        self.state.read().await.changes.len()
    }

    /// Puts events back at the head of the change log, as a delivery
    /// mechanism does after a failed batch.
    pub async fn redeliver(&self, events: Vec<ChangeEvent>) {
        let mut state = self.state.write().await;
        for change in events.into_iter().rev() {
            state.changes.push_front(change);
        }
    }

    /// Physically removes items whose TTL attribute is at or before `now`.
    ///
    /// Returns the number of reclaimed items. Removals are published on the
    /// change stream like any other deletion.
    pub async fn reclaim_expired(&self, now: i64) -> BackendResult<usize> {
        let mut state = self.state.write().await;
        let mut expired = Vec::new();
        for (name, table) in &state.tables {
            let Some(ttl_attribute) = table.schema.ttl_attribute.as_deref() else {
                continue;
            };
            for (partition, items) in &table.partitions {
                for (sort, item) in items {
                    if int_attr(item, ttl_attribute).is_some_and(|ttl| ttl > 0 && ttl <= now) {
                        expired.push(PlannedWrite {
                            table: name.clone(),
                            location: (partition.clone(), sort.clone()),
                            next: None,
                        });
                    }
                }
            }
        }

        let reclaimed = expired.len();
        for write in expired {
            state.commit(write)?;
        }
        if reclaimed > 0 {
            event!(Level::DEBUG, reclaimed, "expired items reclaimed");
        }
        Ok(reclaimed)
    }

    /// Makes the next `count` queries fail with `BackendError::Unavailable`.
    pub fn fail_next_queries(&self, count: usize) {
        self.failing_queries.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` single-item updates fail with `BackendError::Unavailable`.
    pub fn fail_next_updates(&self, count: usize) {
        self.failing_updates.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` queries of one partition fail with
    /// `BackendError::Unavailable`, leaving other partitions alone.
    pub fn fail_partition_queries(&self, partition: impl Into<KeyScalar>, count: usize) {
        self.failing_partitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(partition.into(), count);
    }

    fn take_partition_failure(&self, partition: &KeyScalar) -> bool {
        let mut failing = self
            .failing_partitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match failing.get_mut(partition) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn take_injected_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }
}

#[async_trait]
impl BackingStore for InMemoryBackingStore {
    async fn get_item(&self, table: &str, key: &ItemKey) -> BackendResult<Option<Attributes>> {
        let state = self.state.read().await;
        let table = state.table(table)?;
        let location = table.locate(key.attributes())?;
        Ok(table.get(&location).cloned())
    }

    async fn update_item(&self, request: UpdateRequest) -> BackendResult<()> {
        if Self::take_injected_failure(&self.failing_updates) {
            return Err(BackendError::Unavailable("injected update failure".to_string()));
        }
        let mut state = self.state.write().await;
        let planned = state.plan(&TransactItem::Update(request))?;
        if let Some(write) = planned {
            state.commit(write)?;
        }
        Ok(())
    }

    async fn transact_write(&self, items: Vec<TransactItem>) -> BackendResult<()> {
        if items.len() > self.options.max_transaction_items {
            return Err(BackendError::TransactionTooLarge {
                items: items.len(),
                limit: self.options.max_transaction_items,
            });
        }

        let mut state = self.state.write().await;
        let mut reasons = Vec::with_capacity(items.len());
        let mut writes = Vec::with_capacity(items.len());
        let mut touched = HashSet::new();
        let mut aborted = false;

        for item in &items {
            let planned = match state.plan(item) {
                Ok(planned) => planned,
                Err(BackendError::ConditionalCheckFailed) => {
                    reasons.push(CancellationReason::ConditionalCheckFailed);
                    aborted = true;
                    continue;
                }
                Err(BackendError::Validation(message)) => {
                    event!(Level::DEBUG, %message, "transaction item rejected");
                    reasons.push(CancellationReason::ValidationError);
                    aborted = true;
                    continue;
                }
                Err(err) => return Err(err),
            };

            if let Some(write) = &planned {
                if !touched.insert((write.table.clone(), write.location.clone())) {
                    return Err(BackendError::Validation(
                        "transaction addresses the same item more than once".to_string(),
                    ));
                }
            }
            reasons.push(CancellationReason::None);
            writes.extend(planned);
        }

        if aborted {
            return Err(BackendError::TransactionCanceled { reasons });
        }
        for write in writes {
            state.commit(write)?;
        }
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> BackendResult<QueryPage> {
        if Self::take_injected_failure(&self.failing_queries)
            || self.take_partition_failure(&request.key_condition.partition)
        {
            return Err(BackendError::Unavailable("injected query failure".to_string()));
        }

        let state = self.state.read().await;
        let table = state.table(&request.table)?;
        let partition_key = request.key_condition.partition.clone();
        let Some(partition) = table.partitions.get(&partition_key) else {
            return Ok(QueryPage::default());
        };

        let start = match &request.exclusive_start_key {
            Some(key) => Bound::Excluded(table.locate(key.attributes())?.1),
            None => Bound::Unbounded,
        };
        let entries: Box<dyn Iterator<Item = (&SortSlot, &Attributes)> + '_> =
            if request.scan_forward {
                Box::new(partition.range((start, Bound::Unbounded)))
            } else {
                Box::new(partition.range((Bound::Unbounded, start)).rev())
            };

        let mut page = QueryPage::default();
        let mut evaluated = 0usize;
        let mut entries = entries.peekable();
        while let Some((sort, item)) = entries.next() {
            if let Some(sort_condition) = &request.key_condition.sort {
                if !sort_condition.matches(sort.as_ref()) {
                    continue;
                }
            }
            evaluated += 1;
            if request
                .filter
                .as_ref()
                .is_none_or(|filter: &Condition| filter.evaluate(Some(item)))
            {
                page.items.push(item.clone());
            }

            let limit_reached = request
                .limit
                .is_some_and(|limit| page.items.len() >= limit);
            if limit_reached || evaluated >= self.options.page_size {
                if entries.peek().is_some() {
                    page.last_evaluated_key =
                        Some(table.key_of(&(partition_key.clone(), sort.clone())));
                }
                break;
            }
        }
        Ok(page)
    }

    fn max_transaction_items(&self) -> usize {
        self.options.max_transaction_items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{KeyCondition, SortCondition};
    use crate::stream::ChangeEventType;
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap_or_default()
    }

    async fn store_with_tables(options: MemoryStoreOptions) -> InMemoryBackingStore {
        let store = InMemoryBackingStore::with_options(options);
        store
            .create_table(
                TableSchema::new("items", "id")
                    .with_ttl("ttl")
                    .with_change_stream(),
            )
            .await
            .unwrap();
        store
            .create_table(TableSchema::new("edges", "pk").with_sort_key("child"))
            .await
            .unwrap();
        store
    }

    fn put(table: &str, item: Value, condition: Option<Condition>) -> TransactItem {
        TransactItem::Put {
            table: table.to_string(),
            item: attrs(item),
            condition,
        }
    }

    #[tokio::test]
    async fn test_create_table_twice_fails() {
        let store = store_with_tables(MemoryStoreOptions::default()).await;
        let err = store
            .create_table(TableSchema::new("items", "id"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Validation(_)));
        assert!(store.table_exists("edges").await);
    }

    #[tokio::test]
    async fn test_transaction_is_all_or_nothing() {
        let store = store_with_tables(MemoryStoreOptions::default()).await;
        store
            .transact_write(vec![put("items", json!({"id": "a"}), None)])
            .await
            .unwrap();

        let err = store
            .transact_write(vec![
                put("items", json!({"id": "b"}), Some(Condition::ItemNotExists)),
                put("items", json!({"id": "a"}), Some(Condition::ItemNotExists)),
            ])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BackendError::TransactionCanceled {
                reasons: vec![
                    CancellationReason::None,
                    CancellationReason::ConditionalCheckFailed
                ]
            }
        );
        assert_eq!(store.item_count("items").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_transaction_ceiling() {
        let store = store_with_tables(MemoryStoreOptions {
            max_transaction_items: 2,
            ..MemoryStoreOptions::default()
        })
        .await;
        let items = (0..3)
            .map(|i| put("items", json!({"id": format!("i{i}")}), None))
            .collect();
        let err = store.transact_write(items).await.unwrap_err();
        assert_eq!(err, BackendError::TransactionTooLarge { items: 3, limit: 2 });
        assert_eq!(store.max_transaction_items(), 2);
    }

    #[tokio::test]
    async fn test_transaction_rejects_duplicate_targets() {
        let store = store_with_tables(MemoryStoreOptions::default()).await;
        let err = store
            .transact_write(vec![
                put("items", json!({"id": "a"}), None),
                put("items", json!({"id": "a", "x": 1}), None),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Validation(_)));
    }

    #[tokio::test]
    async fn test_conditional_update_and_increment() {
        let store = store_with_tables(MemoryStoreOptions::default()).await;
        let key = ItemKey::single("id", "a");
        store
            .update_item(UpdateRequest::new("items", key.clone()).increment("version", 1))
            .await
            .unwrap();
        store
            .update_item(
                UpdateRequest::new("items", key.clone())
                    .increment("version", 1)
                    .with_condition(Condition::equals("version", 1)),
            )
            .await
            .unwrap();
        let err = store
            .update_item(
                UpdateRequest::new("items", key.clone())
                    .set("x", 1)
                    .with_condition(Condition::equals("version", 1)),
            )
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::ConditionalCheckFailed);

        let item = store.get_item("items", &key).await.unwrap().unwrap();
        assert_eq!(item, attrs(json!({"id": "a", "version": 2})));

        let err = store
            .update_item(UpdateRequest::new("items", key).set("id", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Validation(_)));
    }

    #[tokio::test]
    async fn test_change_stream_records_images() {
        let store = store_with_tables(MemoryStoreOptions::default()).await;
        let key = ItemKey::single("id", "a");
        store
            .transact_write(vec![put("items", json!({"id": "a"}), None)])
            .await
            .unwrap();
        store
            .update_item(UpdateRequest::new("items", key.clone()).set("ttl", 5))
            .await
            .unwrap();
        // Unchanged writes publish nothing.
        store
            .update_item(UpdateRequest::new("items", key.clone()).set("ttl", 5))
            .await
            .unwrap();
        // Tables without a stream publish nothing.
        store
            .transact_write(vec![put("edges", json!({"pk": "p", "child": "c"}), None)])
            .await
            .unwrap();

        let changes = store.drain_changes().await;
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].event_type, ChangeEventType::Insert);
        assert_eq!(changes[1].event_type, ChangeEventType::Modify);
        assert_eq!(changes[1].keys, key);
        assert_eq!(changes[1].old_image, Some(attrs(json!({"id": "a"}))));
        assert_eq!(changes[1].new_image, Some(attrs(json!({"id": "a", "ttl": 5}))));
        assert!(changes[0].sequence < changes[1].sequence);
        assert_eq!(store.pending_changes().await, 0);

        store.redeliver(changes.clone()).await;
        assert_eq!(store.drain_changes().await, changes);
    }

    #[tokio::test]
    async fn test_query_paginates_in_sort_order() {
        let store = store_with_tables(MemoryStoreOptions {
            page_size: 2,
            ..MemoryStoreOptions::default()
        })
        .await;
        let puts = ["c", "a", "e", "b", "d"]
            .iter()
            .map(|child| put("edges", json!({"pk": "p", "child": child}), None))
            .collect();
        store.transact_write(puts).await.unwrap();

        let mut seen = Vec::new();
        let mut start = None;
        loop {
            let page = store
                .query(QueryRequest::new("edges", KeyCondition::partition("p")).starting_after(start))
                .await
                .unwrap();
            seen.extend(
                page.items
                    .iter()
                    .map(|item| item["child"].as_str().unwrap_or_default().to_string()),
            );
            start = page.last_evaluated_key;
            if start.is_none() {
                break;
            }
        }
        assert_eq!(seen, vec!["a", "b", "c", "d", "e"]);

        let page = store
            .query(QueryRequest::new("edges", KeyCondition::partition("p")).descending())
            .await
            .unwrap();
        assert_eq!(page.items[0]["child"], json!("e"));
    }

    #[tokio::test]
    async fn test_query_limit_counts_matches() {
        let store = store_with_tables(MemoryStoreOptions::default()).await;
        store
            .transact_write(vec![
                put("edges", json!({"pk": "p", "child": "a", "ttl": 1}), None),
                put("edges", json!({"pk": "p", "child": "b"}), None),
                put("edges", json!({"pk": "p", "child": "c"}), None),
            ])
            .await
            .unwrap();

        let page = store
            .query(
                QueryRequest::new("edges", KeyCondition::partition("p"))
                    .with_filter(Condition::attribute_not_exists("ttl"))
                    .with_limit(1),
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0]["child"], json!("b"));
        assert!(page.last_evaluated_key.is_some());

        let page = store
            .query(QueryRequest::new(
                "edges",
                KeyCondition::partition("p").with_sort(SortCondition::BeginsWith("c".into())),
            ))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);

        let empty = store
            .query(QueryRequest::new("edges", KeyCondition::partition("nope")))
            .await
            .unwrap();
        assert!(empty.items.is_empty());
    }

    #[tokio::test]
    async fn test_reclaim_expired_emits_removals() {
        let store = store_with_tables(MemoryStoreOptions::default()).await;
        store
            .transact_write(vec![
                put("items", json!({"id": "old", "ttl": 10}), None),
                put("items", json!({"id": "new", "ttl": 100}), None),
                put("items", json!({"id": "live"}), None),
            ])
            .await
            .unwrap();
        store.drain_changes().await;

        assert_eq!(store.reclaim_expired(50).await.unwrap(), 1);
        assert_eq!(store.item_count("items").await.unwrap(), 2);
        let changes = store.drain_changes().await;
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].event_type, ChangeEventType::Remove);
        assert_eq!(changes[0].keys, ItemKey::single("id", "old"));
    }

    #[tokio::test]
    async fn test_injected_failures_are_one_shot() {
        let store = store_with_tables(MemoryStoreOptions::default()).await;
        store.fail_next_queries(1);
        let request = QueryRequest::new("edges", KeyCondition::partition("p"));
        assert!(matches!(
            store.query(request.clone()).await,
            Err(BackendError::Unavailable(_))
        ));
        assert!(store.query(request).await.is_ok());

        store.fail_next_updates(1);
        let update = UpdateRequest::new("items", ItemKey::single("id", "a")).set("x", 1);
        assert!(store.update_item(update.clone()).await.is_err());
        assert!(store.update_item(update).await.is_ok());
    }

    #[tokio::test]
    async fn test_partition_failures_only_hit_their_partition() {
        let store = store_with_tables(MemoryStoreOptions::default()).await;
        store.fail_partition_queries("p", 1);
        let other = QueryRequest::new("edges", KeyCondition::partition("q"));
        assert!(store.query(other).await.is_ok());

        let target = QueryRequest::new("edges", KeyCondition::partition("p"));
        assert!(matches!(
            store.query(target.clone()).await,
            Err(BackendError::Unavailable(_))
        ));
        assert!(store.query(target).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let store = InMemoryBackingStore::new();
        let err = store
            .get_item("missing", &ItemKey::single("id", "a"))
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::TableNotFound("missing".to_string()));
    }
}
