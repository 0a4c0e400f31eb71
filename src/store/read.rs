use tracing::{Instrument, Level, event, info_span};

use super::EntityStore;
use super::item::StoredItem;
use super::ttl::{is_deleted, now_unix, tombstone_filter};
use crate::backend::{Condition, KeyCondition, QueryRequest};
use crate::core::{ItemKey, Result, TrellisError};

/// Caller-side query over one partition of an entity table.
///
/// The tombstone filter is always ANDed with `filter`; there is no way to
/// read tombstoned entities through the store.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryInput {
    pub table: String,
    pub key_condition: KeyCondition,
    pub filter: Option<Condition>,
    /// Matching items fetched per backing-store round trip.
    pub page_size: Option<usize>,
    /// Cap on the total number of items returned.
    pub limit: Option<usize>,
    pub scan_forward: bool,
}

impl QueryInput {
    pub fn new(table: &str, key_condition: KeyCondition) -> Self {
        Self {
            table: table.to_string(),
            key_condition,
            filter: None,
            page_size: None,
            limit: None,
            scan_forward: true,
        }
    }

    pub fn filter(mut self, filter: Condition) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn descending(mut self) -> Self {
        self.scan_forward = false;
        self
    }
}

impl EntityStore {
    /// Reads an active entity. Absent and tombstoned entities are `NotFound`.
    pub async fn get(&self, table: &str, key: &ItemKey) -> Result<StoredItem> {
        let raw = self
            .backend
            .get_item(table, key)
            .await?
            .ok_or(TrellisError::NotFound)?;
        if is_deleted(&raw, now_unix()) {
            return Err(TrellisError::NotFound);
        }
        Ok(StoredItem::from_raw(raw))
    }

    /// Runs a partition query to exhaustion (or `limit`), skipping
    /// tombstoned entities.
    pub async fn query(&self, input: QueryInput) -> Result<Vec<StoredItem>> {
        let span = info_span!("trellis.query", table = %input.table);

        async move {
            let active = tombstone_filter(now_unix());
            let filter = match input.filter {
                Some(filter) => filter.and(active),
                None => active,
            };
            let mut request = QueryRequest::new(input.table, input.key_condition).with_filter(filter);
            if let Some(page_size) = input.page_size {
                request = request.with_limit(page_size);
            }
            if !input.scan_forward {
                request = request.descending();
            }

            let mut items = Vec::new();
            let mut pages = 0usize;
            loop {
                let page = self.backend.query(request.clone()).await?;
                pages += 1;
                items.extend(page.items.into_iter().map(StoredItem::from_raw));

                if let Some(limit) = input.limit {
                    if items.len() >= limit {
                        items.truncate(limit);
                        break;
                    }
                }
                match page.last_evaluated_key {
                    Some(key) => request = request.starting_after(Some(key)),
                    None => break,
                }
            }

            event!(Level::DEBUG, pages, items = items.len(), "query complete");
            Ok(items)
        }
        .instrument(span)
        .await
    }
}
