use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{Instrument, Level, event, info_span};

use super::EntityStore;
use super::item::ChildRef;
use super::ttl::{now_unix, tombstone_filter};
use crate::backend::{BackingStore, KeyCondition, QueryRequest};
use crate::core::{Result, TrellisError};
use crate::shard::shard_partition_key;

impl EntityStore {
    /// Whether `parent_ref` has at least one child whose edge is not
    /// tombstoned.
    ///
    /// With several shards every shard is checked concurrently and the first
    /// hit cancels the remaining checks. A hit wins over failures on sibling
    /// shards, so shard errors only surface when no shard reports a hit. If
    /// the failing shard is the only one holding active children, the call
    /// fails with `TrellisError::Shard` instead of answering `false`.
    pub async fn has_active_children(&self, parent_ref: &str) -> Result<bool> {
        let span = info_span!(
            "trellis.has_active_children",
            parent_ref = %parent_ref,
            shards = self.config.shard_count
        );

        async move {
            let now = now_unix();
            let table = self.config.relationship_table.clone();
            if self.config.shard_count <= 1 {
                return first_active_child(
                    self.backend.as_ref(),
                    &table,
                    &shard_partition_key(parent_ref, 0),
                    now,
                )
                .await;
            }

            let mut checks = JoinSet::new();
            let mut shard_of = HashMap::new();
            for shard in 0..self.config.shard_count {
                let backend = Arc::clone(&self.backend);
                let table = table.clone();
                let shard_key = shard_partition_key(parent_ref, shard);
                let handle = checks.spawn(async move {
                    first_active_child(backend.as_ref(), &table, &shard_key, now).await
                });
                shard_of.insert(handle.id(), shard);
            }

            let mut first_error = None;
            while let Some(joined) = checks.join_next_with_id().await {
                match joined {
                    Ok((_, Ok(true))) => {
                        checks.abort_all();
                        event!(Level::DEBUG, "active child found");
                        return Ok(true);
                    }
                    Ok((_, Ok(false))) => {}
                    Ok((id, Err(err))) => {
                        let shard = shard_of.get(&id).copied().unwrap_or_default();
                        first_error.get_or_insert(shard_error(shard, err));
                    }
                    // Aborted siblings are not failures.
                    Err(err) if err.is_cancelled() => {}
                    Err(err) => {
                        let shard = shard_of.get(&err.id()).copied().unwrap_or_default();
                        first_error.get_or_insert(shard_error(shard, err.into()));
                    }
                }
            }

            match first_error {
                Some(err) => {
                    event!(Level::WARN, error = %err, "child check failed");
                    Err(err)
                }
                None => Ok(false),
            }
        }
        .instrument(span)
        .await
    }

    /// Every child edge of `parent_ref`, tombstoned edges included.
    ///
    /// Shards are scanned concurrently; within a shard edges keep the backing
    /// store's order, across shards no order is guaranteed. The first shard
    /// failure aborts the scans still in flight and fails the whole call
    /// with `TrellisError::Shard`, whose source is the shard's own error.
    pub async fn query_all_children(&self, parent_ref: &str) -> Result<Vec<ChildRef>> {
        let span = info_span!(
            "trellis.query_all_children",
            parent_ref = %parent_ref,
            shards = self.config.shard_count
        );

        async move {
            let table = self.config.relationship_table.clone();
            if self.config.shard_count <= 1 {
                return scan_shard(
                    self.backend.as_ref(),
                    &table,
                    &shard_partition_key(parent_ref, 0),
                )
                .await;
            }

            let collected = Arc::new(Mutex::new(Vec::new()));
            let mut scans = JoinSet::new();
            let mut shard_of = HashMap::new();
            for shard in 0..self.config.shard_count {
                let backend = Arc::clone(&self.backend);
                let table = table.clone();
                let collected = Arc::clone(&collected);
                let shard_key = shard_partition_key(parent_ref, shard);
                let handle = scans.spawn(async move {
                    let children = scan_shard(backend.as_ref(), &table, &shard_key)
                        .await
                        .map_err(|err| shard_error(shard, err))?;
                    collected.lock().await.extend(children);
                    Ok::<(), TrellisError>(())
                });
                shard_of.insert(handle.id(), shard);
            }

            while let Some(joined) = scans.join_next_with_id().await {
                let outcome = match joined {
                    Ok((_, outcome)) => outcome,
                    Err(err) => {
                        let shard = shard_of.get(&err.id()).copied().unwrap_or_default();
                        Err(shard_error(shard, err.into()))
                    }
                };
                if let Err(err) = outcome {
                    scans.abort_all();
                    event!(Level::WARN, error = %err, "child scan failed");
                    return Err(err);
                }
            }

            let children = std::mem::take(&mut *collected.lock().await);
            event!(Level::DEBUG, children = children.len(), "children collected");
            Ok(children)
        }
        .instrument(span)
        .await
    }
}

fn shard_error(shard: u32, source: TrellisError) -> TrellisError {
    TrellisError::Shard {
        shard,
        source: Box::new(source),
    }
}

/// Pages through one shard until an active edge shows up or the shard ends.
async fn first_active_child(
    backend: &dyn BackingStore,
    table: &str,
    shard_key: &str,
    now: i64,
) -> Result<bool> {
    let mut request = QueryRequest::new(table, KeyCondition::partition(shard_key))
        .with_filter(tombstone_filter(now))
        .with_limit(1);
    loop {
        let page = backend.query(request.clone()).await?;
        if !page.items.is_empty() {
            return Ok(true);
        }
        match page.last_evaluated_key {
            Some(key) => request = request.starting_after(Some(key)),
            None => return Ok(false),
        }
    }
}

async fn scan_shard(backend: &dyn BackingStore, table: &str, shard_key: &str) -> Result<Vec<ChildRef>> {
    let mut children = Vec::new();
    let mut request = QueryRequest::new(table, KeyCondition::partition(shard_key));
    loop {
        let page = backend.query(request.clone()).await?;
        for edge in &page.items {
            children.push(ChildRef::from_edge(edge, shard_key)?);
        }
        match page.last_evaluated_key {
            Some(key) => request = request.starting_after(Some(key)),
            None => return Ok(children),
        }
    }
}
