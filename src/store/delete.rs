use tracing::{Instrument, Level, event, info_span};

use super::EntityStore;
use super::entity::Entity;
use super::item::{ATTR_TTL, ATTR_VERSION, EDGE_CHILD_REF, EDGE_PARTITION_KEY, constraint_key};
use super::ttl::now_unix;
use crate::backend::{Condition, UpdateRequest};
use crate::core::{BackendError, ItemKey, Result, TrellisError};

/// Options of [`EntityStore::delete`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Children are expected to be tombstoned by the cascade; skips the
    /// orphan check.
    pub cascade: bool,
    /// Refuse to delete while an active child exists.
    pub orphan_protect: bool,
    /// Report `NotFound` for an absent entity and `AlreadyDeleted` for a
    /// tombstoned one instead of succeeding silently.
    pub require_active: bool,
}

impl DeleteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cascade(mut self) -> Self {
        self.cascade = true;
        self
    }

    pub fn orphan_protect(mut self) -> Self {
        self.orphan_protect = true;
        self
    }

    pub fn require_active(mut self) -> Self {
        self.require_active = true;
        self
    }
}

impl EntityStore {
    /// Tombstones an entity. Children, the entity's own relationship edge and
    /// its unique reservations are tombstoned later by the cascade.
    pub async fn delete(&self, entity: &dyn Entity, options: DeleteOptions) -> Result<()> {
        let entity_ref = entity.entity_ref();
        let span = info_span!(
            "trellis.delete",
            table = %entity.table_name(),
            entity_ref = %entity_ref,
            cascade = options.cascade,
            orphan_protect = options.orphan_protect
        );

        async move {
            if options.orphan_protect && !options.cascade && self.has_active_children(&entity_ref).await?
            {
                event!(Level::DEBUG, "delete blocked by active children");
                return Err(TrellisError::HasChildren);
            }

            if options.require_active {
                let current = self
                    .backend
                    .get_item(entity.table_name(), &entity.key())
                    .await?
                    .ok_or(TrellisError::NotFound)?;
                if current.contains_key(ATTR_TTL) {
                    return Err(TrellisError::AlreadyDeleted);
                }
                let applied = self
                    .tombstone(entity.table_name(), &entity.key(), now_unix(), true)
                    .await?;
                return if applied {
                    Ok(())
                } else {
                    Err(TrellisError::AlreadyDeleted)
                };
            }

            self.set_ttl(entity).await
        }
        .instrument(span)
        .await
    }

    /// Sets the entity's TTL to now and bumps its version.
    ///
    /// Idempotent: an entity that already carries a TTL, or does not exist,
    /// is left untouched and the call succeeds.
    pub async fn set_ttl(&self, entity: &dyn Entity) -> Result<()> {
        self.set_ttl_by_key(entity.table_name(), &entity.key(), now_unix())
            .await
    }

    /// Tombstones any entity by table and key with the given TTL.
    pub async fn set_ttl_by_key(&self, table: &str, key: &ItemKey, ttl: i64) -> Result<()> {
        if !self.tombstone(table, key, ttl, true).await? {
            event!(Level::DEBUG, table, "entity already tombstoned");
        }
        Ok(())
    }

    /// Tombstones the edge linking `child_ref` to `parent_ref`.
    pub async fn set_relationship_ttl(&self, child_ref: &str, parent_ref: &str, ttl: i64) -> Result<()> {
        let key = ItemKey::single(EDGE_PARTITION_KEY, self.relationship_key(parent_ref, child_ref))
            .with(EDGE_CHILD_REF, child_ref);
        let table = self.config.relationship_table.clone();
        self.tombstone(&table, &key, ttl, false).await.map(|_| ())
    }

    /// Tombstones one unique-constraint reservation.
    pub async fn set_unique_constraint_ttl(&self, constraint_pk: &str, ttl: i64) -> Result<()> {
        let table = self.config.unique_table.clone();
        self.tombstone(&table, &constraint_key(constraint_pk), ttl, false)
            .await
            .map(|_| ())
    }

    /// Writes `ttl` onto an existing item that has none yet.
    ///
    /// Returns whether the write happened; a failed guard is not an error.
    async fn tombstone(&self, table: &str, key: &ItemKey, ttl: i64, bump_version: bool) -> Result<bool> {
        let mut request = UpdateRequest::new(table, key.clone()).set(ATTR_TTL, ttl);
        if bump_version {
            request = request.increment(ATTR_VERSION, 1);
        }
        let request = request
            .with_condition(Condition::ItemExists.and(Condition::attribute_not_exists(ATTR_TTL)));

        match self.backend.update_item(request).await {
            Ok(()) => Ok(true),
            Err(BackendError::ConditionalCheckFailed) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
