use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::json;
use tracing::{Instrument, Level, event, info_span};

use super::EntityStore;
use super::entity::Entity;
use super::item::{
    ATTR_ENTITY_REF, ATTR_TTL, ATTR_UNIQUE_KEYS, ATTR_UPDATED_AT, ATTR_VERSION, constraint_key,
    constraint_record, is_managed, timestamp,
};
use super::plan::{TransactionPlan, TxRole};
use crate::backend::{Condition, TransactItem, UpdateRequest};
use crate::core::{Attributes, BackendError, Result, TrellisError};
use crate::shard;

impl EntityStore {
    /// Updates an entity under optimistic locking.
    ///
    /// Every non-managed, non-key attribute of `item` is written, `version`
    /// goes up by one and `updated_at` is refreshed. The write is rejected
    /// with `ConcurrentModification` when the stored version differs from
    /// `expected_version` or the entity is tombstoned. When a unique field
    /// changes, the old reservation is released and the new one taken in the
    /// same transaction; a taken value fails with `DuplicateValue`.
    pub async fn update(
        &self,
        entity: &dyn Entity,
        item: Attributes,
        expected_version: i64,
    ) -> Result<()> {
        let span = info_span!(
            "trellis.update",
            table = %entity.table_name(),
            entity_ref = %entity.entity_ref(),
            expected_version
        );

        async move {
            let parent_ref = entity
                .parent()
                .map(|link| link.parent_ref)
                .unwrap_or_default();
            match entity.unique_fields() {
                Some(fields) if !parent_ref.is_empty() => {
                    self.update_with_unique_fields(entity, item, expected_version, &parent_ref, fields)
                        .await
                }
                _ => self.update_simple(entity, &item, expected_version).await,
            }
        }
        .instrument(span)
        .await
    }

    async fn update_simple(
        &self,
        entity: &dyn Entity,
        item: &Attributes,
        expected_version: i64,
    ) -> Result<()> {
        let request = versioned_update(entity, item, expected_version);
        match self.backend.update_item(request).await {
            Ok(()) => {
                event!(Level::DEBUG, "entity updated");
                Ok(())
            }
            Err(BackendError::ConditionalCheckFailed) => Err(TrellisError::ConcurrentModification),
            Err(err) => Err(err.into()),
        }
    }

    async fn update_with_unique_fields(
        &self,
        entity: &dyn Entity,
        item: Attributes,
        expected_version: i64,
        parent_ref: &str,
        fields: BTreeMap<String, String>,
    ) -> Result<()> {
        let current = self.get(entity.table_name(), &entity.key()).await?;
        let changed: Vec<(&String, &String, Option<&str>)> = fields
            .iter()
            .map(|(field, value)| (field, value, current.string(field)))
            .filter(|(_, value, previous)| *previous != Some(value.as_str()))
            .collect();

        if changed.is_empty() {
            return self.update_simple(entity, &item, expected_version).await;
        }

        let entity_ref = entity.entity_ref();
        let entity_type = entity.entity_type();
        let own_or_free =
            || Condition::ItemNotExists.or(Condition::equals(ATTR_ENTITY_REF, entity_ref.clone()));
        let mut plan = TransactionPlan::new();

        for (field, value, previous) in &changed {
            if let Some(previous) = previous.filter(|previous| !previous.is_empty()) {
                let stale_pk = shard::unique_constraint_key(parent_ref, entity_type, field, previous);
                plan.push(
                    TxRole::ConstraintRelease,
                    TransactItem::Delete {
                        table: self.config.unique_table.clone(),
                        key: constraint_key(&stale_pk),
                        condition: Some(own_or_free()),
                    },
                );
            }

            let fresh_pk = shard::unique_constraint_key(parent_ref, entity_type, field, value);
            plan.push(
                TxRole::ConstraintReserve,
                TransactItem::Put {
                    table: self.config.unique_table.clone(),
                    item: constraint_record(
                        &fresh_pk,
                        parent_ref,
                        entity_type,
                        field,
                        value,
                        &entity_ref,
                    ),
                    condition: Some(own_or_free()),
                },
            );
        }

        let held_keys: Vec<String> = fields
            .iter()
            .map(|(field, value)| shard::unique_constraint_key(parent_ref, entity_type, field, value))
            .collect();
        plan.push(
            TxRole::EntityUpdate,
            TransactItem::Update(
                versioned_update(entity, &item, expected_version)
                    .set(ATTR_UNIQUE_KEYS, json!(held_keys)),
            ),
        );

        let items = plan.len();
        plan.submit(self.backend.as_ref()).await?;
        event!(
            Level::DEBUG,
            items,
            changed_fields = changed.len(),
            "entity updated with unique fields"
        );
        Ok(())
    }
}

/// The entity write shared by both update paths.
fn versioned_update(entity: &dyn Entity, item: &Attributes, expected_version: i64) -> UpdateRequest {
    let key = entity.key();
    let mut request = UpdateRequest::new(entity.table_name(), key.clone());
    for (name, value) in item {
        if is_managed(name) || key.get(name).is_some() {
            continue;
        }
        request = request.set(name.clone(), value.clone());
    }
    request
        .set(ATTR_UPDATED_AT, timestamp(Utc::now()))
        .increment(ATTR_VERSION, 1)
        .with_condition(
            Condition::equals(ATTR_VERSION, expected_version)
                .and(Condition::attribute_not_exists(ATTR_TTL)),
        )
}
