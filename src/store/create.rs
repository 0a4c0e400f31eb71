use chrono::Utc;
use serde_json::json;
use tracing::{Instrument, Level, event, info_span};

use super::EntityStore;
use super::entity::Entity;
use super::item::{
    ATTR_CREATED_AT, ATTR_ENTITY_REF, ATTR_PARENT_REF, ATTR_UNIQUE_KEYS, ATTR_UPDATED_AT,
    ATTR_VERSION, MANAGED_ATTRIBUTES, constraint_record, relationship_edge, timestamp,
};
use super::plan::{TransactionPlan, TxRole};
use super::ttl::parent_exists_condition;
use crate::backend::{Condition, TransactItem};
use crate::core::{Attributes, Result};
use crate::shard;

impl EntityStore {
    /// Creates an entity together with its parent check, unique-value
    /// reservations and relationship edge, all in one transaction.
    ///
    /// Fails with `ParentNotFound` when the parent is absent or tombstoned,
    /// `AlreadyExists` when the key is taken and `DuplicateValue` when a
    /// unique value is already reserved among the parent's children.
    pub async fn create(&self, entity: &dyn Entity, item: Attributes) -> Result<()> {
        let entity_ref = entity.entity_ref();
        let span = info_span!(
            "trellis.create",
            table = %entity.table_name(),
            entity_ref = %entity_ref
        );

        async move {
            let now = Utc::now();
            let now_unix = now.timestamp();
            let stamp = timestamp(now);
            let key = entity.key();
            let parent = entity.parent();
            let mut plan = TransactionPlan::new();

            if let Some(check) = parent.as_ref().and_then(|link| link.check.clone()) {
                let condition = check
                    .condition
                    .unwrap_or_else(|| parent_exists_condition(now_unix));
                plan.push(
                    TxRole::ParentCheck,
                    TransactItem::ConditionCheck {
                        table: check.table_name,
                        key: check.key,
                        condition,
                    },
                );
            }
            let parent_ref = parent.map(|link| link.parent_ref).unwrap_or_default();

            let mut item = item;
            for name in MANAGED_ATTRIBUTES {
                item.remove(name);
            }
            for (name, value) in key.attributes() {
                item.insert(name.clone(), value.clone());
            }
            item.insert(ATTR_ENTITY_REF.to_string(), json!(entity_ref));
            item.insert(ATTR_VERSION.to_string(), json!(1));
            item.insert(ATTR_CREATED_AT.to_string(), json!(stamp));
            item.insert(ATTR_UPDATED_AT.to_string(), json!(stamp));
            if !parent_ref.is_empty() {
                item.insert(ATTR_PARENT_REF.to_string(), json!(parent_ref));
            }

            let mut unique_keys = Vec::new();
            if !parent_ref.is_empty() {
                let entity_type = entity.entity_type();
                for (field, value) in entity.unique_fields().unwrap_or_default() {
                    let constraint_pk =
                        shard::unique_constraint_key(&parent_ref, entity_type, &field, &value);
                    plan.push(
                        TxRole::ConstraintReserve,
                        TransactItem::Put {
                            table: self.config.unique_table.clone(),
                            item: constraint_record(
                                &constraint_pk,
                                &parent_ref,
                                entity_type,
                                &field,
                                &value,
                                &entity_ref,
                            ),
                            condition: Some(Condition::ItemNotExists),
                        },
                    );
                    unique_keys.push(constraint_pk);
                }
            }
            if !unique_keys.is_empty() {
                item.insert(ATTR_UNIQUE_KEYS.to_string(), json!(unique_keys));
            }

            plan.push(
                TxRole::EntityPut,
                TransactItem::Put {
                    table: entity.table_name().to_string(),
                    item,
                    condition: Some(Condition::ItemNotExists),
                },
            );

            if !parent_ref.is_empty() {
                let shard_key = self.relationship_key(&parent_ref, &entity_ref);
                plan.push(
                    TxRole::RelationshipEdge,
                    TransactItem::Put {
                        table: self.config.relationship_table.clone(),
                        item: relationship_edge(
                            &shard_key,
                            &entity_ref,
                            &parent_ref,
                            entity.table_name(),
                            &key,
                        ),
                        condition: None,
                    },
                );
            }

            let items = plan.len();
            match plan.submit(self.backend.as_ref()).await {
                Ok(()) => {
                    event!(Level::DEBUG, items, "entity created");
                    Ok(())
                }
                Err(err) => {
                    event!(Level::DEBUG, items, error = %err, "entity create rejected");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }
}
