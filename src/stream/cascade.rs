use tracing::{Instrument, Level, event, info_span};

use super::event::{ChangeEvent, ChangeEventType, image_number, image_string, image_string_list};
use crate::core::Result;
use crate::store::EntityStore;
use crate::store::item::{ATTR_ENTITY_REF, ATTR_PARENT_REF, ATTR_TTL, ATTR_UNIQUE_KEYS};

/// What handling one change event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeOutcome {
    /// Not a fresh tombstone; nothing was written.
    Ignored,
    Propagated {
        entity_ref: String,
        ttl: i64,
        children: usize,
        unique_constraints: usize,
        /// Writes that failed and were skipped.
        soft_failures: usize,
    },
}

/// Totals of one delivered batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeSummary {
    pub events: usize,
    pub propagated: usize,
    pub children: usize,
    pub soft_failures: usize,
}

/// The part of a change event a cascade needs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Tombstone {
    entity_ref: String,
    parent_ref: String,
    ttl: i64,
    unique_keys: Vec<String>,
}

impl Tombstone {
    /// Present only when this very event set the TTL.
    fn from_event(change: &ChangeEvent) -> Option<Self> {
        if change.event_type != ChangeEventType::Modify {
            return None;
        }
        let old_ttl = image_number(change.old_image.as_ref(), ATTR_TTL);
        let new_ttl = image_number(change.new_image.as_ref(), ATTR_TTL);
        if old_ttl != 0 || new_ttl == 0 {
            return None;
        }

        let image = change.new_image.as_ref();
        let entity_ref = image_string(image, ATTR_ENTITY_REF);
        if entity_ref.is_empty() {
            return None;
        }
        Some(Self {
            entity_ref,
            parent_ref: image_string(image, ATTR_PARENT_REF),
            ttl: new_ttl,
            unique_keys: image_string_list(image, ATTR_UNIQUE_KEYS),
        })
    }
}

/// Propagates entity tombstones from the change stream.
///
/// Stateless: every write it issues is conditional on the target having no
/// TTL yet, so redelivered or replayed events have no further effect.
#[derive(Clone)]
pub struct CascadeCoordinator {
    store: EntityStore,
}

impl CascadeCoordinator {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Processes a delivered batch in order.
    ///
    /// Stops at the first event that fails hard and returns its error so the
    /// delivery mechanism redelivers the batch.
    pub async fn handle_batch(&self, events: &[ChangeEvent]) -> Result<CascadeSummary> {
        let mut summary = CascadeSummary::default();
        for change in events {
            let outcome = match self.handle_event(change).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    event!(
                        Level::ERROR,
                        event_id = %change.event_id,
                        error = %err,
                        "failed to process change event"
                    );
                    return Err(err);
                }
            };

            summary.events += 1;
            if let CascadeOutcome::Propagated {
                children,
                soft_failures,
                ..
            } = outcome
            {
                summary.propagated += 1;
                summary.children += children;
                summary.soft_failures += soft_failures;
            }
        }
        Ok(summary)
    }

    pub async fn handle_event(&self, change: &ChangeEvent) -> Result<CascadeOutcome> {
        let Some(tombstone) = Tombstone::from_event(change) else {
            return Ok(CascadeOutcome::Ignored);
        };

        let span = info_span!(
            "trellis.cascade",
            event_id = %change.event_id,
            entity_ref = %tombstone.entity_ref
        );
        self.propagate(tombstone).instrument(span).await
    }

    async fn propagate(&self, tombstone: Tombstone) -> Result<CascadeOutcome> {
        let Tombstone {
            entity_ref,
            parent_ref,
            ttl,
            unique_keys,
        } = tombstone;
        event!(Level::INFO, parent_ref = %parent_ref, ttl, "processing cascade delete");

        let children = self.store.query_all_children(&entity_ref).await?;
        event!(Level::INFO, child_count = children.len(), "found children to cascade");

        let mut soft_failures = 0;
        for child in &children {
            if let Err(err) = self
                .store
                .set_ttl_by_key(&child.table_name, &child.key, ttl)
                .await
            {
                soft_failures += 1;
                event!(Level::WARN, child = %child.entity_ref, error = %err, "failed to set TTL on child");
            }
        }

        if !parent_ref.is_empty() {
            if let Err(err) = self
                .store
                .set_relationship_ttl(&entity_ref, &parent_ref, ttl)
                .await
            {
                soft_failures += 1;
                event!(Level::WARN, parent_ref = %parent_ref, error = %err, "failed to set relationship TTL");
            }
        }

        for constraint_pk in &unique_keys {
            if let Err(err) = self.store.set_unique_constraint_ttl(constraint_pk, ttl).await {
                soft_failures += 1;
                event!(Level::WARN, pk = %constraint_pk, error = %err, "failed to set unique constraint TTL");
            }
        }

        event!(
            Level::INFO,
            children_processed = children.len(),
            unique_constraints = unique_keys.len(),
            soft_failures,
            "cascade delete completed"
        );
        Ok(CascadeOutcome::Propagated {
            entity_ref,
            ttl,
            children: children.len(),
            unique_constraints: unique_keys.len(),
            soft_failures,
        })
    }
}
