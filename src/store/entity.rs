use std::collections::BTreeMap;

use crate::backend::Condition;
use crate::core::ItemKey;

/// Builds a type-qualified reference such as `studio#42`.
pub fn entity_ref(entity_type: &str, id: &str) -> String {
    format!("{}#{}", entity_type, id)
}

/// Existence check run against the parent inside a create transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentCheck {
    pub table_name: String,
    pub key: ItemKey,
    /// Replaces the default "exists and not tombstoned" condition when set.
    pub condition: Option<Condition>,
}

/// Link from a child entity to its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentLink {
    pub parent_ref: String,
    /// `None` skips parent validation on create.
    pub check: Option<ParentCheck>,
}

impl ParentLink {
    /// A link recorded on the child without validating the parent.
    pub fn unchecked(parent_ref: impl Into<String>) -> Self {
        Self {
            parent_ref: parent_ref.into(),
            check: None,
        }
    }

    /// A link whose parent must exist (and be active) for a create to commit.
    pub fn checked(
        parent_ref: impl Into<String>,
        table_name: impl Into<String>,
        key: ItemKey,
    ) -> Self {
        Self {
            parent_ref: parent_ref.into(),
            check: Some(ParentCheck {
                table_name: table_name.into(),
                key,
                condition: None,
            }),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        if let Some(check) = self.check.as_mut() {
            check.condition = Some(condition);
        }
        self
    }
}

/// Consumer-side description of a storable entity.
///
/// Only identity and location are mandatory. Entities with a parent override
/// `parent`; entities with fields that must be unique among their siblings
/// override `unique_fields`.
pub trait Entity: Send + Sync {
    fn table_name(&self) -> &str;

    fn key(&self) -> ItemKey;

    /// Globally unique `type#id` reference.
    fn entity_ref(&self) -> String;

    fn entity_type(&self) -> &str;

    fn parent(&self) -> Option<ParentLink> {
        None
    }

    /// Field name to current value, unique within the parent's scope.
    fn unique_fields(&self) -> Option<BTreeMap<String, String>> {
        None
    }
}

/// Plain data implementation of [`Entity`] for callers that do not want a
/// dedicated type per entity kind.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    pub entity_type: String,
    pub table_name: String,
    pub key: ItemKey,
    pub entity_ref: String,
    pub parent: Option<ParentLink>,
    pub unique_fields: Option<BTreeMap<String, String>>,
}

impl EntityDescriptor {
    /// Describes an entity keyed by a single `id` attribute.
    pub fn new(entity_type: &str, table_name: &str, id: &str) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            table_name: table_name.to_string(),
            key: ItemKey::single("id", id),
            entity_ref: entity_ref(entity_type, id),
            parent: None,
            unique_fields: None,
        }
    }

    pub fn with_key(mut self, key: ItemKey) -> Self {
        self.key = key;
        self
    }

    pub fn with_parent(mut self, parent: ParentLink) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_unique(mut self, field: &str, value: &str) -> Self {
        self.unique_fields
            .get_or_insert_with(BTreeMap::new)
            .insert(field.to_string(), value.to_string());
        self
    }
}

impl Entity for EntityDescriptor {
    fn table_name(&self) -> &str {
        &self.table_name
    }

    fn key(&self) -> ItemKey {
        self.key.clone()
    }

    fn entity_ref(&self) -> String {
        self.entity_ref.clone()
    }

    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn parent(&self) -> Option<ParentLink> {
        self.parent.clone()
    }

    fn unique_fields(&self) -> Option<BTreeMap<String, String>> {
        self.unique_fields.clone()
    }
}
