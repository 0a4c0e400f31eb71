use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::core::{Attributes, ItemKey, Result, TrellisError, int_attr, string_attr};

// Attributes stamped and maintained by the store on every entity item.
pub const ATTR_ENTITY_REF: &str = "entity_ref";
pub const ATTR_PARENT_REF: &str = "parent_ref";
pub const ATTR_VERSION: &str = "version";
pub const ATTR_CREATED_AT: &str = "created_at";
pub const ATTR_UPDATED_AT: &str = "updated_at";
pub const ATTR_TTL: &str = "ttl";
pub const ATTR_UNIQUE_KEYS: &str = "_unique_pks";

pub const MANAGED_ATTRIBUTES: [&str; 7] = [
    ATTR_ENTITY_REF,
    ATTR_PARENT_REF,
    ATTR_VERSION,
    ATTR_CREATED_AT,
    ATTR_UPDATED_AT,
    ATTR_TTL,
    ATTR_UNIQUE_KEYS,
];

// Relationship table layout.
pub const EDGE_PARTITION_KEY: &str = "pk";
pub const EDGE_CHILD_REF: &str = "child_ref";
pub const EDGE_CHILD_TABLE: &str = "child_table";
pub const EDGE_CHILD_KEY: &str = "child_key";

// Unique-constraint table layout.
pub const CONSTRAINT_PARTITION_KEY: &str = "pk";
pub const CONSTRAINT_SORT_KEY: &str = "sk";
pub const CONSTRAINT_SORT_VALUE: &str = "CONSTRAINT";

pub fn is_managed(name: &str) -> bool {
    MANAGED_ATTRIBUTES.contains(&name)
}

/// Current time as an RFC 3339 timestamp with second precision.
pub(crate) fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// An entity item as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    /// Full attribute payload, managed attributes included.
    pub raw: Attributes,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
    pub entity_ref: String,
    /// Empty for root entities.
    pub parent_ref: String,
}

impl StoredItem {
    pub fn from_raw(raw: Attributes) -> Self {
        let text = |name: &str| string_attr(&raw, name).unwrap_or_default().to_string();
        Self {
            version: int_attr(&raw, ATTR_VERSION).unwrap_or_default(),
            created_at: text(ATTR_CREATED_AT),
            updated_at: text(ATTR_UPDATED_AT),
            entity_ref: text(ATTR_ENTITY_REF),
            parent_ref: text(ATTR_PARENT_REF),
            raw,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        string_attr(&self.raw, name)
    }

    pub fn ttl(&self) -> Option<i64> {
        int_attr(&self.raw, ATTR_TTL)
    }

    pub fn created_at_time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|time| time.with_timezone(&Utc))
    }

    pub fn updated_at_time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.updated_at)
            .ok()
            .map(|time| time.with_timezone(&Utc))
    }

    /// Keys of the unique-constraint reservations this entity holds.
    pub fn unique_keys(&self) -> Vec<String> {
        crate::stream::image_string_list(Some(&self.raw), ATTR_UNIQUE_KEYS)
    }

    /// Decodes the payload into a caller type; unknown attributes are ignored
    /// unless the target type rejects them.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.raw.clone()))
            .map_err(|err| TrellisError::InvalidItem(err.to_string()))
    }
}

/// A child located through its relationship edge.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildRef {
    pub entity_ref: String,
    pub table_name: String,
    pub key: ItemKey,
    /// Relationship partition the edge lives in.
    pub shard_key: String,
    /// TTL mirrored onto the edge, if it has been tombstoned.
    pub ttl: Option<i64>,
}

impl ChildRef {
    pub(crate) fn from_edge(edge: &Attributes, shard_key: &str) -> Result<Self> {
        let field = |name: &str| {
            string_attr(edge, name)
                .map(str::to_string)
                .ok_or_else(|| {
                    TrellisError::InvalidItem(format!(
                        "relationship edge in '{}' lacks '{}'",
                        shard_key, name
                    ))
                })
        };
        let key = edge
            .get(EDGE_CHILD_KEY)
            .and_then(Value::as_object)
            .cloned()
            .map(ItemKey::from)
            .ok_or_else(|| {
                TrellisError::InvalidItem(format!(
                    "relationship edge in '{}' lacks '{}'",
                    shard_key, EDGE_CHILD_KEY
                ))
            })?;

        Ok(Self {
            entity_ref: field(EDGE_CHILD_REF)?,
            table_name: field(EDGE_CHILD_TABLE)?,
            key,
            shard_key: shard_key.to_string(),
            ttl: int_attr(edge, ATTR_TTL),
        })
    }
}

pub(crate) fn relationship_edge(
    shard_key: &str,
    child_ref: &str,
    parent_ref: &str,
    child_table: &str,
    child_key: &ItemKey,
) -> Attributes {
    let mut edge = Attributes::new();
    edge.insert(EDGE_PARTITION_KEY.to_string(), json!(shard_key));
    edge.insert(EDGE_CHILD_REF.to_string(), json!(child_ref));
    edge.insert(ATTR_PARENT_REF.to_string(), json!(parent_ref));
    edge.insert(EDGE_CHILD_TABLE.to_string(), json!(child_table));
    edge.insert(
        EDGE_CHILD_KEY.to_string(),
        Value::Object(child_key.attributes().clone()),
    );
    edge
}

pub(crate) fn constraint_key(constraint_pk: &str) -> ItemKey {
    ItemKey::single(CONSTRAINT_PARTITION_KEY, constraint_pk)
        .with(CONSTRAINT_SORT_KEY, CONSTRAINT_SORT_VALUE)
}

pub(crate) fn constraint_record(
    constraint_pk: &str,
    parent_ref: &str,
    entity_type: &str,
    field: &str,
    value: &str,
    holder_ref: &str,
) -> Attributes {
    let mut record = constraint_key(constraint_pk).into_attributes();
    record.insert(ATTR_PARENT_REF.to_string(), json!(parent_ref));
    record.insert("entity_type".to_string(), json!(entity_type));
    record.insert("field_name".to_string(), json!(field));
    record.insert("field_value".to_string(), json!(value));
    record.insert(ATTR_ENTITY_REF.to_string(), json!(holder_ref));
    record
}
