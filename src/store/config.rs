use serde::{Deserialize, Serialize};

use crate::shard::MAX_SHARDS;

pub const DEFAULT_RELATIONSHIP_TABLE: &str = "trellis_relationships";
pub const DEFAULT_UNIQUE_TABLE: &str = "trellis_unique_constraints";

/// Store configuration
///
/// Deserializable from any serde format; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Table holding parent/child relationship edges
    pub relationship_table: String,

    /// Table holding unique-constraint reservations
    pub unique_table: String,

    /// Number of relationship shards per parent, within [1, 256].
    ///
    /// Each shard is one partition of the relationship table, so more shards
    /// spread a hot parent's child writes at the cost of one query per shard
    /// when enumerating children.
    pub shard_count: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            relationship_table: DEFAULT_RELATIONSHIP_TABLE.to_string(),
            unique_table: DEFAULT_UNIQUE_TABLE.to_string(),
            shard_count: 1,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the relationship table name
    pub fn relationship_table(mut self, table: &str) -> Self {
        self.relationship_table = table.to_string();
        self
    }

    /// Set the unique-constraint table name
    pub fn unique_table(mut self, table: &str) -> Self {
        self.unique_table = table.to_string();
        self
    }

    /// Set the shard count
    pub fn shard_count(mut self, shard_count: u32) -> Self {
        self.shard_count = shard_count;
        self
    }

    /// Restores defaults for empty table names and clamps the shard count.
    pub fn normalized(mut self) -> Self {
        if self.relationship_table.is_empty() {
            self.relationship_table = DEFAULT_RELATIONSHIP_TABLE.to_string();
        }
        if self.unique_table.is_empty() {
            self.unique_table = DEFAULT_UNIQUE_TABLE.to_string();
        }
        self.shard_count = self.shard_count.clamp(1, MAX_SHARDS);
        self
    }
}
