use serde_json::Value;

use super::Condition;
use crate::core::{Attributes, ItemKey, KeyScalar};

/// Declared shape of a backing-store table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub partition_key: String,
    pub sort_key: Option<String>,
    /// Attribute holding the expiry timestamp (unix seconds) reclaimed by the store.
    pub ttl_attribute: Option<String>,
    /// Whether mutations of this table are published on the change stream.
    pub stream_enabled: bool,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partition_key: partition_key.into(),
            sort_key: None,
            ttl_attribute: None,
            stream_enabled: false,
        }
    }

    pub fn with_sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = Some(sort_key.into());
        self
    }

    pub fn with_ttl(mut self, attribute: impl Into<String>) -> Self {
        self.ttl_attribute = Some(attribute.into());
        self
    }

    pub fn with_change_stream(mut self) -> Self {
        self.stream_enabled = true;
        self
    }

    pub fn is_key_attribute(&self, name: &str) -> bool {
        self.partition_key == name || self.sort_key.as_deref() == Some(name)
    }
}

/// One mutation applied by an update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    Set(String, Value),
    Remove(String),
    /// Adds `delta` to an integer attribute; an absent attribute counts as zero.
    Increment(String, i64),
}

/// Single-item conditional update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub table: String,
    pub key: ItemKey,
    pub actions: Vec<UpdateAction>,
    pub condition: Option<Condition>,
}

impl UpdateRequest {
    pub fn new(table: impl Into<String>, key: ItemKey) -> Self {
        Self {
            table: table.into(),
            key,
            actions: Vec::new(),
            condition: None,
        }
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.actions.push(UpdateAction::Set(name.into(), value.into()));
        self
    }

    pub fn remove(mut self, name: impl Into<String>) -> Self {
        self.actions.push(UpdateAction::Remove(name.into()));
        self
    }

    pub fn increment(mut self, name: impl Into<String>, delta: i64) -> Self {
        self.actions.push(UpdateAction::Increment(name.into(), delta));
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// One member of a bounded atomic transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactItem {
    /// Asserts a condition on an item without writing it.
    ConditionCheck {
        table: String,
        key: ItemKey,
        condition: Condition,
    },
    Put {
        table: String,
        item: Attributes,
        condition: Option<Condition>,
    },
    Update(UpdateRequest),
    Delete {
        table: String,
        key: ItemKey,
        condition: Option<Condition>,
    },
}

impl TransactItem {
    pub fn table(&self) -> &str {
        match self {
            TransactItem::ConditionCheck { table, .. }
            | TransactItem::Put { table, .. }
            | TransactItem::Delete { table, .. } => table,
            TransactItem::Update(request) => &request.table,
        }
    }

    pub fn condition(&self) -> Option<&Condition> {
        match self {
            TransactItem::ConditionCheck { condition, .. } => Some(condition),
            TransactItem::Put { condition, .. } | TransactItem::Delete { condition, .. } => {
                condition.as_ref()
            }
            TransactItem::Update(request) => request.condition.as_ref(),
        }
    }
}

/// Restriction on the sort key of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum SortCondition {
    Equals(KeyScalar),
    BeginsWith(String),
    /// Inclusive on both ends.
    Between(KeyScalar, KeyScalar),
}

impl SortCondition {
    pub fn matches(&self, sort: Option<&KeyScalar>) -> bool {
        let Some(sort) = sort else {
            return false;
        };
        match self {
            SortCondition::Equals(expected) => sort == expected,
            SortCondition::BeginsWith(prefix) => {
                sort.as_str().is_some_and(|value| value.starts_with(prefix.as_str()))
            }
            SortCondition::Between(low, high) => sort >= low && sort <= high,
        }
    }
}

/// Partition (and optional sort key) selection of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCondition {
    pub partition: KeyScalar,
    pub sort: Option<SortCondition>,
}

impl KeyCondition {
    pub fn partition(value: impl Into<KeyScalar>) -> Self {
        Self {
            partition: value.into(),
            sort: None,
        }
    }

    pub fn with_sort(mut self, sort: SortCondition) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// One page request against a single partition.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub table: String,
    pub key_condition: KeyCondition,
    pub filter: Option<Condition>,
    /// Maximum number of matching items returned in this page.
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<ItemKey>,
    pub scan_forward: bool,
}

impl QueryRequest {
    pub fn new(table: impl Into<String>, key_condition: KeyCondition) -> Self {
        Self {
            table: table.into(),
            key_condition,
            filter: None,
            limit: None,
            exclusive_start_key: None,
            scan_forward: true,
        }
    }

    pub fn with_filter(mut self, filter: Condition) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn starting_after(mut self, key: Option<ItemKey>) -> Self {
        self.exclusive_start_key = key;
        self
    }

    pub fn descending(mut self) -> Self {
        self.scan_forward = false;
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub items: Vec<Attributes>,
    /// Present when the partition holds more items past this page.
    pub last_evaluated_key: Option<ItemKey>,
}
