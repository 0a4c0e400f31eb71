use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema-less attribute payload of a stored item.
pub type Attributes = Map<String, Value>;

/// Primary key of an item: one attribute for hash-only tables, two for
/// tables with a sort key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(Attributes);

impl ItemKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key with a single string attribute, e.g. `ItemKey::single("id", "org-1")`.
    pub fn single(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().with(name, value)
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.0
    }

    pub fn into_attributes(self) -> Attributes {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Attributes> for ItemKey {
    fn from(value: Attributes) -> Self {
        Self(value)
    }
}

/// Reads a string attribute, treating absent and non-string values as missing.
pub fn string_attr<'a>(item: &'a Attributes, name: &str) -> Option<&'a str> {
    item.get(name).and_then(Value::as_str)
}

/// Reads an integer attribute, treating absent and non-integer values as missing.
pub fn int_attr(item: &Attributes, name: &str) -> Option<i64> {
    item.get(name).and_then(Value::as_i64)
}
