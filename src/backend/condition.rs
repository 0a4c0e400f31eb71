use serde_json::Value;

use crate::core::Attributes;

/// Typed condition expression evaluated against a single item.
///
/// Used both as a write guard (conditional put/update/delete, condition
/// checks inside transactions) and as a query filter. `item` is `None` when
/// the addressed item does not exist.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    ItemExists,
    ItemNotExists,
    AttributeExists(String),
    AttributeNotExists(String),
    Equals(String, Value),
    /// Integer attribute strictly greater than the operand.
    GreaterThan(String, i64),
    /// Integer attribute less than or equal to the operand.
    AtMost(String, i64),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn attribute_exists(name: impl Into<String>) -> Self {
        Condition::AttributeExists(name.into())
    }

    pub fn attribute_not_exists(name: impl Into<String>) -> Self {
        Condition::AttributeNotExists(name.into())
    }

    pub fn equals(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Equals(name.into(), value.into())
    }

    pub fn greater_than(name: impl Into<String>, operand: i64) -> Self {
        Condition::GreaterThan(name.into(), operand)
    }

    pub fn at_most(name: impl Into<String>, operand: i64) -> Self {
        Condition::AtMost(name.into(), operand)
    }

    /// Conjunction, flattening nested `And`s.
    pub fn and(self, other: Condition) -> Self {
        let mut terms = match self {
            Condition::And(terms) => terms,
            single => vec![single],
        };
        match other {
            Condition::And(more) => terms.extend(more),
            single => terms.push(single),
        }
        Condition::And(terms)
    }

    /// Disjunction, flattening nested `Or`s.
    pub fn or(self, other: Condition) -> Self {
        let mut terms = match self {
            Condition::Or(terms) => terms,
            single => vec![single],
        };
        match other {
            Condition::Or(more) => terms.extend(more),
            single => terms.push(single),
        }
        Condition::Or(terms)
    }

    pub fn negate(self) -> Self {
        Condition::Not(Box::new(self))
    }

    pub fn evaluate(&self, item: Option<&Attributes>) -> bool {
        match self {
            Condition::ItemExists => item.is_some(),
            Condition::ItemNotExists => item.is_none(),
            Condition::AttributeExists(name) => item.is_some_and(|item| item.contains_key(name)),
            Condition::AttributeNotExists(name) => {
                !item.is_some_and(|item| item.contains_key(name))
            }
            Condition::Equals(name, expected) => {
                item.and_then(|item| item.get(name)) == Some(expected)
            }
            Condition::GreaterThan(name, operand) => {
                integer(item, name).is_some_and(|value| value > *operand)
            }
            Condition::AtMost(name, operand) => {
                integer(item, name).is_some_and(|value| value <= *operand)
            }
            Condition::And(terms) => terms.iter().all(|term| term.evaluate(item)),
            Condition::Or(terms) => terms.iter().any(|term| term.evaluate(item)),
            Condition::Not(inner) => !inner.evaluate(item),
        }
    }
}

fn integer(item: Option<&Attributes>, name: &str) -> Option<i64> {
    item.and_then(|item| item.get(name)).and_then(Value::as_i64)
}
