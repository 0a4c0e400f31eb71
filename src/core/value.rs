use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

/// A single key component.
///
/// Backing-store keys are restricted to strings and integers so that they
/// hash and order deterministically. Integers sort before strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyScalar {
    Int(i64),
    Str(String),
}

impl KeyScalar {
    /// Converts a JSON attribute into a key component, if it is usable as one.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(KeyScalar::Str(s.clone())),
            Value::Number(n) => n.as_i64().map(KeyScalar::Int),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            KeyScalar::Int(n) => Value::from(*n),
            KeyScalar::Str(s) => Value::String(s.clone()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeyScalar::Str(s) => Some(s),
            KeyScalar::Int(_) => None,
        }
    }
}

impl Ord for KeyScalar {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyScalar::Int(a), KeyScalar::Int(b)) => a.cmp(b),
            (KeyScalar::Str(a), KeyScalar::Str(b)) => a.cmp(b),
            (KeyScalar::Int(_), KeyScalar::Str(_)) => Ordering::Less,
            (KeyScalar::Str(_), KeyScalar::Int(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for KeyScalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for KeyScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyScalar::Int(n) => write!(f, "{}", n),
            KeyScalar::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for KeyScalar {
    fn from(value: &str) -> Self {
        KeyScalar::Str(value.to_string())
    }
}

impl From<String> for KeyScalar {
    fn from(value: String) -> Self {
        KeyScalar::Str(value)
    }
}

impl From<i64> for KeyScalar {
    fn from(value: i64) -> Self {
        KeyScalar::Int(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_scalar_from_json() {
        assert_eq!(KeyScalar::from_json(&json!("a")), Some(KeyScalar::from("a")));
        assert_eq!(KeyScalar::from_json(&json!(7)), Some(KeyScalar::Int(7)));
        assert_eq!(KeyScalar::from_json(&json!(1.5)), None);
        assert_eq!(KeyScalar::from_json(&json!(true)), None);
        assert_eq!(KeyScalar::from_json(&json!(null)), None);
    }

    #[test]
    fn test_key_scalar_ordering() {
        assert!(KeyScalar::Int(2) < KeyScalar::Int(10));
        assert!(KeyScalar::from("b") > KeyScalar::from("a"));
        assert!(KeyScalar::Int(i64::MAX) < KeyScalar::from(""));
    }
}
