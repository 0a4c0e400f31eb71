use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Attributes, ItemKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeEventType {
    Insert,
    Modify,
    Remove,
}

/// One mutation published by the backing store's change stream.
///
/// Delivery is at-least-once; the same event may be seen more than once and
/// events of unrelated items may arrive out of order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event_id: String,
    pub sequence: u64,
    pub event_type: ChangeEventType,
    pub table: String,
    pub keys: ItemKey,
    pub old_image: Option<Attributes>,
    pub new_image: Option<Attributes>,
}

impl ChangeEvent {
    pub fn new(
        sequence: u64,
        table: impl Into<String>,
        keys: ItemKey,
        old_image: Option<Attributes>,
        new_image: Option<Attributes>,
    ) -> Self {
        let event_type = match (&old_image, &new_image) {
            (None, _) => ChangeEventType::Insert,
            (Some(_), None) => ChangeEventType::Remove,
            (Some(_), Some(_)) => ChangeEventType::Modify,
        };
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            sequence,
            event_type,
            table: table.into(),
            keys,
            old_image,
            new_image,
        }
    }
}

/// Reads a string attribute from an image; absent, null or non-string values read as empty.
pub fn image_string(image: Option<&Attributes>, name: &str) -> String {
    image
        .and_then(|image| image.get(name))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Reads an integer attribute from an image; anything else reads as zero.
pub fn image_number(image: Option<&Attributes>, name: &str) -> i64 {
    image
        .and_then(|image| image.get(name))
        .and_then(Value::as_i64)
        .unwrap_or_default()
}

/// Reads a list of strings from an image, skipping non-string elements.
pub fn image_string_list(image: Option<&Attributes>, name: &str) -> Vec<String> {
    image
        .and_then(|image| image.get(name))
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image(value: Value) -> Attributes {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_event_type_follows_images() {
        let key = ItemKey::single("id", "a");
        let img = image(json!({"id": "a"}));
        let insert = ChangeEvent::new(1, "t", key.clone(), None, Some(img.clone()));
        let modify = ChangeEvent::new(2, "t", key.clone(), Some(img.clone()), Some(img.clone()));
        let remove = ChangeEvent::new(3, "t", key, Some(img), None);
        assert_eq!(insert.event_type, ChangeEventType::Insert);
        assert_eq!(modify.event_type, ChangeEventType::Modify);
        assert_eq!(remove.event_type, ChangeEventType::Remove);
        assert_ne!(insert.event_id, modify.event_id);
    }

    #[test]
    fn test_image_string() {
        let img = image(json!({"name": "日本語テスト", "special": "value#with:special/chars", "n": 4}));
        assert_eq!(image_string(Some(&img), "name"), "日本語テスト");
        assert_eq!(image_string(Some(&img), "special"), "value#with:special/chars");
        assert_eq!(image_string(Some(&img), "n"), "");
        assert_eq!(image_string(Some(&img), "missing"), "");
        assert_eq!(image_string(None, "name"), "");
    }

    #[test]
    fn test_image_number() {
        let img = image(json!({
            "ttl": 1234567890,
            "offset": -100,
            "max": i64::MAX,
            "min": i64::MIN,
            "text": "not-a-number"
        }));
        assert_eq!(image_number(Some(&img), "ttl"), 1234567890);
        assert_eq!(image_number(Some(&img), "offset"), -100);
        assert_eq!(image_number(Some(&img), "max"), i64::MAX);
        assert_eq!(image_number(Some(&img), "min"), i64::MIN);
        assert_eq!(image_number(Some(&img), "text"), 0);
        assert_eq!(image_number(Some(&img), "missing"), 0);
        assert_eq!(image_number(None, "ttl"), 0);
    }

    #[test]
    fn test_image_string_list() {
        let img = image(json!({
            "_unique_pks": ["pk1", "pk2", "pk3"],
            "mixed": ["a", 1, null, "b"],
            "empty": [],
            "scalar": "pk1"
        }));
        assert_eq!(image_string_list(Some(&img), "_unique_pks"), vec!["pk1", "pk2", "pk3"]);
        assert_eq!(image_string_list(Some(&img), "mixed"), vec!["a", "b"]);
        assert!(image_string_list(Some(&img), "empty").is_empty());
        assert!(image_string_list(Some(&img), "scalar").is_empty());
        assert!(image_string_list(None, "_unique_pks").is_empty());
    }

    #[test]
    fn test_event_wire_format() {
        let event = ChangeEvent::new(
            9,
            "studios",
            ItemKey::single("id", "s1"),
            None,
            Some(image(json!({"id": "s1"}))),
        );
        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(encoded["event_type"], json!("INSERT"));
        assert_eq!(encoded["keys"], json!({"id": "s1"}));
        let decoded: ChangeEvent = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, event);
    }
}
