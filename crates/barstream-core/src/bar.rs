//! Bar record type.
//!
//! The provider decides the schema of a bar. This crate only keeps the
//! fields in the order they were inserted so the CSV columns follow the
//! provider's field order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Symbol streamed by the service. Also the output file prefix.
pub const SYMBOL: &str = "BTCUSD";

/// One OHLCV bar as delivered by the connector.
///
/// Opaque mapping from field name to value, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BarRecord {
    fields: Map<String, Value>,
}

impl BarRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field. Re-inserting an existing name keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Builder-style `insert`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Field names in insertion order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for BarRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_order_is_insertion_order() {
        let bar = BarRecord::new()
            .with("symbol", "BTCUSD")
            .with("close", 64010.5)
            .with("open", 64000.0)
            .with("volume", 1.25);

        let names: Vec<_> = bar.field_names().collect();
        assert_eq!(names, vec!["symbol", "close", "open", "volume"]);
    }

    #[test]
    fn test_reinsert_keeps_position() {
        let mut bar = BarRecord::new().with("a", 1).with("b", 2);
        bar.insert("a", 3);

        let names: Vec<_> = bar.field_names().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(bar.get("a"), Some(&json!(3)));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let bar = BarRecord::new().with("symbol", "BTCUSD").with("close", 1.5);
        let text = serde_json::to_string(&bar).unwrap();
        assert_eq!(text, r#"{"symbol":"BTCUSD","close":1.5}"#);

        let parsed: BarRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, bar);
    }

    #[test]
    fn test_from_map() {
        let value = json!({"z": 1, "a": 2});
        let map = value.as_object().cloned().unwrap();
        let bar = BarRecord::from(map);

        assert_eq!(bar.len(), 2);
        assert!(!bar.is_empty());
        assert_eq!(bar.field_names().collect::<Vec<_>>(), vec!["z", "a"]);
    }
}
