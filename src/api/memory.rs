//! Purpose: In-memory `KeyValueStore` for tests and hosts that do not need persistence.
//! Exports: `MemoryStore`.
//! Role: Drop-in stand-in for `Store` behind the `KeyValueStore` trait.
//! Invariants: Reads convert leniently between numeric and text forms; a value that
//! cannot be converted reads as absent.

use std::collections::HashMap;

use super::kv::KeyValueStore;
use crate::core::error::Error;
use crate::core::value::Value;

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl KeyValueStore for MemoryStore {
    fn has_key(&mut self, key: &str) -> Result<bool, Error> {
        Ok(self.entries.contains_key(key))
    }

    fn delete_key(&mut self, key: &str) -> Result<(), Error> {
        self.entries.remove(key);
        Ok(())
    }

    fn delete_all(&mut self) -> Result<(), Error> {
        self.entries.clear();
        Ok(())
    }

    fn try_get_bool(&mut self, key: &str) -> Result<Option<bool>, Error> {
        Ok(self.entries.get(key).and_then(|value| match value {
            Value::Int(int) => Some(*int != 0),
            Value::Double(double) => Some(*double != 0.0),
            Value::Text(text) => {
                let text = text.trim();
                if text.eq_ignore_ascii_case("true") {
                    Some(true)
                } else if text.eq_ignore_ascii_case("false") {
                    Some(false)
                } else {
                    text.parse::<i64>().ok().map(|int| int != 0)
                }
            }
            Value::Null | Value::Bytes(_) => None,
        }))
    }

    fn try_get_i64(&mut self, key: &str) -> Result<Option<i64>, Error> {
        Ok(self.entries.get(key).and_then(|value| match value {
            Value::Int(int) => Some(*int),
            Value::Double(double) => double_to_i64(*double),
            Value::Text(text) => {
                let text = text.trim();
                text.parse::<i64>()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().and_then(double_to_i64))
            }
            Value::Null | Value::Bytes(_) => None,
        }))
    }

    fn try_get_f64(&mut self, key: &str) -> Result<Option<f64>, Error> {
        Ok(self.entries.get(key).and_then(|value| match value {
            Value::Int(int) => Some(*int as f64),
            Value::Double(double) => Some(*double),
            Value::Text(text) => text.trim().parse::<f64>().ok(),
            Value::Null | Value::Bytes(_) => None,
        }))
    }

    fn try_get_string(&mut self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.get(key).and_then(|value| match value {
            Value::Text(text) => Some(text.clone()),
            Value::Int(int) => Some(int.to_string()),
            Value::Double(double) => Some(double.to_string()),
            Value::Null => Some(String::new()),
            Value::Bytes(_) => None,
        }))
    }

    fn try_get_bytes(&mut self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.entries.get(key).and_then(|value| match value {
            Value::Bytes(bytes) => Some(bytes.clone()),
            Value::Text(text) => Some(text.as_bytes().to_vec()),
            Value::Null => Some(Vec::new()),
            Value::Int(_) | Value::Double(_) => None,
        }))
    }

    fn set_i64(&mut self, key: &str, value: i64) -> Result<(), Error> {
        self.insert(key, value);
        Ok(())
    }

    fn set_f64(&mut self, key: &str, value: f64) -> Result<(), Error> {
        self.insert(key, value);
        Ok(())
    }

    fn set_string(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.insert(key, value);
        Ok(())
    }

    fn set_bytes(&mut self, key: &str, value: &[u8]) -> Result<(), Error> {
        self.insert(key, value);
        Ok(())
    }
}

// Rounds half to even; out-of-range and non-finite values do not convert.
fn double_to_i64(value: f64) -> Option<i64> {
    let rounded = value.round_ties_even();
    if rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
        Some(rounded as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::api::{KeyValueExt, KeyValueStore, Value};

    #[test]
    fn numeric_reads_convert_leniently() {
        let mut store = MemoryStore::new();
        store.insert("double", 2.5);
        store.insert("text", " 42 ");
        store.insert("blob", vec![1u8, 2]);

        assert_eq!(store.try_get_i64("double").expect("get"), Some(2));
        assert_eq!(store.try_get_i64("text").expect("get"), Some(42));
        assert_eq!(store.try_get_f64("text").expect("get"), Some(42.0));
        assert_eq!(store.try_get_i64("blob").expect("get"), None);
        assert_eq!(store.try_get_string("double").expect("get").as_deref(), Some("2.5"));
    }

    #[test]
    fn bool_accepts_words_and_numbers() {
        let mut store = MemoryStore::new();
        store.insert("word", "TRUE");
        store.insert("zero", 0i64);
        assert_eq!(store.try_get_bool("word").expect("get"), Some(true));
        assert_eq!(store.try_get_bool("zero").expect("get"), Some(false));
        assert!(store.get_bool_or("missing", true).expect("default"));
    }

    #[test]
    fn writes_replace_previous_values() {
        let mut store = MemoryStore::new();
        store.set_i64("k", 1).expect("set");
        store.set_string("k", "one").expect("set");
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k"), Some(&Value::Text("one".to_string())));
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["k"]);
    }
}
