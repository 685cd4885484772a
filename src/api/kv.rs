//! Purpose: Host-facing typed key-value trait and convenience helpers.
//! Exports: `KeyValueStore`, `KeyValueExt`.
//! Role: One interface over the persistent `Store` and the in-memory `MemoryStore`.
//! Invariants: Absence is `Ok(None)`; narrowing conversions that lose range fail with
//! `ErrorKind::TypeMismatch` instead of truncating.

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::codec::{JsonCodec, TextCodec};
use crate::core::error::{Error, ErrorKind};
use crate::core::store::Store;

pub trait KeyValueStore {
    fn has_key(&mut self, key: &str) -> Result<bool, Error>;

    /// Removes `key`; removing an absent key succeeds.
    fn delete_key(&mut self, key: &str) -> Result<(), Error>;

    fn delete_all(&mut self) -> Result<(), Error>;

    fn try_get_i64(&mut self, key: &str) -> Result<Option<i64>, Error>;

    fn try_get_f64(&mut self, key: &str) -> Result<Option<f64>, Error>;

    fn try_get_string(&mut self, key: &str) -> Result<Option<String>, Error>;

    fn try_get_bytes(&mut self, key: &str) -> Result<Option<Vec<u8>>, Error>;

    fn set_i64(&mut self, key: &str, value: i64) -> Result<(), Error>;

    fn set_f64(&mut self, key: &str, value: f64) -> Result<(), Error>;

    fn set_string(&mut self, key: &str, value: &str) -> Result<(), Error>;

    fn set_bytes(&mut self, key: &str, value: &[u8]) -> Result<(), Error>;

    /// Booleans are stored as the integers 0 and 1.
    fn try_get_bool(&mut self, key: &str) -> Result<Option<bool>, Error> {
        Ok(self.try_get_i64(key)?.map(|value| value != 0))
    }

    fn try_get_i32(&mut self, key: &str) -> Result<Option<i32>, Error> {
        self.try_get_i64(key)?
            .map(|value| {
                i32::try_from(value).map_err(|_| {
                    Error::new(ErrorKind::TypeMismatch)
                        .with_message(format!("stored integer {value} does not fit in i32"))
                        .with_key(key)
                })
            })
            .transpose()
    }

    fn try_get_f32(&mut self, key: &str) -> Result<Option<f32>, Error> {
        Ok(self.try_get_f64(key)?.map(|value| value as f32))
    }

    fn set_bool(&mut self, key: &str, value: bool) -> Result<(), Error> {
        self.set_i64(key, i64::from(value))
    }

    fn set_i32(&mut self, key: &str, value: i32) -> Result<(), Error> {
        self.set_i64(key, i64::from(value))
    }

    fn set_f32(&mut self, key: &str, value: f32) -> Result<(), Error> {
        self.set_f64(key, f64::from(value))
    }
}

impl KeyValueStore for Store {
    fn has_key(&mut self, key: &str) -> Result<bool, Error> {
        Store::has_key(self, key)
    }

    fn delete_key(&mut self, key: &str) -> Result<(), Error> {
        Store::delete_key(self, key).map(drop)
    }

    fn delete_all(&mut self) -> Result<(), Error> {
        Store::delete_all(self).map(drop)
    }

    fn try_get_i64(&mut self, key: &str) -> Result<Option<i64>, Error> {
        self.try_get_int(key)
    }

    fn try_get_f64(&mut self, key: &str) -> Result<Option<f64>, Error> {
        self.try_get_double(key)
    }

    fn try_get_string(&mut self, key: &str) -> Result<Option<String>, Error> {
        self.try_get_text(key)
    }

    fn try_get_bytes(&mut self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        Store::try_get_bytes(self, key)
    }

    fn set_i64(&mut self, key: &str, value: i64) -> Result<(), Error> {
        self.set_int(key, value)
    }

    fn set_f64(&mut self, key: &str, value: f64) -> Result<(), Error> {
        self.set_double(key, value)
    }

    fn set_string(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.set_text(key, value)
    }

    fn set_bytes(&mut self, key: &str, value: &[u8]) -> Result<(), Error> {
        Store::set_bytes(self, key, value)
    }
}

/// Defaults and object helpers available on every `KeyValueStore`.
pub trait KeyValueExt: KeyValueStore {
    fn get_bool_or(&mut self, key: &str, default: bool) -> Result<bool, Error> {
        Ok(self.try_get_bool(key)?.unwrap_or(default))
    }

    fn get_i32_or(&mut self, key: &str, default: i32) -> Result<i32, Error> {
        Ok(self.try_get_i32(key)?.unwrap_or(default))
    }

    fn get_i64_or(&mut self, key: &str, default: i64) -> Result<i64, Error> {
        Ok(self.try_get_i64(key)?.unwrap_or(default))
    }

    fn get_f32_or(&mut self, key: &str, default: f32) -> Result<f32, Error> {
        Ok(self.try_get_f32(key)?.unwrap_or(default))
    }

    fn get_f64_or(&mut self, key: &str, default: f64) -> Result<f64, Error> {
        Ok(self.try_get_f64(key)?.unwrap_or(default))
    }

    fn get_string_or(&mut self, key: &str, default: &str) -> Result<String, Error> {
        Ok(self
            .try_get_string(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    fn get_bytes_or(&mut self, key: &str, default: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(self.try_get_bytes(key)?.unwrap_or_else(|| default.to_vec()))
    }

    /// Reads a JSON-encoded object stored as text.
    fn try_get_object<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>, Error> {
        self.try_get_object_with(&JsonCodec::new(), key)
    }

    fn try_get_object_with<C, T>(&mut self, codec: &C, key: &str) -> Result<Option<T>, Error>
    where
        C: TextCodec,
        T: DeserializeOwned,
    {
        self.try_get_string(key)?
            .map(|text| codec.decode(&text).map_err(|err| err.with_key(key)))
            .transpose()
    }

    fn set_object<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), Error> {
        self.set_object_with(&JsonCodec::new(), key, value)
    }

    fn set_object_with<C, T>(&mut self, codec: &C, key: &str, value: &T) -> Result<(), Error>
    where
        C: TextCodec,
        T: Serialize + ?Sized,
    {
        let text = codec.encode(value).map_err(|err| err.with_key(key))?;
        self.set_string(key, &text)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueExt for S {}

#[cfg(test)]
mod tests {
    use super::{KeyValueExt, KeyValueStore};
    use crate::api::{ErrorKind, MemoryStore, Store};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Window {
        width: u32,
        height: u32,
        title: String,
    }

    fn exercise(store: &mut dyn KeyValueStore) {
        store.set_bool("flag", true).expect("bool");
        store.set_i32("small", -12).expect("i32");
        store.set_f32("ratio", 0.5).expect("f32");
        store.set_string("name", "kv").expect("string");
        store.set_bytes("raw", &[9, 0, 9]).expect("bytes");

        assert_eq!(store.try_get_bool("flag").expect("get"), Some(true));
        assert_eq!(store.try_get_i32("small").expect("get"), Some(-12));
        assert_eq!(store.try_get_f32("ratio").expect("get"), Some(0.5));
        assert_eq!(store.try_get_string("name").expect("get").as_deref(), Some("kv"));
        assert_eq!(store.try_get_bytes("raw").expect("get"), Some(vec![9, 0, 9]));

        assert!(store.has_key("name").expect("has"));
        store.delete_key("name").expect("delete");
        store.delete_key("name").expect("delete absent");
        assert!(!store.has_key("name").expect("has"));

        store.delete_all().expect("clear");
        assert!(!store.has_key("flag").expect("has"));
    }

    #[test]
    fn sqlite_store_implements_trait() {
        let mut store = Store::open_in_memory().expect("open");
        exercise(&mut store);
    }

    #[test]
    fn memory_store_implements_trait() {
        let mut store = MemoryStore::new();
        exercise(&mut store);
    }

    #[test]
    fn defaults_apply_only_when_absent() {
        let mut store = Store::open_in_memory().expect("open");
        assert_eq!(store.get_i64_or("missing", 7).expect("default"), 7);
        assert_eq!(store.get_string_or("missing", "dflt").expect("default"), "dflt");
        store.set_i64("present", 1).expect("set");
        assert_eq!(store.get_i64_or("present", 7).expect("stored"), 1);
        assert!(store.get_bool_or("present", false).expect("stored"));
    }

    #[test]
    fn out_of_range_i32_is_a_mismatch() {
        let mut store = Store::open_in_memory().expect("open");
        store.set_i64("big", i64::from(i32::MAX) + 1).expect("set");
        let err = store.try_get_i32("big").expect_err("range");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(err.key(), Some("big"));
    }

    #[test]
    fn objects_round_trip_through_json() {
        let mut store = Store::open_in_memory().expect("open");
        let window = Window {
            width: 640,
            height: 480,
            title: "main".to_string(),
        };
        store.set_object("window", &window).expect("set");
        let loaded: Option<Window> = store.try_get_object("window").expect("get");
        assert_eq!(loaded, Some(window));

        let missing: Option<Window> = store.try_get_object("nope").expect("get");
        assert!(missing.is_none());

        store.set_string("broken", "{not json").expect("set");
        let err = store
            .try_get_object::<Window>("broken")
            .expect_err("bad json");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }
}
