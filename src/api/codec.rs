//! Purpose: Text codecs used to store structured objects as values.
//! Exports: `TextCodec`, `JsonCodec`.
//! Role: Backs `KeyValueExt::try_get_object` and `KeyValueExt::set_object`.
//! Invariants: Encoding failures are `Usage` errors; decoding failures are `Corrupt`.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::error::{Error, ErrorKind};

pub trait TextCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, Error>;

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, Error>;
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl TextCodec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, Error> {
        let encoded = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        encoded.map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("failed to encode object as JSON")
                .with_source(err)
        })
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, Error> {
        serde_json::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message(format!("stored text is not the expected JSON: {err}"))
                .with_source(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonCodec, TextCodec};
    use serde_json::json;

    #[test]
    fn pretty_output_spans_lines() {
        let value = json!({"a": [1, 2]});
        let compact = JsonCodec::new().encode(&value).expect("compact");
        let pretty = JsonCodec::pretty().encode(&value).expect("pretty");
        assert_eq!(compact, r#"{"a":[1,2]}"#);
        assert!(pretty.contains('\n'));
        let decoded: serde_json::Value = JsonCodec::new().decode(&pretty).expect("decode");
        assert_eq!(decoded, value);
    }
}
