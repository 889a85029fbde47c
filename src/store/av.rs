//! Conversion between `aws_sdk_dynamodb::types::AttributeValue` and the
//! plain JSON shape used by opaque pagination cursors
//! (`{"S": "..."}` / `{"N": "123"}`), plus the cursor codec itself.
//!
//! The cursor only ever round-trips `S` and `N` attributes in this schema
//! (every key and sort key is a string or number), so `Av` only models
//! those two variants — anything else is a programming error, not a
//! malformed-cursor case.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Av {
    S { #[serde(rename = "S")] s: String },
    N { #[serde(rename = "N")] n: String },
}

impl Av {
    fn from_attribute_value(av: &AttributeValue) -> Option<Av> {
        match av {
            AttributeValue::S(s) => Some(Av::S { s: s.clone() }),
            AttributeValue::N(n) => Some(Av::N { n: n.clone() }),
            _ => None,
        }
    }

    fn into_attribute_value(self) -> AttributeValue {
        match self {
            Av::S { s } => AttributeValue::S(s),
            Av::N { n } => AttributeValue::N(n),
        }
    }
}

/// Encode a last-evaluated-key map as an opaque URL-safe base64 cursor.
pub fn encode_cursor(key: &HashMap<String, AttributeValue>) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    let as_json: HashMap<String, Av> = key
        .iter()
        .filter_map(|(k, v)| Av::from_attribute_value(v).map(|av| (k.clone(), av)))
        .collect();
    let json = serde_json::to_vec(&as_json).ok()?;
    Some(URL_SAFE.encode(json))
}

/// Decode an opaque cursor back into a last-evaluated-key map. Any
/// malformed cursor (bad base64, bad JSON, wrong shape) is treated as
/// absent rather than an error, per the spec's cursor contract.
pub fn decode_cursor(cursor: &str) -> Option<HashMap<String, AttributeValue>> {
    let bytes = URL_SAFE.decode(cursor).ok()?;
    let as_json: HashMap<String, Av> = serde_json::from_slice(&bytes).ok()?;
    Some(
        as_json
            .into_iter()
            .map(|(k, v)| (k, v.into_attribute_value()))
            .collect(),
    )
}
