//! Normalization of the server's inconsistent response envelopes.
//!
//! The table, status and historic-data endpoints do not share an envelope.
//! Unwrapping is an ordered list of rules; the first rule whose predicate
//! matches extracts the result. The order is significant and fixed.
//!
//! | Rule | Matches | Result |
//! |------|---------|--------|
//! | `status` | object with `Version` | the object |
//! | `envelope` | object with `prtg-version` | its `groups`, else the object |
//! | `collection` | object with a known collection field | first field in [`COLLECTION_FIELDS`] order |
//! | `sentinel` | the string `"Not enough monitoring data"` | error |
//! | `passthrough` | anything | the payload unchanged |

use serde_json::Value;

use crate::ClientError;

/// Field carrying the server version on table/historic responses.
pub const VERSION_MARKER: &str = "prtg-version";

/// Field carrying the version on status responses.
pub const STATUS_VERSION: &str = "Version";

/// Collection fields, in lookup priority.
pub const COLLECTION_FIELDS: [&str; 7] = [
    "groups",
    "devices",
    "sensors",
    "channels",
    "values",
    "sensordata",
    "messages",
];

/// Payload the server sends instead of JSON when a range holds no samples.
pub const NOT_ENOUGH_DATA: &str = "Not enough monitoring data";

/// One unwrapping rule.
pub struct NormalizeRule {
    pub name: &'static str,
    pub matches: fn(&Value) -> bool,
    pub extract: fn(Value) -> Result<Value, ClientError>,
}

impl std::fmt::Debug for NormalizeRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizeRule").field("name", &self.name).finish()
    }
}

/// The rules, in the order they are tried.
pub static RULES: [NormalizeRule; 5] = [
    NormalizeRule {
        name: "status",
        matches: is_status,
        extract: Ok,
    },
    NormalizeRule {
        name: "envelope",
        matches: is_envelope,
        extract: unwrap_envelope,
    },
    NormalizeRule {
        name: "collection",
        matches: has_collection,
        extract: unwrap_collection,
    },
    NormalizeRule {
        name: "sentinel",
        matches: is_not_enough_data,
        extract: not_enough_data,
    },
    NormalizeRule {
        name: "passthrough",
        matches: any,
        extract: Ok,
    },
];

/// Normalize a decoded response.
pub fn process_response(value: Value) -> Result<Value, ClientError> {
    let rule = matching_rule(&value);
    (rule.extract)(value)
}

/// The first rule that matches `value`.
pub fn matching_rule(value: &Value) -> &'static NormalizeRule {
    RULES
        .iter()
        .find(|rule| (rule.matches)(value))
        .unwrap_or(&RULES[RULES.len() - 1])
}

/// Decode a response body. Non-JSON bodies become a JSON string so the
/// sentinel rule can see them.
pub fn decode_body(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.trim().to_string()))
}

/// Pull `field` out of a normalized value.
///
/// Accepts either the bare collection (already unwrapped) or an object that
/// still carries the field (as returned by the `envelope` rule).
pub fn extract_collection(value: Value, field: &str) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map.remove(field) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn is_status(value: &Value) -> bool {
    value.get(STATUS_VERSION).is_some()
}

fn is_envelope(value: &Value) -> bool {
    value.get(VERSION_MARKER).is_some()
}

fn unwrap_envelope(value: Value) -> Result<Value, ClientError> {
    match value {
        Value::Object(mut map) => match map.remove("groups") {
            Some(groups) => Ok(groups),
            None => Ok(Value::Object(map)),
        },
        other => Ok(other),
    }
}

fn has_collection(value: &Value) -> bool {
    COLLECTION_FIELDS.iter().any(|f| value.get(f).is_some())
}

fn unwrap_collection(value: Value) -> Result<Value, ClientError> {
    let Value::Object(mut map) = value else {
        return Ok(value);
    };
    for field in COLLECTION_FIELDS {
        if let Some(inner) = map.remove(field) {
            return Ok(inner);
        }
    }
    Ok(Value::Object(map))
}

fn is_not_enough_data(value: &Value) -> bool {
    value.as_str() == Some(NOT_ENOUGH_DATA)
}

fn not_enough_data(_: Value) -> Result<Value, ClientError> {
    Err(ClientError::NotEnoughData)
}

fn any(_: &Value) -> bool {
    true
}
