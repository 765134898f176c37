//! Conversion between Firestore typed values and plain JSON
//!
//! Firestore's REST API wraps every value in a single-key object naming its
//! type (`{"stringValue": "x"}`, `{"mapValue": {"fields": {...}}}`).
//! Integers travel as decimal strings. Types with no JSON counterpart
//! decode to their nearest JSON shape: timestamps and references become
//! strings, geo points become `{latitude, longitude}` objects.

use crate::store::Fields;
use crate::{Error, Result};
use serde_json::{json, Map, Value};

/// Encode a JSON value as a Firestore value
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encode a field map as a Firestore `fields` object
pub fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}

/// Decode a Firestore value into JSON
pub fn decode_value(value: &Value) -> Result<Value> {
    let Some((kind, inner)) = value.as_object().and_then(|m| m.iter().next()) else {
        return Err(Error::Store(format!("malformed Firestore value: {}", value)));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => Ok(Value::Bool(inner.as_bool().unwrap_or(false))),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(Value::from)
                .ok_or_else(|| Error::Store(format!("bad integerValue: {}", inner)))
        }
        "doubleValue" => match inner {
            Value::Number(_) => Ok(inner.clone()),
            // NaN and infinities arrive as strings; JSON cannot hold them
            Value::String(_) => Ok(Value::Null),
            _ => Err(Error::Store(format!("bad doubleValue: {}", inner))),
        },
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => Ok(inner.clone()),
        "geoPointValue" => Ok(json!({
            "latitude": inner.get("latitude").cloned().unwrap_or(Value::from(0.0)),
            "longitude": inner.get("longitude").cloned().unwrap_or(Value::from(0.0)),
        })),
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode_value).collect::<Result<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(values))
        }
        "mapValue" => {
            let fields = inner.get("fields").cloned().unwrap_or_else(|| json!({}));
            Ok(Value::Object(decode_fields(&fields)?))
        }
        other => Err(Error::Store(format!("unsupported Firestore value type '{}'", other))),
    }
}

/// Decode a Firestore `fields` object
pub fn decode_fields(fields: &Value) -> Result<Fields> {
    let Some(map) = fields.as_object() else {
        return Err(Error::Store("Firestore fields is not an object".to_string()));
    };
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        out.insert(key.clone(), decode_value(value)?);
    }
    Ok(out)
}

/// Document id from a full resource name
/// (`projects/p/databases/(default)/documents/projects/abc` → `abc`)
pub fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}
