//! JSON <-> JavaScript Value Conversions
//!
//! Job parameters arrive as JSON and are handed to a script's `execute`
//! function as JavaScript values; its return value travels back as JSON.
//!
//! # Type Mapping
//!
//! | JSON Type | JavaScript Type |
//! |-----------|-----------------|
//! | null | null |
//! | boolean | Boolean |
//! | number | Number |
//! | string | String |
//! | array | Array |
//! | object | Object |
//!
//! JavaScript has a single number type, so integral results come back as
//! JSON integers: a script returning `42` yields `42`, not `42.0`.
//! `undefined` and symbols become `null`; symbol keys are skipped. NaN and
//! infinities have no JSON form and are rejected.

use boa_engine::{
    object::{builtins::JsArray, JsObject},
    property::PropertyKey,
    value::JsValue,
    Context, JsString,
};
use jobrelay_common::protocol::error::{JobRelayError, Result};
use serde_json::Value as JsonValue;

/// Largest integer a JavaScript number represents exactly (2^53 - 1).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn conversion_error(message: impl Into<String>) -> JobRelayError {
    JobRelayError::ToolExecution(message.into())
}

/// Convert serde_json::Value to Boa JsValue.
pub fn json_to_js_value(json: JsonValue, ctx: &mut Context) -> Result<JsValue> {
    match json {
        JsonValue::Null => Ok(JsValue::null()),
        JsonValue::Bool(b) => Ok(JsValue::new(b)),
        JsonValue::Number(n) => n
            .as_f64()
            .map(JsValue::new)
            .ok_or_else(|| conversion_error(format!("Number out of range: {}", n))),
        JsonValue::String(s) => Ok(JsValue::new(JsString::from(s.as_str()))),
        JsonValue::Array(arr) => {
            let js_array = JsArray::new(ctx);
            for (i, v) in arr.into_iter().enumerate() {
                let js_value = json_to_js_value(v, ctx)?;
                js_array.push(js_value, ctx).map_err(|e| {
                    conversion_error(format!("Failed to push array element {}: {}", i, e))
                })?;
            }
            Ok(js_array.into())
        }
        JsonValue::Object(obj) => {
            let js_obj = JsObject::with_object_proto(ctx.intrinsics());

            for (key, value) in obj {
                let js_value = json_to_js_value(value, ctx)?;
                js_obj
                    .create_data_property_or_throw(JsString::from(key.as_str()), js_value, ctx)
                    .map_err(|e| conversion_error(format!("Failed to set property '{}': {}", key, e)))?;
            }

            Ok(js_obj.into())
        }
    }
}

/// Convert a JavaScript number to JSON, keeping integral values integral.
fn number_to_json(n: f64) -> Result<JsonValue> {
    if !n.is_finite() {
        return Err(conversion_error(format!("{} has no JSON representation", n)));
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Ok(JsonValue::from(n as i64));
    }
    serde_json::Number::from_f64(n)
        .map(JsonValue::Number)
        .ok_or_else(|| conversion_error(format!("Invalid float {}", n)))
}

/// Convert Boa JsValue to serde_json::Value.
pub fn js_value_to_json(value: JsValue, ctx: &mut Context) -> Result<JsonValue> {
    if value.is_undefined() || value.is_null() || value.is_symbol() {
        return Ok(JsonValue::Null);
    }

    if let Some(b) = value.as_boolean() {
        return Ok(JsonValue::Bool(b));
    }

    if let Some(n) = value.as_number() {
        return number_to_json(n);
    }

    if let Some(s) = value.as_string() {
        return s
            .to_std_string()
            .map(JsonValue::String)
            .map_err(|e| conversion_error(format!("String conversion error: {:?}", e)));
    }

    let Some(obj) = value.as_object() else {
        // BigInt and anything else without a JSON form
        return Err(conversion_error(format!(
            "Cannot convert {} to JSON",
            value.display()
        )));
    };

    if obj.is_array() {
        let array = JsArray::from_object(obj.clone())
            .map_err(|e| conversion_error(format!("Object is not a valid array: {}", e)))?;

        let length: usize = array
            .length(ctx)
            .map_err(|e| conversion_error(format!("Failed to get array length: {}", e)))?
            .try_into()
            .map_err(|_| conversion_error("Array length overflow"))?;

        let mut result = Vec::with_capacity(length);
        for i in 0..length {
            let elem = array
                .get(i, ctx)
                .map_err(|e| conversion_error(format!("Failed to get array element {}: {}", i, e)))?;
            result.push(js_value_to_json(elem, ctx)?);
        }
        return Ok(JsonValue::Array(result));
    }

    let keys = obj
        .own_property_keys(ctx)
        .map_err(|e| conversion_error(format!("Failed to get object keys: {}", e)))?;

    let mut result = serde_json::Map::new();
    for key in keys {
        let key_str = match &key {
            PropertyKey::String(s) => s
                .to_std_string()
                .map_err(|e| conversion_error(format!("String conversion error: {:?}", e)))?,
            PropertyKey::Index(i) => i.get().to_string(),
            PropertyKey::Symbol(_) => continue,
        };

        let prop_value = obj
            .get(key.clone(), ctx)
            .map_err(|e| conversion_error(format!("Failed to get property '{}': {}", key_str, e)))?;
        result.insert(key_str, js_value_to_json(prop_value, ctx)?);
    }

    Ok(JsonValue::Object(result))
}
