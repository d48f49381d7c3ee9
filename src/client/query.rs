//! Query-string encoding for GET calls.
//!
//! Only flat objects are supported: every value must be a string, number,
//! boolean or null. Nested arrays and objects are rejected rather than
//! guessed at.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::Value;

use crate::client::ClientError;

/// Everything but `A-Z a-z 0-9 - _ . ! ~ * ' ( )` is escaped.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Encode `input` as `?k=v&k=v`, or an empty string when there is nothing
/// to send.
///
/// Keys keep their serialization order. `null` values are skipped so that
/// `Option::None` fields are simply absent.
pub fn encode_query<I: Serialize + ?Sized>(input: &I) -> Result<String, ClientError> {
    let fields = match serde_json::to_value(input).map_err(ClientError::Encode)? {
        Value::Null => return Ok(String::new()),
        Value::Object(fields) => fields,
        _ => return Err(ClientError::UnsupportedQuery("<root>".to_string())),
    };

    let mut pairs = Vec::with_capacity(fields.len());
    for (key, value) in &fields {
        let value = match value {
            Value::Null => continue,
            Value::String(text) => text.clone(),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(ClientError::UnsupportedQuery(key.clone()))
            }
        };
        pairs.push(format!(
            "{}={}",
            utf8_percent_encode(key, COMPONENT),
            utf8_percent_encode(&value, COMPONENT)
        ));
    }

    if pairs.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!("?{}", pairs.join("&")))
    }
}
