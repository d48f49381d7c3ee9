//! Stock validators for `Procedure::input`.
//!
//! GET input arrives as a flat object of strings, so targets of `json` for
//! query routes should use string fields.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::rpc::error::RpcError;

/// Deserialize the raw input into `I`.
pub fn json<I: DeserializeOwned>(raw: Value) -> Result<I, RpcError> {
    serde_json::from_value(raw).map_err(|e| RpcError::Validation(e.to_string()))
}

/// Accept the raw input unchanged.
pub fn raw(raw: Value) -> Result<Value, RpcError> {
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Input {
        username: String,
    }

    #[test]
    fn test_json_validator() {
        let ok: Input = json(serde_json::json!({ "username": "u" })).unwrap();
        assert_eq!(ok.username, "u");

        let err = json::<Input>(serde_json::json!({ "user": "u" })).unwrap_err();
        assert!(matches!(err, RpcError::Validation(msg) if msg.contains("username")));
    }
}
