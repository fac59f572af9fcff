//! Normalizes the catalog transport's response shapes into one
//! `{data, errors}` result before anything inspects it.
//!
//! Transports differ: some hand back an already-decoded JSON value, some a
//! raw body string, some raw bytes. All three funnel through
//! [`normalize_response`]; the rest of the crate only ever sees
//! [`GraphQlResult`].

use serde_json::Value;

use crate::error::SyncError;

/// What a [`crate::contract::CatalogClient`] is allowed to return.
#[derive(Debug, Clone)]
pub enum RawResponse {
    /// Already-decoded JSON exposing `data`/`errors`.
    Value(Value),
    /// Raw response body, JSON-encoded.
    Text(String),
    /// Raw response bytes, JSON-encoded.
    Bytes(Vec<u8>),
}

/// One remote-reported error, either request-level or field-level.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQlError {
    pub message: String,
    /// Field path for user errors (e.g. `title`), absent for request errors.
    pub field: Option<String>,
}

/// The single normalized result shape.
#[derive(Debug, Clone)]
pub struct GraphQlResult {
    pub data: Value,
    pub errors: Vec<GraphQlError>,
}

impl GraphQlResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn normalize_response(raw: RawResponse) -> Result<GraphQlResult, SyncError> {
    let value = match raw {
        RawResponse::Value(value) => value,
        RawResponse::Text(body) => serde_json::from_str(&body)
            .map_err(|e| SyncError::ResponseFormat(format!("body is not JSON: {e}")))?,
        RawResponse::Bytes(body) => serde_json::from_slice(&body)
            .map_err(|e| SyncError::ResponseFormat(format!("body is not JSON: {e}")))?,
    };

    let Some(obj) = value.as_object() else {
        return Err(SyncError::ResponseFormat(format!(
            "expected a JSON object, got {}",
            type_name(&value)
        )));
    };
    if !obj.contains_key("data") && !obj.contains_key("errors") {
        return Err(SyncError::ResponseFormat(
            "object exposes neither `data` nor `errors`".into(),
        ));
    }

    let errors = obj
        .get("errors")
        .and_then(|e| e.as_array())
        .map(|list| {
            list.iter()
                .map(|entry| GraphQlError {
                    message: entry
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("unknown error")
                        .to_string(),
                    field: None,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(GraphQlResult {
        data: obj.get("data").cloned().unwrap_or(Value::Null),
        errors,
    })
}

/// Collect `userErrors` reported under a mutation payload, e.g.
/// `data.productCreate.userErrors`.
pub fn user_errors(data: &Value, mutation: &str) -> Vec<GraphQlError> {
    data.get(mutation)
        .and_then(|payload| payload.get("userErrors"))
        .and_then(|errors| errors.as_array())
        .map(|list| {
            list.iter()
                .map(|entry| GraphQlError {
                    message: entry
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("unknown user error")
                        .to_string(),
                    field: entry.get("field").and_then(field_path),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn field_path(field: &Value) -> Option<String> {
    match field {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let joined: Vec<&str> = parts.iter().filter_map(|p| p.as_str()).collect();
            (!joined.is_empty()).then(|| joined.join("."))
        }
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_decoded_value_shape() {
        let result =
            normalize_response(RawResponse::Value(json!({"data": {"x": 1}}))).unwrap();
        assert!(result.is_ok());
        assert_eq!(result.data["x"], 1);
    }

    #[test]
    fn accepts_text_and_bytes_shapes() {
        let body = r#"{"data": null, "errors": [{"message": "throttled"}]}"#;
        for raw in [
            RawResponse::Text(body.to_string()),
            RawResponse::Bytes(body.as_bytes().to_vec()),
        ] {
            let result = normalize_response(raw).unwrap();
            assert_eq!(result.errors.len(), 1);
            assert_eq!(result.errors[0].message, "throttled");
        }
    }

    #[test]
    fn rejects_shapeless_objects() {
        let err = normalize_response(RawResponse::Value(json!({"ok": true}))).unwrap_err();
        assert!(matches!(err, SyncError::ResponseFormat(_)));

        let err = normalize_response(RawResponse::Value(json!([1, 2]))).unwrap_err();
        assert!(matches!(err, SyncError::ResponseFormat(_)));

        let err = normalize_response(RawResponse::Text("not json".into())).unwrap_err();
        assert!(matches!(err, SyncError::ResponseFormat(_)));
    }

    #[test]
    fn collects_field_level_user_errors() {
        let data = json!({
            "productCreate": {
                "product": null,
                "userErrors": [
                    {"field": ["product", "title"], "message": "Title can't be blank"}
                ]
            }
        });
        let errors = user_errors(&data, "productCreate");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field.as_deref(), Some("product.title"));
    }
}
