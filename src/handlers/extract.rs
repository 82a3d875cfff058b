//! Request body extraction with field-level validation errors

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ApiError;

/// JSON body that has been deserialized and validated.
///
/// Rejections are reported through [`ApiError`] so clients always get the
/// same error envelope; a missing field is reported against that field.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection)?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::JsonDataError(e) => {
            let text = e.body_text();
            match missing_field(&text) {
                Some(field) => ApiError::field(field, "This field is required."),
                None => ApiError::ValidationError {
                    message: "Request validation failed".to_string(),
                    details: Some(serde_json::json!({ "non_field_errors": [data_error_detail(&text)] })),
                },
            }
        }
        JsonRejection::JsonSyntaxError(_) => ApiError::validation("Malformed JSON body"),
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::validation("Expected request with `Content-Type: application/json`")
        }
        other => ApiError::validation(other.body_text()),
    }
}

/// Name of the field in a serde "missing field `x`" message
fn missing_field(text: &str) -> Option<&str> {
    let rest = &text[text.find("missing field `")? + "missing field `".len()..];
    let end = rest.find('`')?;
    Some(&rest[..end])
}

/// Serde's message without axum's prefix
fn data_error_detail(text: &str) -> &str {
    text.split_once(": ").map(|(_, detail)| detail).unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_is_extracted() {
        let text = "Failed to deserialize the JSON body into the target type: missing field `booking_date` at line 1 column 20";
        assert_eq!(missing_field(text), Some("booking_date"));
    }

    #[test]
    fn test_other_data_errors_have_no_field() {
        let text = "Failed to deserialize the JSON body into the target type: invalid type: string \"x\", expected i64 at line 1 column 14";
        assert_eq!(missing_field(text), None);
        assert!(data_error_detail(text).starts_with("invalid type"));
    }
}
