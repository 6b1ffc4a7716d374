//! Payload validation helpers.

use serde::de::DeserializeOwned;
use serde_json::Value;

use chatline_core::error::{AppError, AppResult};

/// Maximum message body length in characters.
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Maximum group name length in characters.
pub const MAX_GROUP_NAME_CHARS: usize = 100;

/// Maximum members in one group creation request.
pub const MAX_GROUP_MEMBERS: usize = 256;

/// Validates the raw inbound text before decoding.
pub fn validate_raw(raw: &str, max_size: usize) -> AppResult<()> {
    if raw.len() > max_size {
        return Err(AppError::validation(format!(
            "Message exceeds maximum size of {max_size} bytes"
        )));
    }

    if raw.trim().is_empty() {
        return Err(AppError::validation("Empty message"));
    }

    Ok(())
}

/// Decode a command payload into its typed form.
///
/// A `null` payload is treated as an empty object so commands whose
/// fields are all optional can be sent without `data`.
pub fn parse_payload<T: DeserializeOwned>(data: &Value) -> AppResult<T> {
    let data = if data.is_null() {
        Value::Object(Default::default())
    } else {
        data.clone()
    };
    serde_json::from_value(data).map_err(|e| AppError::validation(format!("Invalid payload: {e}")))
}

/// Reject blank text and text longer than `max_chars`.
pub fn require_text(field: &str, value: &str, max_chars: usize) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if value.chars().count() > max_chars {
        return Err(AppError::validation(format!(
            "{field} exceeds {max_chars} characters"
        )));
    }
    Ok(())
}
