use crux_kv::error::KeyValueError;
use crux_kv::value::Value;
use crux_kv::{KeyValue, KeyValueResponse, KeyValueResult};

use crate::event::Event;

pub type KvCapability = KeyValue<Event>;

pub const MAX_KEY_LENGTH: usize = 512;
pub const MAX_VALUE_SIZE: usize = 64 * 1024;

/// Storage key under which the bearer credential lives.
pub const AUTH_TOKEN_KEY: &str = "authToken";

/// What the core sees for any storage operation: the value read, or the
/// value replaced or removed.
pub type KvResult = Result<Option<Vec<u8>>, KeyValueError>;

#[must_use]
pub fn value_from(bytes: Option<Vec<u8>>) -> Value {
    bytes.map_or(Value::None, Value::Bytes)
}

#[must_use]
pub fn bytes_from(value: Value) -> Option<Vec<u8>> {
    match value {
        Value::None => None,
        Value::Bytes(bytes) => Some(bytes),
    }
}

// --- Shell-side answers ---

#[must_use]
pub fn read_result(value: Option<Vec<u8>>) -> KeyValueResult {
    KeyValueResult::Ok {
        response: KeyValueResponse::Get {
            value: value_from(value),
        },
    }
}

#[must_use]
pub fn written_result(previous: Option<Vec<u8>>) -> KeyValueResult {
    KeyValueResult::Ok {
        response: KeyValueResponse::Set {
            previous: value_from(previous),
        },
    }
}

#[must_use]
pub fn deleted_result(previous: Option<Vec<u8>>) -> KeyValueResult {
    KeyValueResult::Ok {
        response: KeyValueResponse::Delete {
            previous: value_from(previous),
        },
    }
}

#[must_use]
pub fn failed_result(error: KeyValueError) -> KeyValueResult {
    KeyValueResult::Err { error }
}

pub fn io_error(message: impl Into<String>) -> KeyValueError {
    KeyValueError::Io {
        message: message.into(),
    }
}

pub fn other_error(message: impl Into<String>) -> KeyValueError {
    KeyValueError::Other {
        message: message.into(),
    }
}

/// Keys must be non-blank, bounded and free of control characters.
pub fn validate_key(key: &str) -> Result<(), KeyValueError> {
    if key.trim().is_empty() {
        return Err(other_error("key cannot be empty"));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(other_error(format!(
            "key exceeds maximum length of {MAX_KEY_LENGTH} bytes"
        )));
    }
    if key.chars().any(char::is_control) {
        return Err(other_error("key contains control characters"));
    }
    Ok(())
}
