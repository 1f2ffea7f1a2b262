#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod alert;
pub mod api;
pub mod app;
pub mod capabilities;
pub mod config;
pub mod event;
pub mod form;
pub mod logging;
pub mod model;
pub mod session;
#[cfg(all(feature = "native-shell", not(target_arch = "wasm32")))]
pub mod shell;
pub mod validate;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::capabilities::{HttpError, KeyValueError, NotifyError};
use crate::validate::{CoercionError, MissingFields, SubmissionError};

pub use app::App;
pub use capabilities::{Capabilities, Effect, Request};

/// The headless core a shell drives.
pub type Core = crux_core::Core<Effect, App>;
pub use event::{Event, Secret};
pub use model::{Model, Notice, Screen, ViewModel, ViewState};

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const PREDICT_PATH: &str = "/api/predict";
pub const HISTORY_PATH: &str = "/api/predictions/history";
pub const NOTIFY_PATH: &str = "/api/notify";

pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(30);
pub const PREDICT_TIMEOUT: Duration = Duration::from_secs(30);
pub const HISTORY_TIMEOUT: Duration = Duration::from_secs(15);
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

pub const MAX_HISTORY_ENTRIES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Coercion,
    Authentication,
    SessionExpired,
    Prediction,
    Network,
    Timeout,
    Storage,
    Serialization,
    Notification,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Coercion => "COERCION_ERROR",
            Self::Authentication => "AUTH_ERROR",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::Prediction => "PREDICTION_ERROR",
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Storage => "STORAGE_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Notification => "NOTIFICATION_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Network and timeout failures are the transport class.
    #[must_use]
    pub const fn is_transport(self) -> bool {
        matches!(self, Self::Network | Self::Timeout)
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Storage)
    }

    /// Heading for the blocking notice that shows this error.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Validation => "Missing Information",
            Self::Coercion => "Invalid Input",
            Self::Authentication => "Login Failed",
            Self::SessionExpired => "Session Expired",
            Self::Prediction => "Prediction Failed",
            Self::Network | Self::Timeout => "Connection Error",
            Self::Storage => "Storage Error",
            Self::Serialization | Self::Notification | Self::Internal => "Error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: BTreeMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            internal_message: None,
            context: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Network error. Please check your connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::SessionExpired => "Your session has expired. Please sign in again.".into(),
            ErrorKind::Storage => "Unable to access secure storage on this device.".into(),
            ErrorKind::Serialization | ErrorKind::Internal => {
                "An unexpected error occurred. Please try again.".into()
            }
            ErrorKind::Validation
            | ErrorKind::Coercion
            | ErrorKind::Authentication
            | ErrorKind::Prediction
            | ErrorKind::Notification => self.message.clone(),
        }
    }

    /// A non-2xx response. The server's `detail` is shown verbatim when present.
    #[must_use]
    pub fn from_http_status(kind: ErrorKind, status: u16, body: Option<&[u8]>) -> Self {
        let kind = match status {
            408 | 504 => ErrorKind::Timeout,
            _ => kind,
        };

        let message = body
            .and_then(api::ApiErrorBody::parse_detail)
            .unwrap_or_else(|| format!("HTTP error: {status}"));

        Self::new(kind, message).with_context("http_status", status.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<HttpError> for AppError {
    fn from(error: HttpError) -> Self {
        let kind = match &error {
            HttpError::Timeout => ErrorKind::Timeout,
            e if e.is_transport() => ErrorKind::Network,
            _ => ErrorKind::Internal,
        };
        Self::new(kind, "Request failed").with_internal(error.to_string())
    }
}

impl From<KeyValueError> for AppError {
    fn from(error: KeyValueError) -> Self {
        Self::new(ErrorKind::Storage, "Storage operation failed").with_internal(error.to_string())
    }
}

impl From<NotifyError> for AppError {
    fn from(error: NotifyError) -> Self {
        Self::new(ErrorKind::Notification, error.to_string())
    }
}

impl From<MissingFields> for AppError {
    fn from(error: MissingFields) -> Self {
        Self::new(ErrorKind::Validation, error.to_string())
    }
}

impl From<CoercionError> for AppError {
    fn from(error: CoercionError) -> Self {
        Self::new(ErrorKind::Coercion, error.to_string())
    }
}

impl From<SubmissionError> for AppError {
    fn from(error: SubmissionError) -> Self {
        match error {
            SubmissionError::Missing(e) => e.into(),
            SubmissionError::Coercion(e) => e.into(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_uses_detail_verbatim() {
        let err = AppError::from_http_status(
            ErrorKind::Authentication,
            401,
            Some(br#"{"detail":"Invalid credentials"}"#),
        );
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert_eq!(err.user_facing_message(), "Invalid credentials");
        assert_eq!(err.context.get("http_status").map(String::as_str), Some("401"));
    }

    #[test]
    fn http_status_falls_back_to_code() {
        let err = AppError::from_http_status(ErrorKind::Prediction, 502, Some(b"Bad Gateway"));
        assert_eq!(err.message, "HTTP error: 502");
        let err = AppError::from_http_status(ErrorKind::Prediction, 500, None);
        assert_eq!(err.message, "HTTP error: 500");
    }

    #[test]
    fn gateway_timeout_is_transport() {
        let err = AppError::from_http_status(ErrorKind::Prediction, 504, None);
        assert!(err.kind.is_transport());
    }

    #[test]
    fn transport_errors_get_generic_retry_text() {
        let err = AppError::from(HttpError::Connection {
            message: "connection refused".into(),
        });
        assert_eq!(err.kind, ErrorKind::Network);
        assert!(err.user_facing_message().contains("try again"));
        assert!(!err.user_facing_message().contains("refused"));

        let err = AppError::from(HttpError::Timeout);
        assert_eq!(err.kind, ErrorKind::Timeout);

        let err = AppError::from(HttpError::Request {
            reason: "body too large".into(),
        });
        assert_eq!(err.kind, ErrorKind::Internal);
    }

    #[test]
    fn storage_errors_map_to_storage_kind() {
        let err = AppError::from(KeyValueError::Io {
            message: "disk full".into(),
        });
        assert_eq!(err.kind, ErrorKind::Storage);
        assert!(err.is_retryable());
        assert!(err.internal_message.unwrap().contains("disk full"));
    }

    #[test]
    fn submission_errors_map_to_local_kinds() {
        let err = AppError::from(SubmissionError::Missing(MissingFields(vec!["pH"])));
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.user_facing_message(), "Please fill in all required fields: pH");

        let err = AppError::from(SubmissionError::Coercion(CoercionError::NotANumber {
            field: "O2",
            text: "x".into(),
        }));
        assert_eq!(err.kind, ErrorKind::Coercion);
    }

    #[test]
    fn display_includes_code_and_internal() {
        let err = AppError::new(ErrorKind::Storage, "failed").with_internal("disk full");
        assert_eq!(err.to_string(), "[STORAGE_ERROR] failed (internal: disk full)");
    }
}
