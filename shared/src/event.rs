use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

use crate::capabilities::{HttpResult, KvResult, NotifyResult};
use crate::form::FormUpdate;

// --- Secret wrapper: redacts Debug, zeroizes on Drop ---

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

// --- Event enum: user intents first, capability responses boxed ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Lifecycle
    /// Sent by the shell before `AppStarted`; carries the backend root URL.
    BackendConfigured(String),
    AppStarted,
    SessionLoaded(KvResult),
    NotificationPermission(NotifyResult),

    // Login screen
    UsernameChanged(String),
    PasswordChanged(Secret),
    LoginSubmitted,

    // Form and result screens
    FieldChanged(FormUpdate),
    SubmitPressed,
    NewAnalysisPressed,
    HistoryRequested,
    LogoutPressed,
    NoticeDismissed,

    // Capability responses
    LoginResponse(Box<HttpResult>),
    TokenSaved {
        result: Box<KvResult>,
        message: String,
    },
    PredictResponse(Box<HttpResult>),
    HistoryResponse(Box<HttpResult>),
    AlertPresented(NotifyResult),
    AlertRecorded(Box<HttpResult>),
    TokenCleared(KvResult),
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BackendConfigured(_) => "backend_configured",
            Self::AppStarted => "app_started",
            Self::SessionLoaded(_) => "session_loaded",
            Self::NotificationPermission(_) => "notification_permission",
            Self::UsernameChanged(_) => "username_changed",
            Self::PasswordChanged(_) => "password_changed",
            Self::LoginSubmitted => "login_submitted",
            Self::FieldChanged(_) => "field_changed",
            Self::SubmitPressed => "submit_pressed",
            Self::NewAnalysisPressed => "new_analysis_pressed",
            Self::HistoryRequested => "history_requested",
            Self::LogoutPressed => "logout_pressed",
            Self::NoticeDismissed => "notice_dismissed",
            Self::LoginResponse(_) => "login_response",
            Self::TokenSaved { .. } => "token_saved",
            Self::PredictResponse(_) => "predict_response",
            Self::HistoryResponse(_) => "history_response",
            Self::AlertPresented(_) => "alert_presented",
            Self::AlertRecorded(_) => "alert_recorded",
            Self::TokenCleared(_) => "token_cleared",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::UsernameChanged(_)
                | Self::PasswordChanged(_)
                | Self::LoginSubmitted
                | Self::FieldChanged(_)
                | Self::SubmitPressed
                | Self::NewAnalysisPressed
                | Self::HistoryRequested
                | Self::LogoutPressed
                | Self::NoticeDismissed
        )
    }
}
