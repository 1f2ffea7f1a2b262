use serde::{Deserialize, Serialize};

use crate::api::{HistoryRecord, PredictionResult};
use crate::capabilities::{BackendUrl, PermissionState};
use crate::event::Secret;
use crate::form::{DateField, LocationType, Parameter, SourceType, SubmissionForm};
use crate::session::Session;
use crate::{AppError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    #[default]
    Login,
    Form,
    Result,
}

impl Screen {
    /// Screens behind the session check.
    #[must_use]
    pub const fn requires_session(self) -> bool {
        matches!(self, Self::Form | Self::Result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
}

/// A blocking message the user must acknowledge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
    pub code: Option<String>,
}

impl Notice {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            title: title.into(),
            message: message.into(),
            code: None,
        }
    }

    #[must_use]
    pub fn from_error(error: &AppError) -> Self {
        Self {
            kind: NoticeKind::Error,
            title: error.kind.title().to_string(),
            message: error.user_facing_message(),
            code: Some(error.code().to_string()),
        }
    }

    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        let code = self.code.as_deref()?;
        [
            ErrorKind::Validation,
            ErrorKind::Coercion,
            ErrorKind::Authentication,
            ErrorKind::SessionExpired,
            ErrorKind::Prediction,
            ErrorKind::Network,
            ErrorKind::Timeout,
            ErrorKind::Storage,
            ErrorKind::Serialization,
            ErrorKind::Notification,
            ErrorKind::Internal,
        ]
        .into_iter()
        .find(|k| k.code() == code)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: Secret,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    pub backend: BackendUrl,
    pub screen: Screen,
    pub is_restoring: bool,
    pub session: Session,
    pub login: LoginForm,
    pub form: SubmissionForm,
    pub result: Option<PredictionResult>,
    pub history: Vec<HistoryRecord>,
    pub is_loading: bool,
    pub is_submitting: bool,
    pub is_loading_history: bool,
    pub notice: Option<Notice>,
    pub notification_permission: PermissionState,
}

impl Model {
    pub fn show_error(&mut self, error: &AppError) {
        self.notice = Some(Notice::from_error(error));
    }

    pub fn show_success(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.notice = Some(Notice::success(title, message));
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.is_loading || self.is_submitting || self.is_loading_history
    }
}

// --- View model ---

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ParameterView {
    pub name: String,
    pub text: String,
    pub display: Option<String>,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub optimal_min: f64,
    pub optimal_max: f64,
    pub is_optimal: bool,
    pub in_range: Option<bool>,
}

impl ParameterView {
    #[must_use]
    pub fn new(form: &SubmissionForm, parameter: Parameter) -> Self {
        let range = parameter.range();
        Self {
            name: parameter.name().to_string(),
            text: form.measurement(parameter).to_string(),
            display: form.display_value(parameter),
            min: range.min,
            max: range.max,
            step: range.step,
            optimal_min: range.optimal_min,
            optimal_max: range.optimal_max,
            is_optimal: form.is_optimal(parameter),
            in_range: form.value(parameter).map(|v| range.contains(v)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FormView {
    pub location: Option<String>,
    pub source_type: Option<String>,
    pub location_options: Vec<String>,
    pub source_type_options: Vec<String>,
    pub parameters: Vec<ParameterView>,
    pub year: String,
    pub month: String,
    pub day: String,
}

impl FormView {
    #[must_use]
    pub fn new(form: &SubmissionForm) -> Self {
        Self {
            location: form.location().map(|l| l.as_str().to_string()),
            source_type: form.source_type().map(|s| s.as_str().to_string()),
            location_options: LocationType::ALL
                .iter()
                .map(|l| l.as_str().to_string())
                .collect(),
            source_type_options: SourceType::ALL
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
            parameters: Parameter::ALL
                .into_iter()
                .map(|p| ParameterView::new(form, p))
                .collect(),
            year: form.date(DateField::Year).to_string(),
            month: form.date(DateField::Month).to_string(),
            day: form.date(DateField::Day).to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ResultView {
    pub prediction: i64,
    pub is_high_risk: bool,
    pub risk_level: String,
    pub message: String,
    pub confidence_percent: Option<String>,
}

impl From<&PredictionResult> for ResultView {
    fn from(result: &PredictionResult) -> Self {
        Self {
            prediction: result.prediction,
            is_high_risk: result.is_high_risk(),
            risk_level: result.risk_level.clone(),
            message: result.message.clone(),
            confidence_percent: result.confidence.map(|c| format!("{:.1}%", c * 100.0)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum ViewState {
    Loading,
    Login {
        username: String,
        has_password: bool,
        is_loading: bool,
    },
    Form {
        form: FormView,
        is_submitting: bool,
    },
    Result {
        result: ResultView,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub screen: Screen,
    pub state: ViewState,
    pub notice: Option<Notice>,
    pub is_authenticated: bool,
    pub history: Vec<HistoryRecord>,
    pub is_loading_history: bool,
    pub notification_permission: PermissionState,
}
