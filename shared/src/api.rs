//! Wire types for the remote authentication and prediction service.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::Secret;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub username: String,
    pub password: Secret,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    pub access_token: Secret,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionRequest {
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Source_Type")]
    pub source_type: String,
    #[serde(rename = "NH4")]
    pub nh4: f64,
    #[serde(rename = "BSK5")]
    pub bsk5: f64,
    #[serde(rename = "Suspended")]
    pub suspended: f64,
    #[serde(rename = "O2")]
    pub o2: f64,
    #[serde(rename = "NO3")]
    pub no3: f64,
    #[serde(rename = "NO2")]
    pub no2: f64,
    #[serde(rename = "SO4")]
    pub so4: f64,
    #[serde(rename = "PO4")]
    pub po4: f64,
    #[serde(rename = "CL")]
    pub cl: f64,
    #[serde(rename = "pH")]
    pub ph: f64,
    #[serde(rename = "Turbidity")]
    pub turbidity: f64,
    #[serde(rename = "Temperature")]
    pub temperature: f64,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    pub month: u32,
    #[serde(rename = "Day")]
    pub day: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResultError {
    #[error("prediction must be 0 or 1, got {0}")]
    InvalidPrediction(i64),

    #[error("confidence must be within [0, 1]")]
    InvalidConfidence,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionResult {
    pub prediction: i64,
    pub risk_level: String,
    pub message: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl PredictionResult {
    #[must_use]
    pub fn is_high_risk(&self) -> bool {
        self.prediction == 1
    }

    pub fn validate(&self) -> Result<(), ResultError> {
        if !matches!(self.prediction, 0 | 1) {
            return Err(ResultError::InvalidPrediction(self.prediction));
        }
        if let Some(c) = self.confidence {
            if !(c.is_finite() && (0.0..=1.0).contains(&c)) {
                return Err(ResultError::InvalidConfidence);
            }
        }
        Ok(())
    }
}

/// Error body. FastAPI reports validation failures with a structured
/// `detail`, so anything that is not a string is rendered as JSON text.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    detail: serde_json::Value,
}

impl ApiErrorBody {
    #[must_use]
    pub fn detail(&self) -> Option<String> {
        match &self.detail {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    #[must_use]
    pub fn parse_detail(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<Self>(body)
            .ok()
            .and_then(|b| b.detail())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub source_type: String,
    pub prediction: i64,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub risk_level: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub predictions: Vec<HistoryRecord>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NotifyRequest {
    pub location: String,
    pub risk_level: String,
    pub message: String,
}
