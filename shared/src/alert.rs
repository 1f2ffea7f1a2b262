//! Alert Dispatcher.

use crate::api::{NotifyRequest, PredictionResult};
use crate::capabilities::NotificationRequest;
use crate::form::LocationType;

pub const ALERT_TITLE: &str = "Water Quality Alert";
pub const RISK_LEVEL_KEY: &str = "riskLevel";

/// The local notification for a high-risk result; `None` otherwise.
#[must_use]
pub fn maybe_alert(result: &PredictionResult) -> Option<NotificationRequest> {
    result.is_high_risk().then(|| {
        NotificationRequest::new(ALERT_TITLE, result.message.clone())
            .with_data(RISK_LEVEL_KEY, result.risk_level.clone())
    })
}

/// The server-side record that accompanies a fired alert.
#[must_use]
pub fn alert_record(result: &PredictionResult, location: Option<LocationType>) -> NotifyRequest {
    NotifyRequest {
        location: location.map(|l| l.as_str().to_string()).unwrap_or_default(),
        risk_level: result.risk_level.clone(),
        message: result.message.clone(),
    }
}
