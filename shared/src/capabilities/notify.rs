use std::collections::BTreeMap;

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_TITLE_LENGTH: usize = 128;
pub const MAX_BODY_LENGTH: usize = 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PermissionState {
    #[default]
    NotDetermined,
    Denied,
    Authorized,
    Provisional,
}

impl PermissionState {
    #[must_use]
    pub const fn is_authorized(self) -> bool {
        matches!(self, Self::Authorized | Self::Provisional)
    }

    #[must_use]
    pub const fn is_denied(self) -> bool {
        matches!(self, Self::Denied)
    }
}

/// A local notification, shown immediately.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl NotificationRequest {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> Result<(), NotifyError> {
        if self.title.trim().is_empty() {
            return Err(NotifyError::InvalidNotification {
                reason: "title cannot be empty".to_string(),
            });
        }
        if self.title.chars().count() > MAX_TITLE_LENGTH {
            return Err(NotifyError::InvalidNotification {
                reason: format!("title exceeds {MAX_TITLE_LENGTH} characters"),
            });
        }
        if self.body.chars().count() > MAX_BODY_LENGTH {
            return Err(NotifyError::InvalidNotification {
                reason: format!("body exceeds {MAX_BODY_LENGTH} characters"),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", content = "data")]
pub enum NotifyOperation {
    RequestPermission,
    Present(NotificationRequest),
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notifications not available on this platform")]
    NotAvailable,

    #[error("permission denied by user")]
    PermissionDenied,

    #[error("invalid notification: {reason}")]
    InvalidNotification { reason: String },

    #[error("delivery failed: {message}")]
    DeliveryFailed { message: String },

    #[error("operation timed out")]
    Timeout,
}

impl NotifyError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::DeliveryFailed { .. } | Self::Timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum NotifyOutput {
    Permission(PermissionState),
    Presented,
}

impl NotifyOutput {
    #[must_use]
    pub const fn permission(&self) -> Option<PermissionState> {
        match self {
            Self::Permission(state) => Some(*state),
            Self::Presented => None,
        }
    }
}

pub type NotifyResult = Result<NotifyOutput, NotifyError>;

impl Operation for NotifyOperation {
    type Output = NotifyResult;
}

/// Local notifications: asking for permission and showing an alert.
pub struct Notify<Ev> {
    context: CapabilityContext<NotifyOperation, Ev>,
}

impl<Ev> Clone for Notify<Ev> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<Ev> Capability<Ev> for Notify<Ev> {
    type Operation = NotifyOperation;
    type MappedSelf<MappedEv> = Notify<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Notify::new(self.context.map_event(f))
    }
}

impl<Ev> Notify<Ev>
where
    Ev: Send + 'static,
{
    pub fn new(context: CapabilityContext<NotifyOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn request_permission<F>(&self, make_event: F)
    where
        F: FnOnce(NotifyResult) -> Ev + Send + 'static,
    {
        self.request(NotifyOperation::RequestPermission, make_event);
    }

    pub fn present<F>(&self, notification: NotificationRequest, make_event: F)
    where
        F: FnOnce(NotifyResult) -> Ev + Send + 'static,
    {
        self.request(NotifyOperation::Present(notification), make_event);
    }

    fn request<F>(&self, operation: NotifyOperation, make_event: F)
    where
        F: FnOnce(NotifyResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx.request_from_shell(operation).await;
            ctx.update_app(make_event(result));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_state_default_is_undetermined() {
        assert_eq!(PermissionState::default(), PermissionState::NotDetermined);
        assert!(!PermissionState::NotDetermined.is_authorized());
        assert!(PermissionState::Provisional.is_authorized());
        assert!(PermissionState::Denied.is_denied());
    }

    #[test]
    fn test_notification_validation() {
        assert!(NotificationRequest::new("Alert", "body").validate().is_ok());
        assert!(NotificationRequest::new("  ", "body").validate().is_err());
        assert!(NotificationRequest::new("Alert", "x".repeat(MAX_BODY_LENGTH + 1))
            .validate()
            .is_err());
    }

    #[test]
    fn test_operation_serialization_is_tagged() {
        let op = NotifyOperation::Present(
            NotificationRequest::new("Alert", "body").with_data("riskLevel", "HIGH"),
        );
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "Present");
        assert_eq!(json["data"]["data"]["riskLevel"], "HIGH");
    }

    #[test]
    fn test_output_permission_accessor() {
        assert_eq!(
            NotifyOutput::Permission(PermissionState::Denied).permission(),
            Some(PermissionState::Denied)
        );
        assert_eq!(NotifyOutput::Presented.permission(), None);
    }
}
