use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::capabilities::{
    NotificationRequest, NotifyError, NotifyOperation, NotifyOutput, NotifyResult,
    PermissionState,
};

/// Where local notifications end up on this platform.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn request_permission(&self) -> Result<PermissionState, NotifyError>;
    async fn present(&self, notification: &NotificationRequest) -> Result<(), NotifyError>;
}

pub async fn execute(sink: &dyn NotificationSink, operation: &NotifyOperation) -> NotifyResult {
    match operation {
        NotifyOperation::RequestPermission => {
            sink.request_permission().await.map(NotifyOutput::Permission)
        }
        NotifyOperation::Present(notification) => {
            notification.validate()?;
            sink.present(notification).await.map(|()| NotifyOutput::Presented)
        }
    }
}

/// Desktop fallback: notifications are written to the log.
///
/// Permission is granted on first request and can be revoked, after which
/// presenting fails with [`NotifyError::PermissionDenied`].
pub struct LogNotifier {
    permission: AtomicU8,
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self {
            permission: AtomicU8::new(encode(PermissionState::NotDetermined)),
        }
    }
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_permission(&self, state: PermissionState) {
        self.permission.store(encode(state), Ordering::SeqCst);
    }

    pub fn permission(&self) -> PermissionState {
        decode(self.permission.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn request_permission(&self) -> Result<PermissionState, NotifyError> {
        if self.permission() == PermissionState::NotDetermined {
            self.set_permission(PermissionState::Authorized);
        }
        Ok(self.permission())
    }

    async fn present(&self, notification: &NotificationRequest) -> Result<(), NotifyError> {
        if !self.permission().is_authorized() {
            warn!(title = %notification.title, "notification suppressed, permission not granted");
            return Err(NotifyError::PermissionDenied);
        }
        info!(
            title = %notification.title,
            body = %notification.body,
            data = ?notification.data,
            "notification"
        );
        Ok(())
    }
}

const fn encode(state: PermissionState) -> u8 {
    match state {
        PermissionState::NotDetermined => 0,
        PermissionState::Denied => 1,
        PermissionState::Authorized => 2,
        PermissionState::Provisional => 3,
    }
}

const fn decode(raw: u8) -> PermissionState {
    match raw {
        1 => PermissionState::Denied,
        2 => PermissionState::Authorized,
        3 => PermissionState::Provisional,
        _ => PermissionState::NotDetermined,
    }
}
