//! Capabilities: the only way the core talks to the outside world.

mod http;
mod kv;
mod notify;

pub use self::http::{
    timeout_for, ApiRequest, BackendUrl, HttpCapability, HttpError, HttpMethod, HttpOutput,
    HttpResponse, HttpResult, DEFAULT_BACKEND_URL, MAX_REQUEST_BODY_SIZE, MAX_RESPONSE_BODY_SIZE,
    MAX_TIMEOUT_MS, REQUEST_ID_HEADER,
};
pub use self::kv::{
    bytes_from, deleted_result, failed_result, io_error, other_error, read_result,
    validate_key, value_from, written_result, KvCapability, KvResult, AUTH_TOKEN_KEY,
    MAX_KEY_LENGTH, MAX_VALUE_SIZE,
};
pub use self::notify::{
    NotificationRequest, Notify, NotifyError, NotifyOperation, NotifyOutput, NotifyResult,
    PermissionState,
};

// Crux's built-in Render is all the view needs.
pub use crux_core::render::Render;
pub use crux_core::Request;
pub use crux_http::Http;
pub use crux_kv::error::KeyValueError;
pub use crux_kv::KeyValue;

#[allow(unused_imports)]
use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub key_value: KeyValue<Event>,
    pub notify: Notify<Event>,
    pub render: Render<Event>,
}

impl Effect {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::KeyValue(_) => "key_value",
            Self::Notify(_) => "notify",
            Self::Render(_) => "render",
        }
    }
}
