#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use crux_core::testing::AppTester;
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use crux_kv::{KeyValueOperation, KeyValueResult};
use shared::capabilities::{
    deleted_result, failed_result, io_error, other_error, read_result, written_result,
    NotificationRequest, NotifyOperation, NotifyOutput, PermissionState, AUTH_TOKEN_KEY,
};
use shared::form::{FormUpdate, LocationType, Parameter, SourceType};
use shared::{App, Effect, Event, Model, Request, Secret, ViewModel};

/// Drives the app, answering storage and notification requests from memory
/// and holding HTTP requests until the test answers them.
pub struct Driver {
    pub app: AppTester<App, Effect>,
    pub model: Model,
    pub store: HashMap<String, Vec<u8>>,
    pub fail_storage: bool,
    pub permission: PermissionState,
    pub http: Vec<Request<HttpRequest>>,
    pub alerts: Vec<NotificationRequest>,
}

impl Driver {
    pub fn new() -> Self {
        Self {
            app: AppTester::default(),
            model: Model::default(),
            store: HashMap::new(),
            fail_storage: false,
            permission: PermissionState::Authorized,
            http: Vec::new(),
            alerts: Vec::new(),
        }
    }

    pub fn view(&self) -> ViewModel {
        self.app.view(&self.model)
    }

    pub fn send(&mut self, event: Event) {
        let update = self.app.update(event, &mut self.model);
        self.settle(update.effects, update.events);
    }

    /// Feed events back in and answer effects until nothing is left but HTTP.
    fn settle(&mut self, effects: Vec<Effect>, events: Vec<Event>) {
        let mut effects: VecDeque<Effect> = effects.into();
        let mut events: VecDeque<Event> = events.into();
        loop {
            if let Some(event) = events.pop_front() {
                let update = self.app.update(event, &mut self.model);
                effects.extend(update.effects);
                events.extend(update.events);
                continue;
            }
            let Some(effect) = effects.pop_front() else {
                break;
            };
            let update = match effect {
                Effect::Render(_) => continue,
                Effect::Http(request) => {
                    self.http.push(request);
                    continue;
                }
                Effect::KeyValue(mut request) => {
                    let output = self.storage(&request.operation);
                    self.app.resolve(&mut request, output).expect("storage resolves")
                }
                Effect::Notify(mut request) => {
                    let output = match &request.operation {
                        NotifyOperation::RequestPermission => {
                            Ok(NotifyOutput::Permission(self.permission))
                        }
                        NotifyOperation::Present(notification) => {
                            self.alerts.push(notification.clone());
                            Ok(NotifyOutput::Presented)
                        }
                    };
                    self.app.resolve(&mut request, output).expect("notify resolves")
                }
            };
            effects.extend(update.effects);
            events.extend(update.events);
        }
    }

    fn storage(&mut self, operation: &KeyValueOperation) -> KeyValueResult {
        if self.fail_storage {
            return failed_result(io_error("disk unplugged"));
        }
        match operation {
            KeyValueOperation::Get { key } => read_result(self.store.get(key).cloned()),
            KeyValueOperation::Set { key, value } => {
                written_result(self.store.insert(key.clone(), value.clone()))
            }
            KeyValueOperation::Delete { key } => deleted_result(self.store.remove(key)),
            _ => failed_result(other_error("unsupported")),
        }
    }

    /// The oldest outstanding HTTP request.
    pub fn outstanding(&self) -> &HttpRequest {
        &self
            .http
            .first()
            .expect("no HTTP request outstanding")
            .operation
    }

    fn resolve_http(&mut self, output: HttpResult) {
        assert!(!self.http.is_empty(), "no HTTP request outstanding");
        let mut request = self.http.remove(0);
        let update = self.app.resolve(&mut request, output).expect("http resolves");
        self.settle(update.effects, update.events);
    }

    pub fn answer(&mut self, status: u16, body: serde_json::Value) {
        self.resolve_http(HttpResult::Ok(HttpResponse {
            status,
            headers: vec![],
            body: serde_json::to_vec(&body).unwrap(),
        }));
    }

    pub fn fail(&mut self, error: crux_http::HttpError) {
        self.resolve_http(HttpResult::Err(error));
    }

    pub fn token(&self) -> Option<&[u8]> {
        self.store.get(AUTH_TOKEN_KEY).map(Vec::as_slice)
    }

    pub fn enter_credentials(&mut self, username: &str, password: &str) {
        self.send(Event::UsernameChanged(username.into()));
        self.send(Event::PasswordChanged(Secret::new(password)));
    }

    pub fn sign_in(&mut self) {
        self.send(Event::AppStarted);
        self.enter_credentials("alice", "health123");
        self.send(Event::LoginSubmitted);
        self.answer(200, serde_json::json!({"access_token": "tok1", "message": "ok"}));
        self.send(Event::NoticeDismissed);
    }

    pub fn set(&mut self, field: &str, value: &str) {
        let update = FormUpdate::from_name(field, value).expect("known field");
        self.send(Event::FieldChanged(update));
    }

    /// Every required field filled with an in-range value; pH is 7.2.
    pub fn fill_form(&mut self) {
        let location = FormUpdate::Location(Some(LocationType::UrbanArea));
        let source = FormUpdate::SourceType(Some(SourceType::TreatedWater));
        self.send(Event::FieldChanged(location));
        self.send(Event::FieldChanged(source));
        for parameter in Parameter::ALL {
            let value = if parameter == Parameter::Ph {
                7.2
            } else {
                parameter.range().optimal_min
            };
            self.send(Event::FieldChanged(FormUpdate::slider(parameter, value)));
        }
    }
}

/// Path component of the request URL.
pub fn path(request: &HttpRequest) -> String {
    url::Url::parse(&request.url)
        .map(|u| u.path().to_string())
        .unwrap_or_default()
}

pub fn header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
    request
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

pub fn json_body(request: &HttpRequest) -> serde_json::Value {
    serde_json::from_slice(&request.body).expect("JSON body")
}
