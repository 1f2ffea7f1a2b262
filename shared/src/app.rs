//! Screen Controller: the app's state machine over [`Model`].

use tracing::{debug, error, info, warn};

use crate::alert;
use crate::api::{HistoryResponse, LoginRequest, LoginResponse, PredictionResult};
use crate::capabilities::{
    ApiRequest, BackendUrl, Capabilities, HttpResponse, HttpResult, KvResult, NotifyResult,
};
use crate::event::Event;
use crate::form::{self, SubmissionForm};
use crate::model::{FormView, Model, ResultView, Screen, ViewModel, ViewState};
use crate::session::{self, SessionStore};
use crate::validate;
use crate::{
    AppError, ErrorKind, HISTORY_PATH, LOGIN_PATH, MAX_HISTORY_ENTRIES, NOTIFY_PATH, PREDICT_PATH,
};

#[derive(Default)]
pub struct App;

impl App {
    fn fresh_form() -> SubmissionForm {
        SubmissionForm::new(form::today())
    }

    fn ignore(event: &'static str, model: &Model) {
        warn!(event, screen = ?model.screen, "ignoring event in current state");
    }

    /// Drop every trace of the signed-in user.
    fn end_session(model: &mut Model) {
        model.session.clear();
        model.login = Default::default();
        model.form = Self::fresh_form();
        model.result = None;
        model.history.clear();
        model.is_loading = false;
        model.is_submitting = false;
        model.is_loading_history = false;
        model.screen = Screen::Login;
    }

    fn clear_stored_token(caps: &Capabilities) {
        SessionStore::new(&caps.key_value).clear(Event::TokenCleared);
    }

    fn expire_session(model: &mut Model, caps: &Capabilities) {
        warn!("session rejected by server, signing out");
        Self::end_session(model);
        model.show_error(&AppError::new(
            ErrorKind::SessionExpired,
            "Your session has expired. Please sign in again.",
        ));
        Self::clear_stored_token(caps);
    }

    fn login(model: &mut Model, caps: &Capabilities) {
        if let Err(missing) = validate::validate_login(&model.login.username, &model.login.password)
        {
            debug!(fields = ?missing.names(), "login blocked locally");
            model.show_error(&missing.into());
            return;
        }

        let body = LoginRequest {
            username: model.login.username.trim().to_string(),
            password: model.login.password.clone(),
        };

        match ApiRequest::post(&model.backend, LOGIN_PATH).with_json(&body) {
            Ok(request) => {
                info!(request_id = request.request_id(), "submitting login");
                model.is_loading = true;
                request.send(&caps.http, |result| Event::LoginResponse(Box::new(result)));
            }
            Err(e) => {
                error!(error = %e, "failed to build login request");
                model.show_error(&e.into());
            }
        }
    }

    fn login_response(model: &mut Model, caps: &Capabilities, result: HttpResult) {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "login transport failure");
                model.is_loading = false;
                model.show_error(&e.into());
                return;
            }
        };

        if !response.is_success() {
            info!(status = response.status(), "login rejected");
            model.is_loading = false;
            model.show_error(&AppError::from_http_status(
                ErrorKind::Authentication,
                response.status(),
                Some(response.body()),
            ));
            return;
        }

        let body = match response.json::<LoginResponse>() {
            Ok(body) if !body.access_token.is_blank() => body,
            Ok(_) => {
                model.is_loading = false;
                model.show_error(&AppError::new(
                    ErrorKind::Authentication,
                    "Login response did not include an access token",
                ));
                return;
            }
            Err(e) => {
                model.is_loading = false;
                model.show_error(
                    &AppError::new(ErrorKind::Serialization, "Malformed login response")
                        .with_internal(e.to_string()),
                );
                return;
            }
        };

        if !body.token_type.eq_ignore_ascii_case("bearer") {
            warn!(token_type = %body.token_type, "unexpected token type, using as bearer");
        }

        // Stay on login with the busy flag set until the credential is persisted.
        let message = body.message;
        SessionStore::new(&caps.key_value).save(&body.access_token, move |result| {
            Event::TokenSaved {
                result: Box::new(result),
                message,
            }
        });
        model.session.authenticate(body.access_token);
    }

    fn submit(model: &mut Model, caps: &Capabilities) {
        let Some(token) = model.session.token().cloned() else {
            error!("submit without a session");
            return;
        };

        let payload = match validate::prepare(&model.form) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "submission blocked locally");
                model.show_error(&e.into());
                return;
            }
        };

        let request = ApiRequest::post(&model.backend, PREDICT_PATH)
            .with_bearer(token.expose())
            .with_json(&payload);

        match request {
            Ok(request) => {
                info!(request_id = request.request_id(), "submitting sample");
                model.is_submitting = true;
                request.send(&caps.http, |result| Event::PredictResponse(Box::new(result)));
            }
            Err(e) => {
                error!(error = %e, "failed to build predict request");
                model.show_error(&e.into());
            }
        }
    }

    fn predict_response(model: &mut Model, caps: &Capabilities, result: HttpResult) {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "predict transport failure");
                model.show_error(&e.into());
                return;
            }
        };

        if response.status() == 401 {
            Self::expire_session(model, caps);
            return;
        }

        if !response.is_success() {
            info!(status = response.status(), "prediction rejected");
            model.show_error(&AppError::from_http_status(
                ErrorKind::Prediction,
                response.status(),
                Some(response.body()),
            ));
            return;
        }

        let prediction = match Self::parse_prediction(&response) {
            Ok(prediction) => prediction,
            Err(e) => {
                model.show_error(&e);
                return;
            }
        };

        info!(
            prediction = prediction.prediction,
            risk_level = %prediction.risk_level,
            "prediction received"
        );

        if let Some(notification) = alert::maybe_alert(&prediction) {
            caps.notify.present(notification, Event::AlertPresented);
            Self::record_alert(model, caps, &prediction);
        }

        model.result = Some(prediction);
        model.screen = Screen::Result;
    }

    fn parse_prediction(response: &HttpResponse) -> Result<PredictionResult, AppError> {
        let prediction = response.json::<PredictionResult>().map_err(|e| {
            AppError::new(ErrorKind::Prediction, "Unexpected response from the server")
                .with_internal(e.to_string())
        })?;
        prediction.validate().map_err(|e| {
            AppError::new(ErrorKind::Prediction, "Unexpected response from the server")
                .with_internal(e.to_string())
        })?;
        Ok(prediction)
    }

    fn record_alert(model: &Model, caps: &Capabilities, prediction: &PredictionResult) {
        let Some(token) = model.session.token() else {
            return;
        };
        let body = alert::alert_record(prediction, model.form.location());
        let request = ApiRequest::post(&model.backend, NOTIFY_PATH)
            .with_bearer(token.expose())
            .with_json(&body);

        match request {
            Ok(request) => {
                request.send(&caps.http, |result| Event::AlertRecorded(Box::new(result)));
            }
            Err(e) => warn!(error = %e, "failed to build alert record request"),
        }
    }

    fn request_history(model: &mut Model, caps: &Capabilities) {
        let Some(token) = model.session.token() else {
            error!("history requested without a session");
            return;
        };

        let request = ApiRequest::get(&model.backend, HISTORY_PATH).with_bearer(token.expose());
        debug!(request_id = request.request_id(), "requesting history");
        model.is_loading_history = true;
        request.send(&caps.http, |result| Event::HistoryResponse(Box::new(result)));
    }

    fn history_response(model: &mut Model, caps: &Capabilities, result: HttpResult) {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "history transport failure");
                model.show_error(&e.into());
                return;
            }
        };

        if response.status() == 401 {
            Self::expire_session(model, caps);
            return;
        }

        if !response.is_success() {
            model.show_error(&AppError::from_http_status(
                ErrorKind::Prediction,
                response.status(),
                Some(response.body()),
            ));
            return;
        }

        match response.json::<HistoryResponse>() {
            Ok(body) => {
                let mut records = body.predictions;
                records.truncate(MAX_HISTORY_ENTRIES);
                debug!(count = records.len(), "history loaded");
                model.history = records;
            }
            Err(e) => model.show_error(
                &AppError::new(ErrorKind::Serialization, "Malformed history response")
                    .with_internal(e.to_string()),
            ),
        }
    }

    fn log_outcome(what: &str, result: &NotifyResult) {
        match result {
            Ok(output) => debug!(?output, "{what} succeeded"),
            Err(e) => warn!(error = %e, "{what} failed"),
        }
    }

    fn log_storage(what: &str, result: &KvResult) {
        match result {
            Ok(previous) => debug!(had_value = previous.is_some(), "{what} succeeded"),
            Err(e) => error!(error = %e, "{what} failed"),
        }
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        let name = event.name();
        debug!(event = name, "update");

        match event {
            Event::BackendConfigured(raw) => {
                match BackendUrl::parse(&raw) {
                    Ok(backend) => {
                        info!(backend = backend.as_str(), "backend configured");
                        model.backend = backend;
                    }
                    Err(e) => error!(error = %e, "keeping previous backend URL"),
                }
                return;
            }

            Event::AppStarted => {
                model.is_restoring = true;
                SessionStore::new(&caps.key_value).load(Event::SessionLoaded);
                caps.notify.request_permission(Event::NotificationPermission);
            }

            Event::SessionLoaded(result) => {
                if !model.is_restoring {
                    Self::ignore(name, model);
                    return;
                }
                model.is_restoring = false;

                let restored = session::token_from(result)
                    .is_some_and(|token| model.session.authenticate(token));
                if restored {
                    info!("session restored");
                    model.form = Self::fresh_form();
                    model.screen = Screen::Form;
                } else {
                    info!("no session, showing login");
                    model.screen = Screen::Login;
                }
            }

            Event::NotificationPermission(result) => {
                Self::log_outcome("notification permission request", &result);
                if let Some(state) = result.ok().and_then(|o| o.permission()) {
                    model.notification_permission = state;
                }
            }

            Event::UsernameChanged(username) => {
                if model.screen != Screen::Login || model.is_loading {
                    Self::ignore(name, model);
                    return;
                }
                model.login.username = username;
            }

            Event::PasswordChanged(password) => {
                if model.screen != Screen::Login || model.is_loading {
                    Self::ignore(name, model);
                    return;
                }
                model.login.password = password;
            }

            Event::LoginSubmitted => {
                if model.screen != Screen::Login || model.is_restoring {
                    Self::ignore(name, model);
                    return;
                }
                if model.is_loading {
                    debug!("login already in flight");
                    return;
                }
                Self::login(model, caps);
            }

            Event::LoginResponse(result) => {
                if model.screen != Screen::Login || !model.is_loading {
                    Self::ignore(name, model);
                    return;
                }
                Self::login_response(model, caps, *result);
            }

            Event::TokenSaved { result, message } => {
                if model.screen != Screen::Login || !model.is_loading {
                    Self::ignore(name, model);
                    return;
                }
                model.is_loading = false;
                if !model.session.is_authenticated() {
                    error!("credential saved without a session");
                    return;
                }

                Self::log_storage("credential save", &result);
                model.login = Default::default();
                model.form = Self::fresh_form();
                model.screen = Screen::Form;
                let message = if message.trim().is_empty() {
                    "Login successful".to_string()
                } else {
                    message
                };
                info!("signed in");
                model.show_success("Success", message);
            }

            Event::FieldChanged(update) => {
                if model.screen != Screen::Form || model.is_submitting {
                    Self::ignore(name, model);
                    return;
                }
                model.form.set_field(update);
            }

            Event::SubmitPressed => {
                if model.screen != Screen::Form {
                    Self::ignore(name, model);
                    return;
                }
                if model.is_submitting {
                    debug!("submission already in flight");
                    return;
                }
                Self::submit(model, caps);
            }

            Event::PredictResponse(result) => {
                if !model.is_submitting {
                    Self::ignore(name, model);
                    return;
                }
                model.is_submitting = false;
                if model.screen != Screen::Form {
                    Self::ignore(name, model);
                    return;
                }
                Self::predict_response(model, caps, *result);
            }

            Event::AlertPresented(result) => {
                Self::log_outcome("alert dispatch", &result);
                return;
            }

            Event::AlertRecorded(result) => {
                match *result {
                    Ok(response) if response.is_success() => debug!("alert recorded"),
                    Ok(response) => warn!(status = response.status(), "alert record rejected"),
                    Err(e) => warn!(error = %e, "alert record failed"),
                }
                return;
            }

            Event::NewAnalysisPressed => {
                if model.screen != Screen::Result {
                    Self::ignore(name, model);
                    return;
                }
                model.screen = Screen::Form;
            }

            Event::HistoryRequested => {
                if !model.screen.requires_session() {
                    Self::ignore(name, model);
                    return;
                }
                if model.is_loading_history {
                    debug!("history already in flight");
                    return;
                }
                Self::request_history(model, caps);
            }

            Event::HistoryResponse(result) => {
                if !model.is_loading_history {
                    Self::ignore(name, model);
                    return;
                }
                model.is_loading_history = false;
                Self::history_response(model, caps, *result);
            }

            Event::LogoutPressed => {
                if !model.screen.requires_session() {
                    Self::ignore(name, model);
                    return;
                }
                info!("signing out");
                Self::end_session(model);
                Self::clear_stored_token(caps);
            }

            Event::TokenCleared(result) => {
                Self::log_storage("credential removal", &result);
                return;
            }

            Event::NoticeDismissed => {
                model.notice = None;
            }
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        let state = if model.is_restoring {
            ViewState::Loading
        } else {
            match (model.screen, model.result.as_ref()) {
                (Screen::Login, _) => ViewState::Login {
                    username: model.login.username.clone(),
                    has_password: !model.login.password.expose().is_empty(),
                    is_loading: model.is_loading,
                },
                (Screen::Result, Some(result)) => ViewState::Result {
                    result: ResultView::from(result),
                },
                (Screen::Form | Screen::Result, _) => ViewState::Form {
                    form: FormView::new(&model.form),
                    is_submitting: model.is_submitting,
                },
            }
        };

        ViewModel {
            screen: model.screen,
            state,
            notice: model.notice.clone(),
            is_authenticated: model.session.is_authenticated(),
            history: model.history.clone(),
            is_loading_history: model.is_loading_history,
            notification_permission: model.notification_permission,
        }
    }
}
