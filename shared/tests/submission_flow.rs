mod common;

use chrono::Datelike;
use common::{header, json_body, path, Driver};
use shared::alert::{ALERT_TITLE, RISK_LEVEL_KEY};
use shared::form::{self, FormUpdate, Parameter};
use shared::model::NoticeKind;
use shared::{ErrorKind, Event, Screen, ViewState, HISTORY_PATH, NOTIFY_PATH, PREDICT_PATH};

fn high_risk() -> serde_json::Value {
    serde_json::json!({
        "prediction": 1,
        "risk_level": "High",
        "message": "Elevated risk detected",
        "confidence": 0.87
    })
}

fn low_risk() -> serde_json::Value {
    serde_json::json!({
        "prediction": 0,
        "risk_level": "Low",
        "message": "Water quality looks normal"
    })
}

fn signed_in_with_form() -> Driver {
    let mut driver = Driver::new();
    driver.sign_in();
    driver.fill_form();
    driver
}

#[test]
fn missing_ph_is_blocked_locally() {
    let mut driver = signed_in_with_form();
    driver.set("pH", "");

    driver.send(Event::SubmitPressed);

    assert!(driver.http.is_empty());
    let view = driver.view();
    assert_eq!(view.screen, Screen::Form);
    let notice = view.notice.unwrap();
    assert_eq!(notice.error_kind(), Some(ErrorKind::Validation));
    assert_eq!(notice.message, "Please fill in all required fields: pH");
}

#[test]
fn missing_fields_are_listed_in_check_order() {
    let mut driver = Driver::new();
    driver.sign_in();
    driver.set("Temperature", "21");
    driver.set("NH4", "0.5");

    driver.send(Event::SubmitPressed);

    let message = driver.view().notice.unwrap().message;
    assert_eq!(
        message,
        "Please fill in all required fields: Location, Source_Type, BSK5, Suspended, O2, \
         NO3, NO2, SO4, PO4, CL, pH, Turbidity"
    );
}

#[test]
fn unparseable_number_is_a_coercion_error() {
    let mut driver = signed_in_with_form();
    driver.set("O2", "lots");

    driver.send(Event::SubmitPressed);

    assert!(driver.http.is_empty());
    let notice = driver.view().notice.unwrap();
    assert_eq!(notice.error_kind(), Some(ErrorKind::Coercion));
    assert!(notice.message.contains("O2"));
}

#[test]
fn high_risk_result_alerts_exactly_once() {
    let mut driver = signed_in_with_form();

    driver.send(Event::SubmitPressed);
    let request = driver.outstanding();
    assert_eq!(path(request), PREDICT_PATH);
    assert_eq!(header(request, "authorization"), Some("Bearer tok1"));
    let body = json_body(request);
    assert_eq!(body["pH"], 7.2);
    assert_eq!(body["Location"], "Urban_Area");
    assert_eq!(body["Source_Type"], "Treated_Water");
    let today = form::today();
    assert_eq!(body["Year"].as_i64(), Some(i64::from(today.year())));
    assert_eq!(body["Month"].as_i64(), Some(i64::from(today.month())));
    assert_eq!(body["Day"].as_i64(), Some(i64::from(today.day())));

    driver.answer(200, high_risk());

    let view = driver.view();
    assert_eq!(view.screen, Screen::Result);
    let ViewState::Result { result } = view.state else {
        panic!("expected the result screen");
    };
    assert!(result.is_high_risk);
    assert_eq!(result.confidence_percent.as_deref(), Some("87.0%"));

    assert_eq!(driver.alerts.len(), 1);
    let alert = &driver.alerts[0];
    assert_eq!(alert.title, ALERT_TITLE);
    assert_eq!(alert.body, "Elevated risk detected");
    assert_eq!(alert.data.get(RISK_LEVEL_KEY).map(String::as_str), Some("High"));

    assert_eq!(path(driver.outstanding()), NOTIFY_PATH);
    driver.answer(500, serde_json::json!({"detail": "mail relay down"}));
    assert_eq!(driver.view().screen, Screen::Result);
    assert!(driver.view().notice.is_none());
    assert_eq!(driver.alerts.len(), 1);
}

#[test]
fn low_risk_result_never_alerts() {
    let mut driver = signed_in_with_form();

    driver.send(Event::SubmitPressed);
    driver.answer(200, low_risk());

    assert_eq!(driver.view().screen, Screen::Result);
    assert!(driver.alerts.is_empty());
    assert!(driver.http.is_empty());
}

#[test]
fn rejected_prediction_keeps_form() {
    let mut driver = signed_in_with_form();
    let before = driver.view().state;

    driver.send(Event::SubmitPressed);
    driver.answer(422, serde_json::json!({"detail": "Model unavailable"}));

    let view = driver.view();
    assert_eq!(view.screen, Screen::Form);
    let notice = view.notice.clone().unwrap();
    assert_eq!(notice.kind, NoticeKind::Error);
    assert_eq!(notice.message, "Model unavailable");
    assert_eq!(view.state, before);
}

#[test]
fn network_failure_keeps_form_and_allows_retry() {
    let mut driver = signed_in_with_form();

    driver.send(Event::SubmitPressed);
    driver.fail(crux_http::HttpError::Timeout);

    let view = driver.view();
    assert_eq!(view.screen, Screen::Form);
    assert_eq!(view.notice.unwrap().error_kind(), Some(ErrorKind::Timeout));
    assert!(matches!(view.state, ViewState::Form { is_submitting: false, .. }));

    driver.send(Event::SubmitPressed);
    assert_eq!(driver.http.len(), 1);
}

#[test]
fn submit_is_not_reentrant() {
    let mut driver = signed_in_with_form();

    driver.send(Event::SubmitPressed);
    driver.send(Event::SubmitPressed);
    assert_eq!(driver.http.len(), 1);
    assert!(matches!(
        driver.view().state,
        ViewState::Form { is_submitting: true, .. }
    ));

    driver.set("pH", "9.9");
    let ViewState::Form { form, .. } = driver.view().state else {
        panic!("expected the form screen");
    };
    let ph = form.parameters.iter().find(|p| p.name == "pH").unwrap();
    assert_eq!(ph.text, "7.2");
}

#[test]
fn new_analysis_keeps_form_values() {
    let mut driver = signed_in_with_form();
    driver.send(Event::SubmitPressed);
    driver.answer(200, low_risk());

    driver.send(Event::NewAnalysisPressed);

    let view = driver.view();
    assert_eq!(view.screen, Screen::Form);
    let ViewState::Form { form, .. } = view.state else {
        panic!("expected the form screen");
    };
    assert_eq!(form.location.as_deref(), Some("Urban_Area"));
    let ph = form.parameters.iter().find(|p| p.name == "pH").unwrap();
    assert_eq!(ph.text, "7.2");
}

#[test]
fn ph_slider_boundary_is_optimal() {
    let mut driver = Driver::new();
    driver.sign_in();

    let ph_view = |driver: &Driver| {
        let ViewState::Form { form, .. } = driver.view().state else {
            panic!("expected the form screen");
        };
        form.parameters.into_iter().find(|p| p.name == "pH").unwrap()
    };

    driver.send(Event::FieldChanged(FormUpdate::slider(Parameter::Ph, 8.5)));
    let ph = ph_view(&driver);
    assert_eq!(ph.text, "8.5");
    assert!(ph.is_optimal);

    driver.send(Event::FieldChanged(FormUpdate::slider(Parameter::Ph, 8.6)));
    assert!(!ph_view(&driver).is_optimal);
}

#[test]
fn logout_from_result_discards_everything() {
    let mut driver = signed_in_with_form();
    driver.send(Event::SubmitPressed);
    driver.answer(200, low_risk());

    driver.send(Event::LogoutPressed);

    let view = driver.view();
    assert_eq!(view.screen, Screen::Login);
    assert_eq!(driver.token(), None);

    driver.send(Event::NewAnalysisPressed);
    driver.send(Event::SubmitPressed);
    assert_eq!(driver.view().screen, Screen::Login);
    assert!(driver.http.is_empty());
}

#[test]
fn expired_token_on_predict_signs_out() {
    let mut driver = signed_in_with_form();

    driver.send(Event::SubmitPressed);
    driver.answer(401, serde_json::json!({"detail": "Could not validate credentials"}));

    let view = driver.view();
    assert_eq!(view.screen, Screen::Login);
    assert!(!view.is_authenticated);
    assert_eq!(view.notice.unwrap().error_kind(), Some(ErrorKind::SessionExpired));
    assert_eq!(driver.token(), None);
}

#[test]
fn late_prediction_after_logout_is_ignored() {
    let mut driver = signed_in_with_form();
    driver.send(Event::SubmitPressed);
    driver.send(Event::LogoutPressed);

    driver.answer(200, high_risk());

    assert_eq!(driver.view().screen, Screen::Login);
    assert!(driver.alerts.is_empty());
}

#[test]
fn history_is_loaded_and_capped() {
    let mut driver = Driver::new();
    driver.sign_in();

    driver.send(Event::HistoryRequested);
    driver.send(Event::HistoryRequested);
    assert_eq!(driver.http.len(), 1);
    assert_eq!(path(driver.outstanding()), HISTORY_PATH);
    assert!(driver.view().is_loading_history);

    let records: Vec<_> = (0..60)
        .map(|i| {
            serde_json::json!({
                "id": format!("p{i}"),
                "location": "Urban_Area",
                "source_type": "Treated_Water",
                "prediction": i % 2,
                "confidence": 0.5,
                "risk_level": "Low",
                "timestamp": "2024-03-09T10:00:00"
            })
        })
        .collect();
    driver.answer(200, serde_json::json!({ "predictions": records }));

    let view = driver.view();
    assert!(!view.is_loading_history);
    assert_eq!(view.history.len(), 50);
    assert_eq!(view.history[0].id, "p0");
    assert_eq!(view.screen, Screen::Form);
}

#[test]
fn history_failure_keeps_screen() {
    let mut driver = Driver::new();
    driver.sign_in();

    driver.send(Event::HistoryRequested);
    driver.answer(500, serde_json::json!({"detail": "database offline"}));

    let view = driver.view();
    assert_eq!(view.screen, Screen::Form);
    assert_eq!(view.notice.unwrap().message, "database offline");
    assert!(view.history.is_empty());
}

#[test]
fn slider_values_keep_step_precision_on_the_wire() {
    let mut driver = signed_in_with_form();
    driver.send(Event::FieldChanged(FormUpdate::slider(Parameter::No2, 2.04)));

    driver.send(Event::SubmitPressed);

    let body = json_body(driver.outstanding());
    assert_eq!(body["NO2"].as_f64(), Some(2.04));
}
