//! Submission Validator: required-field completeness and coercion into the
//! wire contract. Both steps are pure and run before any network call.

use chrono::NaiveDate;
use thiserror::Error;

use crate::api::PredictionRequest;
use crate::event::Secret;
use crate::form::{DateField, Parameter, SubmissionForm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    Location,
    SourceType,
    Measurement(Parameter),
}

impl RequiredField {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Location => "Location",
            Self::SourceType => "Source_Type",
            Self::Measurement(p) => p.name(),
        }
    }

    fn is_missing(self, form: &SubmissionForm) -> bool {
        match self {
            Self::Location => form.location().is_none(),
            Self::SourceType => form.source_type().is_none(),
            Self::Measurement(p) => form.measurement(p).trim().is_empty(),
        }
    }
}

/// Fixed check order; the date fields are always pre-populated.
pub const REQUIRED_FIELDS: [RequiredField; 14] = [
    RequiredField::Location,
    RequiredField::SourceType,
    RequiredField::Measurement(Parameter::Nh4),
    RequiredField::Measurement(Parameter::Bsk5),
    RequiredField::Measurement(Parameter::Suspended),
    RequiredField::Measurement(Parameter::O2),
    RequiredField::Measurement(Parameter::No3),
    RequiredField::Measurement(Parameter::No2),
    RequiredField::Measurement(Parameter::So4),
    RequiredField::Measurement(Parameter::Po4),
    RequiredField::Measurement(Parameter::Cl),
    RequiredField::Measurement(Parameter::Ph),
    RequiredField::Measurement(Parameter::Turbidity),
    RequiredField::Measurement(Parameter::Temperature),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Please fill in all required fields: {}", .0.join(", "))]
pub struct MissingFields(pub Vec<&'static str>);

impl MissingFields {
    #[must_use]
    pub fn names(&self) -> &[&'static str] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    #[error("{field} must be a number, got '{text}'")]
    NotANumber { field: &'static str, text: String },

    #[error("{field} must be a whole number, got '{text}'")]
    NotAnInteger { field: &'static str, text: String },

    #[error("{year}-{month}-{day} is not a valid calendar date")]
    InvalidDate { year: i32, month: u32, day: u32 },

    #[error("{0} has no value")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Missing(#[from] MissingFields),

    #[error(transparent)]
    Coercion(#[from] CoercionError),
}

/// Names every empty required field, in check order.
pub fn validate(form: &SubmissionForm) -> Result<(), MissingFields> {
    let missing: Vec<_> = REQUIRED_FIELDS
        .into_iter()
        .filter(|f| f.is_missing(form))
        .map(RequiredField::name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(MissingFields(missing))
    }
}

fn number(form: &SubmissionForm, parameter: Parameter) -> Result<f64, CoercionError> {
    let text = form.measurement(parameter).trim();
    if text.is_empty() {
        return Err(CoercionError::Missing(parameter.name()));
    }
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CoercionError::NotANumber {
            field: parameter.name(),
            text: text.to_string(),
        })
}

fn integer<T>(form: &SubmissionForm, field: DateField) -> Result<T, CoercionError>
where
    T: std::str::FromStr,
{
    let text = form.date(field).trim();
    text.parse::<T>().map_err(|_| CoercionError::NotAnInteger {
        field: field.name(),
        text: text.to_string(),
    })
}

/// Convert the form's text into the prediction request.
pub fn coerce(form: &SubmissionForm) -> Result<PredictionRequest, CoercionError> {
    let location = form
        .location()
        .ok_or(CoercionError::Missing("Location"))?;
    let source_type = form
        .source_type()
        .ok_or(CoercionError::Missing("Source_Type"))?;

    let year: i32 = integer(form, DateField::Year)?;
    let month: u32 = integer(form, DateField::Month)?;
    let day: u32 = integer(form, DateField::Day)?;
    if NaiveDate::from_ymd_opt(year, month, day).is_none() {
        return Err(CoercionError::InvalidDate { year, month, day });
    }

    Ok(PredictionRequest {
        location: location.as_str().to_string(),
        source_type: source_type.as_str().to_string(),
        nh4: number(form, Parameter::Nh4)?,
        bsk5: number(form, Parameter::Bsk5)?,
        suspended: number(form, Parameter::Suspended)?,
        o2: number(form, Parameter::O2)?,
        no3: number(form, Parameter::No3)?,
        no2: number(form, Parameter::No2)?,
        so4: number(form, Parameter::So4)?,
        po4: number(form, Parameter::Po4)?,
        cl: number(form, Parameter::Cl)?,
        ph: number(form, Parameter::Ph)?,
        turbidity: number(form, Parameter::Turbidity)?,
        temperature: number(form, Parameter::Temperature)?,
        year,
        month,
        day,
    })
}

/// Validation then coercion, the gate in front of the predict call.
pub fn prepare(form: &SubmissionForm) -> Result<PredictionRequest, SubmissionError> {
    validate(form)?;
    Ok(coerce(form)?)
}

/// Login requires a non-blank username and a non-empty password. The password
/// is sent exactly as typed, so whitespace counts.
pub fn validate_login(username: &str, password: &Secret) -> Result<(), MissingFields> {
    let mut missing = Vec::new();
    if username.trim().is_empty() {
        missing.push("Username");
    }
    if password.expose().is_empty() {
        missing.push("Password");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(MissingFields(missing))
    }
}
