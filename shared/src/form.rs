//! Form Model: the in-progress sample submission.
//!
//! Every field is kept as the raw text the user entered; coercion into wire
//! types happens only at submission time (see [`crate::validate`]). Updates
//! are tagged ([`FormUpdate`]) and produce a new form value, so a change to one
//! field can never leak into another.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The client's current calendar date.
#[must_use]
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("unknown form field '{0}'")]
    UnknownField(String),

    #[error("'{token}' is not a valid {field}")]
    UnknownToken { field: &'static str, token: String },
}

// --- Parameter range table ---

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
    pub optimal_min: f64,
    pub optimal_max: f64,
    pub step: f64,
}

impl ParameterRange {
    /// Inclusive on both ends.
    #[must_use]
    pub fn is_optimal(&self, value: f64) -> bool {
        value.is_finite() && self.optimal_min <= value && value <= self.optimal_max
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && self.min <= value && value <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Parameter {
    #[serde(rename = "NH4")]
    Nh4,
    #[serde(rename = "BSK5")]
    Bsk5,
    Suspended,
    O2,
    #[serde(rename = "NO3")]
    No3,
    #[serde(rename = "NO2")]
    No2,
    #[serde(rename = "SO4")]
    So4,
    #[serde(rename = "PO4")]
    Po4,
    #[serde(rename = "CL")]
    Cl,
    #[serde(rename = "pH")]
    Ph,
    Turbidity,
    Temperature,
}

impl Parameter {
    /// Submission check order.
    pub const ALL: [Parameter; 12] = [
        Parameter::Nh4,
        Parameter::Bsk5,
        Parameter::Suspended,
        Parameter::O2,
        Parameter::No3,
        Parameter::No2,
        Parameter::So4,
        Parameter::Po4,
        Parameter::Cl,
        Parameter::Ph,
        Parameter::Turbidity,
        Parameter::Temperature,
    ];

    /// Field name as it appears on the wire and in user-facing messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nh4 => "NH4",
            Self::Bsk5 => "BSK5",
            Self::Suspended => "Suspended",
            Self::O2 => "O2",
            Self::No3 => "NO3",
            Self::No2 => "NO2",
            Self::So4 => "SO4",
            Self::Po4 => "PO4",
            Self::Cl => "CL",
            Self::Ph => "pH",
            Self::Turbidity => "Turbidity",
            Self::Temperature => "Temperature",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    #[must_use]
    pub const fn range(self) -> ParameterRange {
        let (min, max, optimal_min, optimal_max, step) = match self {
            Self::Ph => (0.0, 14.0, 6.5, 8.5, 0.1),
            Self::O2 => (0.0, 15.0, 5.0, 12.0, 0.1),
            Self::Temperature => (0.0, 40.0, 10.0, 30.0, 0.5),
            Self::Turbidity => (0.0, 50.0, 0.0, 10.0, 0.5),
            Self::Nh4 => (0.0, 10.0, 0.0, 2.0, 0.1),
            Self::No3 => (0.0, 20.0, 0.0, 10.0, 0.1),
            Self::No2 => (0.0, 5.0, 0.0, 2.0, 0.01),
            Self::Cl => (0.0, 500.0, 10.0, 250.0, 1.0),
            Self::So4 => (0.0, 200.0, 5.0, 100.0, 1.0),
            Self::Po4 => (0.0, 10.0, 0.0, 5.0, 0.1),
            Self::Bsk5 => (0.0, 30.0, 1.0, 15.0, 0.1),
            Self::Suspended => (0.0, 100.0, 0.0, 50.0, 1.0),
        };
        ParameterRange {
            min,
            max,
            optimal_min,
            optimal_max,
            step,
        }
    }

    /// pH always shows one decimal; sub-unit steps show one; the rest none.
    #[must_use]
    pub fn decimals(self) -> usize {
        if matches!(self, Self::Ph) || self.range().step < 1.0 {
            1
        } else {
            0
        }
    }

    #[must_use]
    pub fn format(self, value: f64) -> String {
        format!("{value:.prec$}", prec = self.decimals())
    }

    /// Decimals needed to write any multiple of the step exactly.
    #[must_use]
    pub fn step_decimals(self) -> usize {
        self.range()
            .step
            .to_string()
            .split_once('.')
            .map_or(0, |(_, fraction)| fraction.len())
    }

    /// `value` snapped to the nearest step, written at step precision.
    #[must_use]
    pub fn snap(self, value: f64) -> String {
        let step = self.range().step;
        let snapped = (value / step).round() * step;
        format!("{snapped:.prec$}", prec = self.step_decimals())
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// --- Categorical tokens ---

macro_rules! token_enum {
    ($name:ident, $label:literal, [$($variant:ident => $token:literal),+ $(,)?]) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $token),+
                }
            }
        }

        impl FromStr for $name {
            type Err = FormError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s.trim())
                    .ok_or_else(|| FormError::UnknownToken {
                        field: $label,
                        token: s.to_string(),
                    })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// Wire tokens accepted by the prediction model's encoders.
token_enum!(
    LocationType,
    "Location",
    [UrbanArea => "Urban_Area", RuralArea => "Rural_Area"]
);
token_enum!(
    SourceType,
    "Source_Type",
    [TreatedWater => "Treated_Water", UntreatedWater => "Untreated_Water"]
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateField {
    Year,
    Month,
    Day,
}

impl DateField {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Year => "Year",
            Self::Month => "Month",
            Self::Day => "Day",
        }
    }
}

// --- Tagged updates ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value")]
pub enum FormUpdate {
    Location(Option<LocationType>),
    SourceType(Option<SourceType>),
    Measurement { parameter: Parameter, text: String },
    Date { field: DateField, text: String },
}

impl FormUpdate {
    /// Build an update from a field name as the presentation layer knows it.
    /// An empty value clears a categorical field.
    pub fn from_name(name: &str, value: impl Into<String>) -> Result<Self, FormError> {
        fn category(v: &str) -> Option<&str> {
            let v = v.trim();
            (!v.is_empty()).then_some(v)
        }

        let value = value.into();

        match name {
            "Location" => Ok(Self::Location(
                category(&value).map(str::parse).transpose()?,
            )),
            "Source_Type" => Ok(Self::SourceType(
                category(&value).map(str::parse).transpose()?,
            )),
            "Year" => Ok(Self::Date {
                field: DateField::Year,
                text: value,
            }),
            "Month" => Ok(Self::Date {
                field: DateField::Month,
                text: value,
            }),
            "Day" => Ok(Self::Date {
                field: DateField::Day,
                text: value,
            }),
            other => Parameter::from_name(other)
                .map(|parameter| Self::Measurement {
                    parameter,
                    text: value,
                })
                .ok_or_else(|| FormError::UnknownField(other.to_string())),
        }
    }

    /// Slider-style update. The stored text keeps the slider's step precision;
    /// display rounding is applied only when rendering.
    #[must_use]
    pub fn slider(parameter: Parameter, value: f64) -> Self {
        Self::Measurement {
            parameter,
            text: parameter.snap(value),
        }
    }
}

// --- The form itself ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionForm {
    location: Option<LocationType>,
    source_type: Option<SourceType>,
    measurements: BTreeMap<Parameter, String>,
    year: String,
    month: String,
    day: String,
}

impl Default for SubmissionForm {
    fn default() -> Self {
        Self::new(today())
    }
}

impl SubmissionForm {
    #[must_use]
    pub fn new(today: NaiveDate) -> Self {
        Self {
            location: None,
            source_type: None,
            measurements: Parameter::ALL
                .into_iter()
                .map(|p| (p, String::new()))
                .collect(),
            year: today.year().to_string(),
            month: today.month().to_string(),
            day: today.day().to_string(),
        }
    }

    /// A new form value with exactly one field replaced.
    #[must_use]
    pub fn with_field(&self, update: FormUpdate) -> Self {
        let mut next = self.clone();
        match update {
            FormUpdate::Location(location) => next.location = location,
            FormUpdate::SourceType(source_type) => next.source_type = source_type,
            FormUpdate::Measurement { parameter, text } => {
                next.measurements.insert(parameter, text);
            }
            FormUpdate::Date { field, text } => match field {
                DateField::Year => next.year = text,
                DateField::Month => next.month = text,
                DateField::Day => next.day = text,
            },
        }
        next
    }

    pub fn set_field(&mut self, update: FormUpdate) {
        *self = self.with_field(update);
    }

    /// Back to creation defaults, dated `today`.
    pub fn reset(&mut self, today: NaiveDate) {
        *self = Self::new(today);
    }

    #[must_use]
    pub fn location(&self) -> Option<LocationType> {
        self.location
    }

    #[must_use]
    pub fn source_type(&self) -> Option<SourceType> {
        self.source_type
    }

    #[must_use]
    pub fn measurement(&self, parameter: Parameter) -> &str {
        self.measurements
            .get(&parameter)
            .map_or("", String::as_str)
    }

    #[must_use]
    pub fn date(&self, field: DateField) -> &str {
        match field {
            DateField::Year => &self.year,
            DateField::Month => &self.month,
            DateField::Day => &self.day,
        }
    }

    /// The coerced value, if the text parses to a finite number.
    #[must_use]
    pub fn value(&self, parameter: Parameter) -> Option<f64> {
        self.measurement(parameter)
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
    }

    #[must_use]
    pub fn is_optimal(&self, parameter: Parameter) -> bool {
        self.value(parameter)
            .is_some_and(|v| parameter.range().is_optimal(v))
    }

    /// Name-based lookup; `None` for fields outside the range table.
    #[must_use]
    pub fn optimal_status(&self, name: &str) -> Option<bool> {
        Parameter::from_name(name).map(|p| self.is_optimal(p))
    }

    #[must_use]
    pub fn display_value(&self, parameter: Parameter) -> Option<String> {
        self.value(parameter).map(|v| parameter.format(v))
    }
}
