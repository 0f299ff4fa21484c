use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    FinalResult,
    Dropout,
}

impl ModelKind {
    pub fn path_segment(self) -> &'static str {
        match self {
            ModelKind::FinalResult => "final-result",
            ModelKind::Dropout => "dropout",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LabelStyle {
    #[default]
    Short,
    Full,
}

/// Classifier output as returned by the prediction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPrediction {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl fmt::Display for RawPrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawPrediction::Flag(flag) => write!(f, "{flag}"),
            RawPrediction::Number(value) => write!(f, "{value}"),
            RawPrediction::Text(text) => f.write_str(text),
        }
    }
}

/// Canonical form of a binary classifier output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskFlag {
    Positive,
    Negative,
}

impl RiskFlag {
    pub fn from_raw(raw: &RawPrediction) -> Option<Self> {
        match raw {
            RawPrediction::Flag(true) => Some(RiskFlag::Positive),
            RawPrediction::Flag(false) => Some(RiskFlag::Negative),
            RawPrediction::Number(value) if *value == 1.0 => Some(RiskFlag::Positive),
            RawPrediction::Number(value) if *value == 0.0 => Some(RiskFlag::Negative),
            RawPrediction::Number(_) => None,
            RawPrediction::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => Some(RiskFlag::Positive),
                "0" | "false" => Some(RiskFlag::Negative),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpretation {
    pub display_text: String,
    pub is_negative: bool,
    /// False when the raw value was passed through un-interpreted.
    pub recognized: bool,
}

pub fn interpret(raw: &RawPrediction, kind: ModelKind, style: LabelStyle) -> Interpretation {
    match kind {
        ModelKind::Dropout => interpret_dropout(raw, style),
        ModelKind::FinalResult => interpret_final_result(raw),
    }
}

fn interpret_dropout(raw: &RawPrediction, style: LabelStyle) -> Interpretation {
    let (display_text, is_negative) = match (RiskFlag::from_raw(raw), style) {
        (Some(RiskFlag::Positive), LabelStyle::Short) => ("At Risk", true),
        (Some(RiskFlag::Positive), LabelStyle::Full) => ("Student at Risk of Dropping Out", true),
        (Some(RiskFlag::Negative), LabelStyle::Short) => ("No Risk", false),
        (Some(RiskFlag::Negative), LabelStyle::Full) => ("Student Not at Risk", false),
        (None, _) => return passthrough(raw),
    };

    Interpretation {
        display_text: display_text.to_string(),
        is_negative,
        recognized: true,
    }
}

fn interpret_final_result(raw: &RawPrediction) -> Interpretation {
    let RawPrediction::Text(label) = raw else {
        return passthrough(raw);
    };

    let lowered = label.trim().to_lowercase();
    let is_negative = matches!(lowered.as_str(), "fail" | "withdrawn");
    let recognized = is_negative || matches!(lowered.as_str(), "pass" | "distinction");

    Interpretation {
        display_text: capitalize(&lowered),
        is_negative,
        recognized,
    }
}

fn passthrough(raw: &RawPrediction) -> Interpretation {
    Interpretation {
        display_text: raw.to_string(),
        is_negative: false,
        recognized: false,
    }
}

fn capitalize(lowered: &str) -> String {
    let mut chars = lowered.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Body returned by `POST /predict/...`.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionResponse {
    pub success: bool,
    #[serde(default)]
    pub prediction: Option<RawPrediction>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub raw_prediction: RawPrediction,
    pub model_kind: ModelKind,
    pub display_text: String,
    pub is_negative: bool,
    pub message: Option<String>,
}

impl PredictionResult {
    pub fn new(
        raw_prediction: RawPrediction,
        model_kind: ModelKind,
        style: LabelStyle,
        message: Option<String>,
    ) -> Self {
        let interpretation = interpret(&raw_prediction, model_kind, style);
        if !interpretation.recognized {
            tracing::warn!(
                model = %model_kind,
                raw = %raw_prediction,
                "Unrecognized prediction value, showing it verbatim"
            );
        }

        Self {
            raw_prediction,
            model_kind,
            display_text: interpretation.display_text,
            is_negative: interpretation.is_negative,
            message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum Gender {
    #[default]
    #[value(name = "F")]
    F,
    #[value(name = "M")]
    M,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum AgeBand {
    #[default]
    #[serde(rename = "0-35")]
    #[value(name = "0-35")]
    UpTo35,
    #[serde(rename = "35-55")]
    #[value(name = "35-55")]
    From35To55,
    #[serde(rename = "55<=")]
    #[value(name = "55<=")]
    Over55,
}

/// Feature values as typed into the prediction form, before coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionForm {
    pub gender: Gender,
    pub age_band: AgeBand,
    pub studied_credits: String,
    pub num_of_prev_attempts: String,
    pub total_clicks: String,
    pub avg_assessment_score: String,
}

impl Default for PredictionForm {
    fn default() -> Self {
        Self {
            gender: Gender::F,
            age_band: AgeBand::UpTo35,
            studied_credits: "60".to_string(),
            num_of_prev_attempts: "0".to_string(),
            total_clicks: "1000".to_string(),
            avg_assessment_score: "70".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub gender: Gender,
    pub age_band: AgeBand,
    pub studied_credits: f64,
    pub num_of_prev_attempts: f64,
    pub total_clicks: f64,
    pub avg_assessment_score: f64,
}

impl From<&PredictionForm> for PredictionRequest {
    fn from(form: &PredictionForm) -> Self {
        Self {
            gender: form.gender,
            age_band: form.age_band,
            studied_credits: non_negative(&form.studied_credits),
            num_of_prev_attempts: non_negative(&form.num_of_prev_attempts),
            total_clicks: non_negative(&form.total_clicks),
            avg_assessment_score: non_negative(&form.avg_assessment_score).min(100.0),
        }
    }
}

// Empty or invalid input submits as 0.
fn non_negative(field: &str) -> f64 {
    match field.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value,
        _ => 0.0,
    }
}
