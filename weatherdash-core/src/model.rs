use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A tracked city. The set is fixed at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }
}

/// One normalized reading for one location, temperatures in Celsius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub location: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    /// Provider's primary condition label, verbatim.
    pub condition: String,
    pub observed_at: DateTime<Utc>,
    pub humidity_pct: u8,
    pub wind_speed_mps: f64,
}

impl Observation {
    pub fn condition_kind(&self) -> ConditionKind {
        ConditionKind::from_label(&self.condition)
    }
}

/// Coarse classification of a condition label, used for presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    Clear,
    Clouds,
    Rain,
    Other,
}

impl ConditionKind {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "clear" => ConditionKind::Clear,
            "clouds" => ConditionKind::Clouds,
            "rain" => ConditionKind::Rain,
            _ => ConditionKind::Other,
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            ConditionKind::Clear => "☀",
            ConditionKind::Rain => "☂",
            ConditionKind::Clouds | ConditionKind::Other => "☁",
        }
    }
}

/// Rolling summary of one location's readings on one local calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub location: String,
    pub average_temp_c: f64,
    pub max_temp_c: f64,
    pub min_temp_c: f64,
    pub dominant_condition: String,
    pub sample_count: usize,
}

/// An active high-temperature alert. At most one per location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub location: String,
    /// Reading that raised the alert.
    pub temperature_c: f64,
    pub threshold_c: f64,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}
