//! Provider reply types and their mapping into [`Observation`].

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::{
    model::{Location, Observation},
    units::kelvin_to_celsius,
};

/// Raw current-weather reply. Every consumed field is optional so that a
/// partial reply is reported by [`normalize`] instead of failing to decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    pub dt: Option<i64>,
    pub main: Option<RawMain>,
    pub weather: Option<Vec<RawCondition>>,
    pub wind: Option<RawWind>,
}

/// Temperatures are in Kelvin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMain {
    pub temp: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCondition {
    pub main: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawWind {
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("malformed observation: missing `{0}`")]
    MissingField(&'static str),
}

/// Map one provider reply for `location` into an [`Observation`].
///
/// The condition label is taken verbatim; unknown labels are accepted.
pub fn normalize(location: &Location, raw: &RawSnapshot) -> Result<Observation, NormalizeError> {
    let main = raw.main.as_ref().ok_or(NormalizeError::MissingField("main"))?;
    let temp = main.temp.ok_or(NormalizeError::MissingField("main.temp"))?;
    let feels_like = main
        .feels_like
        .ok_or(NormalizeError::MissingField("main.feels_like"))?;
    let humidity = main
        .humidity
        .ok_or(NormalizeError::MissingField("main.humidity"))?;

    let condition = raw
        .weather
        .as_ref()
        .and_then(|w| w.first())
        .and_then(|w| w.main.clone())
        .ok_or(NormalizeError::MissingField("weather[0].main"))?;

    let wind_speed = raw
        .wind
        .as_ref()
        .and_then(|w| w.speed)
        .ok_or(NormalizeError::MissingField("wind.speed"))?;

    let observed_at = raw
        .dt
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .ok_or(NormalizeError::MissingField("dt"))?;

    Ok(Observation {
        location: location.name.clone(),
        temperature_c: kelvin_to_celsius(temp),
        feels_like_c: kelvin_to_celsius(feels_like),
        condition,
        observed_at,
        humidity_pct: humidity,
        wind_speed_mps: wind_speed,
    })
}
