use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    model::Location,
    units::{self, TemperatureUnit},
};

/// User-adjustable dashboard settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Display unit. Also the unit `alert_threshold` is expressed in.
    pub temperature_unit: TemperatureUnit,

    /// Poll period in minutes.
    pub update_interval_minutes: u32,

    pub alert_threshold: f64,

    /// Location whose readings drive alerts. Defaults to the first location.
    pub watched_location: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            temperature_unit: TemperatureUnit::Celsius,
            update_interval_minutes: 5,
            alert_threshold: 35.0,
            watched_location: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("Update interval must be at least one minute")]
    InvalidInterval,

    #[error("Alert threshold must be a finite number, got {0}")]
    InvalidThreshold(f64),

    #[error("Unknown location '{0}'")]
    UnknownLocation(String),
}

impl Settings {
    /// Alert threshold converted to Celsius for comparison.
    pub fn threshold_celsius(&self) -> f64 {
        units::to_celsius(self.alert_threshold, self.temperature_unit)
    }

    /// Switch the display unit, restating the threshold in the new unit so
    /// the Celsius value it stands for does not move.
    pub fn switch_unit(&mut self, unit: TemperatureUnit) {
        if unit == self.temperature_unit {
            return;
        }
        self.alert_threshold = units::convert(self.threshold_celsius(), unit);
        self.temperature_unit = unit;
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(u64::from(self.update_interval_minutes) * 60)
    }

    /// Name of the watched location, falling back to the first tracked one.
    pub fn watched<'a>(&'a self, locations: &'a [Location]) -> Option<&'a str> {
        self.watched_location
            .as_deref()
            .or_else(|| locations.first().map(|l| l.name.as_str()))
    }

    pub fn validate(&self, locations: &[Location]) -> Result<(), SettingsError> {
        check_interval(self.update_interval_minutes)?;
        check_threshold(self.alert_threshold)?;
        if let Some(name) = &self.watched_location {
            check_location(name, locations)?;
        }
        Ok(())
    }
}

pub(crate) fn check_interval(minutes: u32) -> Result<(), SettingsError> {
    if minutes == 0 {
        return Err(SettingsError::InvalidInterval);
    }
    Ok(())
}

pub(crate) fn check_threshold(value: f64) -> Result<(), SettingsError> {
    if !value.is_finite() {
        return Err(SettingsError::InvalidThreshold(value));
    }
    Ok(())
}

pub(crate) fn check_location(name: &str, locations: &[Location]) -> Result<(), SettingsError> {
    if locations.iter().any(|l| l.name == name) {
        Ok(())
    } else {
        Err(SettingsError::UnknownLocation(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cities() -> Vec<Location> {
        vec![
            Location::new("Delhi", 28.6139, 77.209),
            Location::new("Mumbai", 19.076, 72.8777),
        ]
    }

    #[test]
    fn fahrenheit_threshold_is_compared_in_celsius() {
        let settings = Settings {
            temperature_unit: TemperatureUnit::Fahrenheit,
            alert_threshold: 95.0,
            ..Settings::default()
        };
        assert!((settings.threshold_celsius() - 35.0).abs() < 1e-9);
    }

    #[test]
    fn switching_unit_keeps_threshold_meaning() {
        let mut settings = Settings::default();

        settings.switch_unit(TemperatureUnit::Fahrenheit);
        assert_eq!(settings.temperature_unit, TemperatureUnit::Fahrenheit);
        assert!((settings.alert_threshold - 95.0).abs() < 1e-9);
        assert!((settings.threshold_celsius() - 35.0).abs() < 1e-9);

        settings.switch_unit(TemperatureUnit::Fahrenheit);
        assert!((settings.alert_threshold - 95.0).abs() < 1e-9);

        settings.switch_unit(TemperatureUnit::Celsius);
        assert!((settings.alert_threshold - 35.0).abs() < 1e-9);
    }

    #[test]
    fn poll_period_is_in_minutes() {
        let settings = Settings {
            update_interval_minutes: 7,
            ..Settings::default()
        };
        assert_eq!(settings.poll_period(), Duration::from_secs(420));
    }

    #[test]
    fn watched_defaults_to_first_location() {
        let settings = Settings::default();
        assert_eq!(settings.watched(&cities()), Some("Delhi"));

        let settings = Settings {
            watched_location: Some("Mumbai".into()),
            ..Settings::default()
        };
        assert_eq!(settings.watched(&cities()), Some("Mumbai"));
        assert_eq!(Settings::default().watched(&[]), None);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let zero = Settings {
            update_interval_minutes: 0,
            ..Settings::default()
        };
        assert_eq!(zero.validate(&cities()), Err(SettingsError::InvalidInterval));

        let nan = Settings {
            alert_threshold: f64::NAN,
            ..Settings::default()
        };
        assert!(matches!(
            nan.validate(&cities()),
            Err(SettingsError::InvalidThreshold(_))
        ));

        let unknown = Settings {
            watched_location: Some("Pune".into()),
            ..Settings::default()
        };
        assert_eq!(
            unknown.validate(&cities()),
            Err(SettingsError::UnknownLocation("Pune".into()))
        );

        assert_eq!(Settings::default().validate(&cities()), Ok(()));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let settings: Settings = toml::from_str("alert_threshold = 30.5").expect("valid toml");
        assert_eq!(settings.alert_threshold, 30.5);
        assert_eq!(settings.update_interval_minutes, 5);
        assert_eq!(settings.temperature_unit, TemperatureUnit::Celsius);

        let settings: Settings = toml::from_str("temperature_unit = \"F\"").expect("valid toml");
        assert_eq!(settings.temperature_unit, TemperatureUnit::Fahrenheit);
    }
}
