//! Threshold alerts, one per location at most.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Alert, Observation};

/// Render the human-readable alert text for a reading.
pub fn alert_message(location: &str, temperature_c: f64) -> String {
    format!("High temperature alert in {location}: {temperature_c:.1}°C")
}

/// What a single evaluation did to the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertChange {
    Raised,
    Cleared,
    Unchanged,
}

/// Active alerts ordered by `raised_at`, ties in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertSet {
    alerts: Vec<Alert>,
}

impl AlertSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn for_location(&self, location: &str) -> Option<&Alert> {
        self.alerts.iter().find(|a| a.location == location)
    }

    /// Compare `latest` against `threshold_c` and update the set.
    ///
    /// A reading strictly above the threshold raises an alert unless one is
    /// already active for that location, in which case nothing changes. A
    /// reading at or below the threshold clears the location's alert.
    pub fn evaluate(
        &mut self,
        latest: &Observation,
        threshold_c: f64,
        now: DateTime<Utc>,
    ) -> AlertChange {
        let existing = self
            .alerts
            .iter()
            .position(|a| a.location == latest.location);

        if latest.temperature_c > threshold_c {
            if existing.is_some() {
                return AlertChange::Unchanged;
            }

            let alert = Alert {
                location: latest.location.clone(),
                temperature_c: latest.temperature_c,
                threshold_c,
                message: alert_message(&latest.location, latest.temperature_c),
                raised_at: now,
            };
            let at = self.alerts.partition_point(|a| a.raised_at <= now);
            self.alerts.insert(at, alert);

            tracing::info!(
                location = %latest.location,
                temperature_c = latest.temperature_c,
                threshold_c,
                "alert raised"
            );
            AlertChange::Raised
        } else {
            match existing {
                Some(idx) => {
                    self.alerts.remove(idx);
                    tracing::info!(
                        location = %latest.location,
                        temperature_c = latest.temperature_c,
                        threshold_c,
                        "alert cleared"
                    );
                    AlertChange::Cleared
                }
                None => AlertChange::Unchanged,
            }
        }
    }

    /// Drop every alert whose location's latest reading is at or below
    /// `threshold_c`, watched or not. Returns how many were cleared.
    pub fn clear_cooled(&mut self, latest: &[Observation], threshold_c: f64) -> usize {
        let before = self.alerts.len();
        self.alerts.retain(|alert| {
            let cooled = latest
                .iter()
                .find(|obs| obs.location == alert.location)
                .is_some_and(|obs| obs.temperature_c <= threshold_c);
            if cooled {
                tracing::info!(location = %alert.location, threshold_c, "alert cleared");
            }
            !cooled
        });
        before - self.alerts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        "2026-05-10T12:00:00Z".parse().expect("valid timestamp")
    }

    fn reading(location: &str, temp: f64) -> Observation {
        Observation {
            location: location.to_string(),
            temperature_c: temp,
            feels_like_c: temp,
            condition: "Clear".to_string(),
            observed_at: t0(),
            humidity_pct: 20,
            wind_speed_mps: 1.0,
        }
    }

    #[test]
    fn message_rounds_to_one_decimal() {
        assert_eq!(alert_message("Delhi", 36.04), "High temperature alert in Delhi: 36.0°C");
        assert_eq!(alert_message("Delhi", 35.96), "High temperature alert in Delhi: 36.0°C");
    }

    #[test]
    fn evaluating_twice_is_idempotent() {
        let mut once = AlertSet::new();
        once.evaluate(&reading("Delhi", 36.0), 35.0, t0());

        let mut twice = AlertSet::new();
        twice.evaluate(&reading("Delhi", 36.0), 35.0, t0());
        let change = twice.evaluate(&reading("Delhi", 36.0), 35.0, t0() + Duration::minutes(5));

        assert_eq!(change, AlertChange::Unchanged);
        assert_eq!(once, twice);
    }

    #[test]
    fn raise_hold_clear_raise_sequence() {
        let mut alerts = AlertSet::new();
        let threshold = 35.0;

        assert_eq!(alerts.evaluate(&reading("Delhi", 36.0), threshold, t0()), AlertChange::Raised);
        assert_eq!(alerts.len(), 1);
        let first = alerts.active()[0].clone();

        let t1 = t0() + Duration::minutes(5);
        assert_eq!(alerts.evaluate(&reading("Delhi", 36.0), threshold, t1), AlertChange::Unchanged);
        assert_eq!(alerts.active(), std::slice::from_ref(&first));

        let t2 = t1 + Duration::minutes(5);
        assert_eq!(alerts.evaluate(&reading("Delhi", 34.0), threshold, t2), AlertChange::Cleared);
        assert!(alerts.is_empty());

        let t3 = t2 + Duration::minutes(5);
        assert_eq!(alerts.evaluate(&reading("Delhi", 36.0), threshold, t3), AlertChange::Raised);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts.active()[0].raised_at, t3);
    }

    #[test]
    fn reading_equal_to_threshold_clears() {
        let mut alerts = AlertSet::new();
        alerts.evaluate(&reading("Delhi", 36.0), 35.0, t0());

        assert_eq!(alerts.evaluate(&reading("Delhi", 35.0), 35.0, t0()), AlertChange::Cleared);
        assert!(alerts.is_empty());
    }

    #[test]
    fn drop_clears_even_when_reading_differs_from_raising_one() {
        let mut alerts = AlertSet::new();
        alerts.evaluate(&reading("Delhi", 38.2), 35.0, t0());
        // still hot but a different value: same alert, original message kept
        alerts.evaluate(&reading("Delhi", 36.7), 35.0, t0());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts.active()[0].message, alert_message("Delhi", 38.2));

        alerts.evaluate(&reading("Delhi", 30.1), 35.0, t0());
        assert!(alerts.is_empty());
    }

    #[test]
    fn clearing_one_location_keeps_others() {
        let mut alerts = AlertSet::new();
        alerts.evaluate(&reading("Delhi", 40.0), 35.0, t0());
        alerts.evaluate(&reading("Chennai", 37.0), 35.0, t0() + Duration::minutes(1));

        alerts.evaluate(&reading("Delhi", 20.0), 35.0, t0() + Duration::minutes(2));

        assert_eq!(alerts.len(), 1);
        assert!(alerts.for_location("Chennai").is_some());
        assert!(alerts.for_location("Delhi").is_none());
    }

    #[test]
    fn ordered_by_raised_at_then_insertion() {
        let mut alerts = AlertSet::new();
        let later = t0() + Duration::minutes(10);

        alerts.evaluate(&reading("Delhi", 40.0), 35.0, later);
        alerts.evaluate(&reading("Mumbai", 40.0), 35.0, t0());
        alerts.evaluate(&reading("Chennai", 40.0), 35.0, t0());

        let order: Vec<&str> = alerts.active().iter().map(|a| a.location.as_str()).collect();
        assert_eq!(order, vec!["Mumbai", "Chennai", "Delhi"]);
    }

    #[test]
    fn cooled_locations_are_cleared_without_being_watched() {
        let mut alerts = AlertSet::new();
        alerts.evaluate(&reading("Delhi", 38.0), 35.0, t0());
        alerts.evaluate(&reading("Chennai", 37.0), 35.0, t0());

        let latest = vec![reading("Delhi", 20.0), reading("Chennai", 36.0)];
        assert_eq!(alerts.clear_cooled(&latest, 35.0), 1);
        assert!(alerts.for_location("Delhi").is_none());
        assert!(alerts.for_location("Chennai").is_some());

        // no reading for a location leaves its alert alone
        assert_eq!(alerts.clear_cooled(&[], 35.0), 0);
        assert_eq!(alerts.clear_cooled(&latest, 36.0), 1);
        assert!(alerts.is_empty());
    }

    #[test]
    fn below_threshold_without_alert_is_noop() {
        let mut alerts = AlertSet::new();
        assert_eq!(alerts.evaluate(&reading("Delhi", 12.0), 35.0, t0()), AlertChange::Unchanged);
        assert!(alerts.is_empty());
    }
}
