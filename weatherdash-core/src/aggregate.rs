//! Per-day, per-location rolling summaries.
//!
//! The aggregator keeps reducible state (sum, count, extrema and a condition
//! frequency table) for the current local day only. Each update rebuilds the
//! summary for every location it touched from that state and replaces the
//! previous summary for `(today, location)`. Summaries of earlier days are never
//! touched again.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;

use crate::model::{DailySummary, Observation};

#[derive(Debug, Clone)]
struct DayAccumulator {
    date: NaiveDate,
    sum: f64,
    count: usize,
    max: f64,
    min: f64,
    /// Insertion-ordered so the first label to reach the top count wins ties.
    conditions: Vec<(String, usize)>,
    dominant: usize,
    last_observed_at: Option<DateTime<Utc>>,
}

impl DayAccumulator {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            sum: 0.0,
            count: 0,
            max: f64::NEG_INFINITY,
            min: f64::INFINITY,
            conditions: Vec::new(),
            dominant: 0,
            last_observed_at: None,
        }
    }

    /// Fold one reading. Returns `false` if it repeats the previous timestamp.
    fn push(&mut self, obs: &Observation) -> bool {
        if self.last_observed_at == Some(obs.observed_at) {
            return false;
        }
        self.last_observed_at = Some(obs.observed_at);

        self.sum += obs.temperature_c;
        self.count += 1;
        self.max = self.max.max(obs.temperature_c);
        self.min = self.min.min(obs.temperature_c);

        let idx = match self.conditions.iter().position(|(c, _)| *c == obs.condition) {
            Some(idx) => {
                self.conditions[idx].1 += 1;
                idx
            }
            None => {
                self.conditions.push((obs.condition.clone(), 1));
                self.conditions.len() - 1
            }
        };

        // strictly greater: an equal count never displaces the current leader
        if self.conditions[idx].1 > self.conditions[self.dominant].1 {
            self.dominant = idx;
        }

        true
    }

    fn summary(&self, location: &str) -> DailySummary {
        DailySummary {
            date: self.date,
            location: location.to_string(),
            average_temp_c: self.sum / self.count as f64,
            max_temp_c: self.max,
            min_temp_c: self.min,
            dominant_condition: self
                .conditions
                .get(self.dominant)
                .map(|(c, _)| c.clone())
                .unwrap_or_default(),
            sample_count: self.count,
        }
    }
}

/// Folds poll batches into [`DailySummary`] values.
///
/// Calendar days are computed in `tz`; the binary uses [`chrono::Local`].
#[derive(Debug, Clone)]
pub struct DailyAggregator<Tz: TimeZone> {
    tz: Tz,
    accumulators: HashMap<String, DayAccumulator>,
}

impl<Tz: TimeZone> DailyAggregator<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            accumulators: HashMap::new(),
        }
    }

    /// Calendar date of `at` in the aggregator's time zone.
    pub fn local_date(&self, at: &DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.tz).date_naive()
    }

    /// Fold `batch` into `summaries` for `today`.
    ///
    /// Observations dated on any other local day are ignored. Returns the
    /// number of summaries that were created or replaced.
    pub fn update(
        &mut self,
        summaries: &mut Vec<DailySummary>,
        batch: &[Observation],
        today: NaiveDate,
    ) -> usize {
        self.accumulators.retain(|_, acc| acc.date == today);

        let mut touched: Vec<&str> = Vec::new();
        for obs in batch {
            if self.local_date(&obs.observed_at) != today {
                tracing::debug!(
                    location = %obs.location,
                    observed_at = %obs.observed_at,
                    "observation outside current day, not aggregated"
                );
                continue;
            }

            let acc = self
                .accumulators
                .entry(obs.location.clone())
                .or_insert_with(|| DayAccumulator::new(today));

            if acc.push(obs) && !touched.contains(&obs.location.as_str()) {
                touched.push(obs.location.as_str());
            }
        }

        for location in &touched {
            let Some(acc) = self.accumulators.get(*location) else {
                continue;
            };
            let fresh = acc.summary(location);

            match summaries
                .iter_mut()
                .find(|s| s.date == today && s.location == *location)
            {
                Some(existing) => *existing = fresh,
                None => summaries.push(fresh),
            }
        }

        touched.len()
    }
}
