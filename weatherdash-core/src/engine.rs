use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{
    alert::{AlertChange, AlertSet},
    error::PollError,
    model::{DailySummary, Observation},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    #[default]
    Idle,
    Fetching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// At least one location produced an observation.
    Succeeded,
    /// Every location failed.
    Failed,
}

/// Everything the dashboard shows. Written only by the poll orchestrator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineState {
    /// Latest observation per location, in first-seen order.
    pub observations: Vec<Observation>,
    pub summaries: Vec<DailySummary>,
    pub alerts: AlertSet,
    pub phase: PollPhase,
    pub last_outcome: Option<CycleOutcome>,
    /// Per-location failures from the most recent cycle.
    pub failures: Vec<PollError>,
    /// Dashboard-level error, set while the last cycle was a total failure.
    pub error: Option<PollError>,
    pub cycles: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub next_poll_at: Option<DateTime<Utc>>,
}

impl EngineState {
    pub fn observation(&self, location: &str) -> Option<&Observation> {
        self.observations.iter().find(|o| o.location == location)
    }

    /// Replace the stored observation for the reading's location.
    pub(crate) fn upsert_observation(&mut self, obs: Observation) {
        match self
            .observations
            .iter_mut()
            .find(|o| o.location == obs.location)
        {
            Some(existing) => *existing = obs,
            None => self.observations.push(obs),
        }
    }

    pub fn summaries_for(&self, location: &str) -> impl Iterator<Item = &DailySummary> {
        self.summaries.iter().filter(move |s| s.location == location)
    }
}

/// Read-only snapshot handle shared with presentation code.
pub type SharedEngineState = Arc<RwLock<EngineState>>;

/// Result of one fetch-normalize-aggregate-evaluate cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub attempted: usize,
    pub observed: usize,
    pub failures: Vec<PollError>,
    pub summaries_updated: usize,
    pub alert_change: Option<AlertChange>,
    pub duration_ms: u64,
}
