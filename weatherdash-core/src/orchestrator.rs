//! Poll loop driving the fetch, normalize, aggregate and evaluate cycle.
//!
//! Architecture:
//! - [`PollOrchestrator`] owns [`EngineState`] and is its only writer. After
//!   every mutation it publishes a clone into a [`SharedEngineState`] that
//!   readers snapshot.
//! - Each cycle fetches all tracked locations concurrently and waits for all of
//!   them to settle. Failed locations are recorded and skipped; the rest of the
//!   batch is aggregated and evaluated.
//! - [`PollOrchestrator::spawn`] moves the orchestrator into a tokio task driven
//!   by an interval timer whose first tick fires immediately. The returned
//!   [`PollHandle`] changes settings, forces a refresh, and tears the task down.

use chrono::{Local, TimeZone, Utc};
use futures::future::join_all;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{RwLock, mpsc},
    task::JoinHandle,
    time::{Instant, Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    aggregate::DailyAggregator,
    alert::AlertChange,
    engine::{CycleOutcome, CycleReport, EngineState, PollPhase, SharedEngineState},
    error::PollError,
    model::{Location, Observation},
    normalize::normalize,
    provider::ObservationSource,
    settings::{self, Settings, SettingsError},
    units::TemperatureUnit,
};

const COMMAND_BUFFER: usize = 16;
const EVENT_BUFFER: usize = 32;

/// Notifications emitted by a spawned orchestrator.
#[derive(Debug, Clone)]
pub enum PollEvent {
    CycleCompleted(CycleReport),
    /// A settings command was applied and the watched location re-evaluated.
    SettingsApplied { alert_change: Option<AlertChange> },
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Polling task has stopped")]
    Stopped,
}

#[derive(Debug)]
enum Command {
    SetInterval(u32),
    SetThreshold(f64),
    SetUnit(TemperatureUnit),
    Watch(String),
    RefreshNow,
}

enum Wake {
    Cancelled,
    Tick,
    Command(Option<Command>),
}

pub struct PollOrchestrator<Tz: TimeZone = Local> {
    source: Arc<dyn ObservationSource>,
    locations: Vec<Location>,
    settings: Settings,
    aggregator: DailyAggregator<Tz>,
    state: EngineState,
    published: SharedEngineState,
}

impl PollOrchestrator<Local> {
    /// Orchestrator bucketing days in the system's local time zone.
    pub fn new(
        source: Arc<dyn ObservationSource>,
        locations: Vec<Location>,
        settings: Settings,
    ) -> Result<Self, SettingsError> {
        Self::with_timezone(source, locations, settings, Local)
    }
}

impl<Tz: TimeZone> PollOrchestrator<Tz> {
    pub fn with_timezone(
        source: Arc<dyn ObservationSource>,
        locations: Vec<Location>,
        settings: Settings,
        tz: Tz,
    ) -> Result<Self, SettingsError> {
        settings.validate(&locations)?;

        Ok(Self {
            source,
            locations,
            settings,
            aggregator: DailyAggregator::new(tz),
            state: EngineState::default(),
            published: Arc::new(RwLock::new(EngineState::default())),
        })
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn shared_state(&self) -> SharedEngineState {
        Arc::clone(&self.published)
    }

    /// Run one full cycle now and publish the result.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let started = std::time::Instant::now();
        self.begin_cycle().await;
        let results = self.fetch_all().await;
        let report = self.complete_cycle(results, started);
        self.publish().await;
        report
    }

    /// Change the alert threshold (in the display unit) and re-evaluate.
    pub async fn set_threshold(&mut self, value: f64) -> Result<Option<AlertChange>, SettingsError> {
        settings::check_threshold(value)?;
        self.settings.alert_threshold = value;
        Ok(self.reevaluate().await)
    }

    /// Change the display unit. The threshold is restated in the new unit and
    /// keeps its Celsius value.
    pub async fn set_unit(&mut self, unit: TemperatureUnit) -> Option<AlertChange> {
        self.settings.switch_unit(unit);
        self.reevaluate().await
    }

    pub async fn watch_location(&mut self, name: &str) -> Result<Option<AlertChange>, SettingsError> {
        settings::check_location(name, &self.locations)?;
        self.settings.watched_location = Some(name.to_string());
        Ok(self.reevaluate().await)
    }

    /// Store a new poll period. A spawned loop re-arms its timer on top of this.
    pub fn set_interval_minutes(&mut self, minutes: u32) -> Result<(), SettingsError> {
        settings::check_interval(minutes)?;
        self.settings.update_interval_minutes = minutes;
        Ok(())
    }

    async fn begin_cycle(&mut self) {
        self.state.phase = PollPhase::Fetching;
        self.publish().await;
    }

    async fn fetch_all(&self) -> Vec<Result<Observation, PollError>> {
        let source = &self.source;
        let fetches = self.locations.iter().map(|location| async move {
            match source.fetch(location).await {
                Ok(raw) => {
                    normalize(location, &raw).map_err(|e| PollError::malformed(&location.name, e))
                }
                Err(e) => Err(PollError::FetchFailure {
                    location: location.name.clone(),
                    reason: e.to_string(),
                }),
            }
        });

        join_all(fetches).await
    }

    fn complete_cycle(
        &mut self,
        results: Vec<Result<Observation, PollError>>,
        started: std::time::Instant,
    ) -> CycleReport {
        let now = Utc::now();
        let attempted = results.len();

        let mut batch = Vec::with_capacity(attempted);
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(obs) => batch.push(obs),
                Err(err) => {
                    tracing::warn!(error = %err, "location skipped this cycle");
                    failures.push(err);
                }
            }
        }
        let observed = batch.len();

        let (outcome, summaries_updated, alert_change) = if batch.is_empty() {
            let err = PollError::TotalFailure { attempted };
            tracing::error!(error = %err, "poll cycle failed, keeping last known state");
            self.state.error = Some(err);
            (CycleOutcome::Failed, 0, None)
        } else {
            self.state.error = None;
            let today = self.aggregator.local_date(&now);
            let updated = self
                .aggregator
                .update(&mut self.state.summaries, &batch, today);
            for obs in batch {
                self.state.upsert_observation(obs);
            }
            let change = self.evaluate_alerts();
            (CycleOutcome::Succeeded, updated, change)
        };

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.state.phase = PollPhase::Idle;
        self.state.last_outcome = Some(outcome);
        self.state.failures = failures.clone();
        self.state.cycles += 1;
        self.state.last_cycle_at = Some(now);

        tracing::info!(
            attempted,
            observed,
            failed = failures.len(),
            summaries_updated,
            active_alerts = self.state.alerts.len(),
            duration_ms,
            "poll cycle complete"
        );

        CycleReport {
            outcome,
            attempted,
            observed,
            failures,
            summaries_updated,
            alert_change,
            duration_ms,
        }
    }

    /// Evaluate the watched location's latest reading, then clear alerts of
    /// any location that has cooled. Only the watched location raises.
    fn evaluate_alerts(&mut self) -> Option<AlertChange> {
        let threshold_c = self.settings.threshold_celsius();
        let latest = self
            .settings
            .watched(&self.locations)
            .and_then(|name| self.state.observation(name))
            .cloned();

        let change = latest.map(|obs| self.state.alerts.evaluate(&obs, threshold_c, Utc::now()));
        self.state
            .alerts
            .clear_cooled(&self.state.observations, threshold_c);
        change
    }

    async fn reevaluate(&mut self) -> Option<AlertChange> {
        let change = self.evaluate_alerts();
        self.publish().await;
        change
    }

    async fn publish(&self) {
        let mut shared = self.published.write().await;
        *shared = self.state.clone();
    }
}

impl<Tz> PollOrchestrator<Tz>
where
    Tz: TimeZone + Send + Sync + 'static,
{
    /// Move the orchestrator into a background task and start polling.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> (PollHandle, mpsc::Receiver<PollEvent>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();

        let state = self.shared_state();
        let locations = self.locations.clone();
        let task = tokio::spawn(self.run(command_rx, event_tx, cancel.clone()));

        let handle = PollHandle {
            commands: command_tx,
            cancel,
            state,
            locations,
            task: Some(task),
        };

        (handle, event_rx)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        events: mpsc::Sender<PollEvent>,
        cancel: CancellationToken,
    ) {
        tracing::info!(
            locations = self.locations.len(),
            interval_minutes = self.settings.update_interval_minutes,
            "poller started"
        );

        let mut ticker = new_ticker(Instant::now(), self.settings.poll_period());

        loop {
            let wake = tokio::select! {
                biased;
                _ = cancel.cancelled() => Wake::Cancelled,
                _ = ticker.tick() => Wake::Tick,
                command = commands.recv() => Wake::Command(command),
            };

            match wake {
                Wake::Cancelled | Wake::Command(None) => break,
                Wake::Tick => {
                    if !self.poll_once(&cancel, &events).await {
                        break;
                    }
                }
                Wake::Command(Some(Command::RefreshNow)) => {
                    if !self.poll_once(&cancel, &events).await {
                        break;
                    }
                    ticker.reset();
                }
                Wake::Command(Some(command)) => {
                    self.apply_command(command, &mut ticker, &events).await;
                }
            }
        }

        tracing::info!(cycles = self.state.cycles, "poller stopped");
    }

    /// Run one cycle unless cancelled first. Returns `false` on cancellation.
    async fn poll_once(
        &mut self,
        cancel: &CancellationToken,
        events: &mpsc::Sender<PollEvent>,
    ) -> bool {
        let started = std::time::Instant::now();
        self.begin_cycle().await;

        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            results = self.fetch_all() => Some(results),
        };
        let Some(results) = results else {
            tracing::debug!("poller cancelled mid-cycle, discarding in-flight results");
            self.state.phase = PollPhase::Idle;
            self.publish().await;
            return false;
        };

        let report = self.complete_cycle(results, started);
        self.state.next_poll_at = next_poll_at(self.settings.poll_period());
        self.publish().await;
        notify(events, PollEvent::CycleCompleted(report));
        true
    }

    async fn apply_command(
        &mut self,
        command: Command,
        ticker: &mut Interval,
        events: &mpsc::Sender<PollEvent>,
    ) {
        let applied = match command {
            Command::SetInterval(minutes) => match self.set_interval_minutes(minutes) {
                Ok(()) => {
                    let period = self.settings.poll_period();
                    *ticker = new_ticker(Instant::now() + period, period);
                    self.state.next_poll_at = next_poll_at(period);
                    tracing::debug!(interval_minutes = minutes, "poll timer re-armed");
                    Ok(self.reevaluate().await)
                }
                Err(e) => Err(e),
            },
            Command::SetThreshold(value) => self.set_threshold(value).await,
            Command::SetUnit(unit) => Ok(self.set_unit(unit).await),
            Command::Watch(name) => self.watch_location(&name).await,
            Command::RefreshNow => Ok(None),
        };

        match applied {
            Ok(alert_change) => notify(events, PollEvent::SettingsApplied { alert_change }),
            Err(err) => tracing::warn!(error = %err, "settings command rejected"),
        }
    }
}

fn new_ticker(start: Instant, period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn next_poll_at(period: Duration) -> Option<chrono::DateTime<Utc>> {
    chrono::Duration::from_std(period)
        .ok()
        .map(|delta| Utc::now() + delta)
}

fn notify(events: &mpsc::Sender<PollEvent>, event: PollEvent) {
    if let Err(err) = events.try_send(event) {
        tracing::debug!(error = %err, "poll event dropped");
    }
}

/// Control handle for a spawned [`PollOrchestrator`].
///
/// Dropping the handle cancels the polling task.
#[derive(Debug)]
pub struct PollHandle {
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
    state: SharedEngineState,
    locations: Vec<Location>,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Clone of the latest published state.
    pub async fn snapshot(&self) -> EngineState {
        self.state.read().await.clone()
    }

    pub fn shared_state(&self) -> SharedEngineState {
        Arc::clone(&self.state)
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub async fn set_interval_minutes(&self, minutes: u32) -> Result<(), OrchestratorError> {
        settings::check_interval(minutes)?;
        self.send(Command::SetInterval(minutes)).await
    }

    pub async fn set_threshold(&self, value: f64) -> Result<(), OrchestratorError> {
        settings::check_threshold(value)?;
        self.send(Command::SetThreshold(value)).await
    }

    pub async fn set_unit(&self, unit: TemperatureUnit) -> Result<(), OrchestratorError> {
        self.send(Command::SetUnit(unit)).await
    }

    pub async fn watch_location(&self, name: &str) -> Result<(), OrchestratorError> {
        settings::check_location(name, &self.locations)?;
        self.send(Command::Watch(name.to_string())).await
    }

    /// Poll now and restart the period from here.
    pub async fn refresh_now(&self) -> Result<(), OrchestratorError> {
        self.send(Command::RefreshNow).await
    }

    /// Cancel the timer and wait for the task to exit. A cycle in flight is
    /// abandoned and its results discarded.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "poller task ended abnormally");
            }
        }
    }

    async fn send(&self, command: Command) -> Result<(), OrchestratorError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| OrchestratorError::Stopped)
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
