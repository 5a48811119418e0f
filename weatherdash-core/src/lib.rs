//! Core library for the `weatherdash` terminal dashboard.
//!
//! This crate defines:
//! - Unit conversion and the provider-reply normalizer
//! - The daily aggregator and threshold alert evaluator
//! - The poll orchestrator that owns and publishes dashboard state
//! - The observation source abstraction and its OpenWeather implementation
//! - Configuration handling
//!
//! It is used by `weatherdash-cli`, but the engine has no terminal dependencies
//! and can back any other front end.

pub mod aggregate;
pub mod alert;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod provider;
pub mod settings;
pub mod units;

pub use aggregate::DailyAggregator;
pub use alert::{AlertChange, AlertSet};
pub use config::Config;
pub use engine::{CycleOutcome, CycleReport, EngineState, PollPhase, SharedEngineState};
pub use error::PollError;
pub use model::{Alert, ConditionKind, DailySummary, Location, Observation};
pub use normalize::{NormalizeError, RawSnapshot, normalize};
pub use orchestrator::{OrchestratorError, PollEvent, PollHandle, PollOrchestrator};
pub use provider::{FetchError, ObservationSource, OpenWeatherProvider};
pub use settings::{Settings, SettingsError};
pub use units::TemperatureUnit;
