use async_trait::async_trait;
use std::fmt::Debug;

use crate::{model::Location, normalize::RawSnapshot};

pub mod openweather;

pub use openweather::OpenWeatherProvider;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Provider request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse provider JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Something that returns one current-weather snapshot per call.
#[async_trait]
pub trait ObservationSource: Send + Sync + Debug {
    async fn fetch(&self, location: &Location) -> Result<RawSnapshot, FetchError>;
}
