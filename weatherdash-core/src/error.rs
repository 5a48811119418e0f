use serde::Serialize;

use crate::normalize::NormalizeError;

/// Failures recorded by a poll cycle. None of them stops polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PollError {
    /// The source could not deliver a reply for one location.
    #[error("Failed to fetch weather for {location}: {reason}")]
    FetchFailure { location: String, reason: String },

    /// The reply for one location lacked a required field.
    #[error("Malformed observation for {location}: missing `{field}`")]
    MalformedObservation {
        location: String,
        field: &'static str,
    },

    /// Every tracked location failed in the same cycle.
    #[error("Failed to fetch weather data for all {attempted} locations")]
    TotalFailure { attempted: usize },
}

impl PollError {
    pub fn location(&self) -> Option<&str> {
        match self {
            PollError::FetchFailure { location, .. }
            | PollError::MalformedObservation { location, .. } => Some(location),
            PollError::TotalFailure { .. } => None,
        }
    }

    pub(crate) fn malformed(location: &str, err: NormalizeError) -> Self {
        match err {
            NormalizeError::MissingField(field) => PollError::MalformedObservation {
                location: location.to_string(),
                field,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_carries_field_path() {
        let err = PollError::malformed("Delhi", NormalizeError::MissingField("main.temp"));
        assert_eq!(err.location(), Some("Delhi"));
        assert_eq!(
            err.to_string(),
            "Malformed observation for Delhi: missing `main.temp`"
        );
    }

    #[test]
    fn total_failure_serializes_with_kind_tag() {
        let json = serde_json::to_value(PollError::TotalFailure { attempted: 6 })
            .expect("serializable");
        assert_eq!(json["kind"], "total_failure");
        assert_eq!(json["attempted"], 6);
    }
}
