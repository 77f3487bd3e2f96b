use crate::types::Day;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid distribution: weights must contain a positive, finite total")]
    InvalidDistribution,

    #[error("No actions available for persona '{persona_id}' on day {day}")]
    NoActionsAvailable { persona_id: String, day: Day },

    #[error("Product adapter failed: {0}")]
    Adapter(#[source] anyhow::Error),

    #[error("Invalid persona '{persona_id}': {reason}")]
    InvalidPersona { persona_id: String, reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Run cancelled on day {day}")]
    Cancelled { day: Day },

    #[error("Telemetry sink failed: {0}")]
    Sink(String),
}

pub type SimResult<T> = Result<T, SimError>;
