use crate::session::Phase;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("session is {actual}, expected {expected}")]
    InvalidPhase { expected: Phase, actual: Phase },

    #[error("no character with id `{0}` in the roster")]
    CharacterNotFound(String),

    #[error("comfort band [{min}, {max}] is not a valid range within 0..=100")]
    InvalidComfortBand { min: f64, max: f64 },

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
