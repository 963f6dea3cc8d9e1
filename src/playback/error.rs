use thiserror::Error;

use crate::session::{SaveError, SessionError};

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("playback already running")]
    AlreadyRunning,
    #[error("no active session: {0}")]
    Inactive(#[from] SessionError),
    #[error("could not save session: {0}")]
    Save(#[from] SaveError),
}

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("{0} must be a finite, non-negative number")]
    InvalidNumber(&'static str),
    #[error("{0} must be between 0 and 1")]
    RatioOutOfRange(&'static str),
    #[error("loop_length must be at least 1")]
    EmptyLoop,
}
