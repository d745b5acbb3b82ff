// Typed errors with thiserror. Surface meaningful messages to JS and the console.
// Media and timeline errors are recovered inside the crate; only config errors reach JS.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned across the JS boundary.
#[derive(Error, Debug)]
pub enum HeroError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("DOM unavailable: {0}")]
    Dom(String),
}

impl From<serde_json::Error> for HeroError {
    fn from(err: serde_json::Error) -> Self {
        HeroError::Serialization(err.to_string())
    }
}

/// Why a media operation did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// The element could not load its source. Terminal for that element.
    #[error("media failed to load: {0}")]
    LoadFailed(String),

    /// Autoplay policy refused the request. Routine on mobile.
    #[error("playback rejected: {0}")]
    PlaybackRejected(String),

    #[error("playback requested before media data was loaded")]
    NotReady,
}

impl MediaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::LoadFailed(_) => ErrorKind::LoadFailed,
            MediaError::PlaybackRejected(_) => ErrorKind::PlaybackRejected,
            MediaError::NotReady => ErrorKind::NotReady,
        }
    }
}

/// Last recorded media failure, kept by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    LoadFailed,
    PlaybackRejected,
    NotReady,
}

/// Intro timeline failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntroError {
    #[error("intro timeline stalled: no completion within {waited_ms}ms")]
    TimelineStalled { waited_ms: u32 },
}
