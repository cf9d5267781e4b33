//! ReadAloud Error Types
//!
//! `SpeechError` is what a pending `speak()` settles with; `ReadAloudError`
//! is the crate-wide error for everything around it.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure categories reported for an utterance.
///
/// The string forms mirror the host engine error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpeechErrorKind {
    Canceled,
    Interrupted,
    AudioBusy,
    AudioHardware,
    Network,
    SynthesisUnavailable,
    SynthesisFailed,
    LanguageUnavailable,
    VoiceUnavailable,
    TextTooLong,
    InvalidArgument,
    NotAllowed,
}

impl SpeechErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Canceled => "canceled",
            Self::Interrupted => "interrupted",
            Self::AudioBusy => "audio-busy",
            Self::AudioHardware => "audio-hardware",
            Self::Network => "network",
            Self::SynthesisUnavailable => "synthesis-unavailable",
            Self::SynthesisFailed => "synthesis-failed",
            Self::LanguageUnavailable => "language-unavailable",
            Self::VoiceUnavailable => "voice-unavailable",
            Self::TextTooLong => "text-too-long",
            Self::InvalidArgument => "invalid-argument",
            Self::NotAllowed => "not-allowed",
        }
    }

    /// Transient conditions a caller may reasonably retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Canceled | Self::Interrupted | Self::AudioBusy | Self::Network
        )
    }
}

impl fmt::Display for SpeechErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure of a single utterance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct SpeechError {
    pub kind: SpeechErrorKind,
    pub message: String,
}

impl SpeechError {
    pub fn new(kind: SpeechErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn canceled() -> Self {
        Self::new(SpeechErrorKind::Canceled, "utterance was canceled")
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(SpeechErrorKind::InvalidArgument, message)
    }

    pub fn recoverable(&self) -> bool {
        self.kind.is_recoverable()
    }
}

#[derive(Serialize)]
struct SpeechErrorRepr<'a> {
    #[serde(rename = "type")]
    kind: SpeechErrorKind,
    message: &'a str,
    recoverable: bool,
}

impl Serialize for SpeechError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SpeechErrorRepr {
            kind: self.kind,
            message: &self.message,
            recoverable: self.recoverable(),
        }
        .serialize(serializer)
    }
}

/// Central error type for ReadAloud
#[derive(Error, Debug)]
pub enum ReadAloudError {
    #[error("Speech error: {0}")]
    Speech(#[from] SpeechError),

    #[error("Explain error: {0}")]
    Explain(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for ReadAloud operations
pub type ReadAloudResult<T> = Result<T, ReadAloudError>;
