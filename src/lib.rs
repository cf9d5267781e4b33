//! ReadAloud Library
//!
//! Speaks selected text through the host speech engine and explains it
//! through a chat-completion service.

pub mod config;
pub mod core;
pub mod error;
pub mod tts;
pub mod voices;

pub use error::{ReadAloudError, ReadAloudResult, SpeechError, SpeechErrorKind};
pub use tts::{SpeakOptions, SpeechEngine, SpeechQueue};
