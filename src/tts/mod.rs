//! TTS (Text-to-Speech) Module
//!
//! The host speech engine boundary plus the queue that owns it.

use crate::config::Config;
use crate::error::{SpeechError, SpeechErrorKind};
use crate::voices::Voice;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

pub mod chunker;
pub mod events;
pub mod queue;
pub mod silent;
pub mod system;

pub use events::{EventKind, ListenerId, SpeechEvent};
pub use queue::{QueueOptions, QueueState, SpeakOptions, SpeechHandle, SpeechQueue, SpeechStatus};

pub type UtteranceId = u64;

pub const MIN_RATE: f32 = 0.1;
/// Rate ceiling on hosts whose engine misbehaves above 2x.
pub const LIMITED_MAX_RATE: f32 = 2.0;
pub const MAX_RATE: f32 = 10.0;

/// A single request submitted to the host engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub voice: Option<Voice>,
    pub lang: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// What the host reports back while an utterance plays.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Start,
    End,
    Error(SpeechError),
    Pause,
    Resume,
    Boundary { char_index: usize, name: String },
}

/// Per-utterance event sink handed to the engine.
///
/// Each submission gets its own channel, so events from an utterance that
/// was already canceled can never be mistaken for the next one's.
#[derive(Debug, Clone)]
pub struct UtteranceEvents {
    id: UtteranceId,
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl UtteranceEvents {
    pub fn new(id: UtteranceId, tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> UtteranceId {
        self.id
    }

    /// Returns false once the queue stopped listening for this utterance.
    pub fn send(&self, event: EngineEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn start(&self) -> bool {
        self.send(EngineEvent::Start)
    }

    pub fn end(&self) -> bool {
        self.send(EngineEvent::End)
    }

    pub fn error(&self, kind: SpeechErrorKind, message: impl Into<String>) -> bool {
        self.send(EngineEvent::Error(SpeechError::new(kind, message)))
    }

    pub fn boundary(&self, char_index: usize, name: impl Into<String>) -> bool {
        self.send(EngineEvent::Boundary {
            char_index,
            name: name.into(),
        })
    }
}

/// Known limitations of a host engine.
#[derive(Debug, Clone, PartialEq)]
pub struct HostProfile {
    /// Engine breaks above 2x rate
    pub limited_rate: bool,
    pub pause_resume_supported: bool,
    /// Longest text the engine accepts in one utterance, in chars
    pub max_utterance_len: Option<usize>,
    /// Pause/resume cycle period for engines that silently drop long utterances
    pub keep_alive_interval: Option<Duration>,
}

impl Default for HostProfile {
    fn default() -> Self {
        Self {
            limited_rate: false,
            pause_resume_supported: true,
            max_utterance_len: None,
            keep_alive_interval: None,
        }
    }
}

impl HostProfile {
    pub fn max_rate(&self) -> f32 {
        if self.limited_rate {
            LIMITED_MAX_RATE
        } else {
            MAX_RATE
        }
    }

    pub fn clamp_rate(&self, rate: f32) -> f32 {
        clamp_or_default(rate, MIN_RATE, self.max_rate())
    }

    pub fn clamp_pitch(&self, pitch: f32) -> f32 {
        clamp_or_default(pitch, 0.0, 2.0)
    }

    pub fn clamp_volume(&self, volume: f32) -> f32 {
        clamp_or_default(volume, 0.0, 1.0)
    }

    /// Apply user overrides from the config on top of the engine's own profile.
    pub fn with_overrides(mut self, config: &Config) -> Self {
        if let Some(max) = config.max_utterance_len {
            self.max_utterance_len = (max > 0).then_some(max);
        }
        if let Some(secs) = config.keep_alive_secs {
            self.keep_alive_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        self
    }
}

fn clamp_or_default(value: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        1.0_f32.clamp(min, max)
    }
}

/// Host speech-synthesis capability.
///
/// Primitives are fire-and-forget like the host's own; progress comes back
/// through the [`UtteranceEvents`] passed to `speak`.
pub trait SpeechEngine: Send + Sync + std::fmt::Debug {
    /// Get the engine name
    fn name(&self) -> &str;

    fn profile(&self) -> HostProfile {
        HostProfile::default()
    }

    /// May be empty while the host is still loading voices.
    fn list_voices(&self) -> Vec<Voice>;

    /// Signals each time the host voice list changes. `None` if the host never signals.
    fn voices_changed(&self) -> Option<broadcast::Receiver<()>> {
        None
    }

    fn speak(&self, utterance: Utterance, events: UtteranceEvents) -> Result<(), SpeechError>;

    fn cancel(&self);

    fn pause(&self);

    fn resume(&self);

    fn is_speaking(&self) -> bool;
}

/// Factory to create the configured host engine
pub fn create_engine(config: &Config) -> Result<Arc<dyn SpeechEngine>> {
    info!("🛠️ Creating speech engine: {}", config.engine);
    let engine: Arc<dyn SpeechEngine> = match config.engine.as_str() {
        "system" | "speechd" => {
            info!("  - Using speech-dispatcher (spd-say)");
            Arc::new(system::SystemEngine::new())
        }
        "silent" => {
            info!("  - Using silent engine");
            Arc::new(silent::SilentEngine::new())
        }
        _ => {
            warn!(
                "  - Unknown engine '{}', falling back to System",
                config.engine
            );
            Arc::new(system::SystemEngine::new())
        }
    };
    info!("✅ Speech engine '{}' initialized", engine.name());
    Ok(engine)
}
