//! Silent engine for dry runs
//!
//! Walks the text word by word at the requested rate, reporting boundaries
//! and completion without producing audio.

use super::{SpeechEngine, Utterance, UtteranceEvents};
use crate::error::SpeechError;
use crate::voices::Voice;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::info;

const WORDS_PER_MINUTE: f32 = 180.0;

#[derive(Debug)]
pub struct SilentEngine {
    speaking: Arc<AtomicBool>,
    paused: watch::Sender<bool>,
    current: Mutex<Option<Arc<Notify>>>,
}

impl Default for SilentEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SilentEngine {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            speaking: Arc::new(AtomicBool::new(false)),
            paused,
            current: Mutex::new(None),
        }
    }
}

fn word_duration(rate: f32) -> Duration {
    Duration::from_secs_f32(60.0 / (WORDS_PER_MINUTE * rate.max(0.1)))
}

fn word_starts(text: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut after_space = true;
    for (i, c) in text.char_indices() {
        if after_space && !c.is_whitespace() {
            starts.push(i);
        }
        after_space = c.is_whitespace();
    }
    starts
}

impl SpeechEngine for SilentEngine {
    fn name(&self) -> &str {
        "silent"
    }

    fn list_voices(&self) -> Vec<Voice> {
        vec![Voice::new("Silent", "en-US").with_default(true)]
    }

    fn speak(&self, utterance: Utterance, events: UtteranceEvents) -> Result<(), SpeechError> {
        info!("🔇 (silent #{}) {}", events.id(), utterance.text);

        let stop = Arc::new(Notify::new());
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(stop.clone());
        let mut paused = self.paused.subscribe();
        let speaking = self.speaking.clone();
        speaking.store(true, Ordering::SeqCst);
        let per_word = word_duration(utterance.rate);

        tokio::spawn(async move {
            events.start();
            for index in word_starts(&utterance.text) {
                events.boundary(index, "word");
                let advanced = async {
                    while *paused.borrow() {
                        if paused.changed().await.is_err() {
                            break;
                        }
                    }
                    tokio::time::sleep(per_word).await;
                };
                tokio::select! {
                    _ = advanced => {}
                    _ = stop.notified() => {
                        speaking.store(false, Ordering::SeqCst);
                        return;
                    }
                }
            }
            speaking.store(false, Ordering::SeqCst);
            events.end();
        });
        Ok(())
    }

    fn cancel(&self) {
        if let Some(stop) = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            stop.notify_one();
        }
        self.paused.send_replace(false);
    }

    fn pause(&self) {
        self.paused.send_replace(true);
    }

    fn resume(&self) {
        self.paused.send_replace(false);
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }
}
