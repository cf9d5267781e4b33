//! Voice list loading
//!
//! Some hosts load voices asynchronously after startup and either signal a
//! change late or never signal at all. The loader waits for whichever comes
//! first: a change signal, a non-empty poll, or the timeout.

use super::{VoiceCatalog, VoiceClassifier};
use crate::tts::SpeechEngine;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Owns the catalog snapshot and keeps it in sync with the host.
#[derive(Clone)]
pub struct VoiceLoader {
    engine: Arc<dyn SpeechEngine>,
    classifier: Arc<dyn VoiceClassifier>,
    catalog: Arc<RwLock<VoiceCatalog>>,
    ready: Arc<AtomicBool>,
    generation: Arc<AtomicUsize>,
    timeout: Duration,
    poll_interval: Duration,
}

impl std::fmt::Debug for VoiceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceLoader")
            .field("voices", &self.len())
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl VoiceLoader {
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        classifier: Arc<dyn VoiceClassifier>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            engine,
            classifier,
            catalog: Arc::new(RwLock::new(VoiceCatalog::new())),
            ready: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicUsize::new(0)),
            timeout,
            poll_interval,
        }
    }

    /// True once voices arrived or the load timed out.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Number of catalog rebuilds so far.
    pub fn generation(&self) -> usize {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.with_catalog(VoiceCatalog::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn with_catalog<T>(&self, f: impl FnOnce(&VoiceCatalog) -> T) -> T {
        let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        f(&catalog)
    }

    pub fn snapshot(&self) -> VoiceCatalog {
        self.with_catalog(VoiceCatalog::clone)
    }

    /// Rebuild the catalog from the host's current list.
    pub fn refresh(&self) -> usize {
        let voices = self.engine.list_voices();
        let catalog = VoiceCatalog::rebuild(&voices, self.classifier.as_ref());
        let count = catalog.len();
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = catalog;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("🎙️ Voice catalog rebuilt (gen {}): {} voices", generation, count);
        count
    }

    /// Wait for the initial voice list. Degrades to an empty catalog on timeout.
    pub async fn load(&self) -> usize {
        if !self.engine.list_voices().is_empty() {
            return self.mark_ready(self.refresh());
        }

        debug!("⏳ Host has no voices yet, waiting up to {:?}", self.timeout);
        let mut changed = self.engine.voices_changed();
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);
        let mut poll = tokio::time::interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    warn!(
                        "⚠️ No voices reported after {:?}, continuing with an empty catalog",
                        self.timeout
                    );
                    return self.mark_ready(self.len());
                }
                signal = next_change(&mut changed) => match signal {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        let count = self.refresh();
                        if count > 0 {
                            return self.mark_ready(count);
                        }
                    }
                    Err(RecvError::Closed) => changed = None,
                },
                _ = poll.tick() => {
                    if !self.engine.list_voices().is_empty() {
                        return self.mark_ready(self.refresh());
                    }
                }
            }
        }
    }

    /// Rebuild on every later host change signal. `None` if the host never signals.
    pub fn watch(&self) -> Option<JoinHandle<()>> {
        let mut changed = self.engine.voices_changed()?;
        let loader = self.clone();
        Some(tokio::spawn(async move {
            loop {
                match changed.recv().await {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        loader.refresh();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }))
    }

    fn mark_ready(&self, count: usize) -> usize {
        self.ready.store(true, Ordering::SeqCst);
        info!("🎙️ {} voices available", count);
        count
    }
}

async fn next_change(rx: &mut Option<broadcast::Receiver<()>>) -> Result<(), RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => futures::future::pending().await,
    }
}
