//! Utterance Queue
//!
//! Serializes speech requests against a host engine that can only speak one
//! utterance at a time.
//!
//! State machine:
//! - `Idle --submit--> Speaking` when nothing is active
//! - `Speaking --submit--> Speaking` with the request appended to the queue
//! - `Speaking --end/error--> Idle`, then the next queued request is submitted
//! - `Speaking --pause--> Paused --resume--> Speaking` (if the host supports it)
//! - `any --cancel--> Idle`, discarding the active request and the queue

use super::chunker::chunk_text;
use super::events::{EventBus, EventKind, ListenerId, SpeechEvent};
use super::{EngineEvent, HostProfile, SpeechEngine, Utterance, UtteranceEvents, UtteranceId};
use crate::error::{SpeechError, SpeechErrorKind};
use crate::voices::{
    select, Gender, KeywordClassifier, Voice, VoiceClassifier, VoiceCriteria, VoiceLoader,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Per-call speech options. Unset fields fall back to neutral defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeakOptions {
    pub lang: Option<String>,
    pub voice_name: Option<String>,
    pub gender: Option<Gender>,
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
    pub volume: Option<f32>,
    /// Cancel everything active or queued before speaking
    #[serde(default)]
    pub immediate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueueState {
    Idle,
    Speaking,
    Paused,
}

/// Snapshot for UI consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeechStatus {
    pub speaking: bool,
    pub paused: bool,
    pub ready: bool,
    pub voices_count: usize,
    pub queue_length: usize,
}

pub struct QueueOptions {
    /// Overrides the engine's own profile when set
    pub profile: Option<HostProfile>,
    pub classifier: Arc<dyn VoiceClassifier>,
    pub voice_load_timeout: Duration,
    pub voice_poll_interval: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            profile: None,
            classifier: Arc::new(KeywordClassifier),
            voice_load_timeout: Duration::from_secs(3),
            voice_poll_interval: Duration::from_millis(100),
        }
    }
}

type Completion = oneshot::Sender<Result<(), SpeechError>>;

struct Pending {
    utterance: Utterance,
    /// Chunks of one `submit` call share a group
    group: u64,
    done: Completion,
}

struct Active {
    id: UtteranceId,
    group: u64,
    done: Option<Completion>,
    listener: Option<JoinHandle<()>>,
    keep_alive: Option<JoinHandle<()>>,
}

impl Active {
    fn settle(&mut self, result: Result<(), SpeechError>) {
        if let Some(keep_alive) = self.keep_alive.take() {
            keep_alive.abort();
        }
        if let Some(done) = self.done.take() {
            let _ = done.send(result);
        }
    }
}

#[derive(Default)]
struct Inner {
    active: Option<Active>,
    queue: VecDeque<Pending>,
    paused: bool,
}

struct Shared {
    engine: Arc<dyn SpeechEngine>,
    profile: HostProfile,
    voices: VoiceLoader,
    events: EventBus,
    inner: Mutex<Inner>,
    next_id: AtomicU64,
    voice_watch: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(watch) = self
            .voice_watch
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            watch.abort();
        }
    }
}

/// Exclusive owner of the host engine. Cheap to clone.
#[derive(Clone)]
pub struct SpeechQueue {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for SpeechQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechQueue")
            .field("engine", &self.shared.engine.name())
            .field("status", &self.status())
            .finish()
    }
}

/// Completion of one `submit` call, covering all of its chunks.
#[derive(Debug)]
pub struct SpeechHandle {
    ids: Vec<UtteranceId>,
    receivers: Vec<oneshot::Receiver<Result<(), SpeechError>>>,
}

impl SpeechHandle {
    pub fn ids(&self) -> &[UtteranceId] {
        &self.ids
    }

    /// Resolves once every chunk finished, or with the first failure.
    pub async fn wait(self) -> Result<(), SpeechError> {
        for rx in self.receivers {
            match rx.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                // Sender dropped without a result: the queue went away.
                Err(_) => return Err(SpeechError::canceled()),
            }
        }
        Ok(())
    }
}

impl SpeechQueue {
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        Self::with_options(engine, QueueOptions::default())
    }

    pub fn with_options(engine: Arc<dyn SpeechEngine>, options: QueueOptions) -> Self {
        let profile = options.profile.unwrap_or_else(|| engine.profile());
        let voices = VoiceLoader::new(
            engine.clone(),
            options.classifier,
            options.voice_load_timeout,
            options.voice_poll_interval,
        );
        Self {
            shared: Arc::new(Shared {
                engine,
                profile,
                voices,
                events: EventBus::new(),
                inner: Mutex::new(Inner::default()),
                next_id: AtomicU64::new(1),
                voice_watch: Mutex::new(None),
            }),
        }
    }

    /// Wait for the host voice list (or the load timeout), then keep the
    /// catalog in sync with later host changes. Returns the voice count.
    pub async fn initialize(&self) -> usize {
        let count = self.shared.voices.load().await;
        let mut watch = self
            .shared
            .voice_watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if watch.is_none() {
            *watch = self.shared.voices.watch();
        }
        info!(
            "🔊 Speech queue ready on '{}' with {} voices",
            self.shared.engine.name(),
            count
        );
        count
    }

    pub fn profile(&self) -> &HostProfile {
        &self.shared.profile
    }

    pub fn voices(&self) -> &VoiceLoader {
        &self.shared.voices
    }

    /// Speak `text` and wait until it finished.
    pub async fn speak(&self, text: &str, options: SpeakOptions) -> Result<(), SpeechError> {
        self.submit(text, options)?.wait().await
    }

    /// Queue `text` without waiting. Must be called inside a Tokio runtime.
    pub fn submit(&self, text: &str, options: SpeakOptions) -> Result<SpeechHandle, SpeechError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SpeechError::invalid_argument("text must not be empty"));
        }

        let voice = self.resolve_voice(&options);
        let profile = &self.shared.profile;
        let rate = profile.clamp_rate(options.rate.unwrap_or(1.0));
        let pitch = profile.clamp_pitch(options.pitch.unwrap_or(1.0));
        let volume = profile.clamp_volume(options.volume.unwrap_or(1.0));
        let lang = options
            .lang
            .clone()
            .or_else(|| voice.as_ref().map(|v| v.lang.clone()));

        let chunks = match profile.max_utterance_len {
            Some(max) if text.chars().count() > max => {
                let chunks = chunk_text(text, max);
                debug!("✂️ Split {} chars into {} chunks", text.len(), chunks.len());
                chunks
            }
            _ => vec![text.to_string()],
        };

        if options.immediate {
            self.cancel();
        }

        let group = self.shared.next_id();
        let mut ids = Vec::with_capacity(chunks.len());
        let mut receivers = Vec::with_capacity(chunks.len());
        {
            let mut inner = self.shared.lock();
            for chunk in chunks {
                let id = self.shared.next_id();
                let (done, rx) = oneshot::channel();
                inner.queue.push_back(Pending {
                    utterance: Utterance {
                        id,
                        text: chunk,
                        voice: voice.clone(),
                        lang: lang.clone(),
                        rate,
                        pitch,
                        volume,
                    },
                    group,
                    done,
                });
                ids.push(id);
                receivers.push(rx);
            }
        }

        self.shared.pump();
        self.shared.emit_all(self.shared.queued_events(&ids));
        Ok(SpeechHandle { ids, receivers })
    }

    /// Returns false when the host cannot pause or nothing is playing.
    pub fn pause(&self) -> bool {
        if !self.shared.profile.pause_resume_supported {
            debug!("⏸️ Pause not supported by '{}'", self.shared.engine.name());
            return false;
        }
        let id = {
            let mut inner = self.shared.lock();
            let id = match &inner.active {
                Some(active) if !inner.paused => active.id,
                _ => return false,
            };
            self.shared.engine.pause();
            inner.paused = true;
            id
        };
        self.shared.events.emit(SpeechEvent::Pause { id });
        true
    }

    pub fn resume(&self) -> bool {
        if !self.shared.profile.pause_resume_supported {
            return false;
        }
        let id = {
            let mut inner = self.shared.lock();
            let id = match &inner.active {
                Some(active) if inner.paused => active.id,
                _ => return false,
            };
            self.shared.engine.resume();
            inner.paused = false;
            id
        };
        self.shared.events.emit(SpeechEvent::Resume { id });
        true
    }

    /// Discard the active utterance and everything queued. No-op when idle.
    pub fn cancel(&self) {
        let (active, drained) = {
            let mut inner = self.shared.lock();
            let active = inner.active.take();
            let drained: Vec<Pending> = inner.queue.drain(..).collect();
            inner.paused = false;
            if active.is_some() {
                self.shared.engine.cancel();
            }
            (active, drained)
        };

        let canceled = usize::from(active.is_some()) + drained.len();
        if canceled == 0 {
            return;
        }

        if let Some(mut active) = active {
            if let Some(listener) = active.listener.take() {
                listener.abort();
            }
            active.settle(Err(SpeechError::canceled()));
        }
        for pending in drained {
            let _ = pending.done.send(Err(SpeechError::canceled()));
        }

        info!("🛑 Canceled {} utterance(s)", canceled);
        self.shared.events.emit(SpeechEvent::Cancel { canceled });
    }

    pub fn state(&self) -> QueueState {
        let inner = self.shared.lock();
        match (&inner.active, inner.paused) {
            (None, _) => QueueState::Idle,
            (Some(_), false) => QueueState::Speaking,
            (Some(_), true) => QueueState::Paused,
        }
    }

    pub fn status(&self) -> SpeechStatus {
        let (speaking, paused, queue_length) = {
            let inner = self.shared.lock();
            (inner.active.is_some(), inner.paused, inner.queue.len())
        };
        SpeechStatus {
            speaking,
            paused,
            ready: self.shared.voices.is_ready(),
            voices_count: self.shared.voices.len(),
            queue_length,
        }
    }

    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&SpeechEvent) + Send + Sync + 'static,
    {
        self.shared.events.on(kind, callback)
    }

    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.shared.events.off(kind, id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpeechEvent> {
        self.shared.events.subscribe()
    }

    fn resolve_voice(&self, options: &SpeakOptions) -> Option<Voice> {
        let criteria = VoiceCriteria {
            name: options.voice_name.clone(),
            lang: options.lang.clone(),
            gender: options.gender,
        };
        self.shared.voices.with_catalog(|catalog| select(catalog, &criteria))
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// `Queued` events for those of `ids` still waiting, with their 1-based position.
    fn queued_events(&self, ids: &[UtteranceId]) -> Vec<SpeechEvent> {
        let inner = self.lock();
        inner
            .queue
            .iter()
            .enumerate()
            .filter(|(_, pending)| ids.contains(&pending.utterance.id))
            .map(|(index, pending)| SpeechEvent::Queued {
                id: pending.utterance.id,
                position: index + 1,
            })
            .collect()
    }

    fn emit_all(&self, events: Vec<SpeechEvent>) {
        for event in events {
            self.events.emit(event);
        }
    }

    /// Submit queued requests until one is accepted by the host or the queue is empty.
    fn pump(self: &Arc<Self>) {
        let mut out = Vec::new();
        {
            let mut inner = self.lock();
            while inner.active.is_none() {
                let Some(pending) = inner.queue.pop_front() else {
                    break;
                };
                let Pending {
                    utterance,
                    group,
                    done,
                } = pending;
                let id = utterance.id;

                let runtime = match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => runtime,
                    Err(_) => {
                        let error = SpeechError::new(
                            SpeechErrorKind::SynthesisUnavailable,
                            "speech queue used outside a Tokio runtime",
                        );
                        Self::fail_pending(&mut inner, id, group, done, error, &mut out);
                        continue;
                    }
                };

                let (tx, rx) = mpsc::unbounded_channel();
                debug!("🗣️ Submitting utterance {} ({} chars)", id, utterance.text.len());
                if let Err(error) = self.engine.speak(utterance, UtteranceEvents::new(id, tx)) {
                    warn!("❌ Engine rejected utterance {}: {}", id, error);
                    Self::fail_pending(&mut inner, id, group, done, error, &mut out);
                    continue;
                }

                let weak = Arc::downgrade(self);
                let listener = runtime.spawn(listen(weak.clone(), id, rx));
                let keep_alive = self
                    .profile
                    .keep_alive_interval
                    .map(|period| runtime.spawn(keep_alive(weak, id, period)));

                inner.active = Some(Active {
                    id,
                    group,
                    done: Some(done),
                    listener: Some(listener),
                    keep_alive,
                });
            }
        }
        self.emit_all(out);
    }

    fn fail_pending(
        inner: &mut Inner,
        id: UtteranceId,
        group: u64,
        done: Completion,
        error: SpeechError,
        out: &mut Vec<SpeechEvent>,
    ) {
        let _ = done.send(Err(error.clone()));
        inner.queue.retain(|p| p.group != group);
        out.push(SpeechEvent::Error { id, error });
    }

    /// Returns true once the utterance reached a terminal state or is no
    /// longer the active one.
    fn handle_engine_event(self: &Arc<Self>, id: UtteranceId, event: EngineEvent) -> bool {
        let mut out = Vec::new();
        let terminal = {
            let mut inner = self.lock();
            if inner.active.as_ref().map(|a| a.id) != Some(id) {
                return true;
            }
            match event {
                EngineEvent::Start => {
                    out.push(SpeechEvent::Start { id });
                    false
                }
                EngineEvent::Boundary { char_index, name } => {
                    out.push(SpeechEvent::Boundary {
                        id,
                        char_index,
                        name,
                    });
                    false
                }
                // Host pause/resume also fire for the keep-alive cycle; the
                // queue reports its own pause/resume instead.
                EngineEvent::Pause | EngineEvent::Resume => false,
                EngineEvent::End => {
                    if let Some(mut active) = inner.active.take() {
                        active.settle(Ok(()));
                    }
                    inner.paused = false;
                    out.push(SpeechEvent::End { id });
                    true
                }
                EngineEvent::Error(error) => {
                    warn!("❌ Utterance {} failed: {}", id, error);
                    if let Some(mut active) = inner.active.take() {
                        active.settle(Err(error.clone()));
                        inner.queue.retain(|p| p.group != active.group);
                    }
                    inner.paused = false;
                    out.push(SpeechEvent::Error { id, error });
                    true
                }
            }
        };

        self.emit_all(out);
        if terminal {
            self.pump();
        }
        terminal
    }

    /// One pause/resume cycle on the host, under the same lock `pause()` and
    /// `resume()` take. Returns false once `id` is no longer active.
    fn keep_alive_cycle(&self, id: UtteranceId) -> bool {
        let inner = self.lock();
        match &inner.active {
            Some(active) if active.id == id => {
                // Paused by the caller; leave it alone.
                if !inner.paused {
                    debug!("💓 Keep-alive cycle for utterance {}", id);
                    self.engine.pause();
                    self.engine.resume();
                }
                true
            }
            _ => false,
        }
    }
}

/// Adapter from the host's callback stream to the queue state machine.
async fn listen(
    shared: Weak<Shared>,
    id: UtteranceId,
    mut rx: mpsc::UnboundedReceiver<EngineEvent>,
) {
    while let Some(event) = rx.recv().await {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if shared.handle_engine_event(id, event) {
            return;
        }
    }

    if let Some(shared) = shared.upgrade() {
        let error = SpeechError::new(
            SpeechErrorKind::SynthesisFailed,
            "engine dropped the utterance without finishing it",
        );
        shared.handle_engine_event(id, EngineEvent::Error(error));
    }
}

/// Pause/resume cycle for hosts that silently cut off long utterances.
async fn keep_alive(shared: Weak<Shared>, id: UtteranceId, period: Duration) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if !shared.keep_alive_cycle(id) {
            return;
        }
    }
}
