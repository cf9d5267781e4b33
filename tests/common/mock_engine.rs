//! Mock speech engine for testing
//!
//! Records every submission and host call; tests drive completion by hand.

use readaloud::error::{SpeechError, SpeechErrorKind};
use readaloud::tts::{HostProfile, SpeechEngine, Utterance, UtteranceEvents};
use readaloud::voices::Voice;
use std::sync::mpsc as std_mpsc;
use std::sync::Mutex;
use tokio::sync::broadcast;

#[derive(Debug)]
pub struct MockEngine {
    profile: HostProfile,
    voices: Mutex<Vec<Voice>>,
    voices_tx: broadcast::Sender<()>,
    /// Every utterance handed to `speak`, in order
    pub submitted: Mutex<Vec<Utterance>>,
    /// Event sink of the utterance currently playing
    current: Mutex<Option<UtteranceEvents>>,
    /// Host primitives invoked, e.g. "pause", "resume", "cancel"
    pub calls: Mutex<Vec<&'static str>>,
    /// Reject the next `speak` call with this error
    pub reject_next: Mutex<Option<SpeechError>>,
    /// Report start and end as soon as an utterance is submitted
    pub auto_complete: bool,
    /// Host never signals voice changes; only polling sees them
    pub signals_voice_changes: bool,
    /// Blocks the next host `pause` until released, see [`MockEngine::hold_next_pause`]
    pause_gate: Mutex<Option<PauseGate>>,
}

#[derive(Debug)]
struct PauseGate {
    entered: std_mpsc::Sender<()>,
    release: std_mpsc::Receiver<()>,
}

/// Test side of a held `pause` call.
pub struct HeldPause {
    entered: std_mpsc::Receiver<()>,
    release: std_mpsc::Sender<()>,
}

impl HeldPause {
    /// Block until the engine is inside `pause`.
    pub fn wait_entered(&self) {
        self.entered.recv().expect("pause entered");
    }

    pub fn release(self) {
        let _ = self.release.send(());
    }
}

impl MockEngine {
    pub fn new(profile: HostProfile) -> Self {
        let (voices_tx, _) = broadcast::channel(8);
        Self {
            profile,
            voices: Mutex::new(Vec::new()),
            voices_tx,
            submitted: Mutex::new(Vec::new()),
            current: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            reject_next: Mutex::new(None),
            auto_complete: false,
            signals_voice_changes: true,
            pause_gate: Mutex::new(None),
        }
    }

    pub fn without_change_signal(mut self) -> Self {
        self.signals_voice_changes = false;
        self
    }

    /// Make the next host `pause` call block until the returned guard is released.
    pub fn hold_next_pause(&self) -> HeldPause {
        let (entered_tx, entered_rx) = std_mpsc::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        *self.pause_gate.lock().unwrap() = Some(PauseGate {
            entered: entered_tx,
            release: release_rx,
        });
        HeldPause {
            entered: entered_rx,
            release: release_tx,
        }
    }

    pub fn with_voices(self, voices: Vec<Voice>) -> Self {
        *self.voices.lock().unwrap() = voices;
        self
    }

    pub fn auto_completing(mut self) -> Self {
        self.auto_complete = true;
        self
    }

    /// Replace the voice list and fire the change signal.
    pub fn set_voices(&self, voices: Vec<Voice>) {
        *self.voices.lock().unwrap() = voices;
        let _ = self.voices_tx.send(());
    }

    pub fn submitted_texts(&self) -> Vec<String> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.text.clone())
            .collect()
    }

    pub fn last_submitted(&self) -> Utterance {
        self.submitted
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("nothing submitted")
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn current(&self) -> UtteranceEvents {
        self.current
            .lock()
            .unwrap()
            .clone()
            .expect("no utterance playing")
    }

    pub fn start_current(&self) {
        self.current().start();
    }

    pub fn finish_current(&self) {
        let events = self.current.lock().unwrap().take().expect("no utterance playing");
        events.end();
    }

    pub fn fail_current(&self, kind: SpeechErrorKind) {
        let events = self.current.lock().unwrap().take().expect("no utterance playing");
        events.error(kind, "mock failure");
    }

    /// Drop the event sink without a terminal event.
    pub fn drop_current(&self) {
        self.current.lock().unwrap().take();
    }

    pub fn boundary(&self, char_index: usize) {
        self.current().boundary(char_index, "word");
    }
}

impl SpeechEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn profile(&self) -> HostProfile {
        self.profile.clone()
    }

    fn list_voices(&self) -> Vec<Voice> {
        self.voices.lock().unwrap().clone()
    }

    fn voices_changed(&self) -> Option<broadcast::Receiver<()>> {
        self.signals_voice_changes
            .then(|| self.voices_tx.subscribe())
    }

    fn speak(&self, utterance: Utterance, events: UtteranceEvents) -> Result<(), SpeechError> {
        if let Some(error) = self.reject_next.lock().unwrap().take() {
            return Err(error);
        }
        self.submitted.lock().unwrap().push(utterance);
        if self.auto_complete {
            events.start();
            events.end();
        } else {
            *self.current.lock().unwrap() = Some(events);
        }
        Ok(())
    }

    fn cancel(&self) {
        self.calls.lock().unwrap().push("cancel");
        self.current.lock().unwrap().take();
    }

    fn pause(&self) {
        self.calls.lock().unwrap().push("pause");
        let gate = self.pause_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.entered.send(());
            let _ = gate.release.recv();
        }
    }

    fn resume(&self) {
        self.calls.lock().unwrap().push("resume");
    }

    fn is_speaking(&self) -> bool {
        self.current.lock().unwrap().is_some()
    }
}
