//! Speech lifecycle events and listener registry.

use super::UtteranceId;
use crate::error::SpeechError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

const EVENT_CHANNEL_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Start,
    End,
    Error,
    Pause,
    Resume,
    Boundary,
    Queued,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum SpeechEvent {
    Start { id: UtteranceId },
    End { id: UtteranceId },
    Error { id: UtteranceId, error: SpeechError },
    Pause { id: UtteranceId },
    Resume { id: UtteranceId },
    Boundary { id: UtteranceId, char_index: usize, name: String },
    /// `position` is the 1-based place in the pending queue
    Queued { id: UtteranceId, position: usize },
    /// Number of utterances discarded, active one included
    Cancel { canceled: usize },
}

impl SpeechEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Start { .. } => EventKind::Start,
            Self::End { .. } => EventKind::End,
            Self::Error { .. } => EventKind::Error,
            Self::Pause { .. } => EventKind::Pause,
            Self::Resume { .. } => EventKind::Resume,
            Self::Boundary { .. } => EventKind::Boundary,
            Self::Queued { .. } => EventKind::Queued,
            Self::Cancel { .. } => EventKind::Cancel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&SpeechEvent) + Send + Sync>;

/// Fan-out for speech events: per-kind callbacks plus a broadcast stream.
pub struct EventBus {
    listeners: Mutex<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
    tx: broadcast::Sender<SpeechEvent>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            tx,
        }
    }

    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&SpeechEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Returns false if no such listener was registered for `kind`.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(registered) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = registered.len();
        registered.retain(|(listener_id, _)| *listener_id != id);
        before != registered.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpeechEvent> {
        self.tx.subscribe()
    }

    /// Deliver to callbacks and subscribers. Callbacks run without any lock
    /// held, so they may register listeners or drive the queue.
    pub fn emit(&self, event: SpeechEvent) {
        let callbacks: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event.kind())
            .map(|registered| registered.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default();

        for callback in callbacks {
            callback(&event);
        }
        let _ = self.tx.send(event);
    }
}
