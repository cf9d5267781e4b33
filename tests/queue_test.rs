use readaloud::error::SpeechErrorKind;
use readaloud::tts::{
    EventKind, HostProfile, QueueState, SpeakOptions, SpeechEvent, SpeechQueue,
};
use readaloud::voices::Voice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::mock_engine::MockEngine;
use common::{secs, settle};

fn queue_with(engine: MockEngine) -> (SpeechQueue, Arc<MockEngine>) {
    let engine = Arc::new(engine);
    (SpeechQueue::new(engine.clone()), engine)
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<SpeechEvent>) -> Vec<SpeechEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_requests_play_one_at_a_time_in_order() {
    let (queue, engine) = queue_with(MockEngine::new(HostProfile::default()));

    let hello = queue.submit("Hello", SpeakOptions::default()).expect("submit");
    let world = queue.submit("World", SpeakOptions::default()).expect("submit");

    assert_eq!(engine.submitted_texts(), ["Hello"]);
    assert_eq!(queue.status().queue_length, 1);
    assert_eq!(queue.state(), QueueState::Speaking);

    engine.finish_current();
    settle().await;
    assert_eq!(engine.submitted_texts(), ["Hello", "World"]);
    assert_eq!(queue.status().queue_length, 0);

    engine.finish_current();
    hello.wait().await.expect("hello finished");
    world.wait().await.expect("world finished");
    settle().await;
    assert_eq!(queue.state(), QueueState::Idle);
}

#[tokio::test]
async fn test_immediate_preempts_active_and_queued() {
    let (queue, engine) = queue_with(MockEngine::new(HostProfile::default()));

    let first = queue.submit("first", SpeakOptions::default()).expect("submit");
    let second = queue.submit("second", SpeakOptions::default()).expect("submit");
    let urgent = queue
        .submit(
            "urgent",
            SpeakOptions {
                immediate: true,
                ..SpeakOptions::default()
            },
        )
        .expect("submit");

    let err = first.wait().await.unwrap_err();
    assert_eq!(err.kind, SpeechErrorKind::Canceled);
    assert!(err.recoverable());
    assert_eq!(
        second.wait().await.unwrap_err().kind,
        SpeechErrorKind::Canceled
    );

    assert_eq!(engine.submitted_texts(), ["first", "urgent"]);
    assert!(engine.calls().contains(&"cancel"));
    assert_eq!(queue.status().queue_length, 0);
    assert_eq!(queue.state(), QueueState::Speaking);

    engine.finish_current();
    urgent.wait().await.expect("urgent finished");
}

#[tokio::test]
async fn test_empty_text_is_invalid_argument() {
    let (queue, engine) = queue_with(MockEngine::new(HostProfile::default()));

    let err = queue.speak("", SpeakOptions::default()).await.unwrap_err();
    assert_eq!(err.kind, SpeechErrorKind::InvalidArgument);
    assert!(!err.recoverable());

    let err = queue.speak(" \n\t", SpeakOptions::default()).await.unwrap_err();
    assert_eq!(err.kind, SpeechErrorKind::InvalidArgument);
    assert!(engine.submitted_texts().is_empty());
}

#[tokio::test]
async fn test_pause_is_noop_when_host_cannot_pause() {
    let profile = HostProfile {
        pause_resume_supported: false,
        ..HostProfile::default()
    };
    let (queue, engine) = queue_with(MockEngine::new(profile));

    let _handle = queue.submit("Hello", SpeakOptions::default()).expect("submit");
    assert!(!queue.pause());
    assert_eq!(queue.state(), QueueState::Speaking);
    assert!(!queue.resume());
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_pause_and_resume() {
    let (queue, engine) = queue_with(MockEngine::new(HostProfile::default()));
    let mut rx = queue.subscribe();

    assert!(!queue.pause(), "nothing to pause while idle");

    let handle = queue.submit("Hello", SpeakOptions::default()).expect("submit");
    let id = handle.ids()[0];
    assert!(queue.pause());
    assert_eq!(queue.state(), QueueState::Paused);
    assert!(!queue.pause());
    assert!(queue.status().paused);

    assert!(queue.resume());
    assert_eq!(queue.state(), QueueState::Speaking);
    assert!(!queue.resume());

    assert_eq!(engine.calls(), ["pause", "resume"]);
    assert_eq!(
        drain(&mut rx),
        [SpeechEvent::Pause { id }, SpeechEvent::Resume { id }]
    );

    engine.finish_current();
    handle.wait().await.expect("finished");
}

#[tokio::test]
async fn test_cancel_when_idle_is_noop() {
    let (queue, engine) = queue_with(MockEngine::new(HostProfile::default()));
    let mut rx = queue.subscribe();

    queue.cancel();
    queue.cancel();

    assert_eq!(queue.state(), QueueState::Idle);
    assert!(engine.calls().is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_cancel_settles_everything() {
    let (queue, engine) = queue_with(MockEngine::new(HostProfile::default()));
    let mut rx = queue.subscribe();

    let handles: Vec<_> = ["one", "two", "three"]
        .into_iter()
        .map(|t| queue.submit(t, SpeakOptions::default()).expect("submit"))
        .collect();
    queue.cancel();

    for handle in handles {
        assert_eq!(handle.wait().await.unwrap_err().kind, SpeechErrorKind::Canceled);
    }
    assert_eq!(queue.state(), QueueState::Idle);
    assert_eq!(queue.status().queue_length, 0);
    assert_eq!(engine.calls(), ["cancel"]);

    let cancels: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|e| e.kind() == EventKind::Cancel)
        .collect();
    assert_eq!(cancels, [SpeechEvent::Cancel { canceled: 3 }]);

    // Late events from the canceled utterance are ignored.
    settle().await;
    assert_eq!(queue.state(), QueueState::Idle);
}

#[tokio::test]
async fn test_parameters_are_clamped_for_host() {
    let profile = HostProfile {
        limited_rate: true,
        ..HostProfile::default()
    };
    let (queue, engine) = queue_with(MockEngine::new(profile).auto_completing());

    queue
        .speak(
            "Fast",
            SpeakOptions {
                rate: Some(99.0),
                pitch: Some(-5.0),
                volume: Some(3.0),
                ..SpeakOptions::default()
            },
        )
        .await
        .expect("spoken");

    let utterance = engine.last_submitted();
    assert_eq!(utterance.rate, 2.0);
    assert_eq!(utterance.pitch, 0.0);
    assert_eq!(utterance.volume, 1.0);

    let (queue, engine) = queue_with(MockEngine::new(HostProfile::default()).auto_completing());
    queue
        .speak(
            "Fast",
            SpeakOptions {
                rate: Some(99.0),
                ..SpeakOptions::default()
            },
        )
        .await
        .expect("spoken");
    assert_eq!(engine.last_submitted().rate, 10.0);
}

#[tokio::test]
async fn test_host_error_settles_caller_and_continues() {
    let (queue, engine) = queue_with(MockEngine::new(HostProfile::default()));
    let errors = Arc::new(AtomicUsize::new(0));
    let counter = errors.clone();
    queue.on(EventKind::Error, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let failing = queue.submit("Bonjour", SpeakOptions::default()).expect("submit");
    let next = queue.submit("Next", SpeakOptions::default()).expect("submit");

    engine.fail_current(SpeechErrorKind::LanguageUnavailable);
    let err = failing.wait().await.unwrap_err();
    assert_eq!(err.kind, SpeechErrorKind::LanguageUnavailable);
    assert!(!err.recoverable());

    settle().await;
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(engine.submitted_texts(), ["Bonjour", "Next"]);

    engine.finish_current();
    next.wait().await.expect("next finished");
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_engine_rejecting_submission() {
    let (queue, engine) = queue_with(MockEngine::new(HostProfile::default()).auto_completing());
    *engine.reject_next.lock().unwrap() = Some(readaloud::SpeechError::new(
        SpeechErrorKind::AudioBusy,
        "device busy",
    ));

    let err = queue.speak("first", SpeakOptions::default()).await.unwrap_err();
    assert_eq!(err.kind, SpeechErrorKind::AudioBusy);
    assert!(err.recoverable());

    queue
        .speak("second", SpeakOptions::default())
        .await
        .expect("second spoken");
    assert_eq!(engine.submitted_texts(), ["second"]);
}

#[tokio::test]
async fn test_dropped_event_sink_fails_utterance() {
    let (queue, engine) = queue_with(MockEngine::new(HostProfile::default()));

    let handle = queue.submit("lost", SpeakOptions::default()).expect("submit");
    engine.drop_current();

    let err = handle.wait().await.unwrap_err();
    assert_eq!(err.kind, SpeechErrorKind::SynthesisFailed);
    settle().await;
    assert_eq!(queue.state(), QueueState::Idle);
}

#[tokio::test]
async fn test_long_text_is_chunked_and_fully_spoken() {
    let profile = HostProfile {
        max_utterance_len: Some(40),
        ..HostProfile::default()
    };
    let (queue, engine) = queue_with(MockEngine::new(profile).auto_completing());
    let text = "Rust is a systems language. It is fast! Is it also safe? \
                Yes, thanks to ownership and borrowing rules that the compiler checks.";

    queue.speak(text, SpeakOptions::default()).await.expect("spoken");

    let chunks = engine.submitted_texts();
    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| c.chars().count() <= 40));
    let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
    assert_eq!(strip(&chunks.concat()), strip(text));
}

#[tokio::test]
async fn test_failed_chunk_drops_rest_of_request() {
    let profile = HostProfile {
        max_utterance_len: Some(20),
        ..HostProfile::default()
    };
    let (queue, engine) = queue_with(MockEngine::new(profile));

    let long = queue
        .submit("First sentence. Second sentence. Third one.", SpeakOptions::default())
        .expect("submit");
    assert_eq!(long.ids().len(), 3);
    let other = queue.submit("Other", SpeakOptions::default()).expect("submit");

    engine.fail_current(SpeechErrorKind::SynthesisFailed);
    assert_eq!(
        long.wait().await.unwrap_err().kind,
        SpeechErrorKind::SynthesisFailed
    );
    settle().await;
    assert_eq!(engine.submitted_texts(), ["First sentence.", "Other"]);

    engine.finish_current();
    other.wait().await.expect("other finished");
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_cycles_only_while_speaking() {
    let profile = HostProfile {
        keep_alive_interval: Some(secs(14)),
        ..HostProfile::default()
    };
    let (queue, engine) = queue_with(MockEngine::new(profile));

    let handle = queue.submit("A long article", SpeakOptions::default()).expect("submit");
    tokio::time::sleep(secs(29)).await;
    assert_eq!(engine.calls(), ["pause", "resume", "pause", "resume"]);

    engine.finish_current();
    handle.wait().await.expect("finished");
    tokio::time::sleep(secs(60)).await;
    assert_eq!(engine.calls().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_stops_on_cancel() {
    let profile = HostProfile {
        keep_alive_interval: Some(secs(14)),
        ..HostProfile::default()
    };
    let (queue, engine) = queue_with(MockEngine::new(profile));

    let _handle = queue.submit("A long article", SpeakOptions::default()).expect("submit");
    tokio::time::sleep(Duration::from_secs(15)).await;
    queue.cancel();
    tokio::time::sleep(secs(60)).await;
    assert_eq!(engine.calls(), ["pause", "resume", "cancel"]);
}

#[tokio::test]
async fn test_event_lifecycle_and_listener_removal() {
    let (queue, engine) = queue_with(MockEngine::new(HostProfile::default()));
    let mut rx = queue.subscribe();
    let ends = Arc::new(AtomicUsize::new(0));
    let counter = ends.clone();
    let listener = queue.on(EventKind::End, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let first = queue.submit("one", SpeakOptions::default()).expect("submit");
    let second = queue.submit("two", SpeakOptions::default()).expect("submit");
    let (a, b) = (first.ids()[0], second.ids()[0]);

    engine.start_current();
    engine.boundary(0);
    engine.finish_current();
    first.wait().await.expect("first");
    settle().await;
    engine.start_current();
    engine.finish_current();
    second.wait().await.expect("second");
    settle().await;

    assert_eq!(
        drain(&mut rx),
        [
            SpeechEvent::Queued { id: b, position: 1 },
            SpeechEvent::Start { id: a },
            SpeechEvent::Boundary {
                id: a,
                char_index: 0,
                name: "word".to_string()
            },
            SpeechEvent::End { id: a },
            SpeechEvent::Start { id: b },
            SpeechEvent::End { id: b },
        ]
    );
    assert_eq!(ends.load(Ordering::SeqCst), 2);

    assert!(queue.off(EventKind::End, listener));
    queue.submit("three", SpeakOptions::default()).expect("submit");
    engine.finish_current();
    settle().await;
    assert_eq!(ends.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_voice_resolved_from_options() {
    let engine = MockEngine::new(HostProfile::default())
        .with_voices(vec![
            Voice::new("Alex", "en-US"),
            Voice::new("Samantha", "en-US").with_default(true),
            Voice::new("Jorge", "es-ES"),
        ])
        .auto_completing();
    let (queue, engine) = queue_with(engine);
    assert_eq!(queue.initialize().await, 3);

    queue
        .speak(
            "Hola",
            SpeakOptions {
                lang: Some("es-MX".to_string()),
                ..SpeakOptions::default()
            },
        )
        .await
        .expect("spoken");
    let utterance = engine.last_submitted();
    assert_eq!(utterance.voice.map(|v| v.name).as_deref(), Some("Jorge"));
    assert_eq!(utterance.lang.as_deref(), Some("es-MX"));

    queue.speak("Hi", SpeakOptions::default()).await.expect("spoken");
    let utterance = engine.last_submitted();
    assert_eq!(utterance.voice.map(|v| v.name).as_deref(), Some("Samantha"));
    assert_eq!(utterance.lang.as_deref(), Some("en-US"));
}

#[test]
fn test_submit_outside_runtime_settles_unavailable() {
    let (queue, engine) = queue_with(MockEngine::new(HostProfile::default()));

    let handle = queue.submit("Hello", SpeakOptions::default()).expect("submit");
    let err = tokio_test::assert_err!(tokio_test::block_on(handle.wait()));
    assert_eq!(err.kind, SpeechErrorKind::SynthesisUnavailable);
    assert!(engine.submitted_texts().is_empty());
    assert_eq!(queue.state(), QueueState::Idle);
}

#[tokio::test]
async fn test_queued_positions_for_chunks_submitted_while_idle() {
    let profile = HostProfile {
        max_utterance_len: Some(20),
        ..HostProfile::default()
    };
    let (queue, engine) = queue_with(MockEngine::new(profile));
    let mut rx = queue.subscribe();

    let handle = queue
        .submit("First sentence. Second sentence. Third one.", SpeakOptions::default())
        .expect("submit");
    let ids = handle.ids().to_vec();

    assert_eq!(engine.submitted_texts(), ["First sentence."]);
    assert_eq!(
        drain(&mut rx),
        [
            SpeechEvent::Queued { id: ids[1], position: 1 },
            SpeechEvent::Queued { id: ids[2], position: 2 },
        ]
    );
    queue.cancel();
}

#[tokio::test]
async fn test_immediate_while_paused_starts_fresh() {
    let (queue, engine) = queue_with(MockEngine::new(HostProfile::default()));

    let first = queue.submit("first", SpeakOptions::default()).expect("submit");
    assert!(queue.pause());

    let urgent = queue
        .submit(
            "urgent",
            SpeakOptions {
                immediate: true,
                ..SpeakOptions::default()
            },
        )
        .expect("submit");

    assert_eq!(first.wait().await.unwrap_err().kind, SpeechErrorKind::Canceled);
    assert_eq!(queue.state(), QueueState::Speaking);
    assert!(!queue.status().paused);
    assert_eq!(engine.submitted_texts(), ["first", "urgent"]);
    assert_eq!(engine.calls(), ["pause", "cancel"]);

    engine.finish_current();
    urgent.wait().await.expect("urgent finished");
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_skips_while_paused() {
    let profile = HostProfile {
        keep_alive_interval: Some(secs(14)),
        ..HostProfile::default()
    };
    let (queue, engine) = queue_with(MockEngine::new(profile));

    let _handle = queue.submit("A long article", SpeakOptions::default()).expect("submit");
    assert!(queue.pause());
    tokio::time::sleep(secs(30)).await;
    assert_eq!(engine.calls(), ["pause"]);

    assert!(queue.resume());
    tokio::time::sleep(secs(13)).await;
    assert_eq!(engine.calls(), ["pause", "resume", "pause", "resume"]);
    queue.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_caller_pause_waits_for_keep_alive_cycle() {
    let profile = HostProfile {
        keep_alive_interval: Some(Duration::from_millis(200)),
        ..HostProfile::default()
    };
    let (queue, engine) = queue_with(MockEngine::new(profile));
    let held = engine.hold_next_pause();

    let _handle = queue.submit("A long article", SpeakOptions::default()).expect("submit");
    let held = tokio::task::spawn_blocking(move || {
        held.wait_entered();
        held
    })
    .await
    .expect("keep-alive reached the host");

    // The caller pauses while the keep-alive cycle is halfway through.
    let pauser = {
        let queue = queue.clone();
        tokio::task::spawn_blocking(move || queue.pause())
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    held.release();
    assert!(pauser.await.expect("pause task"));

    assert_eq!(engine.calls(), ["pause", "resume", "pause"]);
    assert_eq!(queue.state(), QueueState::Paused);
    queue.cancel();
}
