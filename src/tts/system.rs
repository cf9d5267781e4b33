//! speech-dispatcher engine driven through the `spd-say` command

use super::{HostProfile, SpeechEngine, Utterance, UtteranceEvents};
use crate::error::{SpeechError, SpeechErrorKind};
use crate::voices::{primary_subtag, Voice};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, error, warn};

const SPD_SAY: &str = "spd-say";

#[derive(Debug, Default)]
pub struct SystemEngine {
    speaking: Arc<AtomicBool>,
    /// Stop signal for the utterance currently playing
    current: Mutex<Option<Arc<Notify>>>,
}

impl SystemEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_args(utterance: &Utterance) -> Vec<String> {
        let mut args = vec![
            "--wait".to_string(),
            "-r".to_string(),
            scale_rate(utterance.rate).to_string(),
            "-p".to_string(),
            scale_unit(utterance.pitch - 1.0).to_string(),
            "-i".to_string(),
            scale_unit(utterance.volume * 2.0 - 1.0).to_string(),
        ];
        if let Some(lang) = &utterance.lang {
            args.push("-l".to_string());
            args.push(primary_subtag(lang));
        }
        if let Some(voice) = &utterance.voice {
            args.push("-y".to_string());
            args.push(voice.name.clone());
        }
        args.push("--".to_string());
        args.push(utterance.text.clone());
        args
    }
}

/// Rate 1.0 maps to 0; each doubling adds 50, clamped to spd-say's ±100.
fn scale_rate(rate: f32) -> i32 {
    (rate.max(f32::MIN_POSITIVE).log2() * 50.0).round().clamp(-100.0, 100.0) as i32
}

fn scale_unit(value: f32) -> i32 {
    (value * 100.0).round().clamp(-100.0, 100.0) as i32
}

/// Ask speech-dispatcher to drop everything it is saying.
///
/// Inside a runtime the command is spawned and reaped in the background, so
/// callers holding a lock never wait on the subprocess.
fn stop_all() {
    let result = if tokio::runtime::Handle::try_current().is_ok() {
        tokio::process::Command::new(SPD_SAY)
            .arg("-C")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(drop)
    } else {
        Command::new(SPD_SAY)
            .arg("-C")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(drop)
    };
    if let Err(e) = result {
        warn!("⚠️ spd-say -C failed: {}", e);
    }
}

/// Parse `spd-say -L` output: a header line then `NAME LANGUAGE VARIANT` rows.
pub fn parse_voice_list(output: &str) -> Vec<Voice> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                return None;
            }
            let lang = fields[fields.len() - 2];
            let name = fields[..fields.len() - 2].join(" ");
            Some(Voice::new(name, lang))
        })
        .collect()
}

impl SpeechEngine for SystemEngine {
    fn name(&self) -> &str {
        "system"
    }

    fn profile(&self) -> HostProfile {
        HostProfile {
            pause_resume_supported: false,
            ..HostProfile::default()
        }
    }

    fn list_voices(&self) -> Vec<Voice> {
        match Command::new(SPD_SAY).arg("-L").stderr(Stdio::null()).output() {
            Ok(output) if output.status.success() => {
                parse_voice_list(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                warn!("⚠️ spd-say -L exited with {}", output.status);
                Vec::new()
            }
            Err(e) => {
                warn!("⚠️ Could not list voices via spd-say: {}", e);
                Vec::new()
            }
        }
    }

    fn speak(&self, utterance: Utterance, events: UtteranceEvents) -> Result<(), SpeechError> {
        debug!("System speaking #{}: {}", events.id(), utterance.text);

        let mut child = tokio::process::Command::new(SPD_SAY)
            .args(Self::build_args(&utterance))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!("❌ Failed to spawn spd-say: {}", e);
                SpeechError::new(
                    SpeechErrorKind::SynthesisUnavailable,
                    format!("failed to spawn spd-say: {e}"),
                )
            })?;

        let stop = Arc::new(Notify::new());
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(stop.clone());
        let speaking = self.speaking.clone();
        speaking.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            events.start();
            tokio::select! {
                status = child.wait() => {
                    match status {
                        Ok(status) if status.success() => {
                            events.end();
                        }
                        Ok(status) => {
                            events.error(
                                SpeechErrorKind::SynthesisFailed,
                                format!("spd-say exited with {status}"),
                            );
                        }
                        Err(e) => {
                            events.error(SpeechErrorKind::AudioHardware, e.to_string());
                        }
                    }
                }
                _ = stop.notified() => {
                    let _ = child.start_kill();
                    events.error(SpeechErrorKind::Canceled, "stopped");
                }
            }
            speaking.store(false, Ordering::SeqCst);
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
        stop_all();
    }

    // speech-dispatcher has no pause through spd-say; the profile says so.
    fn pause(&self) {}

    fn resume(&self) {}

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }
}
