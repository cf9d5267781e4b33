//! ReadAloud - speak and explain selected text

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use readaloud::config::Config;
use readaloud::core::explain::{ChatExplainer, Explainer};
use readaloud::core::text::normalize_selection;
use readaloud::tts::{self, HostProfile, QueueOptions, SpeakOptions, SpeechEngine, SpeechQueue};
use readaloud::voices::Gender;
use std::sync::Arc;
use tracing::{info, warn, Subscriber};
use tracing_subscriber::{reload, EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Speech engine to use (system, silent)
    #[arg(long, global = true)]
    engine: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read text aloud
    Speak {
        text: String,
        #[arg(long)]
        lang: Option<String>,
        #[arg(long)]
        voice: Option<String>,
        #[arg(long)]
        gender: Option<Gender>,
        #[arg(long)]
        rate: Option<f32>,
        #[arg(long)]
        pitch: Option<f32>,
        #[arg(long)]
        volume: Option<f32>,
    },
    /// List available voices
    Voices {
        #[arg(long)]
        lang: Option<String>,
    },
    /// Ask the AI service to explain text
    Explain {
        text: String,
        #[arg(long)]
        lang: Option<String>,
        /// Read the explanation aloud
        #[arg(long)]
        speak: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging first: loading the config may warn
    let from_env = EnvFilter::try_from_default_env().ok();
    let pinned = args.verbose || from_env.is_some();
    let filter = match from_env {
        _ if args.verbose => EnvFilter::new("debug"),
        Some(filter) => filter,
        None => EnvFilter::new("info"),
    };
    let (subscriber, log_handle) = log_subscriber(filter);
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = Config::load()?;
    if let Some(engine) = args.engine.clone() {
        config.engine = engine;
    }
    if !pinned {
        log_handle.reload(EnvFilter::new(config.log_level.to_lowercase()))?;
    }

    info!("📖 ReadAloud v{} starting...", env!("CARGO_PKG_VERSION"));

    match args.command {
        Commands::Speak {
            text,
            lang,
            voice,
            gender,
            rate,
            pitch,
            volume,
        } => {
            let queue = build_queue(&config).await?;
            let options = SpeakOptions {
                lang: lang.or_else(|| config.lang.clone()),
                voice_name: voice.or_else(|| config.voice_name.clone()),
                gender,
                rate: Some(rate.unwrap_or(config.rate)),
                pitch: Some(pitch.unwrap_or(config.pitch)),
                volume: Some(volume.unwrap_or(config.volume)),
                immediate: false,
            };
            speak_until_done(&queue, &normalize_selection(&text), options).await?;
        }
        Commands::Voices { lang } => {
            let queue = build_queue(&config).await?;
            let catalog = queue.voices().snapshot();
            let voices: Vec<_> = match lang.as_deref() {
                Some(lang) => catalog.voices_for_language(lang),
                None => catalog.iter().collect(),
            };
            for v in voices {
                println!(
                    "{:<32} {:<8} {:<8} {:<10} {:<9}{}",
                    v.voice.name,
                    v.voice.lang,
                    v.gender,
                    v.provider,
                    v.quality,
                    if v.voice.default { " (default)" } else { "" }
                );
            }
        }
        Commands::Explain { text, lang, speak } => {
            let explainer = ChatExplainer::new(&config)?;
            let lang = lang.or_else(|| config.lang.clone());
            let answer = explainer
                .explain(&text, lang.as_deref())
                .await
                .context("explanation failed")?;
            println!("{answer}");

            if speak {
                let queue = build_queue(&config).await?;
                let options = SpeakOptions {
                    lang,
                    voice_name: config.voice_name.clone(),
                    rate: Some(config.rate),
                    pitch: Some(config.pitch),
                    volume: Some(config.volume),
                    ..SpeakOptions::default()
                };
                speak_until_done(&queue, &answer, options).await?;
            }
        }
    }

    Ok(())
}

type LogHandle = reload::Handle<EnvFilter, tracing_subscriber::fmt::Formatter>;

/// Fmt subscriber whose filter can be swapped once the config is known.
fn log_subscriber(filter: EnvFilter) -> (impl Subscriber + Send + Sync, LogHandle) {
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_filter_reloading();
    let handle = builder.reload_handle();
    (builder.finish(), handle)
}

async fn build_queue(config: &Config) -> Result<SpeechQueue> {
    let engine: Arc<dyn SpeechEngine> = tts::create_engine(config)?;
    let profile: HostProfile = engine.profile().with_overrides(config);
    let queue = SpeechQueue::with_options(
        Arc::clone(&engine),
        QueueOptions {
            profile: Some(profile),
            voice_load_timeout: config.voice_load_timeout(),
            voice_poll_interval: config.voice_poll_interval(),
            ..QueueOptions::default()
        },
    );
    queue.initialize().await;
    Ok(queue)
}

async fn speak_until_done(queue: &SpeechQueue, text: &str, options: SpeakOptions) -> Result<()> {
    tokio::select! {
        result = queue.speak(text, options) => {
            if let Err(e) = result {
                let detail = serde_json::to_string(&e).unwrap_or_else(|_| e.to_string());
                anyhow::bail!("speech failed: {detail}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("🛑 Interrupted, stopping speech");
            queue.cancel();
        }
    }
    Ok(())
}
