use anyhow::{Context, Result, bail};
use clap::Parser;
use owo_colors::OwoColorize;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use voxwire::audio::{PcmFormat, WavAudio};
use voxwire::cli::{Cli, Commands, ConfigAction};
use voxwire::config::Config;
use voxwire::protocol::CompressionPolicy;
use voxwire::session::{ChannelObserver, ErrorEvent, Session, SessionState, SessionUpdate};
use voxwire::{LogSink, TracingLog, WebSocketTransport};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    tracing::info!("voxwire {}", voxwire::version_string());

    match cli.command {
        Commands::Transcribe {
            input,
            language,
            chunk_ms,
            realtime,
            no_compression,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(language) = language {
                config.audio.language = language;
            }
            if let Some(chunk_ms) = chunk_ms {
                config.audio.chunk_ms = chunk_ms;
            }
            if no_compression {
                config.compression = CompressionPolicy::none();
            }
            run_transcribe(config, &input, realtime, cli.quiet).await?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
    }

    Ok(())
}

/// Route `tracing` output to stderr; `-v` raises the level.
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/voxwire/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => match Config::default_path() {
            Some(path) => Config::load_or_default(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::default(),
        },
    };

    // Apply environment variable overrides
    Ok(config.with_env_overrides())
}

fn config_path(custom_path: Option<&Path>) -> Result<PathBuf> {
    match custom_path {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::default_path().context("Could not determine config directory"),
    }
}

/// Handle configuration commands.
fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let mut config = load_config(custom_path)?;
            if !config.service.access_key.is_empty() {
                config.service.access_key = "********".to_string();
            }
            print!("{}", config.to_toml_string()?);
        }
        ConfigAction::Path => {
            println!("{}", config_path(custom_path)?.display());
        }
        ConfigAction::Init { force } => {
            let path = config_path(custom_path)?;
            if path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(&path, Config::default().to_toml_string()?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote default configuration to {}", path.display());
        }
    }
    Ok(())
}

/// Stream a WAV file through one recognition session and print results.
async fn run_transcribe(config: Config, input: &Path, realtime: bool, quiet: bool) -> Result<()> {
    let session_config = config.to_session_config()?;
    let format = PcmFormat {
        sample_rate: config.audio.rate,
        channels: config.audio.channel,
        bits: config.audio.bits,
    };
    let audio = if input == Path::new("-") {
        WavAudio::from_stdin(format)?
    } else {
        WavAudio::from_path(input, format)?
    };
    if !quiet {
        eprintln!(
            "Streaming {:.1}s of audio to {}",
            audio.duration().as_secs_f32(),
            config.service.endpoint
        );
    }

    let log: Arc<dyn LogSink> = Arc::new(TracingLog);
    let (observer, updates) = ChannelObserver::new(Arc::clone(&log));
    let session = Session::spawn(
        session_config,
        Arc::new(WebSocketTransport::new(Arc::clone(&log))),
        Arc::new(observer),
        log,
    );
    let printer = std::thread::spawn(move || print_updates(updates, quiet));

    session.start().await?;

    let streamed = tokio::select! {
        result = stream_audio(&session, &audio, config.audio.chunk_ms, realtime) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let final_state = match streamed {
        Some(Ok(())) => tokio::select! {
            state = session.wait_for_state(|s| s == SessionState::Completed || s.is_failed()) => state?,
            _ = tokio::signal::ctrl_c() => session.state(),
        },
        Some(Err(e)) => {
            tracing::warn!("audio streaming stopped: {}", e);
            session.state()
        }
        None => {
            if !quiet {
                eprintln!("\nInterrupted, closing session...");
            }
            session.state()
        }
    };

    session.shutdown().await?;
    let failure = printer
        .join()
        .map_err(|_| anyhow::anyhow!("output thread panicked"))?;

    match (final_state, failure) {
        (SessionState::Completed, _) => Ok(()),
        (_, Some(error)) => bail!("recognition failed ({}): {}", error.kind(), describe(&error)),
        (state, None) => bail!("session ended in state {}", state),
    }
}

/// Send every chunk, the last one marked, optionally paced at real-time speed.
async fn stream_audio(
    session: &Session,
    audio: &WavAudio,
    chunk_ms: u32,
    realtime: bool,
) -> voxwire::Result<()> {
    let chunks: Vec<&[u8]> = audio.chunks(chunk_ms).collect();
    if chunks.is_empty() {
        return session.stop().await;
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(chunk_ms as u64));
    let count = chunks.len();
    for (index, chunk) in chunks.into_iter().enumerate() {
        if realtime {
            ticker.tick().await;
        }
        session.send_audio(chunk.to_vec(), index + 1 == count).await?;
    }
    Ok(())
}

/// Print results as they arrive. Partial results are shown dimmed on a
/// single rewritten line when stderr is a terminal. Returns the last error.
fn print_updates(
    updates: crossbeam_channel::Receiver<SessionUpdate>,
    quiet: bool,
) -> Option<ErrorEvent> {
    let interactive = std::io::stderr().is_terminal();
    let mut last_error = None;

    for update in updates {
        match update {
            SessionUpdate::Result(result) if result.is_final => {
                if interactive && !quiet {
                    eprint!("\r\x1b[2K");
                }
                println!("{}", result.text);
            }
            SessionUpdate::Result(result) => {
                if quiet {
                    continue;
                }
                if interactive {
                    eprint!("\r\x1b[2K{}", result.text.dimmed());
                    if let Err(e) = std::io::stderr().flush() {
                        tracing::debug!("stderr flush failed: {}", e);
                    }
                } else {
                    eprintln!("{}", result.text.dimmed());
                }
            }
            SessionUpdate::Error(error) => {
                eprintln!("{} {}", "error:".red(), describe(&error));
                last_error = Some(error);
            }
            SessionUpdate::State { from, to } => {
                tracing::info!("session {} -> {}", from, to);
            }
        }
    }

    last_error
}

fn describe(error: &ErrorEvent) -> String {
    match error {
        ErrorEvent::Service(e) => format!("service error {}: {}", e.code, e.message),
        ErrorEvent::Failed { message, .. } => message.clone(),
    }
}
