mod core;
mod error;
mod input;
mod playback;
mod settings;
mod transport;
mod ui;

use crate::core::SegmentLabel;
use crate::error::ReplayError;
use crate::input::Recording;
use crate::playback::PlaybackEngine;
use crate::settings::Settings;
use crate::ui::alerts::{AlertSink, ConsoleAlerts};
use crate::ui::report::{describe_recording, describe_session};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Replay MindToSound EEG recordings as OSC
#[derive(Parser)]
#[command(name = "mindsim", version, about)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show row count, pacing and available states of a recording
    Info {
        /// Recording to inspect
        file: PathBuf,
    },
    /// Stream a recording to an OSC receiver
    Play {
        /// Recording to play
        file: PathBuf,
        /// Destination host (defaults to the saved setting)
        #[arg(long)]
        host: Option<String>,
        /// Destination port (defaults to the saved setting)
        #[arg(long)]
        port: Option<u16>,
        /// Play only rows with this state, e.g. Flow or Transition_to_TH
        #[arg(long)]
        state: Option<String>,
        /// Save host and port as the new defaults
        #[arg(long)]
        remember: bool,
        /// Print the session summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = Settings::load();
    init_logging(&settings, cli.verbose);

    let alerts: Arc<dyn AlertSink> = Arc::new(ConsoleAlerts);
    match run(cli.command, settings, Arc::clone(&alerts)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let title = e
                .downcast_ref::<ReplayError>()
                .map(ReplayError::title)
                .unwrap_or("Error");
            alerts.alert(title, &format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(settings: &Settings, verbose: bool) {
    let default = if verbose { "debug" } else { settings.log_filter.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(command: Command, settings: Settings, alerts: Arc<dyn AlertSink>) -> Result<()> {
    match command {
        Command::Info { file } => {
            let recording = Recording::open(&file)?;
            print!("{}", describe_recording(&recording));
            Ok(())
        }
        Command::Play { file, host, port, state, remember, json } => {
            let settings = Settings {
                host: host.unwrap_or(settings.host),
                port: port.unwrap_or(settings.port),
                ..settings
            };
            if remember {
                settings.save().context("Failed to save settings")?;
                info!("Saved {}:{} as the default destination", settings.host, settings.port);
            }

            let label = state.as_deref().map(parse_label).transpose()?;
            play(file, &settings, label, json, alerts).await
        }
    }
}

fn parse_label(text: &str) -> Result<SegmentLabel> {
    match SegmentLabel::from_label(text) {
        Some(label) => Ok(label),
        None => bail!(
            "Unknown state {:?}; expected one of {}",
            text,
            SegmentLabel::ALL.map(|l| l.as_str()).join(", ")
        ),
    }
}

async fn play(
    file: PathBuf,
    settings: &Settings,
    label: Option<SegmentLabel>,
    json: bool,
    alerts: Arc<dyn AlertSink>,
) -> Result<()> {
    let engine = PlaybackEngine::open(&file, &settings.host, settings.port, alerts).await?;
    print!("{}", describe_recording(engine.recording()));

    match label {
        Some(label) => engine.play_segment(label)?,
        None => engine.start_full_playback()?,
    }
    if engine.transmitter().is_inert() {
        println!(
            "{} is unreachable; rows are paced but not sent",
            engine.transmitter().destination()
        );
    } else {
        println!("Sending to {} (Ctrl-C to stop)", engine.transmitter().destination());
    }

    let summary = tokio::select! {
        summary = engine.wait() => summary,
        _ = tokio::signal::ctrl_c() => {
            println!("Stopping data at row {}...", engine.position());
            engine.stop().await
        }
    };

    let Some(summary) = summary else {
        bail!("Playback ended without a summary");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", describe_session(&summary));
    }

    let stats = engine.transmitter().stats();
    if stats.failed > 0 {
        println!("{} of {} sends failed", stats.failed, stats.sent + stats.failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_play() {
        let cli = Cli::try_parse_from([
            "mindsim", "play", "rec.csv", "--port", "9000", "--state", "Flow", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Play { file, host, port, state, remember, json } => {
                assert_eq!(file, PathBuf::from("rec.csv"));
                assert_eq!(host, None);
                assert_eq!(port, Some(9000));
                assert_eq!(state.as_deref(), Some("Flow"));
                assert!(!remember);
                assert!(!json);
            }
            Command::Info { .. } => panic!("expected play"),
        }
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(parse_label("Transition_to_TH").unwrap(), SegmentLabel::TransitionToTh);
        let err = parse_label("REM").unwrap_err().to_string();
        assert!(err.contains("Baseline, Transition_to_TH"));
    }
}
