#![deny(clippy::all)]

use anyhow::{Context, Result};
use livescribe::audio::CpalMicrophone;
use livescribe::settings;
use livescribe::sinks::{LogNotifier, LogObserver, StdoutSink};
use livescribe::transcription::{
    Collaborators, SessionState, Timeouts, TranscriptionClient, WebSocketConnector,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

const USAGE: &str = "Commands: p = pause, r = resume, s = stop, g = start again, q = quit";

#[tokio::main]
async fn main() -> Result<()> {
    // Transcriptions go to stdout, logs to stderr
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = settings::load(config_path.as_deref()).context("Failed to load settings")?;
    info!(?config, "Settings loaded");

    let client = TranscriptionClient::spawn(
        Collaborators {
            connector: Arc::new(WebSocketConnector),
            microphone: Arc::new(CpalMicrophone),
            text_sink: Arc::new(StdoutSink),
            notifier: Arc::new(LogNotifier),
            observer: Arc::new(LogObserver),
        },
        Timeouts::default(),
    );

    client
        .start(config.clone())
        .await
        .context("Failed to start transcription")?;
    info!("{}", USAGE);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            line = lines.next_line() => {
                let line = match line.context("Failed to read stdin")? {
                    Some(line) => line,
                    None => break,
                };
                let result = match line.trim() {
                    "p" => client.pause().await,
                    "r" => client.resume().await,
                    "s" => client.stop().await,
                    "g" => client.start(config.clone()).await,
                    "q" => break,
                    "" => continue,
                    other => {
                        warn!("Unknown command '{}'. {}", other, USAGE);
                        continue;
                    }
                };
                if let Err(e) = result {
                    error!("{}", e);
                }
            }
        }
    }

    if client.state() != SessionState::Idle {
        if let Err(e) = client.stop().await {
            warn!("Stop failed: {}", e);
        }
    }

    let transcript = client.transcript();
    if !transcript.is_empty() {
        info!(
            segments = transcript.segments.len(),
            "Transcript: {}",
            transcript.full_transcript()
        );
    }

    Ok(())
}
