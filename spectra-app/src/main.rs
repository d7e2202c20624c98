//! Spectra terminal host.
//!
//! ## Threads
//!
//! - main: the consumer/render actor. Paces itself with `recv_timeout` on the
//!   command channel, drives fixed-step decay through `render_tick_into`, and
//!   redraws stdout.
//! - `spectra-stdin`: reads command lines and forwards parsed commands.
//! - `spectra-worker` / `spectra-capture`: owned by `PipelineCoordinator`.
//!
//! Logs go to stderr so the spectrum on stdout stays readable.

mod commands;
mod render;
mod settings;

use std::io::{BufRead, Write};
use std::thread;
use std::time::Instant;

use anyhow::Context;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use spectra_core::{PipelineCoordinator, SpectrumSnapshot};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{error, info, warn};

use commands::{apply, parse_command, Command, Flow, HELP};
use render::SpectrumView;
use settings::{default_settings_path, load_settings, save_settings};

/// ANSI: cursor home, clear to end of screen.
const REDRAW: &str = "\x1b[H\x1b[J";

fn spawn_stdin_reader() -> anyhow::Result<Receiver<Command>> {
    let (tx, rx) = crossbeam_channel::bounded(16);
    thread::Builder::new()
        .name("spectra-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Ok(command) => {
                        if tx.send(command).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("{e} ({HELP})"),
                }
            }
            // EOF on stdin ends the session.
            let _ = tx.send(Command::Quit);
        })
        .context("spawning stdin reader")?;
    Ok(rx)
}

fn main() {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("spectra=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        error!("spectra exited with error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    info!("Spectra starting");

    let settings_path = default_settings_path();
    let mut settings = load_settings(&settings_path);
    info!(path = %settings_path.display(), transform_size = settings.transform_size, "settings loaded");

    let coordinator = PipelineCoordinator::new(settings.pipeline_config());
    let mut status_rx = coordinator.subscribe_status();
    coordinator
        .start_with_device(settings.preferred_input_device.clone())
        .context("starting capture")?;
    let sample_rate = coordinator.config().sample_rate;

    let commands = spawn_stdin_reader()?;
    let mut view = SpectrumView::new(&settings);
    let mut snapshot = SpectrumSnapshot::default();
    let frame_interval = settings.frame_interval();
    let mut last_tick = Instant::now();
    let mut next_frame = last_tick + frame_interval;
    let stdout = std::io::stdout();

    eprintln!("{HELP}");

    'render: loop {
        let timeout = next_frame.saturating_duration_since(Instant::now());
        match commands.recv_timeout(timeout) {
            Ok(command) => {
                match apply(command, &coordinator, &mut settings, &mut view) {
                    Ok(Flow::Exit) => break 'render,
                    Ok(Flow::Continue) => {}
                    Err(e) => warn!("command failed: {e}"),
                }
                continue;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break 'render,
        }

        loop {
            match status_rx.try_recv() {
                Ok(event) => info!(
                    status = ?event.status,
                    transform_size = ?event.transform_size,
                    detail = event.detail.as_deref().unwrap_or(""),
                    "pipeline status"
                ),
                Err(TryRecvError::Lagged(n)) => warn!("missed {n} status events"),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        let now = Instant::now();
        coordinator.render_tick_into(now - last_tick, &mut snapshot);
        last_tick = now;
        next_frame = now + frame_interval;

        let frame = view.render(&snapshot, sample_rate);
        let mut out = stdout.lock();
        if write!(out, "{REDRAW}{frame}").and_then(|_| out.flush()).is_err() {
            break 'render;
        }
    }

    coordinator.stop().context("stopping pipeline")?;
    let diag = coordinator.diagnostics();
    info!(
        passes = diag.passes,
        coalesced = diag.wakes_coalesced,
        stale = diag.stale_passes,
        "pipeline diagnostics on exit"
    );

    save_settings(&settings_path, &settings)
        .with_context(|| format!("saving {}", settings_path.display()))?;
    info!("Spectra stopped");
    Ok(())
}
