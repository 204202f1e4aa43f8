//! Sound gate: host binary.
//!
//! Opens the configured input device, learns the room's noise floor and
//! reports ON/OFF presence events as JSON lines on stdout. Accepts
//! JSON-line commands on stdin; stops on Ctrl-C or a `stop` command.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{error, info, warn};

use sound_gate::audio::{self, SessionClock};
use sound_gate::config::read_gate_config;
use sound_gate::driver::Driver;
use sound_gate::events::{EventHub, GateEvent};
use sound_gate::gate::{GateSession, GateSnapshot};
use sound_gate::ipc::bridge::{emit_error, emit_event, spawn_stdin_reader};
use sound_gate::ipc::{HostCommand, HostEvent};
use sound_gate::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = logging::init() {
        logging::init_stderr();
        warn!("File logging unavailable: {:#}", e);
    }

    emit_event(&HostEvent::Starting {});

    if let Err(e) = run().await {
        error!("Sound gate failed: {:#}", e);
        emit_error(&format!("{:#}", e));
        return Err(e);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Startup errors abort here, before any block is processed.
    let config = read_gate_config().context("reading configuration")?;
    info!(?config, "Configuration loaded");
    let session = GateSession::new(&config).context("validating configuration")?;
    let params = *session.params();

    let hub = EventHub::default();
    let mut gate_events = hub.subscribe();

    let clock = SessionClock::start();
    let (producer, consumer) = audio::block_ring_buffer(None);
    let (err_tx, err_rx) = mpsc::unbounded_channel();
    let capture = audio::start_capture(
        &params,
        config.input_device.as_ref(),
        producer,
        clock,
        err_tx,
    )
    .context("opening audio input")?;

    let running = Arc::new(AtomicBool::new(true));
    let driver = Driver::new(session, consumer, err_rx, hub.clone(), Arc::clone(&running));
    let snapshots = driver.snapshots();

    hub.publish(GateEvent::Calibrating {
        seconds: config.calibration_seconds,
        window_blocks: params.window_capacity,
    });
    emit_event(&HostEvent::Ready {
        device: capture.device_name().to_string(),
        channels: capture.channels(),
        sample_rate: params.sample_rate,
        block_size: params.block_size,
    });

    let driver_task = tokio::spawn(driver.run());
    let mut cmd_rx = spawn_stdin_reader();
    let mut stdin_open = true;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = gate_events.recv() => {
                match event {
                    Ok(event) => forward(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event forwarder lagged behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            cmd = cmd_rx.recv(), if stdin_open => {
                match cmd {
                    Some(command) => {
                        if !handle_command(command, &snapshots) {
                            break;
                        }
                    }
                    None => {
                        // Detached from a client; keep gating until interrupted.
                        info!("stdin closed, continuing until interrupted");
                        stdin_open = false;
                    }
                }
            }
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Interrupt received");
                break;
            }
        }
    }

    emit_event(&HostEvent::Stopping {});

    // Release the device first so the driver can drain the last blocks.
    drop(capture);
    running.store(false, Ordering::Relaxed);
    let session = driver_task.await.context("driver task failed")?;

    while let Ok(event) = gate_events.try_recv() {
        forward(&event);
    }

    let snapshot = session.snapshot();
    info!(
        blocks = snapshot.blocks_processed,
        state = %snapshot.state,
        "Sound gate stopped"
    );
    Ok(())
}

/// Write a gate event to stdout, with a log line for the user-facing ones.
fn forward(event: &GateEvent) {
    match event {
        GateEvent::Calibrating { seconds, .. } => {
            info!("Calibrating noise floor for ~{}s...", seconds);
        }
        GateEvent::StreamInterrupted { reason } => {
            warn!(reason = %reason, "Stream interrupted, continuing");
        }
        _ => {}
    }
    emit_event(event);
}

/// Handle a single command. Returns `false` if the main loop should exit.
fn handle_command(cmd: HostCommand, snapshots: &watch::Receiver<GateSnapshot>) -> bool {
    match cmd {
        HostCommand::Ping {} => {
            emit_event(&HostEvent::Pong {});
        }

        HostCommand::Status {} => {
            let snapshot = *snapshots.borrow();
            emit_event(&HostEvent::Status(snapshot));
        }

        HostCommand::ListAudioDevices {} => {
            emit_event(&HostEvent::AudioDevices {
                input: audio::list_devices(),
            });
        }

        HostCommand::Stop {} => {
            info!("Stop requested");
            return false;
        }
    }

    true
}
