//! CCTV edge node application
//!
//! Wires the camera manager, transmit queue, streaming client, preview
//! and console menu into one orchestration loop.

use anyhow::Result;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use evol_cctv::{
    camera::CameraManager,
    config::NodeConfig,
    constants::{STATS_INTERVAL_SECS, TX_QUEUE_CAPACITY},
    control::{self, ControlCommand},
    display::compose_grid,
    network::queue::{create_shared_queue, SharedTransmitQueue},
    network::StreamClient,
    snapshot,
};

#[cfg(feature = "display")]
use evol_cctv::display::compositor::{GRID_COLS, GRID_ROWS};
#[cfg(feature = "display")]
use evol_cctv::display::PreviewWindow;

/// Orchestration loop pace
const TICK_MS: u64 = 33;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match NodeConfig::from_cli() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Logging
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if config.debug {
            "debug".into()
        } else {
            "info".into()
        }
    });
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        cams = config.cams,
        width = config.width,
        height = config.height,
        fps = config.fps,
        "starting CCTV edge node"
    );

    // Cameras
    let mut manager = CameraManager::new(config.camera_settings())?;
    let started = manager.start_all();
    info!(started, slots = manager.slot_count(), "camera slots up");
    let audio_queue = manager.audio_queue();

    // Streaming client; stays disabled until toggled on
    let tx_queue = create_shared_queue(TX_QUEUE_CAPACITY);
    let mut client = config.server.as_ref().map(|server| {
        StreamClient::new(server.clone(), config.port, config.quality, tx_queue.clone())
    });
    let mut tx_enabled = false;
    if client.is_none() {
        info!("no --server configured, transmission unavailable");
    }

    // Console menu; the reader thread stays detached since a blocked
    // stdin read cannot be interrupted
    let (command_tx, command_rx) = crossbeam_channel::unbounded();
    let _control_thread = control::spawn_stdin_reader(command_tx)?;

    // Preview
    let mut preview_enabled = config.preview;
    #[cfg(feature = "display")]
    let mut preview: Option<PreviewWindow> = None;
    #[cfg(not(feature = "display"))]
    if preview_enabled {
        warn!("preview requested but this build has no display feature");
    }

    let mut last_sent_seq: Vec<Option<u64>> = vec![None; manager.slot_count()];
    let mut audio_chunks_seen: u64 = 0;
    let mut stats_at = Instant::now() + Duration::from_secs(STATS_INTERVAL_SECS);
    let mut running = true;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while running {
        // Console commands
        while let Ok(command) = command_rx.try_recv() {
            match command {
                ControlCommand::ToggleDisplay => {
                    preview_enabled = !preview_enabled;
                    #[cfg(not(feature = "display"))]
                    if preview_enabled {
                        warn!("preview requested but this build has no display feature");
                    }
                    info!(enabled = preview_enabled, "preview toggled");
                }
                ControlCommand::ToggleTransmit => match client.as_mut() {
                    None => println!("No server configured (--server)..."),
                    Some(client) if tx_enabled => {
                        client.stop();
                        tx_enabled = false;
                        info!("transmission disabled");
                        println!("Transmission to server: OFF");
                    }
                    Some(client) => match client.start() {
                        Ok(()) => {
                            tx_enabled = true;
                            info!("transmission enabled");
                            println!("Transmission to server: ON");
                        }
                        Err(e) => error!(error = %e, "failed to start stream client"),
                    },
                },
                ControlCommand::Snapshot => {
                    let grid = compose_grid(&manager.frames(), config.width, config.height);
                    match snapshot::write_grid(&config.snapshot_dir, &grid) {
                        Ok(path) => println!("Snapshot saved to {}", path.display()),
                        Err(e) => error!(error = %e, "snapshot failed"),
                    }
                }
                ControlCommand::ReloadCameras => {
                    let restarted = manager.reload();
                    info!(restarted, "cameras reloaded");
                }
                ControlCommand::Quit => running = false,
            }
        }

        // Feed fresh frames to the stream, one enqueue per new capture
        let frames = manager.frames();
        if tx_enabled {
            if let Some(client) = &client {
                for (slot, frame) in frames.iter().enumerate() {
                    if let Some(frame) = frame {
                        if last_sent_seq[slot] != Some(frame.sequence) {
                            last_sent_seq[slot] = Some(frame.sequence);
                            client.send_frame(frame.clone());
                        }
                    }
                }
            }
        }

        // Preview window follows the toggle
        #[cfg(feature = "display")]
        {
            if preview_enabled && preview.is_none() {
                let grid_w = config.width * GRID_COLS;
                let grid_h = config.height * GRID_ROWS;
                match PreviewWindow::open("CCTV", grid_w, grid_h) {
                    Ok(window) => preview = Some(window),
                    Err(e) => {
                        error!(error = %e, "preview window failed to open");
                        preview_enabled = false;
                    }
                }
            }
            if !preview_enabled && preview.is_some() {
                preview = None;
                info!("preview window closed");
            }
            if let Some(window) = preview.as_mut() {
                if window.poll_quit() {
                    running = false;
                } else {
                    let grid = compose_grid(&frames, config.width, config.height);
                    if let Err(e) = window.render(&grid) {
                        warn!(error = %e, "preview render failed");
                    }
                }
            }
        }

        // Mic chunks are drained here; they are not framed on the wire
        // yet, so the count is only surfaced in the stats line.
        while audio_queue.pop().is_some() {
            audio_chunks_seen += 1;
        }

        if Instant::now() >= stats_at {
            log_stats(&manager, client.as_ref(), &tx_queue, audio_chunks_seen);
            stats_at += Duration::from_secs(STATS_INTERVAL_SECS);
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(TICK_MS)) => {}
            _ = &mut ctrl_c => {
                info!("ctrl-c received");
                running = false;
            }
        }
    }

    // Shutdown: stream first so no frame is half-written, then cameras
    info!("shutting down");
    if let Some(client) = client.as_mut() {
        client.stop();
    }
    manager.stop_all();
    log_stats(&manager, client.as_ref(), &tx_queue, audio_chunks_seen);
    info!("node stopped");
    Ok(())
}

fn log_stats(
    manager: &CameraManager,
    client: Option<&StreamClient>,
    queue: &SharedTransmitQueue,
    audio_chunks: u64,
) {
    let cameras = manager
        .statuses()
        .iter()
        .map(|s| {
            if s.running {
                format!("C{}:{:.1}fps", s.slot, s.fps)
            } else if s.failed {
                format!("C{}:failed", s.slot)
            } else {
                format!("C{}:off", s.slot)
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    match client {
        Some(client) => {
            let stats = client.stats();
            info!(
                %cameras,
                queued = queue.len(),
                dropped = queue.evicted(),
                sent = stats.packets_sent,
                sent_kb = stats.bytes_sent / 1024,
                encode_failures = stats.encode_failures,
                reconnects = stats.reconnects,
                link = ?client.link_state(),
                audio_chunks,
                "stats"
            );
        }
        None => info!(%cameras, queued = queue.len(), audio_chunks, "stats"),
    }
}
