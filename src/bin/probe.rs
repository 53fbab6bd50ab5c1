//! Capture device probe
//!
//! Walks the platform's backend candidates across device indices and
//! reports what opens and what it delivers. Run this before writing a
//! node config for a new box.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use evol_cctv::camera::device::{open_source, probe_order, DeviceBackend, Platform, SlotConfig};
use evol_cctv::constants::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH, DEFAULT_TARGET_FPS};

/// Reads attempted per candidate before giving up on it
const WARMUP_READS: usize = 5;

#[derive(Debug, Parser)]
#[command(name = "evol-cctv-probe", about = "Probe local capture devices", version)]
struct ProbeArgs {
    /// Highest device index to try per backend
    #[arg(long, default_value_t = 3)]
    max_index: u8,

    /// Capture width to request
    #[arg(long, default_value_t = DEFAULT_FRAME_WIDTH)]
    width: u32,

    /// Capture height to request
    #[arg(long, default_value_t = DEFAULT_FRAME_HEIGHT)]
    height: u32,

    /// Frame rate to request
    #[arg(long, default_value_t = DEFAULT_TARGET_FPS)]
    fps: u32,

    /// Also exercise the synthetic test source
    #[arg(long)]
    test_pattern: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = ProbeArgs::parse();
    let platform = Platform::current();

    println!("=== CCTV capture probe ===");
    println!("Platform: {:?}", platform);

    let backends = probe_order(platform);
    if backends.is_empty() {
        println!("No capture backends known for this platform.");
    }

    let mut working: Vec<(DeviceBackend, u8)> = Vec::new();
    for &backend in backends {
        println!("\nBackend {}:", backend);
        for index in 0..=args.max_index {
            let config = slot_config(&args, backend, &index.to_string());
            if try_read(&config).is_some() {
                working.push((backend, index));
            }
        }
    }

    if args.test_pattern {
        println!("\nSynthetic source:");
        try_read(&slot_config(&args, DeviceBackend::Auto, "test:probe"));
    }

    match working.first() {
        Some((backend, index)) => println!(
            "\nSuggested node flags: --backend {} --device {}",
            backend, index
        ),
        None => println!("\nNo working camera devices found."),
    }
    Ok(())
}

/// Open the candidate and pull a few frames, printing one line per
/// outcome. Returns the delivered dimensions once a frame came back.
fn try_read(config: &SlotConfig) -> Option<(u32, u32)> {
    let label = &config.device;
    let mut source = match open_source(config) {
        Ok(source) => source,
        Err(e) => {
            println!("  {}: {}", label, e);
            return None;
        }
    };

    let mut last_err = None;
    for _ in 0..WARMUP_READS {
        match source.read_frame() {
            Ok(image) => {
                let (width, height) = source.dimensions();
                println!(
                    "  {}: OK {}x{} {:?} ({} bytes/frame)",
                    label,
                    width,
                    height,
                    image.layout,
                    image.data.len()
                );
                return Some((width, height));
            }
            Err(e) => last_err = Some(e),
        }
    }
    if let Some(e) = last_err {
        println!("  {}: opened but reads failed: {}", label, e);
    }
    None
}

fn slot_config(args: &ProbeArgs, backend: DeviceBackend, device: &str) -> SlotConfig {
    SlotConfig {
        slot: 0,
        device: device.to_string(),
        backend,
        width: args.width,
        height: args.height,
        fps: args.fps,
        audio: false,
    }
}
