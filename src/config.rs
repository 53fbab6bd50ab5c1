//! Node configuration
//!
//! Settings come from three layers: built-in defaults, an optional
//! TOML config file, and command-line flags. Later layers win. The
//! file lives at the platform config dir by default and can be pointed
//! elsewhere with `--config`.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use directories::ProjectDirs;
use serde::Deserialize;

use crate::camera::{CameraSettings, DeviceBackend};
use crate::constants::{
    DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH, DEFAULT_JPEG_QUALITY, DEFAULT_STREAM_PORT,
    DEFAULT_TARGET_FPS, MAX_CAMERAS,
};
use crate::error::ConfigError;

/// Command-line flags. Every value flag is optional so the config
/// file can fill the gaps.
#[derive(Debug, Parser)]
#[command(name = "evol-cctv-node", about = "Multi-camera CCTV edge node", version)]
pub struct CliArgs {
    /// Number of camera slots (1-4)
    #[arg(long)]
    cams: Option<usize>,

    /// Capture width per camera
    #[arg(long)]
    width: Option<u32>,

    /// Capture height per camera
    #[arg(long)]
    height: Option<u32>,

    /// Target capture rate per camera
    #[arg(long)]
    fps: Option<u32>,

    /// Host of the central receiver; transmission stays unavailable
    /// without it
    #[arg(long, env = "EVOL_CCTV_SERVER")]
    server: Option<String>,

    /// TCP port of the central receiver
    #[arg(long, env = "EVOL_CCTV_PORT")]
    port: Option<u16>,

    /// JPEG quality for streamed frames (1-100)
    #[arg(long)]
    quality: Option<u8>,

    /// Capture backend: auto, v4l2, dshow or msmf
    #[arg(long)]
    backend: Option<DeviceBackend>,

    /// Device for one slot, repeatable in slot order. Slots without a
    /// flag fall back to their index.
    #[arg(long = "device")]
    devices: Vec<String>,

    /// Capture microphone audio alongside slot 0
    #[arg(long)]
    audio: bool,

    /// Open the preview window at startup
    #[arg(long)]
    preview: bool,

    /// Directory snapshots are written to
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(long, env = "EVOL_CCTV_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long)]
    debug: bool,
}

/// On-disk config shape, every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NodeConfigFile {
    cams: Option<usize>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
    server: Option<String>,
    port: Option<u16>,
    quality: Option<u8>,
    backend: Option<DeviceBackend>,
    devices: Option<Vec<String>>,
    audio: Option<bool>,
    preview: Option<bool>,
    snapshot_dir: Option<PathBuf>,
}

/// Fully resolved node configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub cams: usize,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub server: Option<String>,
    pub port: u16,
    pub quality: u8,
    pub backend: DeviceBackend,
    pub devices: Vec<String>,
    pub audio: bool,
    pub preview: bool,
    pub snapshot_dir: PathBuf,
    pub debug: bool,
}

impl NodeConfig {
    /// Parse the process command line and resolve the full config.
    pub fn from_cli() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => read_config_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_config_file(&path)?,
                _ => NodeConfigFile::default(),
            },
        };
        let config = Self::merge(args, file);
        config.validate()?;
        Ok(config)
    }

    fn merge(args: CliArgs, file: NodeConfigFile) -> Self {
        Self {
            cams: args.cams.or(file.cams).unwrap_or(MAX_CAMERAS),
            width: args.width.or(file.width).unwrap_or(DEFAULT_FRAME_WIDTH),
            height: args.height.or(file.height).unwrap_or(DEFAULT_FRAME_HEIGHT),
            fps: args.fps.or(file.fps).unwrap_or(DEFAULT_TARGET_FPS),
            server: args.server.or(file.server),
            port: args.port.or(file.port).unwrap_or(DEFAULT_STREAM_PORT),
            quality: args.quality.or(file.quality).unwrap_or(DEFAULT_JPEG_QUALITY),
            backend: args.backend.or(file.backend).unwrap_or(DeviceBackend::Auto),
            devices: if args.devices.is_empty() {
                file.devices.unwrap_or_default()
            } else {
                args.devices
            },
            audio: args.audio || file.audio.unwrap_or(false),
            preview: args.preview || file.preview.unwrap_or(false),
            snapshot_dir: args
                .snapshot_dir
                .or(file.snapshot_dir)
                .unwrap_or_else(|| PathBuf::from(".")),
            debug: args.debug,
        }
    }

    /// Reject configurations no worker should ever start under. This
    /// is the only fatal error class in the node.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cams == 0 || self.cams > MAX_CAMERAS {
            return Err(ConfigError::BadCameraCount {
                got: self.cams,
                max: MAX_CAMERAS,
            });
        }
        if self.quality == 0 || self.quality > 100 {
            return Err(ConfigError::BadQuality(self.quality));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::BadDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.fps == 0 {
            return Err(ConfigError::BadFps);
        }
        Ok(())
    }

    pub fn camera_settings(&self) -> CameraSettings {
        CameraSettings {
            cameras: self.cams,
            width: self.width,
            height: self.height,
            fps: self.fps,
            backend: self.backend,
            devices: self.devices.clone(),
            audio: self.audio,
        }
    }
}

fn read_config_file(path: &Path) -> Result<NodeConfigFile, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    toml::from_str(&raw).map_err(|e| ConfigError::FileParse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "evol-cctv").map(|dirs| dirs.config_dir().join("node.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("node").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_apply_without_flags_or_file() {
        let config = NodeConfig::merge(parse(&[]), NodeConfigFile::default());
        assert_eq!(config.cams, MAX_CAMERAS);
        assert_eq!(config.width, DEFAULT_FRAME_WIDTH);
        assert_eq!(config.height, DEFAULT_FRAME_HEIGHT);
        assert_eq!(config.fps, DEFAULT_TARGET_FPS);
        assert_eq!(config.port, DEFAULT_STREAM_PORT);
        assert_eq!(config.quality, DEFAULT_JPEG_QUALITY);
        assert_eq!(config.backend, DeviceBackend::Auto);
        assert!(config.server.is_none());
        assert!(!config.audio);
        assert!(!config.preview);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_flags_override_file_values() {
        let file: NodeConfigFile = toml::from_str(
            r#"
            cams = 2
            width = 320
            quality = 40
            server = "file-host"
            "#,
        )
        .unwrap();
        let args = parse(&["--cams", "3", "--server", "cli-host"]);
        let config = NodeConfig::merge(args, file);
        assert_eq!(config.cams, 3);
        assert_eq!(config.server.as_deref(), Some("cli-host"));
        // Untouched flags still come from the file.
        assert_eq!(config.width, 320);
        assert_eq!(config.quality, 40);
    }

    #[test]
    fn test_config_file_is_read_and_layered() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            "cams = 2\nfps = 10\nbackend = \"v4l2\"\ndevices = [\"0\", \"2\"]\naudio = true"
        )
        .unwrap();
        let path = tmp.path().to_string_lossy().into_owned();

        let args = parse(&["--config", &path, "--fps", "25"]);
        let config = NodeConfig::from_args(args).unwrap();
        assert_eq!(config.cams, 2);
        assert_eq!(config.fps, 25, "cli beats file");
        assert_eq!(config.backend, DeviceBackend::V4l2);
        assert_eq!(config.devices, vec!["0".to_string(), "2".to_string()]);
        assert!(config.audio);
    }

    #[test]
    fn test_missing_explicit_config_file_fails() {
        let args = parse(&["--config", "/nonexistent/evol-cctv.toml"]);
        let err = NodeConfig::from_args(args).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_malformed_config_file_fails() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "cams = \"plenty\"").unwrap();
        let path = tmp.path().to_string_lossy().into_owned();

        let err = NodeConfig::from_args(parse(&["--config", &path])).unwrap_err();
        assert!(matches!(err, ConfigError::FileParse { .. }));
    }

    #[test]
    fn test_out_of_range_values_are_fatal() {
        let bad = [
            (&["--cams", "0"][..], "cams zero"),
            (&["--cams", "5"][..], "cams above limit"),
            (&["--quality", "0"][..], "quality zero"),
            (&["--quality", "101"][..], "quality above 100"),
            (&["--width", "0"][..], "zero width"),
            (&["--fps", "0"][..], "zero fps"),
        ];
        for (flags, what) in bad {
            let config = NodeConfig::merge(parse(flags), NodeConfigFile::default());
            assert!(config.validate().is_err(), "{} must be rejected", what);
        }
    }

    #[test]
    fn test_devices_flag_repeats_in_slot_order() {
        let args = parse(&["--device", "test:a", "--device", "1"]);
        let config = NodeConfig::merge(args, NodeConfigFile::default());
        assert_eq!(config.devices, vec!["test:a".to_string(), "1".to_string()]);

        let settings = config.camera_settings();
        assert_eq!(settings.devices.len(), 2);
        assert_eq!(settings.cameras, MAX_CAMERAS);
    }

    #[test]
    fn test_unknown_file_keys_are_rejected() {
        let err = toml::from_str::<NodeConfigFile>("quality = 70\ntypo_key = 1").unwrap_err();
        assert!(err.to_string().contains("typo_key"));
    }
}
