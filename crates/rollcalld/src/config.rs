use chrono::NaiveTime;
use rollcall_core::liveness::{DEFAULT_BLINK_COOLDOWN_FRAMES, DEFAULT_EAR_CLOSED_THRESHOLD};
use std::path::PathBuf;

/// Default cutoff separating a Present record from a Late one.
pub const DEFAULT_CUTOFF_TIME: &str = "09:00:00";

/// Service configuration, loaded from environment variables.
pub struct Config {
    /// Directory of enrollment photos the recognition collaborator encodes;
    /// file names define canonical identity names.
    pub gallery_dir: PathBuf,
    /// Path to the CSV attendance ledger.
    pub ledger_path: PathBuf,
    /// Time-of-day cutoff: records landing at or before it are Present,
    /// later ones are Late.
    pub cutoff_time: NaiveTime,
    /// Euclidean distance below which a probe matches a gallery entry.
    pub match_threshold: f32,
    /// Average eye aspect ratio below which the eyes count as closed.
    pub ear_closed_threshold: f32,
    /// Frames a blink event suppresses re-triggering for.
    pub blink_cooldown_frames: u32,
    /// Reciprocal of the detector's downscale factor; emitted bounding
    /// boxes are multiplied by this to land in full-frame coordinates.
    pub detection_scale: f32,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with
    /// defaults. Unparsable values fall back silently.
    pub fn from_env() -> Self {
        Self {
            gallery_dir: std::env::var("ROLLCALL_GALLERY_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("known_faces")),
            ledger_path: std::env::var("ROLLCALL_LEDGER_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("Attendance.csv")),
            cutoff_time: std::env::var("ROLLCALL_CUTOFF_TIME")
                .ok()
                .and_then(|v| parse_cutoff(&v))
                .unwrap_or_else(default_cutoff),
            match_threshold: env_f32("ROLLCALL_MATCH_THRESHOLD", 0.45),
            ear_closed_threshold: env_f32(
                "ROLLCALL_EAR_CLOSED_THRESHOLD",
                DEFAULT_EAR_CLOSED_THRESHOLD,
            ),
            blink_cooldown_frames: env_u32(
                "ROLLCALL_BLINK_COOLDOWN_FRAMES",
                DEFAULT_BLINK_COOLDOWN_FRAMES,
            ),
            detection_scale: env_f32("ROLLCALL_DETECTION_SCALE", 4.0),
        }
    }
}

/// Parse an `HH:MM:SS` cutoff string.
pub fn parse_cutoff(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S").ok()
}

fn default_cutoff() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default()
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
