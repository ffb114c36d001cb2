use attend_core::service::{DEFAULT_DEVICE, DEFAULT_TOLERANCE};
use attend_core::ServiceConfig;
use std::path::PathBuf;

/// Default embedding dimensionality (dlib-style 128-d face descriptors).
pub const DEFAULT_EMBEDDING_DIM: usize = 128;
/// Default external encoder program, looked up on `PATH`.
pub const DEFAULT_ENCODER: &str = "attend-face-encoder";

/// Application configuration, loaded from environment variables.
pub struct Config {
    /// Directory holding the attendance database.
    pub data_dir: PathBuf,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// External program that turns an image into an embedding.
    pub encoder_program: String,
    /// Dimensionality every embedding must have.
    pub embedding_dim: usize,
    /// Euclidean distance below which a face is accepted.
    pub tolerance: f32,
    /// Source device label written with every scan event.
    pub device: String,
    /// Whether CSV exports start with a UTF-8 byte-order mark.
    pub csv_bom: bool,
}

impl Config {
    /// Load configuration from `ATTEND_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("ATTEND_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("XDG_DATA_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| {
                        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                        PathBuf::from(home).join(".local/share")
                    })
                    .join("attend")
            });

        let db_path = std::env::var("ATTEND_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("attendance.db"));

        Self {
            data_dir,
            db_path,
            encoder_program: std::env::var("ATTEND_ENCODER")
                .unwrap_or_else(|_| DEFAULT_ENCODER.to_string()),
            embedding_dim: env_usize("ATTEND_EMBEDDING_DIM", DEFAULT_EMBEDDING_DIM),
            tolerance: env_f32("ATTEND_TOLERANCE", DEFAULT_TOLERANCE),
            device: std::env::var("ATTEND_DEVICE").unwrap_or_else(|_| DEFAULT_DEVICE.to_string()),
            csv_bom: std::env::var("ATTEND_CSV_BOM")
                .map(|v| v != "0")
                .unwrap_or(true),
        }
    }

    /// Configuration handed to the attendance service.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            tolerance: self.tolerance,
            device: self.device.clone(),
        }
    }
}

/// Finite `f32` from the environment; `NaN` and infinities fall back to `default`.
fn env_f32(key: &str, default: f32) -> f32 {
    parse_finite_f32(std::env::var(key).ok().as_deref(), default)
}

fn parse_finite_f32(raw: Option<&str>, default: f32) -> f32 {
    match raw.map(|v| v.trim().parse::<f32>()) {
        Some(Ok(v)) if v.is_finite() => v,
        Some(_) => {
            tracing::warn!(value = ?raw, default, "ignoring non-numeric or non-finite value");
            default
        }
        None => default,
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_finite_f32() {
        assert_eq!(parse_finite_f32(Some("0.5"), 0.45), 0.5);
        assert_eq!(parse_finite_f32(None, 0.45), 0.45);
        assert_eq!(parse_finite_f32(Some("NaN"), 0.45), 0.45);
        assert_eq!(parse_finite_f32(Some("inf"), 0.45), 0.45);
        assert_eq!(parse_finite_f32(Some("-infinity"), 0.45), 0.45);
        assert_eq!(parse_finite_f32(Some("strict"), 0.45), 0.45);
    }
}
