//! Face encoder backed by an external program.
//!
//! The program receives one PNG image on stdin and prints a JSON document on
//! stdout: `null` when no face was found, otherwise either a bare array of
//! numbers or `{"embedding": [...], "model_version": "..."}`.

use attend_core::{Embedding, EncoderError, FaceEncoder};
use image::{ImageFormat, RgbImage};
use serde::Deserialize;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[derive(Deserialize)]
#[serde(untagged)]
enum EncoderOutput {
    Bare(Vec<f32>),
    Tagged {
        embedding: Option<Vec<f32>>,
        model_version: Option<String>,
    },
}

pub struct CommandEncoder {
    program: PathBuf,
    args: Vec<String>,
    dim: usize,
}

impl CommandEncoder {
    /// Resolve the encoder command. `command` is split on whitespace into a
    /// program and its arguments; the program is looked up on `PATH` unless
    /// it contains a path separator.
    pub fn load(command: &str, dim: usize) -> Result<Self, EncoderError> {
        let mut parts = command.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| EncoderError::Unavailable("no encoder command configured".into()))?;
        let program = resolve_program(name).ok_or_else(|| {
            EncoderError::Unavailable(format!("encoder program not found: {name}"))
        })?;
        let args = parts.map(str::to_string).collect();

        tracing::info!(program = %program.display(), dim, "face encoder loaded");
        Ok(Self { program, args, dim })
    }

    fn parse_output(&self, stdout: &[u8]) -> Result<Option<Embedding>, EncoderError> {
        let output: Option<EncoderOutput> = serde_json::from_slice(stdout)
            .map_err(|e| EncoderError::Failed(format!("unreadable encoder output: {e}")))?;

        let embedding = match output {
            None | Some(EncoderOutput::Tagged { embedding: None, .. }) => return Ok(None),
            Some(EncoderOutput::Bare(values)) => Embedding::new(values),
            Some(EncoderOutput::Tagged {
                embedding: Some(values),
                model_version,
            }) => Embedding { values, model_version },
        };

        if embedding.dim() != self.dim {
            return Err(EncoderError::Failed(format!(
                "expected {}-dim embedding, got {}",
                self.dim,
                embedding.dim()
            )));
        }
        Ok(Some(embedding))
    }
}

impl FaceEncoder for CommandEncoder {
    fn encode(&mut self, image: &RgbImage) -> Result<Option<Embedding>, EncoderError> {
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EncoderError::Failed(format!("spawn {}: {e}", self.program.display())))?;

        // Feed stdin from a separate thread so a chatty encoder cannot
        // deadlock against a full stdout pipe.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EncoderError::Failed("encoder stdin unavailable".into()))?;
        let writer = std::thread::spawn(move || stdin.write_all(&png));

        let output = child
            .wait_with_output()
            .map_err(|e| EncoderError::Failed(format!("encoder wait: {e}")))?;
        if let Ok(Err(e)) = writer.join() {
            tracing::debug!(error = %e, "encoder closed stdin early");
        }

        if !output.status.success() {
            return Err(EncoderError::Failed(format!(
                "encoder exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let result = self.parse_output(&output.stdout)?;
        tracing::debug!(
            width = image.width(),
            height = image.height(),
            face = result.is_some(),
            "image encoded"
        );
        Ok(result)
    }
}

/// Encoder as resolved at startup.
///
/// A missing encoder only disables enroll and identify; every call reports
/// the reason captured when loading failed.
pub enum StartupEncoder {
    Ready(CommandEncoder),
    Unavailable(String),
}

impl StartupEncoder {
    pub fn load(command: &str, dim: usize) -> Self {
        match CommandEncoder::load(command, dim) {
            Ok(encoder) => Self::Ready(encoder),
            Err(e) => {
                let reason = match e {
                    EncoderError::Unavailable(reason) => reason,
                    other => other.to_string(),
                };
                tracing::warn!(reason = %reason, "face encoder unavailable; enroll and identify disabled");
                Self::Unavailable(reason)
            }
        }
    }
}

impl FaceEncoder for StartupEncoder {
    fn encode(&mut self, image: &RgbImage) -> Result<Option<Embedding>, EncoderError> {
        match self {
            Self::Ready(encoder) => encoder.encode(image),
            Self::Unavailable(reason) => Err(EncoderError::Unavailable(reason.clone())),
        }
    }
}

fn resolve_program(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|p| p.is_file())
}
