//! Face encoder capability.
//!
//! Face detection and embedding extraction live outside this crate. An
//! encoder is loaded once at startup; if the backing capability is missing,
//! loading fails with [`EncoderError::Unavailable`] and no identify or
//! enroll operation can run.

use crate::types::Embedding;
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("face encoder unavailable: {0}")]
    Unavailable(String),
    #[error("face encoding failed: {0}")]
    Failed(String),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}

/// Produces a fixed-length embedding from a raster image.
pub trait FaceEncoder {
    /// Encode the first face found in `image`.
    ///
    /// Returns `Ok(None)` when no face is detected; that is a normal outcome
    /// and the caller should ask for another image.
    fn encode(&mut self, image: &RgbImage) -> Result<Option<Embedding>, EncoderError>;
}

/// Open an image file in any supported format and convert it to RGB.
pub fn load_image(path: &Path) -> Result<RgbImage, EncoderError> {
    let image = image::open(path)?;
    tracing::debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "loaded image"
    );
    Ok(image.to_rgb8())
}
