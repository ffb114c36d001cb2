//! Attendance service: enrollment, the identify cycle, and reporting.
//!
//! The identify cycle is encode → match → append. An event is appended only
//! after a successful match and never for an unknown face.

use crate::encoder::{EncoderError, FaceEncoder};
use crate::matcher::{EuclideanMatcher, Matcher};
use crate::range::DateRange;
use crate::report::Report;
use crate::storage::{EventLog, IdentityStore, StoreError};
use crate::types::{IdentityRecord, NewIdentity, ScanEvent};
use chrono::NaiveDateTime;
use image::RgbImage;
use thiserror::Error;

/// Default match tolerance. Lower is stricter.
pub const DEFAULT_TOLERANCE: f32 = 0.45;
/// Default source device label for scan events.
pub const DEFAULT_DEVICE: &str = "desktop";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Encoder(#[from] EncoderError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("missing required field: {0}")]
    InvalidIdentity(&'static str),
    #[error("embedding has {actual} dimensions, gallery uses {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Explicit service configuration, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Maximum accepted match distance (exclusive).
    pub tolerance: f32,
    /// Label recorded as the source device of every scan event.
    pub device: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            device: DEFAULT_DEVICE.to_string(),
        }
    }
}

/// Result of an enrollment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollOutcome {
    Enrolled { id: i64 },
    /// The image contained no detectable face; nothing was stored.
    NoFace,
    /// The code is already enrolled; the existing record is unchanged.
    DuplicateCode(String),
}

/// Result of one identify cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentifyOutcome {
    /// Matched and recorded.
    Matched {
        identity_id: i64,
        code: String,
        name: String,
        distance: f32,
        event: ScanEvent,
    },
    /// A face was found but nobody in the gallery is within tolerance.
    /// `closest` is the best distance seen, `None` for an empty gallery.
    Unknown { closest: Option<f32> },
    /// No face in the image.
    NoFace,
}

pub struct AttendanceService<E, S> {
    config: ServiceConfig,
    encoder: E,
    store: S,
}

impl<E, S> AttendanceService<E, S>
where
    E: FaceEncoder,
    S: IdentityStore + EventLog,
{
    pub fn new(config: ServiceConfig, encoder: E, store: S) -> Self {
        tracing::info!(
            tolerance = config.tolerance,
            device = %config.device,
            "attendance service ready"
        );
        Self { config, encoder, store }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Encode the face in `image` and enroll it under `identity`.
    pub fn enroll(
        &mut self,
        identity: &NewIdentity,
        image: &RgbImage,
    ) -> Result<EnrollOutcome, ServiceError> {
        if let Some(field) = identity.missing_field() {
            return Err(ServiceError::InvalidIdentity(field));
        }

        let Some(embedding) = self.encoder.encode(image)? else {
            tracing::info!(code = %identity.code, "enroll: no face detected");
            return Ok(EnrollOutcome::NoFace);
        };

        let gallery = self.store.list_all()?;
        if let Some(expected) = gallery_dim(&gallery)? {
            if embedding.dim() != expected {
                return Err(ServiceError::DimensionMismatch {
                    expected,
                    actual: embedding.dim(),
                });
            }
        }

        match self.store.add(identity, &embedding) {
            Ok(id) => {
                tracing::info!(id, code = %identity.code, dim = embedding.dim(), "enrolled identity");
                Ok(EnrollOutcome::Enrolled { id })
            }
            Err(StoreError::DuplicateCode(code)) => {
                tracing::warn!(code = %code, "enroll: code already in use");
                Ok(EnrollOutcome::DuplicateCode(code))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run one identify cycle stamped with the current local time.
    pub fn identify(&mut self, image: &RgbImage) -> Result<IdentifyOutcome, ServiceError> {
        let tolerance = self.config.tolerance;
        self.identify_at(image, chrono::Local::now().naive_local(), tolerance)
    }

    /// Run one identify cycle with an explicit timestamp and tolerance.
    pub fn identify_at(
        &mut self,
        image: &RgbImage,
        at: NaiveDateTime,
        tolerance: f32,
    ) -> Result<IdentifyOutcome, ServiceError> {
        let Some(query) = self.encoder.encode(image)? else {
            tracing::info!("identify: no face detected");
            return Ok(IdentifyOutcome::NoFace);
        };

        let gallery = self.store.list_all()?;
        if let Some(expected) = gallery_dim(&gallery)? {
            if query.dim() != expected {
                return Err(ServiceError::DimensionMismatch {
                    expected,
                    actual: query.dim(),
                });
            }
        }

        let matcher = EuclideanMatcher;
        let Some(accepted) = matcher.compare(&query, &gallery, tolerance) else {
            let closest = matcher.nearest(&query, &gallery).map(|m| m.distance);
            tracing::info!(closest = ?closest, tolerance, "identify: unknown face");
            return Ok(IdentifyOutcome::Unknown { closest });
        };

        let identity = accepted.identity;
        let event = ScanEvent {
            identity_id: identity.id,
            timestamp: at,
            source_device: self.config.device.clone(),
        };
        self.store.append(&event)?;

        tracing::info!(
            id = identity.id,
            code = %identity.code,
            distance = accepted.distance,
            "identify: attendance recorded"
        );

        Ok(IdentifyOutcome::Matched {
            identity_id: identity.id,
            code: identity.code.clone(),
            name: identity.display_name.clone(),
            distance: accepted.distance,
            event,
        })
    }

    /// Delete an enrolled identity. Its past scan events are kept.
    pub fn remove(&mut self, id: i64) -> Result<bool, ServiceError> {
        let removed = self.store.delete(id)?;
        tracing::info!(id, removed, "remove identity");
        Ok(removed)
    }

    pub fn list(&self) -> Result<Vec<IdentityRecord>, ServiceError> {
        Ok(self.store.list_all()?)
    }

    /// Daily and total work-hour views over `range`.
    pub fn report(&self, range: DateRange) -> Result<Report, ServiceError> {
        let entries = self.store.query(&range)?;
        let report = Report::build(range, &entries);
        tracing::info!(
            range = %range,
            events = entries.len(),
            days = report.daily.len(),
            identities = report.totals.len(),
            "report built"
        );
        Ok(report)
    }
}

/// Common embedding length of the gallery, `None` when it is empty.
///
/// A gallery holding more than one length is corrupt: its distances are not
/// comparable.
fn gallery_dim(gallery: &[IdentityRecord]) -> Result<Option<usize>, StoreError> {
    let Some(first) = gallery.first() else {
        return Ok(None);
    };
    let expected = first.embedding.dim();
    match gallery.iter().find(|r| r.embedding.dim() != expected) {
        Some(odd) => Err(StoreError::Corrupt(format!(
            "identity {} has a {}-dim embedding, identity {} has {}",
            odd.id,
            odd.embedding.dim(),
            first.id,
            expected
        ))),
        None => Ok(Some(expected)),
    }
}
