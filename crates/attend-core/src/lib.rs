//! attend-core: Face identification and attendance aggregation.
//!
//! Matches a query face embedding against an enrolled gallery by Euclidean
//! distance, and folds timestamped scan events into daily and per-identity
//! work-hour reports.

pub mod aggregate;
pub mod encoder;
pub mod matcher;
pub mod range;
pub mod report;
pub mod service;
pub mod storage;
pub mod types;

pub use aggregate::{aggregate_daily, aggregate_total, DailySummary, TotalSummary};
pub use encoder::{EncoderError, FaceEncoder};
pub use matcher::{EuclideanMatcher, Match, Matcher};
pub use range::{DateRange, RangeError};
pub use report::Report;
pub use service::{AttendanceService, EnrollOutcome, IdentifyOutcome, ServiceConfig, ServiceError};
pub use storage::{EventLog, IdentityStore, StoreError};
pub use types::{AttendanceEntry, Embedding, IdentityRecord, NewIdentity, ScanEvent};
