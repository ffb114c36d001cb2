use crate::config::Config;
use crate::encoder::StartupEncoder;
use attend_core::encoder::load_image;
use attend_core::{
    AttendanceService, DateRange, EnrollOutcome, IdentifyOutcome, IdentityRecord,
    NewIdentity, Report, ServiceError, StoreError,
};
use attend_store::SqliteStore;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

type Service = AttendanceService<StartupEncoder, SqliteStore>;
type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

/// Messages sent from the command layer to the engine thread.
enum EngineRequest {
    Enroll {
        identity: NewIdentity,
        image: PathBuf,
        reply: Reply<EnrollOutcome>,
    },
    Identify {
        image: PathBuf,
        tolerance: f32,
        reply: Reply<IdentifyOutcome>,
    },
    List {
        reply: Reply<Vec<IdentityRecord>>,
    },
    Remove {
        id: i64,
        reply: Reply<bool>,
    },
    Report {
        range: DateRange,
        reply: Reply<Report>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Load the image, encode it, and enroll the face under `identity`.
    pub async fn enroll(
        &self,
        identity: NewIdentity,
        image: PathBuf,
    ) -> Result<EnrollOutcome, EngineError> {
        self.request(|reply| EngineRequest::Enroll { identity, image, reply })
            .await
    }

    /// Run one identify cycle on an image file.
    pub async fn identify(&self, image: PathBuf, tolerance: f32) -> Result<IdentifyOutcome, EngineError> {
        self.request(|reply| EngineRequest::Identify { image, tolerance, reply })
            .await
    }

    pub async fn list(&self) -> Result<Vec<IdentityRecord>, EngineError> {
        self.request(|reply| EngineRequest::List { reply }).await
    }

    pub async fn remove(&self, id: i64) -> Result<bool, EngineError> {
        self.request(|reply| EngineRequest::Remove { id, reply }).await
    }

    pub async fn report(&self, range: DateRange) -> Result<Report, EngineError> {
        self.request(|reply| EngineRequest::Report { range, reply }).await
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Resolves the face encoder once and opens the database synchronously, then
/// enters a request loop. A missing encoder fails enroll and identify with
/// [`attend_core::EncoderError::Unavailable`]; list, remove and report still work. Encoding
/// can be slow; keeping it on its own thread leaves the async side free.
pub fn spawn_engine(config: &Config) -> Result<EngineHandle, EngineError> {
    let encoder = StartupEncoder::load(&config.encoder_program, config.embedding_dim);
    let store = SqliteStore::open(&config.db_path)?;
    let service = AttendanceService::new(config.service_config(), encoder, store);

    let (tx, rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("attend-engine".into())
        .spawn(move || run(service, rx))?;

    Ok(EngineHandle { tx })
}

fn run(mut service: Service, mut rx: mpsc::Receiver<EngineRequest>) {
    tracing::info!("engine thread started");
    while let Some(req) = rx.blocking_recv() {
        match req {
            EngineRequest::Enroll { identity, image, reply } => {
                let result = load_image(&image)
                    .map_err(ServiceError::from)
                    .and_then(|img| service.enroll(&identity, &img))
                    .map_err(EngineError::from);
                let _ = reply.send(result);
            }
            EngineRequest::Identify { image, tolerance, reply } => {
                let now = chrono::Local::now().naive_local();
                let result = load_image(&image)
                    .map_err(ServiceError::from)
                    .and_then(|img| service.identify_at(&img, now, tolerance))
                    .map_err(EngineError::from);
                let _ = reply.send(result);
            }
            EngineRequest::List { reply } => {
                let _ = reply.send(service.list().map_err(EngineError::from));
            }
            EngineRequest::Remove { id, reply } => {
                let _ = reply.send(service.remove(id).map_err(EngineError::from));
            }
            EngineRequest::Report { range, reply } => {
                let _ = reply.send(service.report(range).map_err(EngineError::from));
            }
        }
    }
    tracing::info!("engine thread exiting");
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use attend_core::EncoderError;

    fn config(dir: &std::path::Path, script_body: &str) -> Config {
        let script = dir.join("encoder.sh");
        std::fs::write(&script, script_body).unwrap();
        Config {
            data_dir: dir.to_path_buf(),
            db_path: dir.join("attendance.db"),
            encoder_program: format!("sh {}", script.display()),
            embedding_dim: 2,
            tolerance: 0.45,
            device: "gate-1".into(),
            csv_bom: false,
        }
    }

    fn write_image(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("face.png");
        image::RgbImage::new(4, 4).save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn test_enroll_identify_report_through_engine() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), "cat > /dev/null\necho '[0.1, 0.2]'\n");
        let image = write_image(dir.path());
        let engine = spawn_engine(&cfg).unwrap();

        let outcome = engine
            .enroll(NewIdentity::new("E001", "An", "Ops"), image.clone())
            .await
            .unwrap();
        assert!(matches!(outcome, EnrollOutcome::Enrolled { .. }));

        let outcome = engine.identify(image.clone(), cfg.tolerance).await.unwrap();
        match outcome {
            IdentifyOutcome::Matched { code, event, .. } => {
                assert_eq!(code, "E001");
                assert_eq!(event.source_device, "gate-1");
            }
            other => panic!("expected match, got {other:?}"),
        }

        let report = engine.report(DateRange::all()).await.unwrap();
        assert_eq!(report.totals.len(), 1);
        assert_eq!(report.totals[0].total_scan_count, 1);

        assert_eq!(engine.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_face_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), "cat > /dev/null\necho null\n");
        let image = write_image(dir.path());
        let engine = spawn_engine(&cfg).unwrap();

        let outcome = engine.identify(image, cfg.tolerance).await.unwrap();
        assert_eq!(outcome, IdentifyOutcome::NoFace);
        assert!(engine.report(DateRange::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_encoder_disables_only_face_operations() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), "");
        cfg.encoder_program = "/nonexistent/encoder".into();
        let image = write_image(dir.path());
        let engine = spawn_engine(&cfg).unwrap();

        let report = engine.report(DateRange::all()).await.unwrap();
        assert!(report.is_empty());
        assert!(engine.list().await.unwrap().is_empty());
        assert!(!engine.remove(1).await.unwrap());

        let err = engine.identify(image.clone(), cfg.tolerance).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Service(ServiceError::Encoder(EncoderError::Unavailable(_)))
        ));
        let err = engine
            .enroll(NewIdentity::new("E001", "An", ""), image)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Service(ServiceError::Encoder(EncoderError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_missing_image_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), "cat > /dev/null\necho null\n");
        let engine = spawn_engine(&cfg).unwrap();

        let err = engine
            .identify(dir.path().join("missing.png"), cfg.tolerance)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Service(ServiceError::Encoder(EncoderError::Image(_)))
        ));
    }
}
