use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{
    producer::BatchProducer,
    sinks::batch_file::{BATCH_FILE_PREFIX, REJECTED_FILE_PREFIX},
    staging, timestamp,
    upload::Uploader,
};

/// Clears the shared flag when the upload task finishes, panics included.
struct UploadInProgress(Arc<AtomicBool>);

impl UploadInProgress {
    fn raise(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag.clone())
    }
}

impl Drop for UploadInProgress {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadOutcome {
    pub uploaded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub valid: usize,
    pub uploads: UploadOutcome,
}

/// Files to push in one cycle, captured once when the task starts.
struct UploadJob {
    dir: PathBuf,
    uploader: Uploader,
    rejected_uploader: Option<Uploader>,
}

impl UploadJob {
    async fn staged(dir: &Path, prefix: &str) -> Vec<PathBuf> {
        staging::list_with_prefix(dir, prefix).await.unwrap_or_else(|e| {
            tracing::error!(dir = %dir.display(), error = %e, "failed to list staged files");
            Vec::new()
        })
    }

    async fn run(self) -> UploadOutcome {
        let mut plan: Vec<(PathBuf, &Uploader)> = Self::staged(&self.dir, BATCH_FILE_PREFIX)
            .await
            .into_iter()
            .map(|p| (p, &self.uploader))
            .collect();
        if let Some(rejected) = &self.rejected_uploader {
            plan.extend(
                Self::staged(&self.dir, REJECTED_FILE_PREFIX)
                    .await
                    .into_iter()
                    .map(|p| (p, rejected)),
            );
        }

        let mut outcome = UploadOutcome::default();
        for (path, uploader) in plan {
            if uploader.upload(&path).await {
                outcome.uploaded += 1;
            } else {
                outcome.failed += 1;
            }
        }
        outcome
    }
}

#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub inverters_num: usize,
    pub num_files: usize,
    pub interval: Duration,
    pub drain_poll: Duration,
}

/// Generate → upload → clean → sleep, until shutdown.
///
/// At most one upload task exists at a time and the main flow always joins it
/// before touching the staging directory. On shutdown the staging directory is
/// only cleared once the in-progress flag has dropped.
pub struct CycleController {
    producer: BatchProducer,
    uploader: Uploader,
    rejected_uploader: Option<Uploader>,
    settings: CycleSettings,
    upload_in_progress: Arc<AtomicBool>,
}

impl CycleController {
    pub fn new(producer: BatchProducer, uploader: Uploader, settings: CycleSettings) -> Self {
        Self {
            producer,
            uploader,
            rejected_uploader: None,
            settings,
            upload_in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Also upload the rejected-record file through `uploader`.
    pub fn with_rejected_uploader(mut self, uploader: Option<Uploader>) -> Self {
        self.rejected_uploader = uploader;
        self
    }

    pub fn upload_in_progress(&self) -> bool {
        self.upload_in_progress.load(Ordering::SeqCst)
    }

    fn staging_dir(&self) -> &Path {
        self.producer.staging_dir()
    }

    /// One full cycle: produce, upload on a background task, join, clean up.
    pub async fn run_cycle(&self) -> CycleReport {
        tracing::info!(inverters = self.settings.inverters_num, "generating data");
        let valid = match self
            .producer
            .produce(self.settings.inverters_num, self.settings.num_files)
            .await
        {
            Ok(report) => report.valid,
            Err(e) => {
                tracing::error!(error = %e, "batch production failed");
                0
            }
        };

        tracing::info!("uploading staged files");
        let flag = UploadInProgress::raise(&self.upload_in_progress);
        let job = UploadJob {
            dir: self.staging_dir().to_path_buf(),
            uploader: self.uploader.clone(),
            rejected_uploader: self.rejected_uploader.clone(),
        };
        let handle = tokio::spawn(async move {
            let _flag = flag;
            job.run().await
        });

        let uploads = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "upload task failed");
                UploadOutcome::default()
            }
        };

        staging::clear(self.staging_dir()).await;

        metrics::counter!("generator_cycles_total").increment(1);
        tracing::info!(
            valid,
            uploaded = uploads.uploaded,
            failed = uploads.failed,
            completed_at = %timestamp::run_stamp(timestamp::now()),
            "cycle completed"
        );

        CycleReport { valid, uploads }
    }

    /// Loop until `shutdown` resolves, then drain and clean up.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.run_cycle() => {}
            }

            tracing::info!(
                interval_secs = self.settings.interval.as_secs(),
                "waiting for next run"
            );
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        self.stop().await;
    }

    async fn stop(&self) {
        tracing::info!("process interrupted, cleaning up");

        if self.upload_in_progress() {
            tracing::info!("upload in progress, waiting for completion");
            while self.upload_in_progress() {
                tokio::time::sleep(self.settings.drain_poll).await;
            }
            tracing::info!("upload completed");
        } else {
            tracing::info!("no active upload");
        }

        staging::clear(self.staging_dir()).await;
        tracing::info!("process stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::{BlobStore, UploadError};
    use std::sync::Mutex;
    use tokio::sync::{oneshot, Notify};

    /// Records keys; fails every file whose name contains `fail_marker`.
    #[derive(Default)]
    struct FakeStore {
        keys: Mutex<Vec<String>>,
        fail_marker: Option<&'static str>,
    }

    #[async_trait::async_trait]
    impl BlobStore for FakeStore {
        async fn put_file(&self, key: &str, _path: &Path) -> Result<(), UploadError> {
            if self.fail_marker.is_some_and(|m| key.contains(m)) {
                return Err(UploadError::Store {
                    key: key.to_string(),
                    message: "throttled".to_string(),
                });
            }
            self.keys.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }

    /// Holds every upload for `hold`, then records whether the file still existed.
    struct SlowStore {
        hold: Duration,
        started: Arc<Notify>,
        file_present_after_hold: Mutex<Vec<bool>>,
    }

    #[async_trait::async_trait]
    impl BlobStore for SlowStore {
        async fn put_file(&self, _key: &str, path: &Path) -> Result<(), UploadError> {
            self.started.notify_one();
            tokio::time::sleep(self.hold).await;
            let present = tokio::fs::metadata(path).await.is_ok();
            self.file_present_after_hold.lock().unwrap().push(present);
            Ok(())
        }
    }

    fn settings(interval: Duration) -> CycleSettings {
        CycleSettings {
            inverters_num: 40,
            num_files: 4,
            interval,
            drain_poll: Duration::from_millis(10),
        }
    }

    fn accept_all(dir: &Path) -> BatchProducer {
        BatchProducer::new(dir, 0.0).with_seed(1).with_transforms(Vec::new())
    }

    fn is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn cycle_uploads_every_batch_file_and_clears_staging() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::default());
        let ctl = CycleController::new(
            accept_all(dir.path()),
            Uploader::new(store.clone(), "raw/"),
            settings(Duration::from_secs(20)),
        );

        let report = ctl.run_cycle().await;

        assert_eq!(report.valid, 40);
        assert_eq!(report.uploads, UploadOutcome { uploaded: 4, failed: 0 });
        let keys = store.keys.lock().unwrap();
        assert!(keys.iter().all(|k| k.starts_with("raw/") && k.contains("/inverter-data-")));
        assert!(is_empty(dir.path()));
        assert!(!ctl.upload_in_progress());
    }

    #[tokio::test]
    async fn failed_uploads_do_not_stop_cycle_or_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore {
            fail_marker: Some("inverter-data-2_"),
            ..Default::default()
        });
        let ctl = CycleController::new(
            accept_all(dir.path()),
            Uploader::new(store.clone(), "raw/"),
            settings(Duration::from_secs(20)),
        );

        let report = ctl.run_cycle().await;

        assert_eq!(report.uploads, UploadOutcome { uploaded: 3, failed: 1 });
        assert!(is_empty(dir.path()));
    }

    #[tokio::test]
    async fn empty_production_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::default());
        let mut s = settings(Duration::from_secs(20));
        s.inverters_num = 0;
        let uploader = Uploader::new(store.clone(), "raw/");
        let ctl = CycleController::new(accept_all(dir.path()), uploader, s);

        let report = ctl.run_cycle().await;

        assert_eq!(report, CycleReport::default());
        assert!(store.keys.lock().unwrap().is_empty());
        assert!(is_empty(dir.path()));
    }

    #[tokio::test]
    async fn rejected_file_uploaded_only_with_its_own_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::default());
        let uploader = Uploader::new(store.clone(), "valid/");
        let ctl = CycleController::new(
            BatchProducer::new(dir.path(), 1.0).keep_rejected(true),
            uploader.clone(),
            settings(Duration::from_secs(20)),
        )
        .with_rejected_uploader(Some(uploader.with_prefix("invalid/")));

        let report = ctl.run_cycle().await;

        assert_eq!(report.valid, 0);
        assert_eq!(report.uploads.uploaded, 1);
        let keys = store.keys.lock().unwrap();
        assert!(keys[0].starts_with("invalid/"));
        assert!(keys[0].contains("/invalid-inverter-data_"));
        assert!(is_empty(dir.path()));
    }

    #[tokio::test]
    async fn shutdown_during_upload_waits_for_flag_before_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let started = Arc::new(Notify::new());
        let store = Arc::new(SlowStore {
            hold: Duration::from_millis(100),
            started: started.clone(),
            file_present_after_hold: Mutex::new(Vec::new()),
        });
        let ctl = CycleController::new(
            accept_all(dir.path()),
            Uploader::new(store.clone(), "raw/"),
            settings(Duration::from_secs(3600)),
        );

        let (tx, rx) = oneshot::channel::<()>();
        let run = tokio::spawn(async move {
            ctl.run(async {
                let _ = rx.await;
            })
            .await;
            ctl
        });

        started.notified().await;
        tx.send(()).unwrap();
        let ctl = run.await.unwrap();

        let seen = store.file_present_after_hold.lock().unwrap().clone();
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|present| *present));
        assert!(!ctl.upload_in_progress());
        assert!(is_empty(dir.path()));
    }

    #[tokio::test]
    async fn shutdown_while_sleeping_stops_promptly() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::default());
        let ctl = CycleController::new(
            accept_all(dir.path()),
            Uploader::new(store.clone(), "raw/"),
            settings(Duration::from_secs(3600)),
        );

        let (tx, rx) = oneshot::channel::<()>();
        let run = tokio::spawn(async move {
            ctl.run(async {
                let _ = rx.await;
            })
            .await;
        });

        // Wait for the first cycle's uploads to land.
        for _ in 0..200 {
            if store.keys.lock().unwrap().len() == 4 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("controller stopped")
            .unwrap();
        assert!(is_empty(dir.path()));
    }
}
