use super::CullManager;
use crate::core::{CullError, Result};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Duration as TokioDuration, sleep};
use tracing::{debug, error};

/// Background task ticking a [`CullManager`] on a fixed interval.
pub struct CullWorker {
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl CullWorker {
    /// Signals the worker to stop and waits for it to finish.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(join_handle) = self.join_handle.take() {
            join_handle
                .await
                .map_err(|err| CullError::Scheduler(format!("cull worker join: {}", err)))?;
        }
        Ok(())
    }
}

impl Drop for CullWorker {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            join_handle.abort();
        }
    }
}

/// Spawns a worker that calls `tick` with the manager's clock every `interval_ms`.
///
/// Must be called from within a tokio runtime.
///
/// # Examples
///
/// ```
/// use dormancy::simulation::RecordingHost;
/// use dormancy::{CullingPolicy, ManualClock, spawn_cull_worker};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let clock = Arc::new(ManualClock::new(0));
/// let host = Arc::new(RecordingHost::new());
/// let manager = dormancy::in_memory_manager(host, clock, CullingPolicy::default()).unwrap();
///
/// let worker = spawn_cull_worker(Arc::new(manager), 50);
/// worker.stop().await.unwrap();
/// # });
/// ```
pub fn spawn_cull_worker(manager: Arc<CullManager>, interval_ms: u64) -> CullWorker {
    let interval_ms = interval_ms.max(10);
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let join_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    break;
                }
                _ = sleep(TokioDuration::from_millis(interval_ms)) => {
                    match manager.tick_now() {
                        Ok(report) if report.due > 0 => {
                            debug!(
                                due = report.due,
                                deactivated = report.deactivated,
                                reactivated = report.reactivated,
                                culled = report.culled,
                                failed = report.failed,
                                skipped = report.skipped,
                                "cull tick"
                            );
                        }
                        Ok(_) => {}
                        Err(err) => error!(error = %err, "cull tick failed"),
                    }
                }
            }
        }
    });

    CullWorker {
        stop_tx: Some(stop_tx),
        join_handle: Some(join_handle),
    }
}
