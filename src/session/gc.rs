//! Background expiration sweeps.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::provider::Provider;

/// Periodic task calling [`Provider::gc`].
///
/// The first sweep runs one interval after start. Failed or panicking
/// sweeps are logged and the loop keeps going. Dropping the scheduler stops
/// the task.
#[derive(Debug)]
pub struct GcScheduler {
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl GcScheduler {
    /// Spawn the GC task on the current tokio runtime.
    pub fn start(provider: Arc<dyn Provider>, interval: Duration) -> Self {
        // tokio intervals reject a zero period
        let interval = interval.max(Duration::from_millis(1));
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                provider = provider.name(),
                interval_ms = interval.as_millis() as u64,
                "Session GC started"
            );

            loop {
                tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        run_once(provider.as_ref()).await;
                    }
                }
            }

            info!(provider = provider.name(), "Session GC stopped");
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the task to stop. Safe to call more than once.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Whether the task is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Session GC task failed");
            }
        }
    }
}

impl Drop for GcScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run one sweep, isolating errors and panics.
///
/// Returns `true` if the sweep completed successfully.
pub async fn run_once(provider: &dyn Provider) -> bool {
    match AssertUnwindSafe(provider.gc()).catch_unwind().await {
        Ok(Ok(())) => {
            debug!(provider = provider.name(), "Session GC sweep finished");
            true
        }
        Ok(Err(e)) => {
            error!(provider = provider.name(), error = %e, "Session GC sweep failed");
            false
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(provider = provider.name(), panic = %message, "Session GC sweep panicked");
            false
        }
    }
}
