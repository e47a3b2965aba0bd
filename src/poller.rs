//! Background status polling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use crate::device::MountDevice;

/// Periodically polls a mount for status.
///
/// Spawns a background tokio task on creation; the task is cancelled on
/// drop. Tick failures are logged and counted, never propagated: an
/// unreachable mount just leaves consumers with stale data until it answers
/// again. If any ticks failed during the lifetime of this struct, a warning
/// is logged when dropped.
pub struct MountPoller {
    handle: JoinHandle<()>,
    failures: Arc<AtomicUsize>,
}

impl MountPoller {
    /// Start polling `device` every `interval`.
    ///
    /// The shared mutex serializes poll ticks against externally triggered
    /// command dispatches on the same device, so a tick's reply can never
    /// be attributed to a concurrent command (or vice versa).
    pub fn spawn(device: Arc<Mutex<MountDevice>>, interval: Duration) -> Self {
        let failures = Arc::new(AtomicUsize::new(0));
        let failures_clone = failures.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;

                let mut device = device.lock().await;
                if let Err(e) = device.poll_once().await {
                    let count = failures_clone.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!("status poll failed ({count} total): {e}");
                }
            }
        });

        Self { handle, failures }
    }

    /// Number of failed ticks since the poller started.
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}

impl Drop for MountPoller {
    fn drop(&mut self) {
        self.handle.abort();

        let failures = self.failures.load(Ordering::Relaxed);
        if failures > 0 {
            warn!("MountPoller: {failures} poll tick(s) failed during lifetime");
        }
    }
}
