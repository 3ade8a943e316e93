//! Cancellable forced-calibration deadline.
//!
//! A recalibration that never sees enough heading diversity is certified
//! anyway once the deadline expires. The timer is a spawned task racing a
//! sleep against a [`CancellationToken`]; re-arming or dropping the timer
//! cancels whatever was pending.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct PendingDeadline {
    epoch: u64,
    cancellation: CancellationToken,
    task: JoinHandle<()>,
}

/// At most one pending deadline, tagged with the epoch it was armed for.
#[derive(Default)]
pub struct ForcedCalibrationTimer {
    pending: Option<PendingDeadline>,
}

impl ForcedCalibrationTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the deadline, cancelling any previous one.
    ///
    /// `on_expiry` runs on the timer task with the armed epoch. Must be
    /// called from within a tokio runtime.
    pub fn arm<F>(&mut self, delay: Duration, epoch: u64, on_expiry: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();

        let cancellation = CancellationToken::new();
        let token = cancellation.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(epoch, "Forced-calibration deadline cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    debug!(epoch, "Forced-calibration deadline expired");
                    on_expiry(epoch);
                }
            }
        });

        debug!(epoch, delay_secs = delay.as_secs_f64(), "Forced-calibration deadline armed");
        self.pending = Some(PendingDeadline {
            epoch,
            cancellation,
            task,
        });
    }

    /// Cancels the pending deadline. Returns `true` if one was still waiting.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                let waiting = !pending.task.is_finished();
                pending.cancellation.cancel();
                waiting
            }
            None => false,
        }
    }

    /// Whether a deadline is armed and hasn't fired yet.
    pub fn is_armed(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| !p.task.is_finished())
    }

    pub fn armed_epoch(&self) -> Option<u64> {
        self.pending.as_ref().map(|p| p.epoch)
    }
}

impl Drop for ForcedCalibrationTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for ForcedCalibrationTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForcedCalibrationTimer")
            .field("armed_epoch", &self.armed_epoch())
            .field("is_armed", &self.is_armed())
            .finish()
    }
}
