use crate::client::{ClientError, ScanService};
use crate::model::{TaskSnapshot, TaskStatus};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub deadline: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(crate::config::DEFAULT_POLL_INTERVAL_SECS),
            deadline: None,
        }
    }
}

/// One progress sample taken while the task is not yet done.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressObservation {
    pub task_id: String,
    pub poll: u32,
    pub status: TaskStatus,
    pub progress: u8,
}

pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Shared flag a caller can raise to stop polling between samples.
#[derive(Debug, Default, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("status query failed: {0}")]
    Remote(#[from] ClientError),
    #[error("task did not finish within {elapsed:?}")]
    TimedOut { elapsed: Duration },
    #[error("polling cancelled")]
    Cancelled,
}

/// Queries `task_id` until the daemon reports it done.
///
/// Every non-terminal sample is handed to `observe` before waiting one
/// interval. A failed remote task keeps being polled; only `Done`, the
/// deadline, or the cancel token end the loop.
pub fn poll_until_done<S, C, F>(
    service: &mut S,
    task_id: &str,
    settings: &PollSettings,
    clock: &C,
    cancel: &CancelToken,
    mut observe: F,
) -> Result<TaskSnapshot, PollError>
where
    S: ScanService + ?Sized,
    C: Clock + ?Sized,
    F: FnMut(&ProgressObservation),
{
    let started = clock.now();
    let mut poll = 0u32;

    loop {
        let snapshot = service.task_status(task_id)?;
        if snapshot.status == TaskStatus::Done {
            debug!(task_id, polls = poll, "task reached done");
            return Ok(snapshot);
        }

        poll += 1;
        if snapshot.status == TaskStatus::Failed {
            warn!(task_id, "task reports a failed state, still waiting for done");
        }
        observe(&ProgressObservation {
            task_id: task_id.to_string(),
            poll,
            status: snapshot.status,
            progress: snapshot.progress,
        });

        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }
        if let Some(deadline) = settings.deadline {
            let elapsed = clock.now().saturating_duration_since(started);
            if elapsed >= deadline {
                return Err(PollError::TimedOut { elapsed });
            }
        }

        clock.sleep(settings.interval);
    }
}
