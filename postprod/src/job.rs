use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Result;

/// Pause between status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Job status, normalized across services.
///
/// Each service speaks its own vocabulary ("Pending"/"Running"/"Success" vs.
/// "queued"/"processing"/"completed"); everything downstream of the clients
/// works with this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Error,
}

impl JobStatus {
    /// Terminal states admit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// Map an enhancement-service status string onto the shared vocabulary.
    /// Unknown strings normalize to `Error` rather than being polled forever.
    pub fn from_dolby(status: &str) -> Self {
        match status {
            "Pending" => JobStatus::Queued,
            "Running" => JobStatus::Running,
            "Success" => JobStatus::Completed,
            _ => JobStatus::Error,
        }
    }

    /// Map a transcription-service status string onto the shared vocabulary.
    pub fn from_assembly(status: &str) -> Self {
        match status {
            "queued" => JobStatus::Queued,
            "processing" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            _ => JobStatus::Error,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// One poll observation: normalized status plus the progress percentage when
/// the service reports one. Absent progress means unknown, not zero.
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    pub status: JobStatus,
    pub progress: Option<u8>,
}

/// A reportable change observed while watching a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    /// The job moved to a different status.
    Status(JobStatus),
    /// Progress strictly increased. Repeats and stale decreases are never
    /// reported.
    Progress(u8),
}

/// Drive a job to a terminal state.
///
/// `poll` performs one status query per call and does not retry; any transport
/// failure aborts the watch. `on_update` receives status changes and monotonic
/// progress increases: a progress value less than or equal to the last
/// reported one is treated as a stale read and dropped. `sleep` runs between
/// polls, so tests can substitute a no-op and real callers pass
/// `tokio::time::sleep`.
///
/// The loop ends when the status is terminal or progress reaches 100. There
/// is no retry cap: a job the service never finishes keeps this loop alive
/// until the process dies.
pub async fn watch<P, Fut, U, S, SFut>(
    mut poll: P,
    mut on_update: U,
    mut sleep: S,
) -> Result<JobStatus>
where
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation>>,
    U: FnMut(Update),
    S: FnMut(Duration) -> SFut,
    SFut: Future<Output = ()>,
{
    let mut last_status: Option<JobStatus> = None;
    let mut last_progress: Option<u8> = None;

    loop {
        let obs = poll().await?;

        if last_status != Some(obs.status) {
            on_update(Update::Status(obs.status));
            last_status = Some(obs.status);
        }

        if let Some(pct) = obs.progress {
            match last_progress {
                Some(seen) if pct <= seen => {
                    if pct < seen {
                        warn!(reported = pct, seen, "progress went backwards, ignoring stale read");
                    }
                }
                _ => {
                    on_update(Update::Progress(pct));
                    last_progress = Some(pct);
                }
            }
        }

        if obs.status.is_terminal() {
            debug!(status = %obs.status, "job reached terminal state");
            return Ok(obs.status);
        }

        if obs.progress == Some(100) {
            debug!("progress reached 100, stopping");
            return Ok(obs.status);
        }

        sleep(POLL_INTERVAL).await;
    }
}
