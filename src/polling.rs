//! Fixed-interval polling until a remote job reaches a terminal status.

use std::time::{Duration, Instant};

use crate::remote::{DataId, Job, RemoteError, RemoteJobClient, TerminalStatus};

/// Default pause between status refreshes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How often to poll and when, if ever, to give up.
///
/// Both bounds default to `None`: the wait is unbounded unless a caller opts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// Maximum number of refreshes before giving up.
    pub max_polls: Option<usize>,
    /// Maximum wall-clock time spent waiting.
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_polls: None,
            timeout: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("Job {job} still not finished after {polls} polls ({elapsed:?})")]
    Exhausted {
        job: DataId,
        polls: usize,
        elapsed: Duration,
    },
}

/// Blocks the calling thread while a job runs.
pub struct PollingMonitor<'a, C: ?Sized> {
    client: &'a C,
    settings: PollSettings,
}

impl<'a, C: RemoteJobClient + ?Sized> PollingMonitor<'a, C> {
    pub fn new(client: &'a C, settings: PollSettings) -> Self {
        Self { client, settings }
    }

    /// Refresh `job` until its status is terminal and return that status.
    ///
    /// Every decision is made on a freshly refreshed status, so the handle's
    /// status before the call is never trusted.
    pub fn await_terminal(&self, job: &mut Job) -> Result<TerminalStatus, PollError> {
        let started = Instant::now();
        let mut polls = 0usize;
        loop {
            self.client.refresh(job)?;
            polls += 1;
            if let Some(terminal) = job.status.terminal() {
                tracing::info!("Job {} finished with {} after {} polls", job.id, terminal, polls);
                return Ok(terminal);
            }
            tracing::debug!("Job {} is {} (poll {})", job.id, job.status, polls);

            let elapsed = started.elapsed();
            let out_of_polls = self.settings.max_polls.is_some_and(|max| polls >= max);
            let out_of_time = self.settings.timeout.is_some_and(|limit| elapsed >= limit);
            if out_of_polls || out_of_time {
                return Err(PollError::Exhausted {
                    job: job.id,
                    polls,
                    elapsed,
                });
            }
            std::thread::sleep(self.settings.interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{DataQuery, JobStatus, MemoryRemote, NewData};

    fn instant() -> PollSettings {
        PollSettings {
            interval: Duration::ZERO,
            ..PollSettings::default()
        }
    }

    fn job_with(remote: &MemoryRemote, statuses: &[JobStatus]) -> Job {
        let id = remote.insert_data(NewData::new("data:x:").statuses(statuses.iter().copied()));
        let mut query = DataQuery::default();
        query.id = Some(id);
        Job::from(remote.data(&query).unwrap().remove(0))
    }

    #[test]
    fn returns_ok_after_exactly_the_needed_refreshes() {
        let remote = MemoryRemote::new();
        let mut job = job_with(&remote, &[JobStatus::Pending, JobStatus::Pending, JobStatus::Ok]);
        let status = PollingMonitor::new(&remote, instant())
            .await_terminal(&mut job)
            .unwrap();
        assert_eq!(status, TerminalStatus::Ok);
        assert_eq!(remote.refresh_count(job.id), 3);
    }

    #[test]
    fn error_is_terminal() {
        let remote = MemoryRemote::new();
        let mut job = job_with(&remote, &[JobStatus::Running, JobStatus::Error]);
        let status = PollingMonitor::new(&remote, instant())
            .await_terminal(&mut job)
            .unwrap();
        assert_eq!(status, TerminalStatus::Error);
        assert_eq!(job.status, JobStatus::Error);
    }

    #[test]
    fn stale_terminal_status_is_refreshed_first() {
        let remote = MemoryRemote::new();
        let mut job = job_with(&remote, &[JobStatus::Pending, JobStatus::Ok]);
        // The handle claims ERROR but the service says otherwise.
        job.status = JobStatus::Error;
        let status = PollingMonitor::new(&remote, instant())
            .await_terminal(&mut job)
            .unwrap();
        assert_eq!(status, TerminalStatus::Ok);
        assert_eq!(remote.refresh_count(job.id), 2);
    }

    #[test]
    fn max_polls_bounds_the_wait() {
        let remote = MemoryRemote::new();
        let mut job = job_with(&remote, &[JobStatus::Pending]);
        let settings = PollSettings {
            max_polls: Some(4),
            ..instant()
        };
        let err = PollingMonitor::new(&remote, settings)
            .await_terminal(&mut job)
            .unwrap_err();
        assert!(matches!(err, PollError::Exhausted { polls: 4, .. }));
        assert_eq!(remote.refresh_count(job.id), 4);
    }

    #[test]
    fn zero_timeout_gives_up_after_first_refresh() {
        let remote = MemoryRemote::new();
        let mut job = job_with(&remote, &[JobStatus::Running]);
        let settings = PollSettings {
            timeout: Some(Duration::ZERO),
            ..instant()
        };
        let err = PollingMonitor::new(&remote, settings)
            .await_terminal(&mut job)
            .unwrap_err();
        assert!(matches!(err, PollError::Exhausted { polls: 1, .. }));
    }

    #[test]
    fn unknown_job_surfaces_remote_error() {
        let remote = MemoryRemote::new();
        let mut job = Job {
            id: DataId(99),
            status: JobStatus::Pending,
            type_tag: String::new(),
            parents: Vec::new(),
            input: Default::default(),
        };
        let err = PollingMonitor::new(&remote, instant())
            .await_terminal(&mut job)
            .unwrap_err();
        assert!(matches!(err, PollError::Remote(RemoteError::NotFound(_))));
    }
}
