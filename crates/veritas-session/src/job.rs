//! Job state machine guarding a coordinated resource.
//!
//! Valid transitions:
//! - Idle -> Running (first job)
//! - Running -> Succeeded
//! - Running -> Failed
//! - Succeeded -> Running (next job)
//! - Failed -> Running (next job)
//!
//! `Running -> Running` is refused, which is what makes a resource
//! single-flight.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::SessionError;

/// Lifecycle status of the most recent job on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// No job has run yet.
    Idle,
    /// A job is in flight.
    Running,
    /// The last job finished successfully.
    Succeeded,
    /// The last job failed.
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Idle => write!(f, "idle"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl JobStatus {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &JobStatus) -> bool {
        matches!(
            (self, target),
            (JobStatus::Idle, JobStatus::Running)
                | (JobStatus::Succeeded, JobStatus::Running)
                | (JobStatus::Failed, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Succeeded)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }

    pub fn is_running(&self) -> bool {
        matches!(self, JobStatus::Running)
    }
}

/// What a job is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Ingesting a web page by URL.
    Url,
    /// Ingesting uploaded documents.
    Files,
    /// Purging the knowledge base.
    Reset,
    /// Answering a question.
    Ask,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Url => write!(f, "URL ingestion"),
            JobKind::Files => write!(f, "file ingestion"),
            JobKind::Reset => write!(f, "reset"),
            JobKind::Ask => write!(f, "ask"),
        }
    }
}

/// A coordinated resource. Ordering doubles as the lock order when two
/// machines are locked together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resource {
    /// The engine-held corpus, mutated by ingestion and reset.
    KnowledgeBase,
    /// The question-answering channel.
    Search,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::KnowledgeBase => write!(f, "knowledge base"),
            Resource::Search => write!(f, "search"),
        }
    }
}

/// The most recent job on a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// `None` until the first job starts.
    pub kind: Option<JobKind>,
    pub status: JobStatus,
    /// Human-readable status line.
    pub message: String,
}

impl Default for Job {
    fn default() -> Self {
        Self {
            kind: None,
            status: JobStatus::Idle,
            message: String::new(),
        }
    }
}

/// Thread-safe state machine for one resource.
///
/// Clones share the same underlying job, so the ingestion coordinator and
/// the ask flow can observe each other's resource.
#[derive(Debug, Clone)]
pub struct JobMachine {
    resource: Resource,
    job: Arc<Mutex<Job>>,
}

impl JobMachine {
    /// Create a machine for `resource`, initialized to `Idle`.
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            job: Arc::new(Mutex::new(Job::default())),
        }
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// Snapshot of the current job.
    pub fn current(&self) -> Job {
        self.lock().clone()
    }

    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    pub fn is_running(&self) -> bool {
        self.status().is_running()
    }

    /// Start a job, refusing with `Busy` if one is already running.
    pub fn begin(&self, kind: JobKind, message: impl Into<String>) -> Result<(), SessionError> {
        let mut job = self.lock();
        Self::start(self.resource, &mut job, kind, message.into())
    }

    /// Start a job unless `other` is running a job for which `blocked_by`
    /// returns true. Both machines are locked for the duration of the check.
    pub fn begin_unless(
        &self,
        kind: JobKind,
        message: impl Into<String>,
        other: &JobMachine,
        blocked_by: impl Fn(JobKind) -> bool,
    ) -> Result<(), SessionError> {
        let (mut job, other_job) = if self.resource <= other.resource {
            let job = self.lock();
            (job, other.lock())
        } else {
            let other_job = other.lock();
            (self.lock(), other_job)
        };

        if other_job.status.is_running() {
            if let Some(other_kind) = other_job.kind.filter(|k| blocked_by(*k)) {
                return Err(SessionError::Busy {
                    resource: other.resource,
                    kind: other_kind,
                });
            }
        }

        Self::start(self.resource, &mut job, kind, message.into())
    }

    /// Finish the running job with `status` (`Succeeded` or `Failed`).
    ///
    /// Returns the finished job.
    pub fn finish(&self, status: JobStatus, message: impl Into<String>) -> Result<Job, SessionError> {
        let mut job = self.lock();
        if status.is_running() || !job.status.can_transition_to(&status) {
            return Err(SessionError::InvalidTransition {
                from: job.status,
                to: status,
            });
        }
        tracing::debug!(resource = %self.resource, "Job state: {} -> {}", job.status, status);
        job.status = status;
        job.message = message.into();
        Ok(job.clone())
    }

    fn start(
        resource: Resource,
        job: &mut Job,
        kind: JobKind,
        message: String,
    ) -> Result<(), SessionError> {
        // Only a running job cannot move to Running.
        if !job.status.can_transition_to(&JobStatus::Running) {
            return Err(SessionError::Busy {
                resource,
                kind: job.kind.unwrap_or(kind),
            });
        }
        tracing::debug!(%resource, %kind, "Job state: {} -> running", job.status);
        job.kind = Some(kind);
        job.status = JobStatus::Running;
        job.message = message;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Job> {
        self.job.lock().expect("job mutex poisoned")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [JobStatus; 4] = [
        JobStatus::Idle,
        JobStatus::Running,
        JobStatus::Succeeded,
        JobStatus::Failed,
    ];

    #[test]
    fn test_status_display() {
        assert_eq!(JobStatus::Idle.to_string(), "idle");
        assert_eq!(JobStatus::Running.to_string(), "running");
        assert_eq!(JobStatus::Succeeded.to_string(), "succeeded");
        assert_eq!(JobStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_valid_transitions() {
        assert!(JobStatus::Idle.can_transition_to(&JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(&JobStatus::Succeeded));
        assert!(JobStatus::Running.can_transition_to(&JobStatus::Failed));
        assert!(JobStatus::Succeeded.can_transition_to(&JobStatus::Running));
        assert!(JobStatus::Failed.can_transition_to(&JobStatus::Running));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!JobStatus::Running.can_transition_to(&JobStatus::Running));
        assert!(!JobStatus::Idle.can_transition_to(&JobStatus::Succeeded));
        assert!(!JobStatus::Idle.can_transition_to(&JobStatus::Failed));
        assert!(!JobStatus::Succeeded.can_transition_to(&JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(&JobStatus::Idle));
        assert!(!JobStatus::Running.can_transition_to(&JobStatus::Idle));
    }

    #[test]
    fn test_all_valid_transitions_count() {
        let mut valid_count = 0;
        for from in &ALL {
            for to in &ALL {
                if from.can_transition_to(to) {
                    valid_count += 1;
                }
            }
        }
        assert_eq!(valid_count, 5, "Expected exactly 5 valid transitions");
    }

    #[test]
    fn test_machine_happy_path() {
        let machine = JobMachine::new(Resource::KnowledgeBase);
        assert_eq!(machine.status(), JobStatus::Idle);
        assert_eq!(machine.current().kind, None);

        machine.begin(JobKind::Url, "Vectorizing...").unwrap();
        let job = machine.current();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.kind, Some(JobKind::Url));
        assert_eq!(job.message, "Vectorizing...");

        let done = machine.finish(JobStatus::Succeeded, "Done").unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);
        assert_eq!(done.message, "Done");
        assert_eq!(machine.current(), done);
    }

    #[test]
    fn test_machine_refuses_second_begin() {
        let machine = JobMachine::new(Resource::KnowledgeBase);
        machine.begin(JobKind::Files, "Uploading").unwrap();

        let err = machine.begin(JobKind::Url, "Vectorizing").unwrap_err();
        match err {
            SessionError::Busy { resource, kind } => {
                assert_eq!(resource, Resource::KnowledgeBase);
                assert_eq!(kind, JobKind::Files);
            }
            other => panic!("Expected Busy, got {:?}", other),
        }
        // The running job is untouched.
        assert_eq!(machine.current().kind, Some(JobKind::Files));
        assert_eq!(machine.current().message, "Uploading");
    }

    #[test]
    fn test_machine_restarts_after_failure() {
        let machine = JobMachine::new(Resource::Search);
        machine.begin(JobKind::Ask, "q").unwrap();
        machine.finish(JobStatus::Failed, "nope").unwrap();
        machine.begin(JobKind::Ask, "q again").unwrap();
        assert!(machine.is_running());
    }

    #[test]
    fn test_begin_from_every_ready_status() {
        for end in [None, Some(JobStatus::Succeeded), Some(JobStatus::Failed)] {
            let machine = JobMachine::new(Resource::KnowledgeBase);
            if let Some(end) = end {
                machine.begin(JobKind::Url, "first").unwrap();
                machine.finish(end, "first done").unwrap();
            }
            machine.begin(JobKind::Files, "next").unwrap();
            assert_eq!(machine.current().kind, Some(JobKind::Files));

            // A running job refuses with Busy, never InvalidTransition.
            assert!(matches!(
                machine.begin(JobKind::Reset, "again"),
                Err(SessionError::Busy {
                    kind: JobKind::Files,
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_finish_without_running_job_is_invalid() {
        let machine = JobMachine::new(Resource::Search);
        let err = machine.finish(JobStatus::Succeeded, "done").unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidTransition {
                from: JobStatus::Idle,
                to: JobStatus::Succeeded
            }
        ));
    }

    #[test]
    fn test_finish_to_running_is_invalid() {
        let machine = JobMachine::new(Resource::Search);
        machine.begin(JobKind::Ask, "q").unwrap();
        assert!(machine.finish(JobStatus::Running, "still").is_err());
        assert!(machine.is_running());
    }

    #[test]
    fn test_machine_clone_is_shared() {
        let a = JobMachine::new(Resource::KnowledgeBase);
        let b = a.clone();
        a.begin(JobKind::Reset, "Purging").unwrap();
        assert!(b.is_running());
    }

    #[test]
    fn test_begin_unless_blocked_by_other() {
        let knowledge = JobMachine::new(Resource::KnowledgeBase);
        let search = JobMachine::new(Resource::Search);
        knowledge.begin(JobKind::Reset, "Purging").unwrap();

        let err = search
            .begin_unless(JobKind::Ask, "q", &knowledge, |k| k == JobKind::Reset)
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Busy {
                resource: Resource::KnowledgeBase,
                kind: JobKind::Reset
            }
        ));
        assert_eq!(search.status(), JobStatus::Idle);
    }

    #[test]
    fn test_begin_unless_ignores_unlisted_kinds() {
        let knowledge = JobMachine::new(Resource::KnowledgeBase);
        let search = JobMachine::new(Resource::Search);
        knowledge.begin(JobKind::Url, "Vectorizing").unwrap();

        search
            .begin_unless(JobKind::Ask, "q", &knowledge, |k| k == JobKind::Reset)
            .unwrap();
        assert!(search.is_running());
    }

    #[test]
    fn test_begin_unless_locks_in_either_order() {
        let knowledge = JobMachine::new(Resource::KnowledgeBase);
        let search = JobMachine::new(Resource::Search);
        search.begin(JobKind::Ask, "q").unwrap();

        let err = knowledge
            .begin_unless(JobKind::Reset, "Purging", &search, |_| true)
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Busy {
                resource: Resource::Search,
                kind: JobKind::Ask
            }
        ));
    }
}
