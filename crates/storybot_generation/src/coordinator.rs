//! Non-blocking generation jobs with an explicit join barrier.
//!
//! Jobs are launched into a [`JobRegistry`] owned by one session. The
//! registry is only touched by the turn that holds the session, so it needs
//! no locking of its own.

use crate::{GeneratedChapter, GeneratedReference};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use storybot_core::{BookId, Character, IllustrationRef, JobId};
use storybot_error::{AggregateError, AggregateErrorKind, StorybotError, StorybotResult};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// What a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum JobKind {
    /// Reference portrait for a draft character
    CharacterReference,
    /// Text of the next chapter
    ChapterText,
    /// One illustration
    Illustration,
}

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    /// Still executing
    Running,
    /// Finished with output
    Succeeded,
    /// Finished with an error, panicked or timed out
    Failed,
}

/// Input of a job.
#[derive(Debug, Clone)]
pub enum JobInput {
    /// Generate a reference portrait
    CharacterReference {
        /// Character name
        name: String,
        /// Full description
        description: String,
    },
    /// Generate the next chapter's text for a stored book
    ChapterText {
        /// Book to continue
        book_id: BookId,
        /// Optional direction from the user
        hint: String,
        /// Target length in words
        target_words: usize,
    },
    /// Illustrate one scene
    Illustration {
        /// Scene description
        scene: String,
        /// Book title
        title: String,
        /// Characters that may appear
        characters: Vec<Character>,
    },
}

impl JobInput {
    /// Kind of job this input launches.
    pub fn kind(&self) -> JobKind {
        match self {
            JobInput::CharacterReference { .. } => JobKind::CharacterReference,
            JobInput::ChapterText { .. } => JobKind::ChapterText,
            JobInput::Illustration { .. } => JobKind::Illustration,
        }
    }
}

/// Output of a successful job.
#[derive(Debug, Clone)]
pub enum JobOutput {
    /// Reference portrait
    Reference(GeneratedReference),
    /// Chapter text
    Chapter(GeneratedChapter),
    /// Stored illustration
    Illustration(IllustrationRef),
}

/// Executes job inputs. Implemented by the production generation services
/// and by test doubles.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Runs one job to completion.
    async fn run(&self, input: JobInput) -> StorybotResult<JobOutput>;
}

/// Settled job, returned from [`GenerationCoordinator::await_all`].
#[derive(Debug, Clone)]
pub struct JobResult {
    /// Job identifier
    pub id: JobId,
    /// Job kind
    pub kind: JobKind,
    /// Output or the captured failure
    pub outcome: Result<JobOutput, StorybotError>,
}

impl JobResult {
    /// Final status.
    pub fn status(&self) -> JobStatus {
        if self.outcome.is_ok() {
            JobStatus::Succeeded
        } else {
            JobStatus::Failed
        }
    }
}

/// Non-blocking view of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSummary {
    /// Job identifier
    pub id: JobId,
    /// Job kind
    pub kind: JobKind,
    /// Status at the time of the call
    pub status: JobStatus,
}

struct TrackedJob {
    id: JobId,
    kind: JobKind,
    launched_at: Instant,
    status: watch::Receiver<JobStatus>,
    handle: JoinHandle<StorybotResult<JobOutput>>,
}

/// Jobs launched on behalf of one session, in launch order.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Vec<TrackedJob>,
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.jobs.iter().map(|j| (j.id, j.kind)))
            .finish()
    }
}

impl JobRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Launches jobs on the Tokio runtime and joins them on demand.
#[derive(Clone)]
pub struct GenerationCoordinator {
    runner: Arc<dyn JobRunner>,
    job_timeout: Duration,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for GenerationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationCoordinator")
            .field("job_timeout", &self.job_timeout)
            .field("launched", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

impl GenerationCoordinator {
    /// Creates a coordinator; each job must settle within `job_timeout` of launch.
    pub fn new(runner: Arc<dyn JobRunner>, job_timeout: Duration) -> Self {
        Self {
            runner,
            job_timeout,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Starts a job and returns immediately.
    ///
    /// Must be called from within a Tokio runtime.
    #[instrument(skip(self, registry, input), fields(kind = %input.kind()))]
    pub fn launch(&self, registry: &mut JobRegistry, input: JobInput) -> JobId {
        let id = JobId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let kind = input.kind();
        let (status_tx, status_rx) = watch::channel(JobStatus::Running);
        let runner = Arc::clone(&self.runner);

        let handle = tokio::spawn(async move {
            let outcome = runner.run(input).await;
            let status = match &outcome {
                Ok(_) => JobStatus::Succeeded,
                Err(e) => {
                    warn!(job = %id, error = %e, "Job failed");
                    JobStatus::Failed
                }
            };
            // The registry may already have been cancelled.
            let _ = status_tx.send(status);
            outcome
        });

        registry.jobs.push(TrackedJob {
            id,
            kind,
            launched_at: Instant::now(),
            status: status_rx,
            handle,
        });

        debug!(job = %id, "Job launched");
        id
    }

    /// Snapshot of every tracked job without waiting.
    pub fn pending(&self, registry: &JobRegistry) -> Vec<JobSummary> {
        registry
            .jobs
            .iter()
            .map(|job| JobSummary {
                id: job.id,
                kind: job.kind,
                status: *job.status.borrow(),
            })
            .collect()
    }

    /// Waits for every tracked job to settle and drains the registry.
    ///
    /// Results come back in launch order. A job that fails, panics or
    /// misses its deadline yields a failed result; the others are unaffected.
    #[instrument(skip(self, registry), fields(jobs = registry.len()))]
    pub async fn await_all(&self, registry: &mut JobRegistry) -> Vec<JobResult> {
        let jobs = std::mem::take(&mut registry.jobs);
        let mut results = Vec::with_capacity(jobs.len());

        for job in jobs {
            let deadline = job.launched_at + self.job_timeout;
            let outcome = match tokio::time::timeout_at(deadline, job.handle).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(join_error)) => Err(aborted(job.id, format!("task failed: {}", join_error))),
                Err(_) => {
                    warn!(job = %job.id, timeout_secs = self.job_timeout.as_secs(), "Job timed out");
                    Err(aborted(
                        job.id,
                        format!("no result within {} seconds", self.job_timeout.as_secs()),
                    ))
                }
            };

            results.push(JobResult {
                id: job.id,
                kind: job.kind,
                outcome,
            });
        }

        let failed = results.iter().filter(|r| r.outcome.is_err()).count();
        info!(settled = results.len(), failed, "Jobs joined");
        results
    }

    /// Stops tracking every job without waiting.
    ///
    /// The tasks keep running to completion; their results are discarded.
    /// Returns how many jobs were dropped.
    pub fn cancel(&self, registry: &mut JobRegistry) -> usize {
        let dropped = registry.jobs.len();
        registry.jobs.clear();
        if dropped > 0 {
            debug!(dropped, "Stopped tracking jobs");
        }
        dropped
    }
}

fn aborted(id: JobId, reason: String) -> StorybotError {
    AggregateError::new(AggregateErrorKind::JobAborted {
        job: id.to_string(),
        reason,
    })
    .into()
}
