//! Retry policy for failed page attempts
//!
//! Every failure class gets the same attempt budget. A page whose budget runs
//! out is recorded as failed in the frontier and never allocated again; an
//! item whose download budget runs out lands in the failed downloads.

use crate::state::{DownloadTask, Frontier, PageTask};
use crate::FetchError;

/// Coarse classification of a failed attempt, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Connection or read error
    TransientNetwork,
    Timeout,
    /// Non-2xx response
    HttpStatus,
    Unexpected,
}

/// What happened to a failed task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Handed back to the pending queue
    Requeued,
    /// Dropped; its page is in the failed set
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn classify(error: &FetchError) -> FailureClass {
        match error {
            FetchError::Network(_) => FailureClass::TransientNetwork,
            FetchError::Timeout => FailureClass::Timeout,
            FetchError::HttpStatus(_) => FailureClass::HttpStatus,
            FetchError::Unexpected(_) => FailureClass::Unexpected,
        }
    }

    /// Whether a task with its current attempt count gets another try
    pub fn should_retry(&self, task: &PageTask) -> bool {
        self.allows_another(task.attempt_count)
    }

    fn allows_another(&self, attempts: u32) -> bool {
        attempts < self.max_retries
    }

    /// Records the failure on `task` and requeues or abandons it
    ///
    /// With `max_retries = n`, a page that always fails is attempted `n` times
    /// (at least once).
    pub fn apply(&self, frontier: &Frontier, mut task: PageTask, error: FetchError) -> RetryDecision {
        let class = Self::classify(&error);
        task.record_failure(error);

        if self.should_retry(&task) {
            tracing::warn!(
                page = task.page_number,
                attempt = task.attempt_count,
                ?class,
                "Page attempt failed, requeueing: {}",
                task.last_error.as_ref().map(ToString::to_string).unwrap_or_default()
            );
            frontier.requeue(task);
            RetryDecision::Requeued
        } else {
            tracing::error!(
                page = task.page_number,
                attempts = task.attempt_count,
                ?class,
                "Giving up on page: {}",
                task.last_error.as_ref().map(ToString::to_string).unwrap_or_default()
            );
            frontier.mark_failed(task.page_number);
            RetryDecision::Abandoned
        }
    }

    /// Same as [`apply`](Self::apply), for a failed download
    pub fn apply_download(
        &self,
        frontier: &Frontier,
        mut task: DownloadTask,
        error: FetchError,
    ) -> RetryDecision {
        let class = Self::classify(&error);
        let reason = error.to_string();
        task.record_failure(error);

        if self.allows_another(task.attempt_count) {
            tracing::warn!(
                item = %task.item_id,
                attempt = task.attempt_count,
                ?class,
                "Download failed, requeueing: {}",
                reason
            );
            frontier.requeue_download(task);
            RetryDecision::Requeued
        } else {
            tracing::error!(
                item = %task.item_id,
                attempts = task.attempt_count,
                ?class,
                "Giving up on download: {}",
                reason
            );
            frontier.mark_download_failed(&task.item_id);
            RetryDecision::Abandoned
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
