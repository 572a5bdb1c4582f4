use crate::FetchError;

/// A unit of work: fetch and parse one listing page
///
/// A task is owned by exactly one worker at a time. It is handed back to the
/// frontier only through a retry, in which case it keeps its attempt history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTask {
    /// Listing page number (1-based)
    pub page_number: u64,

    /// Worker that currently owns the task
    pub worker_id: Option<usize>,

    /// Failed attempts so far
    pub attempt_count: u32,

    /// Error of the most recent failed attempt
    pub last_error: Option<FetchError>,

    /// Items this page contributed that had not been seen before
    pub items: Vec<String>,

    /// The page has been committed to the frontier
    pub processed: bool,

    /// The page came back empty
    pub no_more_pages: bool,
}

impl PageTask {
    /// Creates a fresh task for a page number
    pub fn new(page_number: u64) -> Self {
        Self {
            page_number,
            worker_id: None,
            attempt_count: 0,
            last_error: None,
            items: Vec::new(),
            processed: false,
            no_more_pages: false,
        }
    }

    /// Stamps the worker that now owns this task
    pub fn assign(mut self, worker_id: usize) -> Self {
        self.worker_id = Some(worker_id);
        self
    }

    /// Records a failed attempt
    pub fn record_failure(&mut self, error: FetchError) {
        self.attempt_count += 1;
        self.last_error = Some(error);
    }
}
