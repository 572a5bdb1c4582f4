use crate::FetchError;

/// One discovered item waiting to be downloaded
///
/// Like [`PageTask`](crate::state::PageTask), a task keeps its attempt
/// history when it goes back to the queue after a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub item_id: String,
    pub attempt_count: u32,
    pub last_error: Option<FetchError>,
}

impl DownloadTask {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            attempt_count: 0,
            last_error: None,
        }
    }

    /// Records a failed attempt
    pub fn record_failure(&mut self, error: FetchError) {
        self.attempt_count += 1;
        self.last_error = Some(error);
    }
}
