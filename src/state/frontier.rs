//! Shared crawl frontier
//!
//! The frontier is the only structure touched by several workers at once. All
//! of its state lives behind one mutex and is reachable only through the
//! methods below, each of which runs as a single critical section:
//!
//! - a page number enters `processed_pages` at most once
//! - an item id enters the download queue at most once, and never if it was
//!   already downloaded
//! - `max_page_found` never decreases
//! - `no_more_pages` and `has_error` only ever go from false to true
//! - an item id leaves the download queue either into `downloaded`, back into
//!   the queue for a retry, or into the failed downloads
//!
//! Lock order is always frontier, then cursor.

use crate::state::{DownloadTask, PageTask, TaskCursor};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Result of committing a page to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The page had already been committed; nothing changed
    Duplicate,

    /// The page is now part of `processed_pages`
    Recorded {
        /// Number of items that were not seen before
        new_items: usize,
        /// Whether the catalog is considered exhausted after this page
        catalog_exhausted: bool,
    },
}

/// Point-in-time copy of the frontier, for reporting and tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontierSnapshot {
    pub processed_pages: BTreeSet<u64>,
    pub failed_pages: BTreeSet<u64>,
    pub download_queue: Vec<String>,
    pub discovered: Vec<String>,
    pub downloaded: usize,
    pub downloads_completed: usize,
    pub failed_downloads: BTreeSet<String>,
    pub pending_tasks: usize,
    pub max_page_found: u64,
    pub no_more_pages: bool,
    pub has_error: bool,
}

#[derive(Debug, Default)]
struct FrontierState {
    pending_tasks: VecDeque<PageTask>,
    processed_pages: HashSet<u64>,
    failed_pages: HashSet<u64>,
    download_queue: VecDeque<DownloadTask>,
    queued: HashSet<String>,
    discovered: Vec<String>,
    downloaded: HashSet<String>,
    failed_downloads: HashSet<String>,
    downloads_in_flight: usize,
    downloads_completed: usize,
    max_page_found: u64,
    no_more_pages: bool,
    has_error: bool,
}

impl FrontierState {
    fn take_pending(&mut self, worker_id: usize, count: usize, out: &mut Vec<PageTask>) {
        while out.len() < count {
            match self.pending_tasks.pop_front() {
                Some(task) => out.push(task.assign(worker_id)),
                None => break,
            }
        }
    }

    fn allocate_new(
        &self,
        cursor: &TaskCursor,
        page_limit: Option<u64>,
        worker_id: usize,
        count: usize,
        out: &mut Vec<PageTask>,
    ) {
        if count == 0 || self.no_more_pages || !self.pending_tasks.is_empty() {
            return;
        }
        if limit_reached(cursor, page_limit) {
            return;
        }

        for page in cursor.reserve(count) {
            if page_limit.is_some_and(|limit| page > limit) {
                break;
            }
            if self.processed_pages.contains(&page) || self.failed_pages.contains(&page) {
                continue;
            }
            out.push(PageTask::new(page).assign(worker_id));
        }
    }

    fn mark_exhausted_if(&mut self, page: u64, found: usize) -> bool {
        if found == 0 && page > self.max_page_found {
            self.no_more_pages = true;
        }
        self.no_more_pages
    }

    fn is_known(&self, item: &str) -> bool {
        self.queued.contains(item) || self.downloaded.contains(item)
    }
}

fn limit_reached(cursor: &TaskCursor, page_limit: Option<u64>) -> bool {
    page_limit.is_some_and(|limit| cursor.peek() > limit)
}

/// Shared crawl state for one run
#[derive(Debug, Default)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    cursor: TaskCursor,
    page_limit: Option<u64>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a frontier whose `downloaded` set is pre-populated
    ///
    /// Items in this set are never queued again during the run.
    pub fn with_downloaded<I>(downloaded: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let frontier = Self::new();
        frontier.lock().downloaded.extend(downloaded);
        frontier
    }

    /// Never allocates page numbers above `limit`
    ///
    /// Once the cursor passes the limit the frontier drains like an exhausted
    /// catalog, even if no empty page was seen.
    pub fn with_page_limit(mut self, limit: Option<u64>) -> Self {
        self.page_limit = limit;
        self
    }

    // Poisoning is ignored: no critical section panics halfway through an update.
    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes up to `count` tasks from the pending queue, oldest first
    pub fn take_pending(&self, worker_id: usize, count: usize) -> Vec<PageTask> {
        let mut tasks = Vec::with_capacity(count);
        self.lock().take_pending(worker_id, count, &mut tasks);
        tasks
    }

    /// Reserves `count` fresh page numbers and turns the unprocessed ones into tasks
    ///
    /// Returns nothing while retries are pending or once the catalog is exhausted.
    pub fn allocate_new(&self, worker_id: usize, count: usize) -> Vec<PageTask> {
        let mut tasks = Vec::with_capacity(count);
        self.lock()
            .allocate_new(&self.cursor, self.page_limit, worker_id, count, &mut tasks);
        tasks
    }

    /// Claims a chunk of work: pending retries first, then fresh pages
    pub fn next_tasks(&self, worker_id: usize, count: usize) -> Vec<PageTask> {
        let mut tasks = Vec::with_capacity(count);
        let mut state = self.lock();
        state.take_pending(worker_id, count, &mut tasks);
        let remaining = count - tasks.len();
        state.allocate_new(&self.cursor, self.page_limit, worker_id, remaining, &mut tasks);
        tasks
    }

    /// Commits the items extracted from a page
    ///
    /// Items already queued or downloaded are dropped; the rest are appended to
    /// the download queue in page order and also stored on `task.items`. An
    /// empty page beyond the high-water mark marks the catalog as exhausted.
    pub fn record_result(&self, task: &mut PageTask, items: &[String]) -> RecordOutcome {
        let page = task.page_number;
        let mut state = self.lock();

        if state.processed_pages.contains(&page) {
            task.processed = true;
            return RecordOutcome::Duplicate;
        }

        let mut new_items = Vec::new();
        for item in items {
            if !state.is_known(item) {
                state.queued.insert(item.clone());
                state.download_queue.push_back(DownloadTask::new(item.as_str()));
                state.discovered.push(item.clone());
                new_items.push(item.clone());
            }
        }

        let catalog_exhausted = if items.is_empty() {
            task.no_more_pages = true;
            state.mark_exhausted_if(page, 0)
        } else {
            state.max_page_found = state.max_page_found.max(page);
            state.no_more_pages
        };

        state.processed_pages.insert(page);
        state.failed_pages.remove(&page);

        task.processed = true;
        let new_count = new_items.len();
        task.items = new_items;

        RecordOutcome::Recorded {
            new_items: new_count,
            catalog_exhausted,
        }
    }

    /// Sets `no_more_pages` when `page` lies beyond the high-water mark and yielded nothing
    ///
    /// Returns the flag after evaluation.
    pub fn mark_exhausted_if(&self, page: u64, found: usize) -> bool {
        self.lock().mark_exhausted_if(page, found)
    }

    /// Puts a task back at the end of the pending queue
    pub fn requeue(&self, task: PageTask) {
        self.lock().pending_tasks.push_back(task);
    }

    /// Hands back the unstarted rest of a chunk that ended early
    ///
    /// Once the catalog is exhausted, tasks beyond `max_page_found` are past the
    /// end and dropped; everything else goes back to the pending queue.
    /// Returns how many tasks were dropped.
    pub fn return_unfinished(&self, tasks: Vec<PageTask>) -> usize {
        let mut state = self.lock();
        let mut dropped = 0;

        for task in tasks {
            if state.processed_pages.contains(&task.page_number) {
                continue;
            }
            if state.no_more_pages && task.page_number > state.max_page_found {
                dropped += 1;
                continue;
            }
            state.pending_tasks.push_back(task);
        }

        dropped
    }

    /// Records a page whose retries ran out so it is never allocated again
    pub fn mark_failed(&self, page: u64) {
        let mut state = self.lock();
        if !state.processed_pages.contains(&page) {
            state.failed_pages.insert(page);
        }
    }

    pub fn is_processed(&self, page: u64) -> bool {
        self.lock().processed_pages.contains(&page)
    }

    /// True once no new page will be allocated and no retry is waiting
    pub fn is_drained(&self) -> bool {
        let state = self.lock();
        let closed = state.no_more_pages || limit_reached(&self.cursor, self.page_limit);
        closed && state.pending_tasks.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.lock().no_more_pages
    }

    pub fn mark_error(&self) {
        self.lock().has_error = true;
    }

    pub fn has_error(&self) -> bool {
        self.lock().has_error
    }

    pub fn processed_count(&self) -> usize {
        self.lock().processed_pages.len()
    }

    /// Item ids discovered during this run, in discovery order
    ///
    /// Downloading an item does not remove it from this list.
    pub fn items(&self) -> Vec<String> {
        self.lock().discovered.clone()
    }

    /// Pops the next item to download, skipping ids that are already downloaded
    pub fn take_download(&self) -> Option<DownloadTask> {
        let mut state = self.lock();
        while let Some(task) = state.download_queue.pop_front() {
            if state.downloaded.contains(&task.item_id) {
                continue;
            }
            state.downloads_in_flight += 1;
            return Some(task);
        }
        None
    }

    /// Moves a taken item into the downloaded set
    pub fn mark_downloaded(&self, item_id: &str) {
        let mut state = self.lock();
        state.downloads_in_flight = state.downloads_in_flight.saturating_sub(1);
        if state.downloaded.insert(item_id.to_string()) {
            state.downloads_completed += 1;
        }
        state.failed_downloads.remove(item_id);
    }

    /// Puts a taken item back at the end of the download queue
    pub fn requeue_download(&self, task: DownloadTask) {
        let mut state = self.lock();
        state.downloads_in_flight = state.downloads_in_flight.saturating_sub(1);
        state.download_queue.push_back(task);
    }

    /// Records a taken item whose retries ran out
    pub fn mark_download_failed(&self, item_id: &str) {
        let mut state = self.lock();
        state.downloads_in_flight = state.downloads_in_flight.saturating_sub(1);
        if !state.downloaded.contains(item_id) {
            state.failed_downloads.insert(item_id.to_string());
        }
    }

    /// Removes every queued item and returns the ids in queue order
    pub fn drain_download_queue(&self) -> Vec<String> {
        self.lock()
            .download_queue
            .drain(..)
            .map(|task| task.item_id)
            .collect()
    }

    /// True when nothing is queued for download and no download is in flight
    pub fn is_download_drained(&self) -> bool {
        let state = self.lock();
        state.download_queue.is_empty() && state.downloads_in_flight == 0
    }

    pub fn snapshot(&self) -> FrontierSnapshot {
        let state = self.lock();
        FrontierSnapshot {
            processed_pages: state.processed_pages.iter().copied().collect(),
            failed_pages: state.failed_pages.iter().copied().collect(),
            download_queue: state
                .download_queue
                .iter()
                .map(|task| task.item_id.clone())
                .collect(),
            discovered: state.discovered.clone(),
            downloaded: state.downloaded.len(),
            downloads_completed: state.downloads_completed,
            failed_downloads: state.failed_downloads.iter().cloned().collect(),
            pending_tasks: state.pending_tasks.len(),
            max_page_found: state.max_page_found,
            no_more_pages: state.no_more_pages,
            has_error: state.has_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn items(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn record(frontier: &Frontier, page: u64, ids: &[&str]) -> RecordOutcome {
        let mut task = PageTask::new(page);
        frontier.record_result(&mut task, &items(ids))
    }

    #[test]
    fn test_end_of_catalog_scenario() {
        let frontier = Frontier::new();
        record(&frontier, 1, &["a", "b"]);
        record(&frontier, 2, &["b", "c"]);
        let outcome = record(&frontier, 3, &[]);

        assert_eq!(
            outcome,
            RecordOutcome::Recorded {
                new_items: 0,
                catalog_exhausted: true
            }
        );

        let snapshot = frontier.snapshot();
        assert_eq!(snapshot.processed_pages, BTreeSet::from([1, 2, 3]));
        assert_eq!(snapshot.download_queue, items(&["a", "b", "c"]));
        assert_eq!(snapshot.max_page_found, 2);
        assert!(snapshot.no_more_pages);
    }

    #[test]
    fn test_record_result_is_idempotent() {
        let frontier = Frontier::new();
        let mut first = PageTask::new(1);
        let mut second = PageTask::new(1);

        frontier.record_result(&mut first, &items(&["a"]));
        let outcome = frontier.record_result(&mut second, &items(&["a", "z"]));

        assert_eq!(outcome, RecordOutcome::Duplicate);
        assert!(second.processed);
        assert!(second.items.is_empty());
        assert_eq!(frontier.items(), items(&["a"]));
        assert_eq!(frontier.processed_count(), 1);
    }

    #[test]
    fn test_record_sets_task_fields() {
        let frontier = Frontier::new();
        record(&frontier, 1, &["a"]);

        let mut task = PageTask::new(2);
        frontier.record_result(&mut task, &items(&["a", "b", "b"]));
        assert!(task.processed);
        assert!(!task.no_more_pages);
        assert_eq!(task.items, items(&["b"]));
    }

    #[test]
    fn test_dedup_against_downloaded() {
        let frontier = Frontier::with_downloaded(items(&["old"]));
        let outcome = record(&frontier, 1, &["old", "new"]);

        assert_eq!(
            outcome,
            RecordOutcome::Recorded {
                new_items: 1,
                catalog_exhausted: false
            }
        );
        let snapshot = frontier.snapshot();
        assert_eq!(snapshot.download_queue, items(&["new"]));
        assert_eq!(snapshot.downloaded, 1);
    }

    #[test]
    fn test_page_of_only_duplicates_still_raises_high_water_mark() {
        let frontier = Frontier::new();
        record(&frontier, 1, &["a"]);
        record(&frontier, 4, &["a"]);

        let snapshot = frontier.snapshot();
        assert_eq!(snapshot.max_page_found, 4);
        assert!(!snapshot.no_more_pages);
    }

    #[test]
    fn test_max_page_found_never_decreases() {
        let frontier = Frontier::new();
        record(&frontier, 5, &["x"]);
        record(&frontier, 2, &["y"]);
        assert_eq!(frontier.snapshot().max_page_found, 5);
    }

    #[test]
    fn test_empty_page_below_high_water_mark_does_not_exhaust() {
        let frontier = Frontier::new();
        record(&frontier, 5, &["x"]);

        let mut task = PageTask::new(3);
        let outcome = frontier.record_result(&mut task, &[]);

        assert_eq!(
            outcome,
            RecordOutcome::Recorded {
                new_items: 0,
                catalog_exhausted: false
            }
        );
        assert!(task.no_more_pages);
        assert!(!frontier.is_exhausted());
    }

    #[test]
    fn test_exhaustion_is_one_way() {
        let frontier = Frontier::new();
        assert!(frontier.mark_exhausted_if(1, 0));
        assert!(frontier.mark_exhausted_if(1, 3));
        record(&frontier, 7, &["late"]);
        assert!(frontier.is_exhausted());
    }

    #[test]
    fn test_mark_exhausted_requires_empty_page() {
        let frontier = Frontier::new();
        assert!(!frontier.mark_exhausted_if(10, 2));
        assert!(!frontier.is_exhausted());
    }

    #[test]
    fn test_next_tasks_prefers_pending() {
        let frontier = Frontier::new();
        let mut retry = PageTask::new(9);
        retry.attempt_count = 1;
        frontier.requeue(retry);

        let tasks = frontier.next_tasks(3, 2);
        let pages: Vec<u64> = tasks.iter().map(|t| t.page_number).collect();

        // Pending queue was emptied within the chunk, so fresh pages fill the rest
        assert_eq!(pages, vec![9, 1]);
        assert!(tasks.iter().all(|t| t.worker_id == Some(3)));
        assert_eq!(tasks[0].attempt_count, 1);
    }

    #[test]
    fn test_pending_is_fifo() {
        let frontier = Frontier::new();
        for page in [4, 2, 8] {
            frontier.requeue(PageTask::new(page));
        }
        let pages: Vec<u64> = frontier
            .take_pending(0, 5)
            .iter()
            .map(|t| t.page_number)
            .collect();
        assert_eq!(pages, vec![4, 2, 8]);
    }

    #[test]
    fn test_allocate_skips_processed_and_failed() {
        let frontier = Frontier::new();
        record(&frontier, 2, &["a"]);
        frontier.mark_failed(3);

        let pages: Vec<u64> = frontier
            .allocate_new(0, 4)
            .iter()
            .map(|t| t.page_number)
            .collect();
        assert_eq!(pages, vec![1, 4]);
    }

    #[test]
    fn test_allocate_waits_for_pending() {
        let frontier = Frontier::new();
        frontier.requeue(PageTask::new(1));
        assert!(frontier.allocate_new(0, 3).is_empty());
    }

    #[test]
    fn test_no_allocation_after_exhaustion() {
        let frontier = Frontier::new();
        frontier.mark_exhausted_if(1, 0);
        assert!(frontier.allocate_new(0, 3).is_empty());
        assert!(frontier.next_tasks(0, 3).is_empty());
        assert!(frontier.is_drained());
    }

    #[test]
    fn test_not_drained_while_retries_pending() {
        let frontier = Frontier::new();
        frontier.requeue(PageTask::new(2));
        frontier.mark_exhausted_if(3, 0);
        assert!(!frontier.is_drained());

        let tasks = frontier.next_tasks(0, 5);
        assert_eq!(tasks.len(), 1);
        assert!(frontier.is_drained());
    }

    #[test]
    fn test_page_limit_caps_allocation() {
        let frontier = Frontier::new().with_page_limit(Some(3));
        let pages: Vec<u64> = frontier
            .allocate_new(0, 5)
            .iter()
            .map(|t| t.page_number)
            .collect();
        assert_eq!(pages, vec![1, 2, 3]);
        assert!(frontier.allocate_new(0, 5).is_empty());
        assert!(frontier.is_drained());
        assert!(!frontier.is_exhausted());
    }

    #[test]
    fn test_page_limit_waits_for_retries() {
        let frontier = Frontier::new().with_page_limit(Some(1));
        let task = frontier.next_tasks(0, 1).pop().unwrap();
        frontier.requeue(task);
        assert!(!frontier.is_drained());
    }

    #[test]
    fn test_return_unfinished_keeps_pages_inside_catalog() {
        let frontier = Frontier::new();
        for page in 4..=8 {
            record(&frontier, page, &[format!("id{}", page).as_str()]);
        }
        record(&frontier, 9, &[]);
        assert!(frontier.is_exhausted());

        let dropped = frontier.return_unfinished(vec![
            PageTask::new(3),
            PageTask::new(8),
            PageTask::new(12),
        ]);

        assert_eq!(dropped, 1);
        let pending: Vec<u64> = frontier
            .take_pending(0, 5)
            .iter()
            .map(|t| t.page_number)
            .collect();
        assert_eq!(pending, vec![3]);
    }

    #[test]
    fn test_return_unfinished_before_exhaustion_requeues_all() {
        let frontier = Frontier::new();
        record(&frontier, 2, &["a"]);

        let dropped = frontier.return_unfinished(vec![PageTask::new(5), PageTask::new(6)]);

        assert_eq!(dropped, 0);
        assert_eq!(frontier.snapshot().pending_tasks, 2);
    }

    #[test]
    fn test_download_transitions() {
        let frontier = Frontier::with_downloaded(items(&["old"]));
        record(&frontier, 1, &["a", "b", "old", "c"]);

        let a = frontier.take_download().unwrap();
        assert_eq!(a.item_id, "a");
        assert!(!frontier.is_download_drained());
        frontier.mark_downloaded(&a.item_id);

        let mut b = frontier.take_download().unwrap();
        b.record_failure(crate::FetchError::Timeout);
        frontier.requeue_download(b);

        let c = frontier.take_download().unwrap();
        frontier.mark_download_failed(&c.item_id);

        let b = frontier.take_download().unwrap();
        assert_eq!(b.item_id, "b");
        assert_eq!(b.attempt_count, 1);
        frontier.mark_downloaded(&b.item_id);

        assert!(frontier.take_download().is_none());
        assert!(frontier.is_download_drained());

        let snapshot = frontier.snapshot();
        assert_eq!(snapshot.downloads_completed, 2);
        assert_eq!(snapshot.downloaded, 3);
        assert_eq!(snapshot.failed_downloads, BTreeSet::from(["c".to_string()]));
        // Downloads do not shrink the discovered list
        assert_eq!(frontier.items(), items(&["a", "b", "c"]));
    }

    #[test]
    fn test_downloaded_item_is_never_requeued_for_discovery() {
        let frontier = Frontier::new();
        record(&frontier, 1, &["a"]);
        let task = frontier.take_download().unwrap();
        frontier.mark_downloaded(&task.item_id);

        record(&frontier, 2, &["a", "b"]);
        assert_eq!(frontier.drain_download_queue(), items(&["b"]));
    }

    #[test]
    fn test_drain_download_queue() {
        let frontier = Frontier::new();
        record(&frontier, 1, &["x", "y"]);
        record(&frontier, 2, &["z"]);

        assert_eq!(frontier.drain_download_queue(), items(&["x", "y", "z"]));
        assert!(frontier.drain_download_queue().is_empty());
        assert!(frontier.take_download().is_none());
        assert_eq!(frontier.items().len(), 3);
    }

    #[test]
    fn test_mark_failed_ignores_processed_pages() {
        let frontier = Frontier::new();
        record(&frontier, 1, &["a"]);
        frontier.mark_failed(1);
        assert!(frontier.snapshot().failed_pages.is_empty());
    }

    #[test]
    fn test_error_flag() {
        let frontier = Frontier::new();
        assert!(!frontier.has_error());
        frontier.mark_error();
        assert!(frontier.has_error());
        assert!(frontier.snapshot().has_error);
    }

    #[test]
    fn test_concurrent_allocation_is_disjoint() {
        let frontier = Arc::new(Frontier::new());
        let handles: Vec<_> = (0..8)
            .map(|worker_id| {
                let frontier = Arc::clone(&frontier);
                std::thread::spawn(move || {
                    (0..50)
                        .flat_map(|_| frontier.allocate_new(worker_id, 4))
                        .map(|t| t.page_number)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for page in handle.join().unwrap() {
                assert!(seen.insert(page), "page {} allocated twice", page);
            }
        }
        assert_eq!(seen.len(), 8 * 50 * 4);
    }

    #[test]
    fn test_concurrent_records_keep_items_unique() {
        let frontier = Arc::new(Frontier::new());
        let handles: Vec<_> = (0..4u64)
            .map(|n| {
                let frontier = Arc::clone(&frontier);
                std::thread::spawn(move || {
                    for page in 1..=25u64 {
                        let mut task = PageTask::new(page + n * 100);
                        let ids: Vec<String> =
                            (0..10).map(|i| format!("item-{}", (page + i) % 30)).collect();
                        frontier.record_result(&mut task, &ids);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let queue = frontier.items();
        let unique: HashSet<_> = queue.iter().collect();
        assert_eq!(unique.len(), queue.len());
        assert_eq!(queue.len(), 30);
        assert_eq!(frontier.processed_count(), 100);
    }
}
