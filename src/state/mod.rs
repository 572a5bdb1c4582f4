//! State module for tracking crawl progress
//!
//! This module provides the shared state of a sweep run.
//!
//! # Components
//!
//! - `Frontier`: pending tasks, processed and failed pages, discovered items, run flags
//! - `TaskCursor`: allocator of fresh page numbers, owned by the frontier
//! - `PageTask`: one page being fetched by one worker
//! - `DownloadTask`: one discovered item being downloaded

mod cursor;
mod download_task;
mod frontier;
mod page_task;

// Re-export main types
pub use cursor::TaskCursor;
pub use download_task::DownloadTask;
pub use frontier::{Frontier, FrontierSnapshot, RecordOutcome};
pub use page_task::PageTask;
