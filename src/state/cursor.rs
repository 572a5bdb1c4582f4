use std::ops::Range;
use std::sync::{Mutex, PoisonError};

/// Monotonic page-number allocator
///
/// Hands out disjoint, consecutive ranges of page numbers starting at 1. The
/// cursor knows nothing about which pages were processed; callers filter.
#[derive(Debug)]
pub struct TaskCursor {
    next_page: Mutex<u64>,
}

impl TaskCursor {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates a cursor whose first reservation begins at `first_page`
    pub fn starting_at(first_page: u64) -> Self {
        Self {
            next_page: Mutex::new(first_page),
        }
    }

    /// Reserves the next `count` page numbers
    pub fn reserve(&self, count: usize) -> Range<u64> {
        let mut next = self.next_page.lock().unwrap_or_else(PoisonError::into_inner);
        let start = *next;
        *next = start.saturating_add(count as u64);
        start..*next
    }

    /// The first page number the next reservation will return
    pub fn peek(&self) -> u64 {
        *self.next_page.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TaskCursor {
    fn default() -> Self {
        Self::new()
    }
}
