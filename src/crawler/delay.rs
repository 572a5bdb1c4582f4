use std::time::Duration;

/// Source of the pause a worker takes between two requests
pub trait DelayPolicy: Send + Sync {
    fn next_delay(&self) -> Duration;
}

/// Uniformly random delay within `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitteredDelay {
    min: Duration,
    max: Duration,
}

impl JitteredDelay {
    /// Creates a jittered delay; bounds given in the wrong order are swapped
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }
}

impl DelayPolicy for JitteredDelay {
    fn next_delay(&self) -> Duration {
        let span = (self.max - self.min).as_millis() as u64;
        if span == 0 {
            return self.min;
        }
        self.min + Duration::from_millis(fastrand::u64(0..=span))
    }
}

/// No pause at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl DelayPolicy for NoDelay {
    fn next_delay(&self) -> Duration {
        Duration::ZERO
    }
}
