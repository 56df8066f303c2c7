use std::cell::Cell;
use std::thread;
use std::time::{Duration, Instant};

/// Enforces a minimum spacing between consecutive calls to `wait`.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last: Cell<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Cell::new(None),
        }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn wait(&self) {
        if !self.min_interval.is_zero() {
            if let Some(remaining) = self
                .last
                .get()
                .and_then(|last| self.min_interval.checked_sub(last.elapsed()))
            {
                thread::sleep(remaining);
            }
        }

        self.last.set(Some(Instant::now()));
    }
}
