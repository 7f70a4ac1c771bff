use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives the completed fraction of a stage, always in `(0, 1]`.
pub type ProgressFn<'a> = dyn Fn(f64) + 'a;

/// Turns per-file completions into strictly increasing fractions.
pub(crate) struct ProgressTracker<'a> {
    total: usize,
    completed: usize,
    sink: &'a ProgressFn<'a>,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(total: usize, sink: &'a ProgressFn<'a>) -> Self {
        Self {
            total,
            completed: 0,
            sink,
        }
    }

    pub(crate) fn advance(&mut self) {
        if self.completed >= self.total {
            return;
        }
        self.completed += 1;
        (self.sink)(self.completed as f64 / self.total as f64);
    }
}

/// Shared stop flag, checked at file boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::{CancellationToken, ProgressTracker};
    use std::cell::RefCell;

    #[test]
    fn tracker_reports_each_fraction_once_and_ends_at_one() {
        let seen = RefCell::new(Vec::new());
        let sink = |fraction: f64| seen.borrow_mut().push(fraction);
        let mut tracker = ProgressTracker::new(4, &sink);
        for _ in 0..5 {
            tracker.advance();
        }

        assert_eq!(*seen.borrow(), vec![0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn cancellation_is_visible_through_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
