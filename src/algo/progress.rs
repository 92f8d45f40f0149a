//! Progress reporting for long-running algorithms.
//!
//! The improver reports after every relaxation step; a CLI can turn the
//! reports into a progress bar, a GUI into an animation frame.
//!
//! # Example
//!
//! ```
//! use eikmesh::algo::Progress;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&seen);
//! let progress = Progress::new(move |current, _total, _message| {
//!     counter.store(current, Ordering::Relaxed);
//! });
//!
//! progress.report(3, 10, "relaxing");
//! assert_eq!(seen.load(Ordering::Relaxed), 3);
//! ```

/// A progress callback that receives updates during long-running operations.
///
/// The callback receives the current step, the total number of steps and a
/// short description of what is being done.
pub struct Progress {
    callback: Box<dyn Fn(usize, usize, &str) + Send + Sync>,
}

impl Progress {
    /// Create a new progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Report progress.
    #[inline]
    pub fn report(&self, current: usize, total: usize, message: &str) {
        (self.callback)(current, total, message);
    }

    /// Report progress within one step of a larger run.
    ///
    /// `[0, sub_total]` is mapped onto `[range_current, range_current + 1]`
    /// out of `range_total`, in thousandths.
    #[inline]
    pub fn report_sub(
        &self,
        sub_current: usize,
        sub_total: usize,
        range_current: usize,
        range_total: usize,
        message: &str,
    ) {
        if sub_total == 0 || range_total == 0 {
            return;
        }
        let sub_fraction = (sub_current.min(sub_total) * 1000) / sub_total;
        let effective = range_current * 1000 + sub_fraction;
        (self.callback)(effective, range_total * 1000, message);
    }

    /// A reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_report_sub_scales_into_range() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let progress = Progress::new(move |c, t, _| sink.lock().unwrap().push((c, t)));
        progress.report_sub(1, 2, 3, 4, "");
        progress.report_sub(5, 0, 0, 4, "");
        assert_eq!(*log.lock().unwrap(), vec![(3500, 4000)]);
    }
}
