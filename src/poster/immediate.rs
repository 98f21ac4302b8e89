use super::Poster;
use crate::error::Result;
use crate::executor::Task;
use crate::mode::ExecutionMode;
use crate::stats::{PosterMetrics, PosterSnapshot};
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};

/// Runs tasks inline on the posting thread.
///
/// There is no queue. A panicking task is counted and then resumed into the
/// caller of `enqueue`.
#[derive(Debug, Default)]
pub struct ImmediatePoster {
    metrics: PosterMetrics,
}

impl ImmediatePoster {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Poster for ImmediatePoster {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Immediate
    }

    fn enqueue(&self, task: Task) -> Result<()> {
        self.metrics.record_posted();
        match catch_unwind(AssertUnwindSafe(move || task.run())) {
            Ok(()) => {
                self.metrics.record_executed();
                Ok(())
            }
            Err(payload) => {
                self.metrics.record_panicked();
                resume_unwind(payload)
            }
        }
    }

    // nothing is ever pending
    fn clear(&self) {}

    fn snapshot(&self) -> PosterSnapshot {
        self.metrics.snapshot(ExecutionMode::Immediate)
    }
}
