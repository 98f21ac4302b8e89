use super::queue::ExecutionQueue;
use super::Poster;
use crate::error::Result;
use crate::executor::{Executor, PanicHandler, Task};
use crate::mode::ExecutionMode;
use crate::stats::PosterSnapshot;
use std::sync::Arc;

/// Serial queue drained on the shared executor.
///
/// Backs both `Background` and `Async`; the two only differ by intent, and
/// each gets its own queue so their pending tasks and drain loops are
/// independent. They still share the executor, so a slow task in one can
/// starve the other when the pool is small.
#[derive(Debug)]
pub struct PoolPoster {
    queue: Arc<ExecutionQueue>,
}

impl PoolPoster {
    pub fn new(mode: ExecutionMode, executor: Arc<dyn Executor>, handler: Arc<PanicHandler>) -> Self {
        Self {
            queue: ExecutionQueue::new(mode, executor, handler),
        }
    }

    pub fn background(executor: Arc<dyn Executor>, handler: Arc<PanicHandler>) -> Self {
        Self::new(ExecutionMode::Background, executor, handler)
    }

    pub fn asynchronous(executor: Arc<dyn Executor>, handler: Arc<PanicHandler>) -> Self {
        Self::new(ExecutionMode::Async, executor, handler)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Poster for PoolPoster {
    fn mode(&self) -> ExecutionMode {
        self.queue.mode()
    }

    fn enqueue(&self, task: Task) -> Result<()> {
        self.queue.enqueue(task)
    }

    fn clear(&self) {
        self.queue.clear();
    }

    fn snapshot(&self) -> PosterSnapshot {
        self.queue.metrics().snapshot(self.queue.mode())
    }
}
