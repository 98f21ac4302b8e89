//! Task execution infrastructure.
//!
//! This module provides the task type, the panic boundary every queued task
//! runs behind, the [`Executor`] seam the dispatcher drains its queues
//! through, and a fixed-size [`ThreadPool`] implementing it.

pub mod panic_handler;
pub mod task;
pub mod thread_pool;

pub use panic_handler::{FailureReporter, PanicHandler, PanicStrategy, TaskFailure};
pub use task::{Task, TaskId};
pub use thread_pool::ThreadPool;

use crate::error::Result;
use std::sync::Arc;

/// A raw unit of work handed to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A shared pool of threads. Sizing and policy belong to whoever builds it.
pub trait Executor: Send + Sync {
    /// Runs `job` on some pool thread. Must not block on the job itself.
    fn execute(&self, job: Job) -> Result<()>;
}

impl<E> Executor for Arc<E>
where
    E: Executor + ?Sized,
{
    fn execute(&self, job: Job) -> Result<()> {
        (**self).execute(job)
    }
}
