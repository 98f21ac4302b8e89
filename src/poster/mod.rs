//! Per-mode task posters.
//!
//! Each [`ExecutionMode`] other than `Unspecified` has one poster that owns
//! its queueing policy: [`PoolPoster`] for `Background` and `Async`,
//! [`MainThreadPoster`] for `Main` and [`ImmediatePoster`] for `Immediate`.

pub mod immediate;
pub mod main_thread;
pub mod pool;
pub mod queue;

pub use immediate::ImmediatePoster;
pub use main_thread::{MainContext, MainThreadPoster};
pub use pool::PoolPoster;
pub use queue::ExecutionQueue;

use crate::error::Result;
use crate::executor::Task;
use crate::mode::ExecutionMode;
use crate::stats::PosterSnapshot;

pub trait Poster: Send + Sync {
    fn mode(&self) -> ExecutionMode;

    /// Hands `task` to this poster's execution context.
    fn enqueue(&self, task: Task) -> Result<()>;

    /// Drops pending tasks. Tasks already running are not interrupted.
    fn clear(&self);

    fn snapshot(&self) -> PosterSnapshot;
}
