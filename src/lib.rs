//! methodpost - route fire-and-forget tasks to execution contexts
//!
//! A [`Dispatcher`] hands each task to one of four execution modes:
//!
//! - **Immediate**: runs inline on the posting thread; panics reach the caller.
//! - **Background** / **Async**: two independent serial queues drained on a
//!   shared, caller-supplied thread pool.
//! - **Main**: posted into the host's single-threaded main context.
//!
//! Queued modes keep FIFO order per mode, run one task at a time per mode,
//! and contain task panics behind a reporting hook. The mode can be given
//! explicitly or read from a tag attached to the callable.
//!
//! # Quick Start
//!
//! ```no_run
//! use methodpost::prelude::*;
//! use std::sync::Arc;
//!
//! let pool = Arc::new(ThreadPool::new(&PoolConfig::default()).unwrap());
//! let main_loop = MainLoop::new();
//! let dispatcher =
//!     Dispatcher::new(pool, Arc::new(main_loop.handle()), ExecutionMode::Background).unwrap();
//!
//! dispatcher.post(ExecutionMode::Async, || println!("on the pool")).unwrap();
//! dispatcher.dispatch(Tagged::main(|| println!("on the main loop"))).unwrap();
//!
//! main_loop.run_pending();
//! ```

// Lint configuration
#![warn(missing_debug_implementations)]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod invoke;
pub mod main_loop;
pub mod mode;
pub mod poster;
pub mod prelude;
pub mod stats;

// Re-export key types at crate root
pub use config::{PoolConfig, PoolConfigBuilder};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::{Error, Result};
pub use executor::{Executor, FailureReporter, Job, PanicStrategy, Task, TaskFailure, ThreadPool};
pub use invoke::{BoundCall, MethodInfo, MethodTable, Parameter};
pub use main_loop::{MainLoop, MainLoopHandle};
pub use mode::{resolve, ExecutionMode, ModeRegistry, ModeResolver, ModeSource, ModeTag, Tagged};
pub use poster::MainContext;

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_all_modes_run() {
        let pool = Arc::new(ThreadPool::with_threads(2).unwrap());
        let main_loop = MainLoop::new();
        let dispatcher =
            Dispatcher::new(pool, Arc::new(main_loop.handle()), ExecutionMode::Background).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();

        for mode in [ExecutionMode::Background, ExecutionMode::Async] {
            let tx = tx.clone();
            dispatcher.post(mode, move || tx.send(mode).unwrap()).unwrap();
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        dispatcher
            .post(ExecutionMode::Immediate, move || sink.lock().push("immediate"))
            .unwrap();
        assert_eq!(*log.lock(), vec!["immediate"]);

        let sink = log.clone();
        dispatcher
            .post(ExecutionMode::Main, move || sink.lock().push("main"))
            .unwrap();
        main_loop.run_pending();
        assert_eq!(*log.lock(), vec!["immediate", "main"]);

        let mut pooled: Vec<ExecutionMode> = (0..2)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        pooled.sort_by_key(|m| m.as_str());
        assert_eq!(pooled, vec![ExecutionMode::Async, ExecutionMode::Background]);
    }
}
