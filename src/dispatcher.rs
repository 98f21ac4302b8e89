//! The public entry point: routes tasks to the poster of their mode.

use crate::error::{Error, Result};
use crate::executor::{Executor, FailureReporter, PanicHandler, PanicStrategy, Task};
use crate::invoke::{BoundCall, MethodInfo, MethodTable};
use crate::mode::{ExecutionMode, ModeResolver, ModeSource, Tagged};
use crate::poster::{ImmediatePoster, MainContext, MainThreadPoster, PoolPoster, Poster};
use crate::stats::DispatcherStats;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Routes fire-and-forget tasks to the `Immediate`, `Background`, `Main` or
/// `Async` poster.
///
/// Posting never blocks except in `Immediate` mode, where the task runs
/// inline and a panic reaches the caller. Queued modes run each task exactly
/// once, in FIFO order per mode, behind a panic boundary. `Background` and
/// `Async` share one executor.
pub struct Dispatcher {
    resolver: ModeResolver,
    executor: Arc<dyn Executor>,
    main_context: Arc<dyn MainContext>,
    immediate: ImmediatePoster,
    background: PoolPoster,
    main: MainThreadPoster,
    asynchronous: PoolPoster,
    created_at: Instant,
}

impl Dispatcher {
    /// Builds a dispatcher over a caller-owned executor and main context.
    ///
    /// `default_mode` must not be `Unspecified`.
    pub fn new(
        executor: Arc<dyn Executor>,
        main_context: Arc<dyn MainContext>,
        default_mode: ExecutionMode,
    ) -> Result<Self> {
        DispatcherBuilder::new(executor, main_context)
            .default_mode(default_mode)
            .build()
    }

    pub fn builder(
        executor: Arc<dyn Executor>,
        main_context: Arc<dyn MainContext>,
    ) -> DispatcherBuilder {
        DispatcherBuilder::new(executor, main_context)
    }

    pub fn default_mode(&self) -> ExecutionMode {
        self.resolver.default_mode()
    }

    /// The shared executor backing `Background` and `Async`.
    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    pub fn main_context(&self) -> &Arc<dyn MainContext> {
        &self.main_context
    }

    /// Posts `f` to `mode`; `Unspecified` means the default mode.
    pub fn post<F>(&self, mode: ExecutionMode, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_task(mode, Task::new(f))
    }

    pub fn post_task(&self, mode: ExecutionMode, task: Task) -> Result<()> {
        let mode = self.resolver.resolve(Some(mode), None);
        self.route(mode, task)
    }

    /// Posts `f` to the mode tagged on `source`, or the default mode when
    /// the source is untagged or its tag cannot be read.
    pub fn post_tagged<F>(&self, source: &dyn ModeSource, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mode = self.resolver.resolve(None, Some(source));
        self.route(mode, Task::new(f))
    }

    /// Posts `f` with both an explicit mode and a tag source. A specified
    /// `mode` wins; `Unspecified` defers to the tag, then the default.
    pub fn post_with<F>(&self, mode: ExecutionMode, source: &dyn ModeSource, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mode = self.resolver.resolve(Some(mode), Some(source));
        self.route(mode, Task::new(f))
    }

    /// Posts a callable that carries its own tag.
    pub fn dispatch<F>(&self, tagged: Tagged<F>) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mode = self.resolver.resolve(None, Some(&tagged));
        self.route(mode, tagged.into_task())
    }

    /// Posts a bound method call to the mode tagged on its registration.
    pub fn post_bound(&self, call: BoundCall) -> Result<()> {
        let mode = self.resolver.resolve(None, Some(&call));
        self.route(mode, call.into_task())
    }

    /// Looks `info` up in `table` and posts the call on `owner`.
    ///
    /// Unknown names and mismatched parameters are dropped: nothing is
    /// queued and `Ok(())` is returned.
    pub fn post_method<T>(&self, owner: &Arc<T>, table: &MethodTable<T>, info: MethodInfo) -> Result<()>
    where
        T: Send + Sync + 'static,
    {
        let name = info.name().to_string();
        match table.bind(Arc::clone(owner), info) {
            Some(call) => self.post_bound(call),
            None => {
                tracing::debug!(method = %name, "no matching method registered, call dropped");
                Ok(())
            }
        }
    }

    /// Drops every task not yet started, in all modes. Running tasks finish.
    pub fn clear_tasks(&self) {
        self.background.clear();
        self.main.clear();
        self.asynchronous.clear();
        tracing::debug!("dispatcher.clear_tasks");
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            timestamp: Instant::now(),
            uptime: self.created_at.elapsed(),
            immediate: self.immediate.snapshot(),
            background: self.background.snapshot(),
            main: self.main.snapshot(),
            asynchronous: self.asynchronous.snapshot(),
        }
    }

    /// Pending tasks in the `Background` and `Async` queues.
    pub fn pending(&self, mode: ExecutionMode) -> usize {
        match mode {
            ExecutionMode::Background => self.background.pending(),
            ExecutionMode::Async => self.asynchronous.pending(),
            _ => 0,
        }
    }

    fn poster(&self, mode: ExecutionMode) -> &dyn Poster {
        match mode {
            ExecutionMode::Immediate => &self.immediate,
            ExecutionMode::Main => &self.main,
            ExecutionMode::Async => &self.asynchronous,
            ExecutionMode::Background | ExecutionMode::Unspecified => &self.background,
        }
    }

    fn route(&self, mode: ExecutionMode, task: Task) -> Result<()> {
        tracing::trace!(mode = %mode, task_id = %task.id(), "dispatcher.post");
        self.poster(mode).enqueue(task)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("default_mode", &self.default_mode())
            .field("background", &self.background)
            .field("main", &self.main)
            .field("asynchronous", &self.asynchronous)
            .finish_non_exhaustive()
    }
}

/// Optional settings for a [`Dispatcher`].
pub struct DispatcherBuilder {
    executor: Arc<dyn Executor>,
    main_context: Arc<dyn MainContext>,
    default_mode: ExecutionMode,
    panic_strategy: PanicStrategy,
    reporter: Option<Arc<dyn FailureReporter>>,
}

impl DispatcherBuilder {
    pub fn new(executor: Arc<dyn Executor>, main_context: Arc<dyn MainContext>) -> Self {
        Self {
            executor,
            main_context,
            default_mode: ExecutionMode::Background,
            panic_strategy: PanicStrategy::default(),
            reporter: None,
        }
    }

    pub fn default_mode(mut self, mode: ExecutionMode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.panic_strategy = strategy;
        self
    }

    /// Receives every panic swallowed by a queued poster.
    pub fn reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn build(self) -> Result<Dispatcher> {
        if !self.default_mode.is_specified() {
            return Err(Error::InvalidDefaultMode);
        }

        let mut handler = PanicHandler::new(self.panic_strategy);
        if let Some(reporter) = self.reporter {
            handler = handler.with_reporter(reporter);
        }
        let handler = Arc::new(handler);

        Ok(Dispatcher {
            resolver: ModeResolver::new(self.default_mode),
            immediate: ImmediatePoster::new(),
            background: PoolPoster::background(self.executor.clone(), handler.clone()),
            main: MainThreadPoster::new(self.main_context.clone(), handler.clone()),
            asynchronous: PoolPoster::asynchronous(self.executor.clone(), handler),
            executor: self.executor,
            main_context: self.main_context,
            created_at: Instant::now(),
        })
    }
}

impl fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("default_mode", &self.default_mode)
            .field("panic_strategy", &self.panic_strategy)
            .field("has_reporter", &self.reporter.is_some())
            .finish()
    }
}
