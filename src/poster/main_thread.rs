use super::Poster;
use crate::error::Result;
use crate::executor::{Job, PanicHandler, Task};
use crate::mode::ExecutionMode;
use crate::stats::{PosterMetrics, PosterSnapshot};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The host's single-threaded execution context, e.g. a UI event loop.
///
/// Jobs posted from one thread must run in post order. The dispatcher only
/// posts into the context; it never creates or drives it.
pub trait MainContext: Send + Sync {
    fn post(&self, job: Job) -> Result<()>;
}

impl<C> MainContext for Arc<C>
where
    C: MainContext + ?Sized,
{
    fn post(&self, job: Job) -> Result<()> {
        (**self).post(job)
    }
}

struct Shared {
    // bumped by `clear`; jobs stamped with an older value are skipped
    generation: AtomicU64,
    handler: Arc<PanicHandler>,
    metrics: PosterMetrics,
}

/// Posts tasks into the [`MainContext`].
pub struct MainThreadPoster {
    context: Arc<dyn MainContext>,
    shared: Arc<Shared>,
}

impl MainThreadPoster {
    pub fn new(context: Arc<dyn MainContext>, handler: Arc<PanicHandler>) -> Self {
        Self {
            context,
            shared: Arc::new(Shared {
                generation: AtomicU64::new(0),
                handler,
                metrics: PosterMetrics::new(),
            }),
        }
    }

    pub fn context(&self) -> &Arc<dyn MainContext> {
        &self.context
    }
}

impl Poster for MainThreadPoster {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Main
    }

    fn enqueue(&self, task: Task) -> Result<()> {
        let stamp = self.shared.generation.load(Ordering::Acquire);
        let shared = Arc::clone(&self.shared);

        let job: Job = Box::new(move || {
            if shared.generation.load(Ordering::Acquire) != stamp {
                shared.metrics.record_discarded(1);
                return;
            }
            match shared.handler.execute(ExecutionMode::Main, task) {
                Ok(()) => shared.metrics.record_executed(),
                Err(_) => shared.metrics.record_panicked(),
            }
        });

        self.shared.metrics.record_posted();
        if let Err(err) = self.context.post(job) {
            self.shared.metrics.revert_posted();
            tracing::warn!(error = %err, "main context refused task");
            return Err(err);
        }
        Ok(())
    }

    /// Invalidates every task this poster posted that has not started yet.
    /// The context still delivers them; they are dropped unrun.
    fn clear(&self) {
        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(generation, "main.clear");
    }

    fn snapshot(&self) -> PosterSnapshot {
        self.shared.metrics.snapshot(ExecutionMode::Main)
    }
}

impl fmt::Debug for MainThreadPoster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainThreadPoster")
            .field("generation", &self.shared.generation.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::executor::PanicStrategy;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingContext {
        jobs: Mutex<Vec<Job>>,
    }

    impl RecordingContext {
        fn run_all(&self) {
            let jobs = std::mem::take(&mut *self.jobs.lock());
            for job in jobs {
                job();
            }
        }
    }

    impl MainContext for RecordingContext {
        fn post(&self, job: Job) -> Result<()> {
            self.jobs.lock().push(job);
            Ok(())
        }
    }

    struct ClosedContext;

    impl MainContext for ClosedContext {
        fn post(&self, _job: Job) -> Result<()> {
            Err(Error::ContextClosed)
        }
    }

    fn handler() -> Arc<PanicHandler> {
        Arc::new(PanicHandler::new(PanicStrategy::Isolate))
    }

    #[test]
    fn test_runs_in_post_order() {
        let context = Arc::new(RecordingContext::default());
        let poster = MainThreadPoster::new(context.clone(), handler());
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..4 {
            let log = log.clone();
            poster.enqueue(Task::new(move || log.lock().push(i))).unwrap();
        }
        context.run_all();

        assert_eq!(*log.lock(), vec![0, 1, 2, 3]);
        assert_eq!(poster.snapshot().executed, 4);
    }

    #[test]
    fn test_clear_skips_pending_only() {
        let context = Arc::new(RecordingContext::default());
        let poster = MainThreadPoster::new(context.clone(), handler());
        let log = Arc::new(Mutex::new(Vec::new()));

        let sink = log.clone();
        poster.enqueue(Task::new(move || sink.lock().push("stale"))).unwrap();
        poster.clear();
        let sink = log.clone();
        poster.enqueue(Task::new(move || sink.lock().push("fresh"))).unwrap();
        context.run_all();

        assert_eq!(*log.lock(), vec!["fresh"]);
        let snapshot = poster.snapshot();
        assert_eq!(snapshot.discarded, 1);
        assert_eq!(snapshot.executed, 1);
    }

    #[test]
    fn test_panic_is_contained() {
        let context = Arc::new(RecordingContext::default());
        let poster = MainThreadPoster::new(context.clone(), handler());

        poster.enqueue(Task::new(|| panic!("on main"))).unwrap();
        context.run_all();

        assert_eq!(poster.snapshot().panicked, 1);
    }

    #[test]
    fn test_closed_context_returns_error() {
        let poster = MainThreadPoster::new(Arc::new(ClosedContext), handler());

        let result = poster.enqueue(Task::new(|| {}));

        assert!(matches!(result, Err(Error::ContextClosed)));
        assert_eq!(poster.snapshot().posted, 0);
    }
}
