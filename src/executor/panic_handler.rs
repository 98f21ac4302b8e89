use super::task::{Task, TaskId};
use crate::mode::ExecutionMode;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum PanicStrategy {
    Abort,
    Isolate,
    #[default]
    LogAndContinue,
}

/// A queued task that panicked.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub task_id: TaskId,
    pub mode: ExecutionMode,
    pub message: String,
}

impl TaskFailure {
    fn from_payload(task_id: TaskId, mode: ExecutionMode, payload: Box<dyn Any + Send>) -> Self {
        Self {
            task_id,
            mode,
            message: panic_message(payload.as_ref()),
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) panicked: {}", self.task_id, self.mode, self.message)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Hook that receives every swallowed task failure.
pub trait FailureReporter: Send + Sync {
    fn report(&self, failure: &TaskFailure);
}

impl<F> FailureReporter for F
where
    F: Fn(&TaskFailure) + Send + Sync,
{
    fn report(&self, failure: &TaskFailure) {
        self(failure)
    }
}

/// Execution boundary for queued tasks. Panics never escape it.
pub struct PanicHandler {
    strategy: PanicStrategy,
    reporter: Option<Arc<dyn FailureReporter>>,
    panic_count: AtomicUsize,
}

impl PanicHandler {
    pub fn new(strategy: PanicStrategy) -> Self {
        Self {
            strategy,
            reporter: None,
            panic_count: AtomicUsize::new(0),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn execute(&self, mode: ExecutionMode, task: Task) -> Result<(), TaskFailure> {
        let task_id = task.id();
        match catch_unwind(AssertUnwindSafe(move || task.run())) {
            Ok(()) => Ok(()),
            Err(payload) => {
                self.panic_count.fetch_add(1, Ordering::Relaxed);

                let failure = TaskFailure::from_payload(task_id, mode, payload);

                match self.strategy {
                    PanicStrategy::Abort => {
                        tracing::error!(
                            task_id = %failure.task_id,
                            mode = %failure.mode,
                            message = %failure.message,
                            "task panicked, aborting"
                        );
                        std::process::abort();
                    }
                    PanicStrategy::Isolate => {}
                    PanicStrategy::LogAndContinue => {
                        tracing::error!(
                            task_id = %failure.task_id,
                            mode = %failure.mode,
                            message = %failure.message,
                            "task panicked"
                        );
                    }
                }

                if let Some(reporter) = &self.reporter {
                    reporter.report(&failure);
                }

                Err(failure)
            }
        }
    }

    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }

    pub fn reset_count(&self) {
        self.panic_count.store(0, Ordering::Relaxed);
    }

    pub fn strategy(&self) -> PanicStrategy {
        self.strategy
    }
}

impl Default for PanicHandler {
    fn default() -> Self {
        Self::new(PanicStrategy::default())
    }
}

impl fmt::Debug for PanicHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicHandler")
            .field("strategy", &self.strategy)
            .field("has_reporter", &self.reporter.is_some())
            .field("panic_count", &self.panic_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_panic_handler_isolate() {
        let handler = PanicHandler::new(PanicStrategy::Isolate);

        let result = handler.execute(ExecutionMode::Background, Task::new(|| panic!("test panic")));

        let failure = result.unwrap_err();
        assert_eq!(failure.message, "test panic");
        assert_eq!(failure.mode, ExecutionMode::Background);
        assert_eq!(handler.panic_count(), 1);
    }

    #[test]
    fn test_panic_handler_success() {
        let handler = PanicHandler::new(PanicStrategy::Isolate);

        let result = handler.execute(ExecutionMode::Async, Task::new(|| {}));

        assert!(result.is_ok());
        assert_eq!(handler.panic_count(), 0);
    }

    #[test]
    fn test_panic_counter() {
        let handler = PanicHandler::new(PanicStrategy::LogAndContinue);

        for _ in 0..5 {
            let _ = handler.execute(ExecutionMode::Main, Task::new(|| panic!("test")));
        }

        assert_eq!(handler.panic_count(), 5);

        handler.reset_count();
        assert_eq!(handler.panic_count(), 0);
    }

    #[test]
    fn test_reporter_receives_failure() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = PanicHandler::new(PanicStrategy::Isolate).with_reporter(Arc::new(
            move |failure: &TaskFailure| sink.lock().push(failure.message.clone()),
        ));

        let task = Task::new(|| panic!("{}", String::from("formatted")));
        let _ = handler.execute(ExecutionMode::Background, task);

        assert_eq!(*seen.lock(), vec!["formatted".to_string()]);
    }
}
