use super::panic_handler::panic_message;
use super::{Executor, Job};
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub type WorkerId = usize;

// counters shared by all workers
#[derive(Debug, Default)]
struct PoolState {
    jobs_executed: AtomicU64,
    jobs_panicked: AtomicU64,
    busy_workers: AtomicUsize,
}

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
}

/// Fixed-size thread pool fed through a shared FIFO channel.
///
/// The dispatcher never builds one itself; hosts create it from a
/// [`PoolConfig`] and hand it over as the shared executor.
pub struct ThreadPool {
    workers: Mutex<Vec<WorkerHandle>>,
    sender: RwLock<Option<Sender<Job>>>,
    num_threads: usize,
    state: Arc<PoolState>,
}

impl ThreadPool {
    pub fn new(config: &PoolConfig) -> Result<Self> {
        config.validate()?;

        let num_threads = config.worker_threads();

        let (sender, receiver) = unbounded::<Job>();
        let state = Arc::new(PoolState::default());
        let mut handles = Vec::with_capacity(num_threads);

        for id in 0..num_threads {
            let receiver = receiver.clone();
            let state = state.clone();
            let name = format!("{}-{}", config.thread_name_prefix, id);

            let mut builder = thread::Builder::new().name(name);

            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            // Dropping `sender` on the error path disconnects the workers
            // already spawned, so they exit on their own.
            let thread = builder.spawn(move || run_worker(id, receiver, state))?;

            handles.push(WorkerHandle {
                id,
                thread: Some(thread),
            });
        }

        tracing::trace!(threads = num_threads, "pool.start");

        Ok(Self {
            workers: Mutex::new(handles),
            sender: RwLock::new(Some(sender)),
            num_threads,
            state,
        })
    }

    pub fn with_threads(num_threads: usize) -> Result<Self> {
        let config = PoolConfig::builder().num_threads(num_threads).build()?;
        Self::new(&config)
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Jobs submitted but not yet picked up by a worker.
    pub fn pending_jobs(&self) -> usize {
        self.sender.read().as_ref().map_or(0, Sender::len)
    }

    pub fn busy_workers(&self) -> usize {
        self.state.busy_workers.load(Ordering::Relaxed)
    }

    pub fn jobs_executed(&self) -> u64 {
        self.state.jobs_executed.load(Ordering::Relaxed)
    }

    pub fn jobs_panicked(&self) -> u64 {
        self.state.jobs_panicked.load(Ordering::Relaxed)
    }

    pub fn is_shutdown(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Stops accepting jobs, lets workers finish what is queued and joins
    /// them. A worker calling this skips joining itself.
    pub fn shutdown(&self) {
        if self.sender.write().take().is_none() {
            return;
        }

        let current = thread::current().id();
        let mut workers = self.workers.lock();
        for worker in workers.iter_mut() {
            if let Some(thread) = worker.thread.take() {
                if thread.thread().id() == current {
                    continue;
                }
                if thread.join().is_err() {
                    tracing::warn!(worker = worker.id, "pool worker exited abnormally");
                }
            }
        }

        tracing::trace!(threads = self.num_threads, "pool.shutdown");
    }
}

impl Executor for ThreadPool {
    fn execute(&self, job: Job) -> Result<()> {
        let sender = self.sender.read();
        match sender.as_ref() {
            Some(sender) => sender
                .send(job)
                .map_err(|_| Error::rejected("thread pool disconnected")),
            None => Err(Error::rejected("thread pool is shut down")),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("num_threads", &self.num_threads)
            .field("pending_jobs", &self.pending_jobs())
            .field("busy_workers", &self.busy_workers())
            .finish()
    }
}

// worker main loop, returns once every sender is gone
fn run_worker(id: WorkerId, receiver: Receiver<Job>, state: Arc<PoolState>) {
    for job in receiver.iter() {
        state.busy_workers.fetch_add(1, Ordering::Relaxed);

        if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
            state.jobs_panicked.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                worker = id,
                message = %panic_message(payload.as_ref()),
                "pool job panicked"
            );
        }

        state.jobs_executed.fetch_add(1, Ordering::Relaxed);
        state.busy_workers.fetch_sub(1, Ordering::Relaxed);
    }
}
