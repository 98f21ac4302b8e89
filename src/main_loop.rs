//! A minimal single-threaded event loop usable as the main context.
//!
//! Hosts with their own UI loop implement [`MainContext`] for it instead.
//! [`MainLoop`] covers headless hosts: whichever thread calls one of the
//! `run*` methods becomes the main thread for as long as it runs.

use crate::error::{Error, Result};
use crate::executor::panic_handler::panic_message;
use crate::executor::Job;
use crate::poster::MainContext;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

enum Message {
    Run(Job),
    Quit,
}

/// FIFO job loop. Jobs run one at a time in post order.
pub struct MainLoop {
    sender: Sender<Message>,
    receiver: Receiver<Message>,
}

/// Posting side of a [`MainLoop`]. Cheap to clone.
#[derive(Clone)]
pub struct MainLoopHandle {
    sender: Sender<Message>,
}

impl MainLoop {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn handle(&self) -> MainLoopHandle {
        MainLoopHandle {
            sender: self.sender.clone(),
        }
    }

    /// Jobs waiting to run.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Runs jobs until [`MainLoopHandle::quit`] is received. Returns the
    /// number of jobs run.
    pub fn run(&self) -> usize {
        let mut ran = 0;
        while let Ok(message) = self.receiver.recv() {
            match message {
                Message::Run(job) => {
                    run_job(job);
                    ran += 1;
                }
                Message::Quit => break,
            }
        }
        ran
    }

    /// Runs what is already queued, without waiting for more.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(Message::Run(job)) => {
                    run_job(job);
                    ran += 1;
                }
                Ok(Message::Quit) | Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                    break
                }
            }
        }
        ran
    }

    /// Runs jobs as they arrive until `timeout` has passed or a quit is
    /// received.
    pub fn run_for(&self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut ran = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(Message::Run(job)) => {
                    run_job(job);
                    ran += 1;
                }
                Ok(Message::Quit)
                | Err(RecvTimeoutError::Timeout)
                | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        ran
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MainLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainLoop")
            .field("pending", &self.pending())
            .finish()
    }
}

impl MainLoopHandle {
    /// Asks a running loop to return once the jobs posted before this call
    /// have run.
    pub fn quit(&self) -> Result<()> {
        self.sender
            .send(Message::Quit)
            .map_err(|_| Error::ContextClosed)
    }
}

impl MainContext for MainLoopHandle {
    fn post(&self, job: Job) -> Result<()> {
        self.sender
            .send(Message::Run(job))
            .map_err(|_| Error::ContextClosed)
    }
}

impl fmt::Debug for MainLoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainLoopHandle").finish_non_exhaustive()
    }
}

fn run_job(job: Job) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
        tracing::error!(message = %panic_message(payload.as_ref()), "main loop job panicked");
    }
}
