use crate::error::Result;
use crate::executor::{Executor, PanicHandler, Task};
use crate::mode::ExecutionMode;
use crate::stats::PosterMetrics;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

struct Queued {
    seq: u64,
    task: Task,
}

#[derive(Default)]
struct QueueState {
    // ordered by `seq`
    pending: VecDeque<Queued>,
    next_seq: u64,
    // set while a drain unit is scheduled or running
    draining: bool,
}

/// Serial FIFO queue drained on a shared executor.
///
/// At most one drain unit per queue is active, so tasks run one at a time in
/// enqueue order even though each may land on a different pool thread. The
/// lock is held only to push, pop and flip the draining flag.
pub struct ExecutionQueue {
    mode: ExecutionMode,
    state: Mutex<QueueState>,
    executor: Arc<dyn Executor>,
    handler: Arc<PanicHandler>,
    metrics: PosterMetrics,
}

impl ExecutionQueue {
    pub fn new(
        mode: ExecutionMode,
        executor: Arc<dyn Executor>,
        handler: Arc<PanicHandler>,
    ) -> Arc<Self> {
        Arc::new(Self {
            mode,
            state: Mutex::new(QueueState::default()),
            executor,
            handler,
            metrics: PosterMetrics::new(),
        })
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Appends `task` and schedules a drain unit if none is active.
    ///
    /// If the executor refuses the drain unit, every task appended since the
    /// activation began is taken back out and the error returned. Posts that
    /// slipped in while the activation was in flight were already answered
    /// with `Ok`; their tasks are counted as discarded. An idle queue is
    /// therefore always empty.
    pub fn enqueue(self: &Arc<Self>, task: Task) -> Result<()> {
        let task_id = task.id();
        self.metrics.record_posted();
        let (seq, start_drain) = {
            let mut state = self.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.pending.push_back(Queued { seq, task });
            (seq, !std::mem::replace(&mut state.draining, true))
        };

        if !start_drain {
            return Ok(());
        }

        let queue = Arc::clone(self);
        if let Err(err) = self.executor.execute(Box::new(move || queue.drain())) {
            let withdrawn = {
                let mut state = self.state.lock();
                state.draining = false;
                let at = state.pending.partition_point(|queued| queued.seq < seq);
                state.pending.split_off(at)
            };

            let mut stranded = 0u64;
            for queued in &withdrawn {
                if queued.seq == seq {
                    self.metrics.revert_posted();
                } else {
                    stranded += 1;
                }
            }
            if stranded > 0 {
                self.metrics.record_discarded(stranded);
            }

            tracing::warn!(
                mode = %self.mode,
                task_id = %task_id,
                stranded,
                error = %err,
                "queue.drain.rejected"
            );
            return Err(err);
        }

        Ok(())
    }

    /// Drops every task not yet handed to the drain loop. Returns how many.
    pub fn clear(&self) -> usize {
        let discarded = std::mem::take(&mut self.state.lock().pending);
        let count = discarded.len();
        if count > 0 {
            self.metrics.record_discarded(count as u64);
            tracing::debug!(mode = %self.mode, discarded = count, "queue.clear");
        }
        count
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().pending.is_empty()
    }

    pub fn is_draining(&self) -> bool {
        self.state.lock().draining
    }

    pub fn metrics(&self) -> &PosterMetrics {
        &self.metrics
    }

    fn drain(&self) {
        tracing::trace!(mode = %self.mode, "queue.drain.start");
        let mut ran = 0usize;

        loop {
            let task = {
                let mut state = self.state.lock();
                match state.pending.pop_front() {
                    Some(queued) => queued.task,
                    None => {
                        state.draining = false;
                        break;
                    }
                }
            };

            match self.handler.execute(self.mode, task) {
                Ok(()) => self.metrics.record_executed(),
                Err(_) => self.metrics.record_panicked(),
            }
            ran += 1;
        }

        tracing::trace!(mode = %self.mode, ran, "queue.drain.stop");
    }
}

impl fmt::Debug for ExecutionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ExecutionQueue")
            .field("mode", &self.mode)
            .field("pending", &state.pending.len())
            .field("draining", &state.draining)
            .finish()
    }
}
