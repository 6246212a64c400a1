use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use crossbeam_queue::SegQueue;
use zenith_core::log::trace;
use crate::system::{QueuedJob, ThreadLocalState};

pub(crate) struct WorkerThread {
    shutdown: Arc<AtomicBool>,

    global_queue: Arc<SegQueue<QueuedJob>>,
    local_state: Arc<ThreadLocalState>,
}

impl WorkerThread {
    pub(crate) fn new(
        shutdown: Arc<AtomicBool>,
        global_queue: Arc<SegQueue<QueuedJob>>,
        local_state: Arc<ThreadLocalState>,
    ) -> Self {
        Self {
            shutdown,
            global_queue,
            local_state,
        }
    }

    pub(crate) fn run(self) {
        while !self.shutdown.load(Ordering::Acquire) {
            // local jobs have higher priority
            let executed = Self::execute_next_ready(&self.local_state.local_queue)
                || Self::execute_next_ready(&self.global_queue);

            if !executed {
                // no work available, sleep a while
                std::thread::sleep(Duration::from_micros(10));
            }
        }
    }

    /// Execute the first job whose dependencies are completed.
    /// Jobs which are not ready are put back, each job is visited at most once per call.
    fn execute_next_ready(queue: &SegQueue<QueuedJob>) -> bool {
        for _ in 0..queue.len() {
            let Some(job) = queue.pop() else {
                break;
            };

            if job.ready_to_execute() {
                trace!("Execute {} on [{}]", job.id(), std::thread::current().name().unwrap_or("unnamed"));
                job.execute();
                return true;
            }

            queue.push(job);
        }

        false
    }
}
