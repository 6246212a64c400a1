use std::fmt::{Debug, Formatter};
use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use std::thread::JoinHandle;
use parking_lot::RwLock;
use crossbeam_queue::SegQueue;
use anyhow::{Result, anyhow};
use zenith_core::collections::SmallVec;
use zenith_core::collections::hashmap::HashMap;
use zenith_core::log::{error, info};
use crate::job::{AsJobState, BoxedJob, Job, JobId, JobResult, JobState, PendingJob};
use crate::worker::WorkerThread;

pub(crate) struct QueuedJob {
    job: BoxedJob,
    state: Arc<JobState>,
    dependencies: SmallVec<[Arc<JobState>; 4]>,
}

impl Debug for QueuedJob {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.job.id(), f)
    }
}

impl QueuedJob {
    fn new(job: BoxedJob, state: Arc<JobState>, dependencies: SmallVec<[Arc<JobState>; 4]>) -> Self {
        Self {
            job,
            state,
            dependencies,
        }
    }

    pub(crate) fn ready_to_execute(&self) -> bool {
        self.dependencies
            .iter()
            .all(|state| state.completed())
    }

    #[inline]
    pub(crate) fn id(&self) -> JobId {
        self.job.id()
    }

    pub(crate) fn execute(self) {
        let id = self.job.id();
        let job = self.job;

        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || job.execute())) {
            Ok(result) => self.state.set_result(result),
            Err(_) => {
                error!("{} panicked on thread [{}]", id, std::thread::current().name().unwrap_or("unnamed"));
                self.state.set_panicked();
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct ThreadInfo {
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ThreadInfo {
    pub(crate) fn new(shutdown: Arc<AtomicBool>, handle: JoinHandle<()>) -> Self {
        Self {
            shutdown,
            handle,
        }
    }

    pub(crate) fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release)
    }

    pub(crate) fn join(self) {
        if self.handle.join().is_err() {
            error!("Worker thread terminated abnormally");
        }
    }
}

#[derive(Default, Debug)]
pub(crate) struct ThreadLocalState {
    pub(crate) local_queue: SegQueue<QueuedJob>,
}

/// Job system backed by named worker threads.
///
/// Jobs go either to the global queue, which every worker steals from, or to the local queue of
/// a named thread. A job only starts once all of its dependencies completed.
pub struct JobSystem {
    thread_registry: RwLock<HashMap<String, ThreadInfo>>,

    global_queue: Arc<SegQueue<QueuedJob>>,
    thread_local_states: RwLock<HashMap<String, Arc<ThreadLocalState>>>,
}

impl Debug for JobSystem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSystem")
            .field("threads", &self.thread_registry.read().keys().collect::<Vec<_>>())
            .field("global_queue", &self.global_queue.len())
            .finish()
    }
}

impl Default for JobSystem {
    fn default() -> Self {
        let count = std::thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(4);
        Self::new(&[("worker", count)])
    }
}

impl JobSystem {
    pub fn new(thread_configs: &[(&str, usize)]) -> Self {
        let system = Self {
            thread_registry: RwLock::new(HashMap::new()),

            global_queue: Arc::new(SegQueue::new()),
            thread_local_states: RwLock::new(HashMap::new()),
        };
        system.spawn_threads(thread_configs);
        info!("Job system started with {} worker thread(s)", system.num_worker_threads());
        system
    }

    pub fn create_job<J: Job>(&self, job: J) -> PendingJob<J::Output> {
        PendingJob::new(job)
    }

    pub fn run_job<T: Send + 'static>(&self, job: PendingJob<T>) -> JobResult<T> {
        self.run_job_after(job, [])
    }

    pub fn run_job_after<T: Send + 'static, const N: usize>(
        &self,
        job: PendingJob<T>,
        dependencies: [&dyn AsJobState; N],
    ) -> JobResult<T> {
        let state = job.state.clone();
        let (job, result) = job.into_result();

        self.global_queue.push(QueuedJob::new(job, state, collect_dependencies(&dependencies)));
        result
    }

    pub fn run_job_on<T: Send + 'static>(&self, thread_name: &str, job: PendingJob<T>) -> Result<JobResult<T>> {
        self.run_job_on_after(thread_name, job, [])
    }

    pub fn run_job_on_after<T: Send + 'static, const N: usize>(
        &self,
        thread_name: &str,
        job: PendingJob<T>,
        dependencies: [&dyn AsJobState; N],
    ) -> Result<JobResult<T>> {
        let thread_local_states = self.thread_local_states.read();
        let local_state = thread_local_states
            .get(thread_name)
            .ok_or_else(|| anyhow!("Thread '{}' not found", thread_name))?;

        let state = job.state.clone();
        let (job, result) = job.into_result();

        local_state.local_queue.push(QueuedJob::new(job, state, collect_dependencies(&dependencies)));
        Ok(result)
    }

    /// Shorthand of [`JobSystem::create_job`] followed by [`JobSystem::run_job`].
    pub fn submit<J: Job>(&self, job: J) -> JobResult<J::Output> {
        self.run_job(self.create_job(job))
    }

    pub fn submit_to<J: Job>(&self, thread_name: &str, job: J) -> Result<JobResult<J::Output>> {
        self.run_job_on(thread_name, self.create_job(job))
    }

    pub fn wait_for_job(&self, job: &dyn AsJobState) {
        job.as_state().wait();
    }

    pub fn has_thread(&self, thread_name: &str) -> bool {
        self.thread_registry.read().contains_key(thread_name)
    }

    pub fn num_worker_threads(&self) -> usize {
        self.thread_registry.read().len()
    }

    /// Join all current workers and respawn with new configs.
    pub fn config(&self, thread_configs: &[(&str, usize)]) {
        self.join_all_workers();
        self.spawn_threads(thread_configs);
    }

    pub fn join_all_workers(&self) {
        for (_, thread) in self.thread_registry.write().drain() {
            thread.request_shutdown();
            thread.join();
        }
        self.thread_local_states.write().clear();
    }

    fn spawn_threads(&self, thread_configs: &[(&str, usize)]) {
        for (thread_name, count) in thread_configs {
            for i in 0..*count {
                let name = if *count == 1 {
                    (*thread_name).to_owned()
                } else {
                    format!("{}_{}", thread_name, i)
                };

                let shutdown = Arc::new(AtomicBool::new(false));

                let thread_local_state = Arc::new(ThreadLocalState::default());
                self.thread_local_states.write().insert(name.clone(), thread_local_state.clone());

                let worker = WorkerThread::new(
                    shutdown.clone(),
                    self.global_queue.clone(),
                    thread_local_state,
                );

                match std::thread::Builder::new()
                    .name(name.clone())
                    .spawn(move || worker.run()) {
                    Ok(handle) => {
                        self.thread_registry.write().insert(name, ThreadInfo::new(shutdown, handle));
                    }
                    Err(err) => {
                        error!("Failed to spawn worker thread [{}]: {}", name, err);
                        self.thread_local_states.write().remove(&name);
                    }
                }
            }
        }
    }
}

impl Drop for JobSystem {
    fn drop(&mut self) {
        self.join_all_workers();
    }
}

fn collect_dependencies(dependencies: &[&dyn AsJobState]) -> SmallVec<[Arc<JobState>; 4]> {
    dependencies
        .iter()
        .map(|dependency| dependency.as_state())
        .collect()
}
