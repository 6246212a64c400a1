use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::any::Any;
use std::sync::Arc;
use parking_lot::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    pub const INVALID: JobId = JobId(u64::MAX);

    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        JobId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn valid(&self) -> bool {
        self != &Self::INVALID
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Job#{}", self.0)
    }
}

pub(crate) type UntypedThreadSafeObject = Box<dyn Any + Send + 'static>;
pub(crate) type UntypedExecuteFunc = Box<dyn FnOnce(UntypedThreadSafeObject) -> UntypedThreadSafeObject + Send>;

pub trait Job: Send + 'static {
    type Output: Send + 'static;

    fn execute(self: Box<Self>) -> Self::Output;
}

impl<F, R> Job for F
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    type Output = R;

    fn execute(self: Box<Self>) -> Self::Output {
        (*self)()
    }
}

pub(crate) struct BoxedJob {
    id: JobId,
    job: UntypedThreadSafeObject,
    execute_fn: UntypedExecuteFunc,
}

impl BoxedJob {
    pub(crate) fn new<J: Job>(job: J) -> Self {
        let execute_fn = Box::new(|job_any: UntypedThreadSafeObject| -> UntypedThreadSafeObject {
            match job_any.downcast::<J>() {
                Ok(job) => Box::new(job.execute()),
                Err(_) => unreachable!("Job type is erased and restored by the same closure"),
            }
        });

        Self {
            id: JobId::new(),
            job: Box::new(job),
            execute_fn,
        }
    }

    pub(crate) fn execute(self) -> UntypedThreadSafeObject {
        (self.execute_fn)(self.job)
    }

    pub(crate) fn id(&self) -> JobId {
        self.id
    }
}

/// A job which had been created but not scheduled yet.
/// Hand it to [`crate::JobSystem::run_job`] (or one of its variants) to execute it.
pub struct PendingJob<T: Send + 'static> {
    pub(crate) job: BoxedJob,
    pub(crate) state: Arc<JobState>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: Send + 'static> PendingJob<T> {
    pub(crate) fn new<J: Job<Output = T>>(job: J) -> Self {
        Self {
            job: BoxedJob::new(job),
            state: Arc::new(JobState::new()),
            _phantom: std::marker::PhantomData,
        }
    }

    pub fn id(&self) -> JobId {
        self.job.id()
    }

    pub(crate) fn into_result(self) -> (BoxedJob, JobResult<T>) {
        let result = JobResult::from_state(self.state, self.job.id());
        (self.job, result)
    }
}

pub trait AsJobState {
    fn as_state(&self) -> Arc<JobState>;
}

pub struct JobState {
    result: Mutex<Option<UntypedThreadSafeObject>>,
    completed: AtomicBool,
    panicked: AtomicBool,
    condvar: Condvar,
}

impl JobState {
    pub(crate) fn new() -> Self {
        Self {
            result: Mutex::new(None),
            completed: AtomicBool::new(false),
            panicked: AtomicBool::new(false),
            condvar: Condvar::new(),
        }
    }

    fn new_completed() -> Self {
        Self {
            result: Mutex::new(None),
            completed: AtomicBool::new(true),
            panicked: AtomicBool::new(false),
            condvar: Condvar::new(),
        }
    }

    pub(crate) fn set_result(&self, result: UntypedThreadSafeObject) {
        let mut guard = self.result.lock();
        *guard = Some(result);
        self.completed.store(true, Ordering::Release);
        self.condvar.notify_all();
    }

    pub(crate) fn set_panicked(&self) {
        let _guard = self.result.lock();
        self.panicked.store(true, Ordering::Release);
        self.completed.store(true, Ordering::Release);
        self.condvar.notify_all();
    }

    pub(crate) fn completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    pub(crate) fn panicked(&self) -> bool {
        self.panicked.load(Ordering::Acquire)
    }

    pub(crate) fn wait(&self) {
        if self.completed() {
            return;
        }

        let mut result = self.result.lock();
        while !self.completed() {
            self.condvar.wait(&mut result);
        }
    }
}

pub struct JobResult<T: Send + 'static> {
    id: JobId,
    state: Arc<JobState>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: Send + 'static> JobResult<T> {
    /// A result which is already completed, useful as the head of a dependency chain.
    pub fn placeholder() -> Self {
        Self {
            id: JobId::INVALID,
            state: Arc::new(JobState::new_completed()),
            _phantom: std::marker::PhantomData,
        }
    }

    pub(crate) fn from_state(state: Arc<JobState>, id: JobId) -> Self {
        Self {
            state,
            id,
            _phantom: std::marker::PhantomData,
        }
    }

    pub fn completed(&self) -> bool {
        self.state.completed()
    }

    pub fn panicked(&self) -> bool {
        self.state.panicked()
    }

    pub fn wait(&self) {
        self.state.wait();
    }

    pub fn try_get(&self) -> Option<T> {
        if !self.state.completed() {
            return None;
        }

        self.state.result.lock()
            .take()?
            .downcast()
            .ok()
            .map(|boxed| *boxed)
    }

    /// Block until the job finished and take its output.
    ///
    /// # Panics
    /// If the job panicked or its output had been taken by [`JobResult::try_get`].
    pub fn get(self) -> T {
        self.wait();

        if self.state.panicked() {
            panic!("{} panicked during execution", self.id);
        }

        match self.try_get() {
            Some(result) => result,
            None => panic!("Result of {} had been taken", self.id),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn forget_result(self) -> JobHandle {
        JobHandle {
            id: self.id,
            state: self.state,
        }
    }
}

impl<T: Send + 'static> AsJobState for JobResult<T> {
    fn as_state(&self) -> Arc<JobState> {
        self.state.clone()
    }
}

/// Type-erased handle of a scheduled job, only able to wait on it.
#[derive(Clone)]
pub struct JobHandle {
    id: JobId,
    state: Arc<JobState>,
}

impl JobHandle {
    pub fn null() -> Self {
        Self {
            id: JobId::INVALID,
            state: Arc::new(JobState::new_completed()),
        }
    }

    pub fn completed(&self) -> bool {
        self.state.completed()
    }

    pub fn wait(&self) {
        self.state.wait()
    }

    pub fn id(&self) -> JobId {
        self.id
    }
}

impl AsJobState for JobHandle {
    fn as_state(&self) -> Arc<JobState> {
        self.state.clone()
    }
}
