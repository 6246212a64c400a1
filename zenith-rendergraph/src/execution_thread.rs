use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use log::{error, info, trace, warn};
use parking_lot::Mutex;
use zenith_task::{AsJobState, JobHandle, JobSystem};
use crate::config::{ExecutionMode, RenderGraphConfig};
use crate::graph::CompiledRenderGraph;

const EXECUTION_THREAD_NAME: &str = "render-graph";

/// Runs compiled render graphs, strictly in submission order.
///
/// In [`ExecutionMode::Multithreaded`] graphs run on one dedicated worker, each chained after the
/// previously submitted one. In [`ExecutionMode::Singlethreaded`] they run right away on the caller.
pub struct RenderGraphExecutionThread {
    mode: ExecutionMode,
    job_system: Option<JobSystem>,
    last_execution: Mutex<JobHandle>,
    executed_graphs: Arc<AtomicU64>,
}

impl RenderGraphExecutionThread {
    pub fn initialize(mode: ExecutionMode) -> Self {
        let job_system = match mode {
            ExecutionMode::Multithreaded => {
                let job_system = JobSystem::new(&[(EXECUTION_THREAD_NAME, 1)]);
                if job_system.has_thread(EXECUTION_THREAD_NAME) {
                    Some(job_system)
                } else {
                    warn!("Failed to spawn render graph execution thread, fall back to single threaded execution");
                    None
                }
            }
            ExecutionMode::Singlethreaded => None,
        };

        let mode = if job_system.is_some() { ExecutionMode::Multithreaded } else { ExecutionMode::Singlethreaded };
        info!("Render graph execution thread initialized: {mode:?}");

        Self {
            mode,
            job_system,
            last_execution: Mutex::new(JobHandle::null()),
            executed_graphs: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Honors [`RenderGraphConfig::execution_mode`], which [`RenderGraphConfig::from_env`] fills.
    pub fn from_config(config: &RenderGraphConfig) -> Self {
        Self::initialize(config.execution_mode)
    }

    #[inline]
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Number of graphs which finished executing.
    pub fn executed_graph_count(&self) -> u64 {
        self.executed_graphs.load(Ordering::Acquire)
    }

    pub fn execute_render_graph(&self, graph: CompiledRenderGraph) {
        let executed_graphs = self.executed_graphs.clone();

        let Some(job_system) = &self.job_system else {
            execute(graph, &executed_graphs);
            return;
        };

        let job = job_system.create_job(move || {
            // nothing can recover from a half recorded frame
            if std::panic::catch_unwind(AssertUnwindSafe(|| execute(graph, &executed_graphs))).is_err() {
                error!("Render graph execution panicked, abort");
                std::process::abort();
            }
        });

        let mut last_execution = self.last_execution.lock();
        let previous: &dyn AsJobState = &*last_execution;
        let submitted = job_system.run_job_on_after(EXECUTION_THREAD_NAME, job, [previous]);
        match submitted {
            Ok(result) => *last_execution = result.forget_result(),
            Err(err) => error!("Failed to submit render graph: {err:#}"),
        }
    }

    /// Block until every submitted graph finished executing.
    pub fn wait_for_finished_execution(&self) {
        let last_execution = self.last_execution.lock().clone();
        last_execution.wait();
    }

    /// Drain the submitted graphs and join the worker. Later graphs run on the caller.
    pub fn shutdown(&mut self) {
        let Some(job_system) = self.job_system.take() else {
            return;
        };

        self.wait_for_finished_execution();
        job_system.join_all_workers();
        self.mode = ExecutionMode::Singlethreaded;
        info!("Render graph execution thread shut down after {} graph(s)", self.executed_graph_count());
    }
}

impl Drop for RenderGraphExecutionThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn execute(graph: CompiledRenderGraph, executed_graphs: &AtomicU64) {
    match graph.execute_immediate() {
        Ok(report) => trace!("{report:?}"),
        Err(err) => error!("Render graph execution failed: {err}"),
    }
    executed_graphs.fetch_add(1, Ordering::AcqRel);
}
