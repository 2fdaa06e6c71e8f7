//! Fan-out/join over a persistent worker pool.
//!
//! Kernels split their destination rows into contiguous slices. All but the
//! last slice are spawned on the pool; the caller runs the last slice itself
//! and the call returns once every slice is done. There is no work stealing
//! between slices and no cancellation.

use log::{debug, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::OnceLock;

const THREADS_ENV: &str = "EFFECTGRAPH_THREADS";

struct WorkerPool {
    pool: ThreadPool,
    threads: usize,
}

static WORKER_POOL: OnceLock<Option<WorkerPool>> = OnceLock::new();

fn configured_threads() -> usize {
    let hardware = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    match std::env::var(THREADS_ENV) {
        Ok(raw) => match raw.trim().parse::<usize>() {
            Ok(threads) if threads > 0 => threads,
            _ => {
                warn!("{THREADS_ENV}={raw:?} is not a positive integer, using {hardware}");
                hardware
            }
        },
        Err(_) => hardware,
    }
}

fn worker_pool() -> Option<&'static WorkerPool> {
    WORKER_POOL
        .get_or_init(|| {
            let threads = configured_threads();
            match ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("effectgraph-worker-{i}"))
                .build()
            {
                Ok(pool) => {
                    debug!("worker pool started with {threads} thread(s)");
                    Some(WorkerPool { pool, threads })
                }
                Err(err) => {
                    warn!("failed to start worker pool, kernels run serially: {err}");
                    None
                }
            }
        })
        .as_ref()
}

/// Number of threads in the shared pool (1 if it could not be started).
pub fn pool_threads() -> usize {
    worker_pool().map(|p| p.threads).unwrap_or(1)
}

/// When and how wide kernels may split their work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelSettings {
    /// Master switch.
    pub enabled: bool,
    /// Destination area (pixels) per job for blur, lighting, convolution and turbulence.
    pub min_area: usize,
    /// Destination area (pixels) per job for morphology.
    pub morphology_min_area: usize,
    /// Upper bound on jobs (0 = pool size).
    pub max_jobs: usize,
}

impl Default for ParallelSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_area: 100 * 100,
            morphology_min_area: 300 * 300,
            max_jobs: 0,
        }
    }
}

impl ParallelSettings {
    /// Settings that never split.
    pub fn serial() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Jobs for a kernel writing `area` pixels, one job per `min_area` pixels.
    pub fn jobs_for(&self, area: usize, min_area: usize) -> ParallelJobs {
        if !self.enabled || min_area == 0 {
            return ParallelJobs::serial();
        }
        let optimal = area / min_area;
        let requested = if self.max_jobs > 0 {
            optimal.min(self.max_jobs)
        } else {
            optimal
        };
        if requested < 2 {
            return ParallelJobs::serial();
        }
        ParallelJobs::new(requested)
    }
}

/// A fan-out/join plan with a fixed number of jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelJobs {
    jobs: usize,
}

impl ParallelJobs {
    /// `clamp(requested, 2, pool threads)` jobs; a single-threaded pool gives one job.
    pub fn new(requested: usize) -> Self {
        let threads = pool_threads();
        let jobs = if threads < 2 {
            1
        } else {
            requested.clamp(2, threads)
        };
        Self { jobs }
    }

    /// One job, run on the caller.
    pub fn serial() -> Self {
        Self { jobs: 1 }
    }

    /// Exactly `jobs` slices, independent of the pool size.
    pub fn with_jobs(jobs: usize) -> Self {
        Self { jobs: jobs.max(1) }
    }

    /// Number of slices work is split into.
    pub fn number_of_jobs(&self) -> usize {
        self.jobs
    }

    /// Run `f` once per parameter block. The last block runs on the caller.
    pub fn execute<T, F>(&self, params: &mut [T], f: F)
    where
        T: Send,
        F: Fn(&mut T) + Sync,
    {
        let Some((last, rest)) = params.split_last_mut() else {
            return;
        };
        let pool = match worker_pool() {
            Some(pool) if !rest.is_empty() => pool,
            _ => {
                rest.iter_mut().for_each(&f);
                f(last);
                return;
            }
        };

        let f = &f;
        pool.pool.in_place_scope(|scope| {
            for param in rest {
                scope.spawn(move |_| f(param));
            }
            f(last);
        });
    }

    /// Split `data` (rows of `row_bytes` bytes) into contiguous row slices and run
    /// `f(first_row, slice)` for each. Leading slices take one extra row when the
    /// rows do not divide evenly.
    pub fn execute_rows<F>(&self, data: &mut [u8], row_bytes: usize, f: F)
    where
        F: Fn(usize, &mut [u8]) + Sync,
    {
        if row_bytes == 0 || data.is_empty() {
            return;
        }
        let rows = data.len() / row_bytes;
        let jobs = self.jobs.min(rows).max(1);
        let block = rows / jobs;
        let with_extra = rows % jobs;

        let mut slices = Vec::with_capacity(jobs);
        let mut remaining = data;
        let mut first_row = 0;
        for job in 0..jobs {
            let height = if job < with_extra { block + 1 } else { block };
            let (head, tail) = remaining.split_at_mut(height * row_bytes);
            slices.push((first_row, head));
            remaining = tail;
            first_row += height;
        }

        self.execute(&mut slices, |(first_row, slice)| f(*first_row, slice));
    }
}
