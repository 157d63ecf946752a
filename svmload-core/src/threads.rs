//! Worker-count resolution and the pool that runs a build.

use std::num::NonZeroUsize;

use crate::error::Result;

/// Clamps a requested worker count to the available parallelism.
///
/// A request of `0` means "use everything"; any other request is honoured as
/// a cap even when it leaves cores idle.
///
/// # Examples
/// ```
/// use std::num::NonZeroUsize;
/// use svmload_core::resolve_thread_count;
///
/// let four = NonZeroUsize::new(4).expect("non-zero");
/// assert_eq!(resolve_thread_count(0, four).get(), 4);
/// assert_eq!(resolve_thread_count(100, four).get(), 4);
/// assert_eq!(resolve_thread_count(2, four).get(), 2);
/// ```
#[must_use]
pub fn resolve_thread_count(requested: usize, max_threads: NonZeroUsize) -> NonZeroUsize {
    NonZeroUsize::new(requested).map_or(max_threads, |requested| requested.min(max_threads))
}

/// Maximum number of workers the build may use on this machine.
///
/// With the `parallel` feature this is the platform's available parallelism;
/// without it the build is single-threaded.
#[must_use]
pub fn max_threads() -> NonZeroUsize {
    #[cfg(feature = "parallel")]
    {
        std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
    }
    #[cfg(not(feature = "parallel"))]
    {
        NonZeroUsize::MIN
    }
}

/// Dedicated workers for one build.
///
/// Parallel regions run inside [`WorkerPool::run`] so that they use exactly
/// the resolved worker count rather than the global rayon pool.
pub(crate) struct WorkerPool {
    #[cfg(feature = "parallel")]
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    pub(crate) fn new(workers: NonZeroUsize) -> Result<Self> {
        #[cfg(feature = "parallel")]
        {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers.get())
                .thread_name(|index| format!("svmload-worker-{index}"))
                .build()
                .map_err(|err| crate::error::BuildError::ThreadPool {
                    threads: workers.get(),
                    reason: err.to_string().into(),
                })?;
            Ok(Self { pool })
        }
        #[cfg(not(feature = "parallel"))]
        {
            let _ = workers;
            Ok(Self {})
        }
    }

    pub(crate) fn run<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        #[cfg(feature = "parallel")]
        {
            self.pool.install(op)
        }
        #[cfg(not(feature = "parallel"))]
        {
            op()
        }
    }
}
