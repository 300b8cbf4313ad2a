//! Worker pool for independent counting tasks.
//!
//! Counting work splits into pieces with no shared state: the fault
//! locations of a leaf, the sub-components of a parallel composition, the
//! syndromes of a lookup table. [`WorkerPool`] runs such pieces either on
//! the calling thread or on a rayon pool. Results always come back in input
//! order, so a threaded run reduces to exactly the serial answer.

use crate::error::{CountError, FtResult};
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, mpsc};
use tracing::debug;

/// Where counting tasks run.
#[derive(Clone, Default)]
pub enum WorkerPool {
    /// Everything runs on the calling thread.
    #[default]
    Serial,
    /// Tasks run on a dedicated rayon pool.
    Threaded(Arc<rayon::ThreadPool>),
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerPool::Serial => write!(f, "WorkerPool::Serial"),
            WorkerPool::Threaded(pool) => {
                write!(f, "WorkerPool::Threaded({})", pool.current_num_threads())
            }
        }
    }
}

impl WorkerPool {
    /// Run on the calling thread.
    pub fn serial() -> Self {
        WorkerPool::Serial
    }

    /// A pool of `workers` threads. Zero or one worker gives a serial pool.
    pub fn threaded(workers: usize) -> FtResult<Self> {
        if workers <= 1 {
            return Ok(WorkerPool::Serial);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("ftcount-worker-{i}"))
            .build()
            .map_err(|e| CountError::Dispatch(e.to_string()))?;
        debug!(workers, "Started worker pool");
        Ok(WorkerPool::Threaded(Arc::new(pool)))
    }

    /// Number of tasks that can run at once.
    pub fn workers(&self) -> usize {
        match self {
            WorkerPool::Serial => 1,
            WorkerPool::Threaded(pool) => pool.current_num_threads(),
        }
    }

    /// Whether tasks run on the calling thread.
    pub fn is_serial(&self) -> bool {
        matches!(self, WorkerPool::Serial)
    }

    /// Apply `f` to every item, keeping input order.
    pub fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync + Send,
    {
        match self {
            WorkerPool::Serial => items.into_iter().map(f).collect(),
            WorkerPool::Threaded(pool) => pool.install(|| items.into_par_iter().map(f).collect()),
        }
    }

    /// Apply a fallible `f` to every item. The first error in input order
    /// is returned.
    pub fn try_map<T, R, F>(&self, items: Vec<T>, f: F) -> FtResult<Vec<R>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> FtResult<R> + Sync + Send,
    {
        self.map(items, f).into_iter().collect()
    }

    /// Map chunks of `items` and fold the partial results with `reduce`.
    ///
    /// Chunks are mapped in parallel and reduced in input order. Returns
    /// `None` for an empty input.
    pub fn map_reduce<T, R, M, F>(
        &self,
        items: &[T],
        chunk_size: usize,
        map: M,
        reduce: F,
    ) -> FtResult<Option<R>>
    where
        T: Sync,
        R: Send,
        M: Fn(&[T]) -> FtResult<R> + Sync + Send,
        F: Fn(R, R) -> FtResult<R>,
    {
        let chunk_size = chunk_size.max(1);
        let parts: Vec<FtResult<R>> = match self {
            WorkerPool::Serial => items.chunks(chunk_size).map(&map).collect(),
            WorkerPool::Threaded(pool) => {
                pool.install(|| items.par_chunks(chunk_size).map(&map).collect())
            }
        };
        let mut acc = None;
        for part in parts {
            let part = part?;
            acc = Some(match acc {
                None => part,
                Some(prev) => reduce(prev, part)?,
            });
        }
        Ok(acc)
    }

    /// Chunk size that gives each worker a few chunks of `len` items.
    pub fn chunk_size(&self, len: usize) -> usize {
        len.div_ceil(self.workers() * 4).max(1)
    }

    /// Start `f` and return a handle to its result.
    ///
    /// A panic inside `f` surfaces as [`CountError::Dispatch`] from
    /// [`Pending::get`].
    pub fn submit<R, F>(&self, f: F) -> Pending<R>
    where
        R: Send + 'static,
        F: FnOnce() -> FtResult<R> + Send + 'static,
    {
        match self {
            WorkerPool::Serial => Pending {
                inner: PendingInner::Ready(run_guarded(f)),
            },
            WorkerPool::Threaded(pool) => {
                let (tx, rx) = mpsc::channel();
                pool.spawn(move || {
                    // the receiver may be gone if the caller gave up
                    let _ = tx.send(run_guarded(f));
                });
                Pending {
                    inner: PendingInner::Waiting(rx),
                }
            }
        }
    }
}

fn run_guarded<R, F>(f: F) -> FtResult<R>
where
    F: FnOnce() -> FtResult<R>,
{
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(CountError::Dispatch(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("task panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("task panicked: {s}")
    } else {
        "task panicked".to_string()
    }
}

/// Handle to a submitted task.
#[derive(Debug)]
pub struct Pending<R> {
    inner: PendingInner<R>,
}

#[derive(Debug)]
enum PendingInner<R> {
    Ready(FtResult<R>),
    Waiting(mpsc::Receiver<FtResult<R>>),
}

impl<R> Pending<R> {
    /// Block until the task finishes.
    pub fn get(self) -> FtResult<R> {
        match self.inner {
            PendingInner::Ready(result) => result,
            PendingInner::Waiting(rx) => rx
                .recv()
                .map_err(|_| CountError::Dispatch("worker dropped the task".to_string()))?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pools() -> Vec<WorkerPool> {
        vec![WorkerPool::serial(), WorkerPool::threaded(3).unwrap()]
    }

    #[test]
    fn test_map_keeps_order() {
        for pool in pools() {
            let out = pool.map((0..100).collect(), |x: u64| x * x);
            assert_eq!(out, (0..100).map(|x| x * x).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_try_map_reports_first_error() {
        for pool in pools() {
            let out = pool.try_map((0..10).collect(), |x: usize| {
                if x >= 4 {
                    Err(CountError::Dispatch(format!("bad {x}")))
                } else {
                    Ok(x)
                }
            });
            match out {
                Err(CountError::Dispatch(msg)) => assert_eq!(msg, "bad 4"),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_map_reduce() {
        let items: Vec<u64> = (1..=1000).collect();
        for pool in pools() {
            let sum = pool
                .map_reduce(&items, pool.chunk_size(items.len()), |c| Ok(c.iter().sum::<u64>()), |a, b| Ok(a + b))
                .unwrap();
            assert_eq!(sum, Some(500_500));
            let none = pool
                .map_reduce(&[] as &[u64], 4, |c| Ok(c.len()), |a, b| Ok(a + b))
                .unwrap();
            assert_eq!(none, None);
        }
    }

    #[test]
    fn test_submit_and_panics() {
        for pool in pools() {
            assert_eq!(pool.submit(|| Ok(41 + 1)).get().unwrap(), 42);
            let failed = pool.submit(|| -> FtResult<u8> { panic!("boom") }).get();
            assert!(matches!(failed, Err(CountError::Dispatch(msg)) if msg.contains("boom")));
        }
    }

    #[test]
    fn test_single_worker_is_serial() {
        assert!(WorkerPool::threaded(1).unwrap().is_serial());
        assert!(WorkerPool::threaded(0).unwrap().is_serial());
        assert_eq!(WorkerPool::threaded(2).unwrap().workers(), 2);
    }
}
