use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rayon::ThreadPool;
use tracing::debug;

use crate::reader::errors::ReadError;

/// Barrier object accumulating asynchronous work and the first error among
/// its tasks.
///
/// `append` is thread-safe and may be called from inside a running task
/// (inference reconversion relies on this). The first task error latches:
/// later appends are dropped, in-flight tasks run to completion but their
/// results are discarded. `finish` blocks until every appended task has
/// completed and returns the latched error.
#[derive(Clone)]
pub struct TaskGroup {
    inner: Arc<Inner>,
}

struct Inner {
    pool: Option<Arc<ThreadPool>>,
    state: Mutex<GroupState>,
    all_done: Condvar,
}

#[derive(Default)]
struct GroupState {
    pending: usize,
    error: Option<ReadError>,
}

impl TaskGroup {
    /// Inline execution: each task runs during `append`, on the caller's
    /// thread.
    pub fn serial() -> Self {
        Self {
            inner: Arc::new(Inner {
                pool: None,
                state: Mutex::new(GroupState::default()),
                all_done: Condvar::new(),
            }),
        }
    }

    /// Tasks are spawned onto the given worker pool.
    pub fn threaded(pool: Arc<ThreadPool>) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool: Some(pool),
                state: Mutex::new(GroupState::default()),
                all_done: Condvar::new(),
            }),
        }
    }

    /// Whether no task has failed so far.
    pub fn ok(&self) -> bool {
        self.inner.state.lock().error.is_none()
    }

    pub fn append(&self, task: impl FnOnce() -> Result<(), ReadError> + Send + 'static) {
        match &self.inner.pool {
            None => {
                if !self.ok() {
                    return;
                }
                if let Err(error) = task() {
                    self.latch(error);
                }
            }
            Some(pool) => {
                {
                    let mut state = self.inner.state.lock();
                    if state.error.is_some() {
                        return;
                    }
                    state.pending += 1;
                }
                let inner = Arc::clone(&self.inner);
                pool.spawn(move || {
                    let result = task();
                    let mut state = inner.state.lock();
                    if let Err(error) = result {
                        if state.error.is_none() {
                            debug!(target: "vlakdata::read", %error, "Task group latched failure");
                            state.error = Some(error);
                        }
                    }
                    state.pending -= 1;
                    if state.pending == 0 {
                        inner.all_done.notify_all();
                    }
                });
            }
        }
    }

    /// Waits for all appended tasks, including tasks appended by tasks, and
    /// returns the first error among them.
    pub fn finish(&self) -> Result<(), ReadError> {
        let mut state = self.inner.state.lock();
        while state.pending > 0 {
            self.inner.all_done.wait(&mut state);
        }
        match state.error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn latch(&self, error: ReadError) {
        let mut state = self.inner.state.lock();
        if state.error.is_none() {
            debug!(target: "vlakdata::read", %error, "Task group latched failure");
            state.error = Some(error);
        }
    }
}
