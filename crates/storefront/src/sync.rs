//! Background confirm-or-reconcile tasks.
//!
//! Every mutating store operation runs in two phases: a synchronous state
//! transition under the store's lock, then a spawned future that confirms
//! the change with the server (or reconciles on failure). [`SyncTasks`]
//! owns those futures for one store.
//!
//! Each session transition starts a new epoch. Tasks from the previous
//! epoch are aborted, and results that arrive after the epoch moved are
//! discarded by the caller via [`SyncTasks::is_current`].

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Store state is always left consistent between statements, so a poisoned
/// guard carries no torn writes.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-flight background tasks of one store.
#[derive(Debug)]
pub(crate) struct SyncTasks {
    tasks: Mutex<JoinSet<()>>,
    epoch: AtomicU64,
    /// Number of spawned tasks that have not completed or been aborted.
    in_flight: Arc<watch::Sender<usize>>,
}

impl Default for SyncTasks {
    fn default() -> Self {
        let (in_flight, _) = watch::channel(0);
        Self {
            tasks: Mutex::new(JoinSet::new()),
            epoch: AtomicU64::new(0),
            in_flight: Arc::new(in_flight),
        }
    }
}

/// Held by a running task; dropped when it completes or is aborted.
struct InFlightGuard(Arc<watch::Sender<usize>>);

impl InFlightGuard {
    fn new(in_flight: &Arc<watch::Sender<usize>>) -> Self {
        in_flight.send_modify(|n| *n += 1);
        Self(Arc::clone(in_flight))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl SyncTasks {
    /// Spawn `task` on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = InFlightGuard::new(&self.in_flight);
        let mut tasks = lock(&self.tasks);
        reap(&mut tasks);
        tasks.spawn(async move {
            let _guard = guard;
            task.await;
        });
    }

    /// Current session epoch.
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Whether `epoch` is still the current session epoch.
    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        self.epoch() == epoch
    }

    /// Start a new epoch and abort every task of the previous one.
    ///
    /// Callers that publish results guarded by [`is_current`](Self::is_current)
    /// must advance while holding the same lock they publish under.
    pub(crate) fn advance(&self) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        lock(&self.tasks).abort_all();
        epoch
    }

    /// Wait until no background task is in flight.
    ///
    /// The tasks stay owned by the store while waiting, so a concurrent
    /// [`advance`](Self::advance) still aborts them and dropping this future
    /// cancels nothing.
    pub(crate) async fn settle(&self) {
        let mut in_flight = self.in_flight.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = in_flight.wait_for(|n| *n == 0).await;
        reap(&mut lock(&self.tasks));
    }
}

/// Drop finished tasks so the set does not grow without bound.
fn reap(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        if let Err(e) = result {
            report(&e);
        }
    }
}

fn report(e: &JoinError) {
    if e.is_panic() {
        tracing::error!(error = %e, "background sync task panicked");
    }
}
