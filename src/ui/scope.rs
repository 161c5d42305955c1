use anyhow::Result;
use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Background work owned by one controller.
///
/// Every store call goes through [`TaskScope::launch`] so the terminal loop
/// never waits on SQLite. Cancelling the scope abandons whatever is still in
/// flight; a write that was cut off is not rolled back.
#[derive(Debug, Clone, Default)]
pub struct TaskScope {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl TaskScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `fut` as an independent task. Its steps run in order, but two
    /// launched tasks have no ordering relative to each other. Failures are
    /// logged and otherwise dropped.
    pub fn launch<F>(&self, label: &'static str, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let token = self.token.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    log::debug!("Task '{}' cancelled", label);
                }
                result = fut => {
                    if let Err(e) = result {
                        log::error!("Task '{}' failed: {:#}", label, e);
                    }
                }
            }
        })
    }

    /// Derives a value holder from `source`: the returned receiver holds
    /// `f(source)` and is recomputed on every change until the scope is
    /// cancelled. Receivers are only woken when the mapped value changes.
    pub fn watch_map<T, U, F>(&self, mut source: watch::Receiver<T>, f: F) -> watch::Receiver<U>
    where
        T: Send + Sync + 'static,
        U: PartialEq + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + 'static,
    {
        let initial = f(&source.borrow_and_update());
        let (tx, rx) = watch::channel(initial);
        let token = self.token.clone();

        // Not tracked: it only ends on cancellation, and wait_idle must not
        // wait for it.
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    changed = source.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let value = f(&source.borrow_and_update());
                        tx.send_if_modified(|current| {
                            if *current == value {
                                false
                            } else {
                                *current = value;
                                true
                            }
                        });
                    }
                }
            }
        });
        rx
    }

    /// Waits until every task launched so far, and any launched meanwhile,
    /// has finished.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}
