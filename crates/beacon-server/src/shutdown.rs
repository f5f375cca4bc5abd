//! Server-wide shutdown state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Coordinates shutdown across the server's tasks.
///
/// Teardown has two phases. [`stop_accepting`](Self::stop_accepting) makes
/// the push endpoint refuse new streams while open ones keep running.
/// [`cancel`](Self::cancel) then fires the server token, which ends the
/// HTTP accept loop and every request scope derived from it.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    accepting: AtomicBool,
}

impl ShutdownCoordinator {
    /// Fresh coordinator that accepts streams.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            accepting: AtomicBool::new(true),
        }
    }

    /// The server token. Request scopes are child tokens of it.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Refuse new push streams from now on.
    pub fn stop_accepting(&self) {
        if self.accepting.swap(false, Ordering::AcqRel) {
            info!("no longer accepting push streams");
        }
    }

    /// Whether new push streams are accepted.
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire) && !self.token.is_cancelled()
    }

    /// Stop accepting and fire the server token.
    pub fn cancel(&self) {
        self.stop_accepting();
        self.token.cancel();
    }

    /// Whether the server token has fired.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fire the server token, then give `tasks` up to `bound` to finish.
    ///
    /// Returns `false` when the bound was hit. Unfinished tasks are aborted.
    pub async fn cancel_and_join(&self, tasks: Vec<JoinHandle<()>>, bound: Duration) -> bool {
        self.cancel();

        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();
        let joined = tokio::time::timeout(bound, futures::future::join_all(tasks)).await;
        match joined {
            Ok(results) => {
                for err in results.into_iter().filter_map(Result::err) {
                    warn!(error = %err, "server task ended abnormally");
                }
                true
            }
            Err(_) => {
                warn!(
                    bound_ms = u64::try_from(bound.as_millis()).unwrap_or(u64::MAX),
                    pending = aborts.iter().filter(|a| !a.is_finished()).count(),
                    "server tasks still running, aborting"
                );
                aborts.iter().for_each(tokio::task::AbortHandle::abort);
                false
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
