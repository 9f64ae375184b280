//! Periodic token validation
//!
//! While a session is authenticated a background task re-checks the access
//! token on a fixed interval and refreshes it before it runs out. The task
//! holds only a weak reference to the manager and is cancelled whenever the
//! session leaves the authenticated state. A task that stops on its own
//! deregisters itself.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{Inner, SessionManager};
use crate::SessionError;

/// What a validation pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Not authenticated; nothing to check
    Idle,
    /// Token still comfortably valid
    Valid { expires_in: i64 },
    /// Token was refreshed
    Refreshed,
    /// Refresh failed and the session was torn down
    SignedOut(SessionError),
}

/// Running validation task
pub(crate) struct MonitorHandle {
    epoch: u64,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Session epoch the task was started for
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the task to stop. It is not awaited: the caller may be the
    /// task itself (a failed refresh signs out from inside a tick).
    pub(crate) fn stop(self) {
        self.shutdown.cancel();
        drop(self.task);
    }
}

pub(crate) struct SessionMonitor {
    session: Weak<Inner>,
    epoch: u64,
    initial_delay: Duration,
    check_interval: Duration,
    shutdown: CancellationToken,
}

impl SessionMonitor {
    pub(crate) fn spawn(manager: &SessionManager, epoch: u64) -> MonitorHandle {
        let shutdown = CancellationToken::new();
        let config = manager.config();
        let monitor = Self {
            session: Arc::downgrade(&manager.inner),
            epoch,
            initial_delay: config.initial_delay,
            check_interval: config.validation_interval.max(Duration::from_millis(1)),
            shutdown: shutdown.clone(),
        };
        let task = tokio::spawn(monitor.run());
        MonitorHandle {
            epoch,
            shutdown,
            task,
        }
    }

    async fn run(self) {
        tracing::debug!(
            interval_secs = self.check_interval.as_secs(),
            "Session validation started"
        );

        // Let start-up hydration settle before the first check
        tokio::select! {
            _ = tokio::time::sleep(self.initial_delay) => {}
            _ = self.shutdown.cancelled() => return,
        }

        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shutdown.cancelled() => break,
            }

            let Some(inner) = self.session.upgrade() else {
                break;
            };
            match SessionManager::from_inner(inner).validate().await {
                ValidationOutcome::Valid { expires_in } => {
                    tracing::trace!(expires_in, "Access token valid");
                }
                ValidationOutcome::Refreshed => {}
                ValidationOutcome::Idle | ValidationOutcome::SignedOut(_) => break,
            }
        }

        if let Some(inner) = self.session.upgrade() {
            SessionManager::from_inner(inner).release_monitor(self.epoch);
        }
        tracing::debug!("Session validation stopped");
    }
}
