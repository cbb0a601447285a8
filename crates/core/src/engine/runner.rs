//! Worker composition and lifecycle
//!
//! The runner is the single owner of the bus and the cancellation scope.
//! Handlers and adapters are spawned under it; shutdown cancels the scope,
//! waits for every worker to return and closes the bus.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::events::EventBus;

pub struct Runner {
    bus: Arc<EventBus>,
    cancel: CancellationToken,
    tasks: JoinSet<&'static str>,
}

impl Runner {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            cancel: CancellationToken::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Token workers should select on; child tokens share the runner's
    /// cancellation scope.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    /// Spawn a worker future under the runner's scope
    pub fn spawn<F>(&mut self, name: &'static str, worker: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(worker = name, "spawning worker");
        self.tasks.spawn(async move {
            worker.await;
            name
        });
    }

    pub fn worker_count(&self) -> usize {
        self.tasks.len()
    }

    /// Cancel the scope, wait for all workers (bounded), then close the
    /// bus so remaining subscribers observe the end of the stream.
    pub async fn shutdown(mut self, grace: Duration) {
        info!("runner shutting down");
        self.cancel.cancel();

        let deadline = tokio::time::Instant::now() + grace;
        loop {
            match tokio::time::timeout_at(deadline, self.tasks.join_next()).await {
                Ok(Some(Ok(name))) => debug!(worker = name, "worker stopped"),
                Ok(Some(Err(e))) => error!(error = %e, "worker panicked during shutdown"),
                Ok(None) => break,
                Err(_) => {
                    warn!(remaining = self.tasks.len(), "shutdown grace expired, aborting workers");
                    self.tasks.abort_all();
                    break;
                }
            }
        }

        self.bus.close();
        info!("runner stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_cancels_and_joins_workers() {
        let bus = Arc::new(EventBus::new());
        let mut runner = Runner::new(bus.clone());
        let cancel = runner.cancel_token();

        runner.spawn("sleeper", {
            let cancel = cancel.clone();
            async move {
                cancel.cancelled().await;
            }
        });
        assert_eq!(runner.worker_count(), 1);

        runner.shutdown(Duration::from_secs(1)).await;
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn stuck_workers_are_aborted_after_grace() {
        let bus = Arc::new(EventBus::new());
        let mut runner = Runner::new(bus);

        runner.spawn("stuck", async {
            // Ignores cancellation on purpose
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        tokio::time::timeout(
            Duration::from_secs(2),
            runner.shutdown(Duration::from_millis(50)),
        )
        .await
        .expect("shutdown must not hang on stuck workers");
    }
}
