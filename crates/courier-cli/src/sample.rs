//! Sample event and handler used by both subcommands.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use courier_core::{Event, Handler};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptEvent {
    pub transaction_id: String,
}

impl Event for AcceptEvent {
    const TYPE_NAME: &'static str = "AcceptEvent";
}

/// Counts handled events and cancels `done` once `target` is reached.
pub struct Progress {
    handled: AtomicUsize,
    target: usize,
    done: CancellationToken,
}

impl Progress {
    pub fn new(target: usize, done: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            handled: AtomicUsize::new(0),
            target,
            done,
        })
    }

    pub fn handled(&self) -> usize {
        self.handled.load(Ordering::SeqCst)
    }

    fn record(&self) {
        let handled = self.handled.fetch_add(1, Ordering::SeqCst) + 1;
        if self.target > 0 && handled >= self.target {
            self.done.cancel();
        }
    }
}

pub struct AcceptEventHandler {
    pub work: Duration,
    pub progress: Arc<Progress>,
}

#[async_trait]
impl Handler<AcceptEvent> for AcceptEventHandler {
    async fn handle(&self, event: &AcceptEvent) -> anyhow::Result<()> {
        info!(transaction_id = %event.transaction_id, "doing the stuff");
        tokio::time::sleep(self.work).await;
        info!(transaction_id = %event.transaction_id, "finished the stuff");
        self.progress.record();
        Ok(())
    }
}
