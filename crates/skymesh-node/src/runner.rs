//! Async driver for the node tick loop.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use skymesh_identity::Identity;

use crate::node::SwarmNode;
use crate::transport::Transport;

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Drives a [`SwarmNode`] at its configured update frequency on a tokio
/// task until shut down. The node is handed back on shutdown so callers
/// can inspect its final state.
pub struct NodeRunner<T, I>
where
    T: Transport + Send + 'static,
    I: Identity + Send + 'static,
{
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<SwarmNode<T, I>>,
}

impl<T, I> NodeRunner<T, I>
where
    T: Transport + Send + 'static,
    I: Identity + Send + 'static,
{
    /// Spawn the tick loop.
    pub fn spawn(mut node: SwarmNode<T, I>) -> Self {
        let (shutdown, mut stop) = watch::channel(false);
        let interval = node.config().tick_interval();
        let id = node.id();
        info!(node = %id, interval_ms = interval.as_millis() as u64, "node runner started");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = node.tick(unix_ms());
                        if report.committed {
                            debug!(node = %id, "consensus round committed a block");
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!(node = %id, ticks = node.stats().ticks, "node runner stopped");
            node
        });

        Self { shutdown, handle }
    }

    /// Stop the loop and hand the node back. A node whose task panicked
    /// cannot be recovered and yields `None`.
    pub async fn shutdown(self) -> Option<SwarmNode<T, I>> {
        // The receiver is gone if the task already exited; join either way.
        let _ = self.shutdown.send(true);
        self.handle.await.ok()
    }
}
