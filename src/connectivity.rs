use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::engine::SyncEngine;

/// Online/offline signal shared between the app shell and the engine.
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(online)),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current != online {
                *current = online;
                true
            } else {
                false
            }
        });
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Watch for offline→online transitions and replay the queue once per
/// transition. The engine's in-flight guard makes overlapping triggers
/// no-ops.
pub async fn run_replay_trigger(
    engine: Arc<SyncEngine>,
    mut online: watch::Receiver<bool>,
    shutdown: CancellationToken,
) {
    let mut was_online = *online.borrow();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = online.changed() => {
                if changed.is_err() {
                    break;
                }
                let now_online = *online.borrow_and_update();
                if now_online && !was_online {
                    tracing::info!("connectivity restored, replaying queued mutations");
                    match engine.replay().await {
                        Ok(summary) => tracing::info!(
                            replayed = summary.replayed,
                            remaining = summary.remaining,
                            "replay pass finished"
                        ),
                        Err(e) => tracing::warn!(error = %e, "replay pass failed"),
                    }
                }
                was_online = now_online;
            }
        }
    }
}
