//! Background maintenance task.
//!
//! One task per [`Timeline`](crate::Timeline) owns both timer-driven cache
//! sweeps and persistence writes. Cancelling its token stops both at once.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::persist::SharedStore;
use crate::timeline::Core;

/// Handle to a running maintenance task.
#[derive(Debug)]
pub(crate) struct Worker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Starts the task on the current tokio runtime.
    ///
    /// When `load_first` is set, persisted history is read before the loop
    /// starts and the timeline becomes ready once it is applied. Cancelling
    /// during that read makes the timeline ready without the stored history.
    pub(crate) fn spawn(core: Arc<Core>, store: SharedStore, load_first: bool) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn(run(core, store, token.clone(), load_first));
        Self { token, handle }
    }

    /// Signals the task to stop without waiting for it.
    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    /// Signals the task to stop and waits for it to finish.
    pub(crate) async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            debug!(error = %e, "timeline worker ended abnormally");
        }
    }
}

async fn run(core: Arc<Core>, store: SharedStore, token: CancellationToken, load_first: bool) {
    if load_first {
        tokio::select! {
            () = token.cancelled() => {
                core.abandon_load();
                return;
            }
            () = core.load_from(&store) => {}
        }
    }

    let mut sweep = tokio::time::interval(core.config().sweep_interval());
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    sweep.tick().await;

    info!("timeline worker started");
    loop {
        tokio::select! {
            () = token.cancelled() => {
                info!("timeline worker shutting down");
                break;
            }
            _ = sweep.tick() => {
                core.sweep_caches();
            }
            () = core.persist_requested() => {
                // Failures are logged inside; the mutation that asked for
                // this write has already returned.
                let _ = core.persist_to(&store).await;
            }
        }
    }
}
