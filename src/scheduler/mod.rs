//! The `scheduler` module hosts every long-running task of the unit on a single
//! cooperative run-loop.
//!
//! Tasks never return in normal operation. A task that ends does so with a
//! [`RestartReason`], and the run-loop turns the first one into a device reset.

pub mod reset;
pub mod run_loop;

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::utils::error::RestartReason;

pub use reset::{RESTART_EXIT_CODE, restart_device};
pub use run_loop::RunLoop;

/// Outcome of a long-running task. `Ok` is uninhabited: tasks only ever end with a
/// restart reason.
pub type TaskResult = Result<Infallible, RestartReason>;

/// Give other tasks a chance to run.
///
/// A zero granularity is a bare yield; anything else sleeps for that long.
pub async fn pace(granularity: Duration) {
    if granularity.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(granularity).await;
    }
}

/// Something that can hand memory back on request.
pub trait Reclaim: Send + Sync {
    fn name(&self) -> &str;

    /// Release what can be released and return the number of bytes freed, as far as
    /// it is known.
    fn reclaim(&self) -> usize;
}

/// Run every reclaimer, then sleep `interval`, forever.
pub async fn reclamation_loop(reclaimers: Vec<Arc<dyn Reclaim>>, interval: Duration) -> TaskResult {
    loop {
        let mut total = 0;
        for reclaimer in &reclaimers {
            let freed = reclaimer.reclaim();
            debug!(reclaimer = reclaimer.name(), freed, "reclaimed");
            total += freed;
        }
        info!(freed = total, "memory reclamation finished");
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests;
