//! Run-loop
//!
//! A `JoinSet` of named tasks on the current runtime. The loop ends on the first
//! task that finishes, whatever the reason, and aborts the rest.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::{error, info};

use super::TaskResult;
use crate::utils::error::RestartReason;

#[derive(Default)]
pub struct RunLoop {
    tasks: JoinSet<(String, Result<TaskResult, ()>)>,
}

impl RunLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks currently hosted.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Host `task` under `name`. A panic inside the task is caught and reported
    /// by name.
    pub fn spawn<F>(&mut self, name: impl Into<String>, task: F)
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        let name = name.into();
        info!(task = %name, "starting task");
        self.tasks.spawn(async move {
            let outcome = AssertUnwindSafe(task).catch_unwind().await.map_err(|_| ());
            (name, outcome)
        });
    }

    /// Drive all tasks until one of them ends and return why.
    pub async fn run(mut self) -> RestartReason {
        let reason = match self.tasks.join_next().await {
            None => RestartReason::SchedulerStarved,
            Some(Ok((task, Ok(Err(reason))))) => {
                error!(%task, %reason, "task ended");
                reason
            }
            Some(Ok((_, Ok(Ok(never))))) => match never {},
            Some(Ok((task, Err(())))) => {
                error!(%task, "task panicked");
                RestartReason::TaskPanicked { task }
            }
            Some(Err(e)) => {
                // Panics are caught inside the task, so this is a cancellation.
                error!("task was cancelled: {e}");
                RestartReason::TaskCancelled
            }
        };
        self.tasks.shutdown().await;
        reason
    }
}

impl std::fmt::Debug for RunLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLoop")
            .field("tasks", &self.tasks.len())
            .finish()
    }
}
