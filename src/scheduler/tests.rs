use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{Reclaim, RunLoop, TaskResult, pace, reclamation_loop};
use crate::utils::error::RestartReason;

struct CountingReclaimer {
    calls: AtomicUsize,
    freed: usize,
}

impl Reclaim for CountingReclaimer {
    fn name(&self) -> &str {
        "counting"
    }

    fn reclaim(&self) -> usize {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.freed
    }
}

async fn forever() -> TaskResult {
    loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
    }
}

fn run_panics() -> bool {
    true
}

#[tokio::test]
async fn test_empty_run_loop_is_starved() {
    let run_loop = RunLoop::new();
    assert!(run_loop.is_empty());
    assert_eq!(run_loop.run().await, RestartReason::SchedulerStarved);
}

#[tokio::test(start_paused = true)]
async fn test_first_restart_reason_ends_the_loop() {
    let mut run_loop = RunLoop::new();
    run_loop.spawn("idle", forever());
    run_loop.spawn("failing", async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Err(RestartReason::BrokerFailureDuringLinkLoss {
            error: "connection refused".to_string(),
        })
    });
    assert_eq!(run_loop.len(), 2);

    let reason = run_loop.run().await;
    assert_eq!(
        reason,
        RestartReason::BrokerFailureDuringLinkLoss {
            error: "connection refused".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_panicking_task_is_reported_by_name() {
    let mut run_loop = RunLoop::new();
    run_loop.spawn("idle", forever());
    run_loop.spawn("dispatcher", async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if run_panics() {
            panic!("boom");
        }
        forever().await
    });

    assert_eq!(
        run_loop.run().await,
        RestartReason::TaskPanicked {
            task: "dispatcher".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_pace_sleeps_for_granularity() {
    let start = tokio::time::Instant::now();
    pace(Duration::from_millis(10)).await;
    assert_eq!(start.elapsed(), Duration::from_millis(10));

    let start = tokio::time::Instant::now();
    pace(Duration::ZERO).await;
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_reclamation_loop_runs_every_interval() {
    let reclaimer = Arc::new(CountingReclaimer {
        calls: AtomicUsize::new(0),
        freed: 128,
    });
    let task = tokio::spawn(reclamation_loop(
        vec![reclaimer.clone() as Arc<dyn Reclaim>],
        Duration::from_secs(1700),
    ));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(reclaimer.calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(1700)).await;
    assert_eq!(reclaimer.calls.load(Ordering::SeqCst), 2);
    task.abort();
}
