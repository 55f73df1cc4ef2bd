//! # Example: In-memory queue with an elastic pool
//!
//! Feeds a [`MemoryQueue`] in bursts and lets the pool grow and shrink:
//! - a burst of jobs makes the primary hand over and admit helpers;
//! - every 7th job is rolled back once, every 13th fails once and is then dead-lettered;
//! - halfway through, the pool is resized and paused for a moment;
//! - finally the queue idles and the pool is stopped.
//!
//! Run with:
//! ```text
//! RUST_LOG=debug cargo run --example memory_queue --features logging
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use queuevisor::{
    CoordinatorBuilder, CoordinatorConfig, DispatchFn, Disposition, LiveWorkers, LogWriter,
    MemoryQueue, Message, QueueWorkerFactory, Subscribe, WorkerError, WorkerId,
};

/// Jobs fail on multiples of 13 (once, then they are dead-lettered) and roll
/// back on multiples of 7 (once, then they succeed).
async fn handle(
    msg: Message,
    worker: WorkerId,
    ctx: CancellationToken,
    queue: Arc<MemoryQueue>,
    retried: Arc<Mutex<HashSet<u64>>>,
) -> Result<Disposition, WorkerError> {
    let n: u64 = msg.body_str().and_then(|b| b.parse().ok()).unwrap_or(0);

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(40)) => {}
        _ = ctx.cancelled() => return Err(WorkerError::Canceled),
    }

    if n % 13 == 0 {
        if queue.failure_count(msg.sequence) > 0 {
            println!("[{worker}] job {n}: dead-lettered");
            return Ok(Disposition::Commit);
        }
        return Err(WorkerError::dispatch_failed(format!("job {n} is malformed")));
    }
    if n % 7 == 0 && retried.lock().insert(msg.sequence) {
        println!("[{worker}] job {n}: rolled back, will retry");
        return Ok(Disposition::Rollback);
    }
    println!("[{worker}] job {n}: done");
    Ok(Disposition::Commit)
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut cfg = CoordinatorConfig::with_capacity(4);
    cfg.primary_wait = Duration::from_millis(500);
    cfg.stop_timeout = Duration::from_secs(5);

    let queue = Arc::new(MemoryQueue::new());
    let retried = Arc::new(Mutex::new(HashSet::new()));
    let dispatcher = {
        let queue = Arc::clone(&queue);
        DispatchFn::new(move |msg: Message, worker: WorkerId, ctx: CancellationToken| {
            handle(msg, worker, ctx, Arc::clone(&queue), Arc::clone(&retried))
        })
    };
    let factory = QueueWorkerFactory::new(Arc::clone(&queue), Arc::new(dispatcher));

    let live = Arc::new(LiveWorkers::new());
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new()), live.clone()];
    let coordinator = CoordinatorBuilder::new(cfg, factory)
        .with_subscribers(subs)
        .build()?;

    let shutdown = CancellationToken::new();
    coordinator.start(&shutdown);

    for n in 1..=20 {
        queue.push(Message::new("job", n.to_string()));
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
    println!("live workers: {:?}", live.snapshot());

    coordinator.set_capacity(8)?;
    coordinator.set_paused(true);
    for n in 21..=40 {
        queue.push(Message::new("job", n.to_string()).with_service("billing"));
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
    coordinator.set_paused(false);

    while queue.committed() < 40 {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    println!(
        "committed={} queued={} running={} failed_workers={}",
        queue.committed(),
        queue.len(),
        coordinator.running_count(),
        live.failures()
    );

    let report = coordinator.stop().await;
    println!(
        "stopped: drained={} stragglers={:?} in {:?}",
        report.drained, report.stragglers, report.elapsed
    );
    Ok(())
}
