/*!
 * Lock-Wait Demo
 *
 * Walks a coordinator through its four outcomes:
 * - Fast path (caller becomes first registrant)
 * - Joined wait released by the holder
 * - Timeout while the holder keeps the key
 * - Cancellation through the caller's context
 */

use std::error::Error;
use std::time::Duration;
use tracing::{info, warn};

use lock_wait::{init_tracing, LockWaitConfig, WaitContext, WaitCoordinator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let mut config = LockWaitConfig::from_env();
    if !config.wait_enabled() {
        config = LockWaitConfig::standard().accounting(config.accounting);
    }
    info!(timeout_ms = config.timeout.as_millis() as u64, accounting = ?config.accounting, "Lock-wait demo starting");

    let coordinator = WaitCoordinator::new(&config);
    let background = WaitContext::background();

    // Fast path: nobody holds "orders"
    let holder = coordinator.wait(&background, "orders").await?;
    info!(first = holder.is_first(), joiner = holder.is_joiner(), "Fast path");
    drop(holder);

    // Joined wait: a holder registered directly, a second caller waits on it
    let registration = coordinator.registry().register("orders").await;
    let Some(release) = registration.into_release_handle() else {
        return Err("expected to become first registrant".into());
    };

    let waiter = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .wait(&WaitContext::background(), "orders")
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let woken = release.release();
    info!(woken = woken.count(), "Holder released orders");

    let joined = waiter.await??;
    info!(joiner = joined.is_joiner(), waited_us = joined.waited().as_micros() as u64, "Joined wait finished");

    // Timeout: the holder never releases within the budget
    let quick = WaitCoordinator::with_registry(
        coordinator.registry().clone(),
        &LockWaitConfig::with_timeout(Duration::from_millis(20)),
    );
    let stuck = coordinator.registry().register("invoices").await;
    match quick.wait(&background, "invoices").await {
        Ok(outcome) => warn!(joiner = outcome.is_joiner(), "Expected a timeout"),
        Err(e) => info!(error = %e, "Timed out as expected"),
    }
    drop(stuck);

    // Cancellation: the caller gives up through its own context
    let stuck = coordinator.registry().register("payments").await;
    let ctx = WaitContext::background().with_timeout(Duration::from_millis(10));
    match coordinator.wait(&ctx, "payments").await {
        Ok(outcome) => warn!(joiner = outcome.is_joiner(), "Expected a cancellation"),
        Err(e) => info!(error = %e, "Cancelled as expected"),
    }
    drop(stuck);

    let stats = coordinator.registry().stats().snapshot();
    info!(stats = %stats.to_json()?, "Lock-wait demo finished");

    Ok(())
}
