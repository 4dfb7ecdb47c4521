/*!
 * Lock-Wait Integration Tests
 *
 * Fast path, joined waits, timeout and cancellation through the coordinator
 */

use lock_wait::{
    with_lock_wait, CancelReason, JoinAccounting, LockWaitConfig, LockWaitHost, WaitContext,
    WaitCoordinator, WaitError, WaitRegistry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn coordinator(timeout: Duration) -> WaitCoordinator {
    WaitCoordinator::new(&LockWaitConfig::with_timeout(timeout))
}

async fn wait_for_joins(registry: &WaitRegistry, key: &str, joins: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while registry.join_count(key) != Some(joins) {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("joiners should register");
}

#[tokio::test]
async fn test_fast_path_on_empty_registry() {
    let coordinator = coordinator(Duration::from_secs(1));
    let start = Instant::now();

    let outcome = coordinator
        .wait(&WaitContext::background(), "k")
        .await
        .expect("fast path should succeed");

    assert!(!outcome.is_joiner());
    assert!(outcome.is_first());
    assert!(start.elapsed() < Duration::from_millis(500));
    assert!(coordinator.registry().is_empty());
}

#[tokio::test]
async fn test_joiner_observes_holder_release() {
    let coordinator = coordinator(Duration::ZERO);
    let holder = coordinator.registry().register("k").await;
    assert!(holder.is_first());

    let waiter = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.wait(&WaitContext::background(), "k").await })
    };

    wait_for_joins(coordinator.registry(), "k", 1).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!waiter.is_finished(), "joiner must block until release");

    let release = holder.into_release_handle().unwrap();
    assert_eq!(release.key(), "k");
    assert_eq!(release.release().count(), 1);

    let outcome = waiter.await.unwrap().expect("joiner should be released");
    assert!(outcome.is_joiner());
    assert!(!outcome.is_first());
    assert!(outcome.waited() >= Duration::from_millis(30));
    assert!(coordinator.registry().is_empty());
}

#[tokio::test]
async fn test_timeout_without_release() {
    let coordinator = coordinator(Duration::from_millis(10));
    let _holder = coordinator.registry().register("k").await;
    let start = Instant::now();

    let err = coordinator
        .wait(&WaitContext::background(), "k")
        .await
        .unwrap_err();

    let elapsed = start.elapsed();
    assert_eq!(err, WaitError::Timeout { timeout_ms: 10 });
    assert!(elapsed >= Duration::from_millis(10));
    assert!(elapsed < Duration::from_millis(500));
    assert!(!coordinator.registry().contains("k"));
}

#[tokio::test]
async fn test_pre_cancelled_context_returns_promptly() {
    let coordinator = coordinator(Duration::from_secs(5));
    let ctx = WaitContext::background();
    ctx.cancel();
    let start = Instant::now();

    let err = coordinator.wait(&ctx, "k").await.unwrap_err();

    assert_eq!(err, WaitError::Cancelled(CancelReason::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(1));

    // The abandoned registration finishes in the background and removes itself
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(coordinator.registry().is_empty());
    assert_eq!(coordinator.registry().stats().snapshot().abandoned, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_release_fans_out_to_all_joiners() {
    const JOINERS: usize = 16;

    let coordinator = coordinator(Duration::from_secs(5));
    let holder = coordinator.registry().register("k").await;

    let waiters: Vec<_> = (0..JOINERS)
        .map(|_| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.wait(&WaitContext::background(), "k").await })
        })
        .collect();

    wait_for_joins(coordinator.registry(), "k", JOINERS).await;
    assert_eq!(coordinator.registry().len(), 1);

    let woken = holder.into_release_handle().unwrap().release();
    assert!(woken.is_woken());

    for waiter in waiters {
        let outcome = waiter.await.unwrap().expect("every joiner should wake");
        assert!(outcome.is_joiner());
    }
    assert!(coordinator.registry().is_empty());

    let stats = coordinator.registry().stats().snapshot();
    assert_eq!(stats.joins, JOINERS as u64);
    assert_eq!(stats.releases, 1);
}

#[tokio::test]
async fn test_timeout_precedes_late_release() {
    let coordinator = coordinator(Duration::from_millis(20));
    let holder = coordinator.registry().register("k").await;

    let releaser = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(holder);
    });

    let err = coordinator
        .wait(&WaitContext::background(), "k")
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    releaser.await.unwrap();
    assert!(!coordinator.registry().contains("k"));
}

#[tokio::test]
async fn test_cancellation_precedes_timeout() {
    let coordinator = coordinator(Duration::from_secs(1));
    let _holder = coordinator.registry().register("k").await;
    let ctx = WaitContext::background();

    let canceller = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            ctx.cancel();
        })
    };

    let start = Instant::now();
    let err = coordinator.wait(&ctx, "k").await.unwrap_err();
    canceller.await.unwrap();

    assert_eq!(err.cancel_reason(), Some(CancelReason::Cancelled));
    assert!(start.elapsed() < Duration::from_millis(500));
    assert!(!coordinator.registry().contains("k"));
}

#[tokio::test]
async fn test_context_deadline_reports_reason() {
    let coordinator = coordinator(Duration::from_secs(1));
    let _holder = coordinator.registry().register("k").await;
    let ctx = WaitContext::background().with_timeout(Duration::from_millis(10));

    let err = coordinator.wait(&ctx, "k").await.unwrap_err();

    assert_eq!(err, WaitError::Cancelled(CancelReason::DeadlineExceeded));
    assert_eq!(coordinator.registry().stats().snapshot().cancellations, 1);
}

#[tokio::test]
async fn test_keys_are_independent() {
    let coordinator = coordinator(Duration::from_millis(50));
    let _holder = coordinator.registry().register("held").await;

    let outcome = coordinator
        .wait(&WaitContext::background(), "free")
        .await
        .unwrap();
    assert!(outcome.is_first());
    assert!(coordinator.registry().contains("held"));
    assert!(!coordinator.registry().contains("free"));
}

#[tokio::test]
async fn test_observed_after_wake_accounting() {
    let config = LockWaitConfig::with_timeout(Duration::from_secs(1))
        .accounting(JoinAccounting::ObservedAfterWake);
    let coordinator = WaitCoordinator::new(&config);

    let first = coordinator
        .wait(&WaitContext::background(), "k")
        .await
        .unwrap();
    assert!(first.is_first());
    assert!(!first.is_joiner());
    drop(first);

    let holder = coordinator.registry().register("k").await;
    let waiter = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.wait(&WaitContext::background(), "k").await })
    };
    wait_for_joins(coordinator.registry(), "k", 1).await;
    drop(holder);

    let outcome = waiter.await.unwrap().unwrap();
    assert!(outcome.is_joiner());
}

#[derive(Default)]
struct LockManager {
    wait_lock: bool,
    waiter: Option<WaitCoordinator>,
}

impl LockWaitHost for LockManager {
    fn install_lock_wait(&mut self, wait_enabled: bool, coordinator: WaitCoordinator) {
        self.wait_lock = wait_enabled;
        self.waiter = Some(coordinator);
    }
}

impl LockManager {
    fn new(options: Vec<Box<dyn FnOnce(&mut LockManager)>>) -> Self {
        let mut manager = Self::default();
        for option in options {
            option(&mut manager);
        }
        manager
    }
}

#[tokio::test]
async fn test_manager_option_wires_coordinator() {
    let option: Box<dyn FnOnce(&mut LockManager)> =
        Box::new(with_lock_wait::<LockManager>(Duration::from_millis(15)));
    let manager = LockManager::new(vec![option]);
    assert!(manager.wait_lock);

    let waiter = manager.waiter.as_ref().unwrap();
    let _holder = waiter.registry().register("k").await;
    let err = waiter
        .wait(&WaitContext::background(), "k")
        .await
        .unwrap_err();
    assert_eq!(err, WaitError::Timeout { timeout_ms: 15 });
}

#[tokio::test]
async fn test_shared_registry_across_coordinators() {
    let registry = Arc::new(WaitRegistry::default());
    let slow = WaitCoordinator::with_registry(registry.clone(), &LockWaitConfig::standard());
    let quick = WaitCoordinator::with_registry(
        registry.clone(),
        &LockWaitConfig::with_timeout(Duration::from_millis(10)),
    );

    let holder = slow
        .wait(&WaitContext::background(), "k")
        .await
        .unwrap()
        .into_release_handle()
        .unwrap();
    assert!(registry.is_empty());

    let _relock = registry.register("k").await;
    assert!(quick
        .wait(&WaitContext::background(), "k")
        .await
        .unwrap_err()
        .is_timeout());

    assert_eq!(holder.release().count(), 0);
    assert!(registry.is_empty());
}
