/*!
 * Wait Coordinator
 *
 * Public entry point for lock managers. Each call registers on the key in a
 * separately spawned task and races that registration against the configured
 * timeout and the caller's [`WaitContext`]. The key's registry entry is
 * removed on every exit path, including the call's future being dropped.
 *
 * A registration task that loses the race is never aborted: it runs to
 * completion in the background and its result is discarded.
 */

use super::config::LockWaitConfig;
use super::context::WaitContext;
use super::registry::{Registration, ReleaseHandle, WaitRegistry};
use crate::core::errors::{WaitError, WaitResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

/// Successful result of [`WaitCoordinator::wait`]
#[derive(Debug)]
#[must_use = "dropping a first registrant's outcome releases the key"]
pub struct WaitOutcome {
    registration: Registration,
    waited: Duration,
}

impl WaitOutcome {
    /// Whether the caller waited on another holder's release
    ///
    /// Exact under [`JoinAccounting::Snapshot`](super::JoinAccounting::Snapshot);
    /// best effort under `ObservedAfterWake`.
    #[inline]
    pub fn is_joiner(&self) -> bool {
        self.registration.is_joiner()
    }

    /// Whether the caller became the key's first registrant
    #[inline]
    pub fn is_first(&self) -> bool {
        self.registration.is_first()
    }

    /// Time spent inside the wait call
    pub fn waited(&self) -> Duration {
        self.waited
    }

    pub fn release_handle(&self) -> Option<&ReleaseHandle> {
        self.registration.release_handle()
    }

    /// Take the first registrant's handle; the holder fires it when done
    pub fn into_release_handle(self) -> Option<ReleaseHandle> {
        self.registration.into_release_handle()
    }
}

/// Races key registration against timeout and cancellation
#[derive(Debug, Clone)]
pub struct WaitCoordinator {
    registry: Arc<WaitRegistry>,
    timeout: Option<Duration>,
    enabled: bool,
}

impl WaitCoordinator {
    /// Create a coordinator with its own registry
    pub fn new(config: &LockWaitConfig) -> Self {
        Self::with_registry(Arc::new(WaitRegistry::new(config.accounting)), config)
    }

    /// Create a coordinator over a registry shared with other coordinators
    pub fn with_registry(registry: Arc<WaitRegistry>, config: &LockWaitConfig) -> Self {
        Self {
            registry,
            timeout: config.race_timeout(),
            enabled: config.wait_enabled(),
        }
    }

    /// Whether the owning manager should wait instead of failing fast
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Timeout raced against registration; `None` waits indefinitely
    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn registry(&self) -> &Arc<WaitRegistry> {
        &self.registry
    }

    /// Wait on `key` until its holder releases it
    ///
    /// Meant to be called by a lock manager that found `key` already held.
    ///
    /// - `Ok` with `is_first()`: nobody had registered the key; the caller
    ///   now owns its [`ReleaseHandle`]
    /// - `Ok` with `is_joiner()`: the caller observed the holder's release
    /// - `Err(WaitError::Cancelled)`: `ctx` was cancelled or hit its deadline
    /// - `Err(WaitError::Timeout)`: the configured timeout elapsed first
    ///
    /// When several are ready at once, cancellation wins over the timeout and
    /// the timeout wins over registration.
    #[allow(clippy::let_and_return)]
    #[tracing::instrument(level = "debug", skip(self, ctx))]
    pub async fn wait(&self, ctx: &WaitContext, key: &str) -> WaitResult<WaitOutcome> {
        let started = Instant::now();
        let _cleanup = CleanupGuard {
            registry: &self.registry,
            key,
        };

        let (result_tx, result_rx) = oneshot::channel::<Registration>();
        let registry = Arc::clone(&self.registry);
        let owned_key = key.to_owned();
        tokio::spawn(async move {
            let registration = registry.register(&owned_key).await;
            // Single slot, never blocks; fails only once the caller has gone
            if let Err(unclaimed) = result_tx.send(registration) {
                registry.abandon(&owned_key, unclaimed);
            }
        });

        // The receiver is consumed by the select and dropped before the
        // cleanup guard, so a late first registrant either lands in the slot
        // (and is removed by the guard) or cleans up after itself.
        let result = tokio::select! {
            biased;
            reason = ctx.done() => {
                self.registry.stats().record_cancellation();
                debug!(key, %reason, "Wait cancelled");
                Err(WaitError::Cancelled(reason))
            }
            _ = race_timeout(self.timeout) => {
                self.registry.stats().record_timeout();
                let timeout_ms = self.timeout.map_or(0, |t| t.as_millis() as u64);
                debug!(key, timeout_ms, "Wait timed out");
                Err(WaitError::Timeout { timeout_ms })
            }
            Ok(registration) = result_rx => {
                let waited = started.elapsed();
                debug!(
                    key,
                    joiner = registration.is_joiner(),
                    waited_us = waited.as_micros() as u64,
                    "Wait resolved"
                );
                Ok(WaitOutcome { registration, waited })
            }
        };

        result
    }
}

async fn race_timeout(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

/// Removes the key's entry when the wait call ends, however it ends
struct CleanupGuard<'a> {
    registry: &'a WaitRegistry,
    key: &'a str,
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        self.registry.cleanup(self.key);
    }
}
