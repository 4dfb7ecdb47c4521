/*!
 * Lock-Wait Configuration
 *
 * Wait budget and join accounting for a coordinator, plus the mutator a lock
 * manager applies at construction time to enable waiting.
 */

use super::coordinator::WaitCoordinator;
use crate::core::limits::{
    DEFAULT_LOCK_WAIT_TIMEOUT, LOCK_WAIT_ACCOUNTING_ENV, LOCK_WAIT_TIMEOUT_ENV,
    STANDARD_LOCK_WAIT_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// How a registration decides whether its caller was a joiner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinAccounting {
    /// Decided at registration time under the registry lock: the creator is
    /// never a joiner, everyone else always is
    #[default]
    Snapshot,
    /// `join_count > 0` read after the caller stops blocking. A first
    /// registrant can observe a joiner that arrived right after it and
    /// report `true`.
    ObservedAfterWake,
}

impl JoinAccounting {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "snapshot" => Some(Self::Snapshot),
            "observed_after_wake" | "observed" => Some(Self::ObservedAfterWake),
            _ => None,
        }
    }
}

/// Wait configuration
///
/// A zero timeout disables waiting and removes the timer from the wait race,
/// so a coordinator built from it waits until release or cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockWaitConfig {
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
    #[serde(default)]
    pub accounting: JoinAccounting,
}

impl Default for LockWaitConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl LockWaitConfig {
    /// Waiting off
    pub const fn disabled() -> Self {
        Self {
            timeout: DEFAULT_LOCK_WAIT_TIMEOUT,
            accounting: JoinAccounting::Snapshot,
        }
    }

    /// Waiting on with the given budget
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            accounting: JoinAccounting::Snapshot,
        }
    }

    /// Waiting on with [`STANDARD_LOCK_WAIT_TIMEOUT`]
    pub const fn standard() -> Self {
        Self::with_timeout(STANDARD_LOCK_WAIT_TIMEOUT)
    }

    pub const fn accounting(mut self, accounting: JoinAccounting) -> Self {
        self.accounting = accounting;
        self
    }

    #[inline]
    pub fn wait_enabled(&self) -> bool {
        !self.timeout.is_zero()
    }

    /// Timeout raced by the coordinator; `None` when disabled
    #[inline]
    pub fn race_timeout(&self) -> Option<Duration> {
        self.wait_enabled().then_some(self.timeout)
    }

    /// Load from the environment, falling back to defaults
    ///
    /// Environment variables:
    /// - LOCK_WAIT_TIMEOUT_MS: wait budget in milliseconds (default: 0)
    /// - LOCK_WAIT_ACCOUNTING: `snapshot` or `observed_after_wake`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var(LOCK_WAIT_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.timeout = Duration::from_millis(ms),
                Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid {}", LOCK_WAIT_TIMEOUT_ENV),
            }
        }

        if let Ok(raw) = std::env::var(LOCK_WAIT_ACCOUNTING_ENV) {
            match JoinAccounting::parse(&raw) {
                Some(accounting) => config.accounting = accounting,
                None => warn!(value = %raw, "Ignoring invalid {}", LOCK_WAIT_ACCOUNTING_ENV),
            }
        }

        config
    }
}

/// Lock managers that can host a [`WaitCoordinator`]
pub trait LockWaitHost {
    /// Install the coordinator; `wait_enabled` tells the manager whether to
    /// wait on held keys instead of failing fast
    fn install_lock_wait(&mut self, wait_enabled: bool, coordinator: WaitCoordinator);
}

/// Let a manager's callers wait when a key is held by someone else
///
/// `timeout` is the wait budget. A zero budget still installs a coordinator,
/// but leaves waiting disabled and its race without a timer.
pub fn with_lock_wait<H: LockWaitHost>(timeout: Duration) -> impl FnOnce(&mut H) {
    with_lock_wait_config(LockWaitConfig::with_timeout(timeout))
}

/// [`with_lock_wait`] with full control over the configuration
pub fn with_lock_wait_config<H: LockWaitHost>(config: LockWaitConfig) -> impl FnOnce(&mut H) {
    move |host: &mut H| {
        host.install_lock_wait(config.wait_enabled(), WaitCoordinator::new(&config));
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Manager {
        wait_lock: bool,
        coordinator: Option<WaitCoordinator>,
    }

    impl LockWaitHost for Manager {
        fn install_lock_wait(&mut self, wait_enabled: bool, coordinator: WaitCoordinator) {
            self.wait_lock = wait_enabled;
            self.coordinator = Some(coordinator);
        }
    }

    #[test]
    fn test_with_lock_wait_enables_positive_timeout() {
        let mut manager = Manager::default();
        with_lock_wait(Duration::from_millis(50))(&mut manager);

        assert!(manager.wait_lock);
        let coordinator = manager.coordinator.unwrap();
        assert_eq!(coordinator.timeout(), Some(Duration::from_millis(50)));
    }

    #[test]
    fn test_with_lock_wait_zero_installs_disabled() {
        let mut manager = Manager::default();
        with_lock_wait(Duration::ZERO)(&mut manager);

        assert!(!manager.wait_lock);
        let coordinator = manager.coordinator.unwrap();
        assert!(!coordinator.is_enabled());
        assert_eq!(coordinator.timeout(), None);
    }

    #[test]
    fn test_config_accounting_reaches_registry() {
        let mut manager = Manager::default();
        let config = LockWaitConfig::standard().accounting(JoinAccounting::ObservedAfterWake);
        with_lock_wait_config(config)(&mut manager);

        let coordinator = manager.coordinator.unwrap();
        assert_eq!(
            coordinator.registry().accounting(),
            JoinAccounting::ObservedAfterWake
        );
    }

    #[test]
    fn test_config_serde() {
        let config = LockWaitConfig::with_timeout(Duration::from_millis(250));
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"timeout_ms":250,"accounting":"snapshot"}"#);

        let parsed: LockWaitConfig = serde_json::from_str(r#"{"timeout_ms":10}"#).unwrap();
        assert_eq!(parsed, LockWaitConfig::with_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_accounting_parse() {
        assert_eq!(JoinAccounting::parse("Snapshot"), Some(JoinAccounting::Snapshot));
        assert_eq!(
            JoinAccounting::parse(" observed_after_wake "),
            Some(JoinAccounting::ObservedAfterWake)
        );
        assert_eq!(JoinAccounting::parse("fifo"), None);
    }

    #[test]
    fn test_defaults() {
        let config = LockWaitConfig::default();
        assert!(!config.wait_enabled());
        assert_eq!(config.race_timeout(), None);
        assert_eq!(config.accounting, JoinAccounting::Snapshot);
    }
}
