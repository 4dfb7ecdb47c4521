/*!
 * Lock-Wait Library
 * Keyed wait coordination for lock managers that block on held keys
 */

pub mod core;
pub mod monitoring;

// Re-exports
pub use crate::core::errors::{CancelReason, WaitError, WaitResult};
pub use crate::core::sync::{
    with_lock_wait, with_lock_wait_config, JoinAccounting, LockWaitConfig, LockWaitHost,
    Registration, ReleaseHandle, ReleaseSignal, WaitContext, WaitCoordinator, WaitOutcome,
    WaitRegistry, WaitStats, WaitStatsSnapshot, WakeResult,
};
pub use monitoring::init_tracing;
