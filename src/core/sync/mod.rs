/*!
 * Keyed Wait Coordination
 *
 * Lets concurrent callers join a single pending operation per string key and
 * block until the operation's owner releases it, bounded by a timeout and the
 * caller's cancellation context.
 *
 * # Architecture
 *
 * - [`WaitRegistry`]: key to in-flight [`WaitRecord`] map behind one mutex
 * - [`ReleaseSignal`]: one-shot broadcast every joiner of a key waits on
 * - [`WaitCoordinator`]: races registration against timeout and cancellation,
 *   and always removes the key's entry before returning
 *
 * The first registrant for a key receives a [`ReleaseHandle`]; firing it (or
 * dropping it) wakes every joiner. The lock manager owning this module decides
 * when that happens.
 */

mod config;
mod context;
mod coordinator;
mod registry;
mod signal;
mod stats;

pub use config::{with_lock_wait, with_lock_wait_config, JoinAccounting, LockWaitConfig, LockWaitHost};
pub use context::WaitContext;
pub use coordinator::{WaitCoordinator, WaitOutcome};
pub use registry::{Registration, ReleaseHandle, WaitRecord, WaitRegistry};
pub use signal::{ReleaseSignal, WakeResult};
pub use stats::{WaitStats, WaitStatsSnapshot};
