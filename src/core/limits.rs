/*!
 * Lock-Wait Limits and Constants
 *
 * Defaults and environment variable names used by the wait configuration.
 */

use std::time::Duration;

// =============================================================================
// WAIT DEFAULTS
// =============================================================================

/// Default wait budget (zero)
/// A zero budget leaves waiting disabled and runs the wait race without a timer
pub const DEFAULT_LOCK_WAIT_TIMEOUT: Duration = Duration::ZERO;

/// Suggested wait budget for managers that enable waiting without tuning it
pub const STANDARD_LOCK_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// ENVIRONMENT
// =============================================================================

/// Wait budget in milliseconds
pub const LOCK_WAIT_TIMEOUT_ENV: &str = "LOCK_WAIT_TIMEOUT_MS";

/// Join accounting mode: `snapshot` or `observed_after_wake`
pub const LOCK_WAIT_ACCOUNTING_ENV: &str = "LOCK_WAIT_ACCOUNTING";

/// Enables JSON log output when set to `1` or `true`
pub const LOCK_WAIT_TRACE_JSON_ENV: &str = "LOCK_WAIT_TRACE_JSON";
