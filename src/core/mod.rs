/*!
 * Core Module
 * Error types, limits and the keyed wait primitives
 */

pub mod errors;
pub mod limits;
pub mod sync;

// Re-export for convenience
pub use errors::*;
