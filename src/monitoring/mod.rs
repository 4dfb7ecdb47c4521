/*!
 * Monitoring
 * Structured tracing setup for hosts embedding the wait primitives
 */

mod tracer;

pub use tracer::init_tracing;
