/*!
 * Monitoring
 * Structured logging and request tracing
 */

mod tracer;

pub use tracer::{generate_trace_id, init_tracing, RequestSpan};
