/*!
 * Monitoring
 * Structured logging setup and syscall spans
 */

pub mod tracer;

pub use tracer::{generate_trace_id, init_tracing, try_init_tracing, SyscallSpan};
