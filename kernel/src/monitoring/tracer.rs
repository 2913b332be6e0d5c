/*!
 * Structured Tracing
 * Subscriber setup and per-syscall spans using the tracing crate
 *
 * Features:
 * - Per-syscall trace IDs for correlating entry, errors and completion
 * - JSON-formatted logs for structured parsing
 * - `log` records from the VFS bridged into the same subscriber
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, span, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

static NEXT_TRACE_ID: AtomicU64 = AtomicU64::new(1);

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - KERNEL_TRACE_JSON: Enable JSON output (default: false)
pub fn init_tracing() {
    if !try_init_tracing() {
        debug!("tracing subscriber already installed");
    }
}

/// Install the subscriber unless one is already set; returns whether this
/// call installed it. Safe to call from every test.
pub fn try_init_tracing() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("KERNEL_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_line_number(true)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "structured tracing initialized");
    }
    installed
}

/// Next process-wide trace ID
pub fn generate_trace_id() -> u64 {
    NEXT_TRACE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Span covering one trap into the kernel
pub struct SyscallSpan {
    span: tracing::Span,
    start: Instant,
    syscall_name: &'static str,
    trace_id: u64,
}

impl SyscallSpan {
    pub fn new(syscall_name: &'static str, pid: i32) -> Self {
        let trace_id = generate_trace_id();
        let span = span!(
            Level::TRACE,
            "syscall",
            trace_id,
            syscall = syscall_name,
            pid,
            result = tracing::field::Empty,
            error = tracing::field::Empty,
            return_value = tracing::field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
            syscall_name,
            trace_id,
        }
    }

    pub fn trace_id(&self) -> u64 {
        self.trace_id
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    pub fn record_return(&self, value: i64) {
        self.span.record("result", "success");
        self.span.record("return_value", value);
    }

    pub fn record_error(&self, error: &str) {
        self.span.record("result", "error");
        self.span.record("error", error);
    }
}

impl Drop for SyscallSpan {
    fn drop(&mut self) {
        let _entered = self.span.enter();
        debug!(
            trace_id = self.trace_id,
            syscall = self.syscall_name,
            duration_us = self.start.elapsed().as_micros() as u64,
            "syscall completed"
        );
    }
}
