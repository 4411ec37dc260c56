/*!
 * Request Tracing
 * Structured tracing for VFS requests using the tracing crate
 *
 * Features:
 * - Trace ID per request for correlation
 * - JSON-formatted logs for structured parsing
 * - Slow request warnings
 */

use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level, Span};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::core::limits::DEFAULT_SLOW_REQUEST_MS;

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - VFS_TRACE_JSON: Enable JSON output (default: false)
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("VFS_TRACE_JSON")
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
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "Structured tracing initialized");
    }
}

/// Generate a unique trace ID for request correlation
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one routed request
pub struct RequestSpan {
    span: Span,
    start: Instant,
    method: &'static str,
    trace_id: String,
    slow_after: Duration,
}

impl RequestSpan {
    pub fn new(method: &'static str, username: &str) -> Self {
        let trace_id = generate_trace_id();

        let span = span!(
            Level::DEBUG,
            "vfs_request",
            trace_id = %trace_id,
            method = method,
            user = username,
            duration_us = tracing::field::Empty,
            result = tracing::field::Empty,
            error = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            method,
            trace_id,
            slow_after: Duration::from_millis(DEFAULT_SLOW_REQUEST_MS),
        }
    }

    /// Override the slow-request warning threshold
    pub fn with_slow_threshold(mut self, slow_after: Duration) -> Self {
        self.slow_after = slow_after;
        self
    }

    #[inline]
    pub fn is_slow(&self, elapsed: Duration) -> bool {
        elapsed > self.slow_after
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Underlying span, for instrumenting the request future
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Record success or the error code
    pub fn record_outcome<T>(&self, result: &crate::vfs::VfsResult<T>) {
        match result {
            Ok(_) => {
                self.span.record("result", "success");
            }
            Err(e) => {
                self.span.record("result", "error");
                self.span.record("error", e.code());
            }
        }
    }
}

impl Drop for RequestSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.span.record("duration_us", micros);
        let _entered = self.span.enter();

        if self.is_slow(duration) {
            warn!(
                trace_id = %self.trace_id,
                method = self.method,
                duration_ms = micros / 1000,
                slow = true,
                "slow request"
            );
        } else {
            debug!(
                trace_id = %self.trace_id,
                method = self.method,
                duration_us = micros,
                "request completed"
            );
        }
    }
}
