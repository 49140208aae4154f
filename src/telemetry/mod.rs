// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging and metrics.
//!
//! - **Tracing**: every generation runs inside a `generation` span carrying
//!   its id; chunk-level detail is at `trace`, lifecycle at `debug`,
//!   dropped tool calls at `warn`, transport failures at `error`.
//! - **Metrics**: generation outcomes, tool-call counts, token totals and
//!   latency histograms in [`GLOBAL_METRICS`]. Recording is compiled in with
//!   the `telemetry` feature (on by default).
//!
//! # Usage
//!
//! ```rust,ignore
//! use parley::telemetry::{init_telemetry, TelemetryConfig, GLOBAL_METRICS};
//!
//! let _guard = init_telemetry(&TelemetryConfig::default())?;
//! // ...
//! eprintln!("{}", GLOBAL_METRICS.snapshot().format_report());
//! ```

mod init;
pub mod metrics;

pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard};
pub use metrics::{
    GenerationCounts, GenerationOutcome, Histogram, Metrics, MetricsSnapshot, OperationMetrics,
    GLOBAL_METRICS,
};
