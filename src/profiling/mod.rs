//! Profiling infrastructure for latency sweeps
//!
//! Two diagnostic modes can replace the measured iterations of a sweep:
//!
//! - [`trace`] - a scoped span capture around one generate call, persisted as
//!   a Chrome trace JSON plus a per-span summary
//! - [`rpd`] - the ROCm rpd hardware tracer, started and stopped around one
//!   generate call
//!
//! # Example
//!
//! ```rust,ignore
//! use rocmforge_latency::profiling::TraceSession;
//!
//! let session = TraceSession::new("./benchmark_result/latency_result_1700000000.5");
//! let (_, report) = session.record(|| engine.generate(&prompts, &spec, false))?;
//! println!("{}", report.summary);
//! ```

pub mod rpd;
pub mod trace;
pub mod types;

pub use rpd::{HardwareTracer, RpdTracer};
pub use trace::{TraceReport, TraceSession, TraceSummary};
pub use types::{Activity, ProfilingError, ProfilingResult, TracerTool};
