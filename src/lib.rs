//! ROCmForge latency benchmark
//!
//! Measures end-to-end batch latency of a text-generation engine over a
//! grid of (batch size, input length, output length) configurations, with
//! optional profiling and hardware-tracing modes and a CSV report.

pub mod config;
pub mod distributed;
pub mod engine;
pub mod error;
pub mod logging;
pub mod profiling;
pub mod report;
pub mod sweep;

pub use config::{EngineArgs, SweepConfig};
pub use distributed::{EnvRank, RankGate, SingleProcess};
pub use engine::{build_engine, EngineKind, GenerationEngine, HttpEngine, SyntheticEngine};
pub use error::{BenchError, BenchResult, ErrorCategory};
pub use profiling::{HardwareTracer, RpdTracer, TraceSession};
pub use report::{ReportRow, ReportTable, Reporter};
pub use sweep::{dummy_batch, SamplingSpec, SweepController, SweepOutcome};
