//! Common types for the profiling integrations
//!
//! Shared by the scoped trace session and the hardware tracer.

use std::fmt;

/// Error type for profiling operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProfilingError {
    #[error("Profiling tool not found: {0}")]
    ToolNotFound(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Profiling session error: {0}")]
    SessionError(String),
}

/// Result type for profiling operations
pub type ProfilingResult<T> = Result<T, ProfilingError>;

/// Where a recorded span spent its time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Activity {
    /// Host-side work (request building, transport, bookkeeping)
    Cpu,
    /// Accelerator work reported by the engine
    Device,
}

impl Activity {
    /// Span field value that marks accelerator work
    pub const DEVICE_TAG: &'static str = "device";

    /// Classify a span from its `activity` field value
    pub fn from_tag(tag: &str) -> Self {
        if tag.eq_ignore_ascii_case(Self::DEVICE_TAG) || tag.eq_ignore_ascii_case("gpu") {
            Activity::Device
        } else {
            Activity::Cpu
        }
    }

    /// Chrome trace category name
    pub fn category(&self) -> &'static str {
        match self {
            Activity::Cpu => "cpu_op",
            Activity::Device => "kernel",
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Cpu => write!(f, "CPU"),
            Activity::Device => write!(f, "Device"),
        }
    }
}

/// Available low-level hardware tracers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracerTool {
    /// rpd - ROCm runtime profile data tracer (sqlite output)
    Rpd,
}

impl TracerTool {
    /// Shared library the tracer lives in
    pub fn library_name(&self) -> &'static str {
        match self {
            TracerTool::Rpd => "librpd_tracer.so",
        }
    }

    /// Cargo feature that links the tracer
    pub fn feature_name(&self) -> &'static str {
        match self {
            TracerTool::Rpd => "rpd",
        }
    }

    /// Whether the tracer was linked into this build
    pub fn is_linked(&self) -> bool {
        match self {
            TracerTool::Rpd => cfg!(feature = "rpd"),
        }
    }
}
