//! Low-level hardware tracing through the ROCm rpd tracer
//!
//! rpd records HIP API calls and kernel dispatches into a sqlite database.
//! The library reads its output file from `RPDT_FILENAME` when it is loaded,
//! so the path is fixed for the lifetime of the process. Run the harness
//! with `RPDT_AUTOSTART=0` so only the traced run is recorded.
//!
//! The tracer is linked only with the `rpd` cargo feature. Without it,
//! [`RpdTracer::from_env`] fails with [`ProfilingError::ToolNotFound`].

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::{ProfilingError, ProfilingResult, TracerTool};

/// Environment variable rpd reads its output path from
pub const RPD_FILENAME_ENV: &str = "RPDT_FILENAME";

/// rpd's own default when `RPDT_FILENAME` is unset
pub const DEFAULT_RPD_FILE: &str = "trace.rpd";

/// A tracer that records device activity between `start` and `stop`
pub trait HardwareTracer {
    fn start(&mut self) -> ProfilingResult<()>;
    fn stop(&mut self) -> ProfilingResult<()>;
    /// Where the tracer writes its data
    fn output(&self) -> &Path;
}

#[cfg(feature = "rpd")]
mod ffi {
    // Linked by build.rs
    extern "C" {
        pub fn rpdstart();
        pub fn rpdstop();
        pub fn rpdflush();
    }
}

/// Handle on the in-process rpd tracer
#[derive(Debug)]
pub struct RpdTracer {
    output: PathBuf,
    active: bool,
}

impl RpdTracer {
    /// Bind to the linked rpd library, reading the output path like rpd does
    pub fn from_env() -> ProfilingResult<Self> {
        let output = std::env::var(RPD_FILENAME_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_RPD_FILE));
        Self::with_output(output)
    }

    fn with_output(output: PathBuf) -> ProfilingResult<Self> {
        let tool = TracerTool::Rpd;
        if !tool.is_linked() {
            return Err(ProfilingError::ToolNotFound(format!(
                "{} (rebuild with --features {})",
                tool.library_name(),
                tool.feature_name()
            )));
        }
        debug!(output = %output.display(), "rpd tracer bound");
        Ok(RpdTracer {
            output,
            active: false,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl HardwareTracer for RpdTracer {
    fn start(&mut self) -> ProfilingResult<()> {
        if self.active {
            return Err(ProfilingError::SessionError(
                "rpd tracer already started".to_string(),
            ));
        }
        #[cfg(feature = "rpd")]
        unsafe {
            ffi::rpdstart();
        }
        self.active = true;
        info!(output = %self.output.display(), "rpd tracing started");
        Ok(())
    }

    fn stop(&mut self) -> ProfilingResult<()> {
        if !self.active {
            return Err(ProfilingError::SessionError(
                "rpd tracer is not running".to_string(),
            ));
        }
        #[cfg(feature = "rpd")]
        unsafe {
            ffi::rpdstop();
            ffi::rpdflush();
        }
        self.active = false;
        info!(output = %self.output.display(), "rpd tracing stopped");
        Ok(())
    }

    fn output(&self) -> &Path {
        &self.output
    }
}
