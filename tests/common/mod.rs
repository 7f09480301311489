//! Shared helpers for integration tests
//!
//! Every test here runs without a GPU or an external inference server:
//! sweeps are driven against [`RecordingEngine`] or the crate's
//! `SyntheticEngine`, and `HttpEngine` talks to an in-process
//! [`CompletionServer`].

#![allow(dead_code)]

mod completion_server;
mod fixtures;
mod tempfile_helpers;

pub use completion_server::{CompletionServer, ServerMode};
pub use fixtures::{CallRecord, RecordingEngine, RecordingTracer};
pub use tempfile_helpers::{create_temp_dir, read_csv_rows};

use once_cell::sync::Lazy;
pub use serial_test::serial;

/// Installs the global subscriber once per test binary
static LOGGING: Lazy<()> = Lazy::new(rocmforge_latency::logging::init_logging_default);

pub fn init_test_logging() {
    Lazy::force(&LOGGING);
}
