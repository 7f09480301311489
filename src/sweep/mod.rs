//! Latency sweep
//!
//! - [`request`] - dummy prompt batches
//! - [`sampling`] - per-configuration sampling parameters
//! - [`executor`] - single timed or traced generate calls
//! - [`controller`] - grid iteration, warmup and early-exit modes

pub mod controller;
pub mod executor;
pub mod request;
pub mod sampling;

pub use controller::{
    configurations, default_profile_dir, mean, SweepConfiguration, SweepController,
    SweepOutcome, DEFAULT_PROFILE_ROOT,
};
pub use executor::RunExecutor;
pub use request::{dummy_batch, DummyBatch, SENTINEL_TOKEN};
pub use sampling::SamplingSpec;
