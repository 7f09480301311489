//! Engines the harness can drive
//!
//! The harness treats the inference engine as a black box with a blocking
//! `generate` capability. Scheduling, batching, KV cache management and
//! model loading all live behind [`GenerationEngine`].
//!
//! ## Module Structure
//!
//! - [`http`] - OpenAI-compatible completion server over HTTP
//! - [`synthetic`] - In-process simulated engine for dry runs and tests
//!
//! Engines that want their work to show up as device activity in a trace
//! session open spans with an `activity = "device"` field.

pub mod http;
pub mod synthetic;

use std::fmt;

use clap::ValueEnum;

use crate::config::EngineArgs;
use crate::error::BenchResult;
use crate::sweep::SamplingSpec;

pub use http::{HttpEngine, DEFAULT_ENDPOINT};
pub use synthetic::{SyntheticConfig, SyntheticEngine};

/// Token id type used in prompts
pub type TokenId = u32;

/// One completed sequence returned by an engine
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    /// Index of the prompt this sequence belongs to
    pub prompt_index: usize,
    pub text: String,
    /// Number of generated tokens, when the engine reports it
    pub num_tokens: Option<usize>,
    pub finish_reason: Option<String>,
}

/// Blocking text generation capability
pub trait GenerationEngine {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Run every prompt to completion.
    ///
    /// The engine may split the batch into several internal steps. Errors
    /// are reported as [`crate::BenchError::EngineFailure`].
    fn generate(
        &mut self,
        prompts: &[Vec<TokenId>],
        spec: &SamplingSpec,
        show_progress: bool,
    ) -> BenchResult<Vec<GenerationOutput>>;

    /// Drop engine-internal state such as prefix caches.
    ///
    /// Engines without resettable state keep the default no-op.
    fn reset_state(&mut self) -> BenchResult<()> {
        Ok(())
    }
}

impl<E: GenerationEngine + ?Sized> GenerationEngine for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn generate(
        &mut self,
        prompts: &[Vec<TokenId>],
        spec: &SamplingSpec,
        show_progress: bool,
    ) -> BenchResult<Vec<GenerationOutput>> {
        (**self).generate(prompts, spec, show_progress)
    }

    fn reset_state(&mut self) -> BenchResult<()> {
        (**self).reset_state()
    }
}

/// Which engine backend to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum EngineKind {
    /// Remote OpenAI-compatible completion server
    #[default]
    Http,
    /// In-process simulation
    Synthetic,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Http => write!(f, "http"),
            EngineKind::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Build the engine once; it is reused for the whole sweep
pub fn build_engine(
    kind: EngineKind,
    args: &EngineArgs,
    endpoint: &str,
    synthetic: SyntheticConfig,
) -> BenchResult<Box<dyn GenerationEngine>> {
    args.validate()?;
    match kind {
        EngineKind::Http => Ok(Box::new(HttpEngine::connect(endpoint, args)?)),
        EngineKind::Synthetic => Ok(Box::new(SyntheticEngine::new(args.clone(), synthetic)?)),
    }
}
