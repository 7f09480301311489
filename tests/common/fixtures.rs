//! Test doubles for the engine and hardware tracer

use std::path::{Path, PathBuf};
use std::time::Duration;

use rocmforge_latency::engine::{GenerationEngine, GenerationOutput, TokenId};
use rocmforge_latency::error::{engine_failure, BenchResult};
use rocmforge_latency::profiling::{HardwareTracer, ProfilingResult};
use rocmforge_latency::sweep::SamplingSpec;

/// What one generate call received
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub batch_size: usize,
    pub prompt_lengths: Vec<usize>,
    pub all_sentinel: bool,
    pub spec: SamplingSpec,
    pub show_progress: bool,
}

/// Engine that records every call and answers instantly
#[derive(Debug, Default)]
pub struct RecordingEngine {
    pub calls: Vec<CallRecord>,
    pub resets: usize,
    /// Per-call delay, indexed by call number (0-based); missing means none
    pub delays: Vec<Duration>,
    /// Fail the k-th call (1-based)
    pub fail_on_call: Option<usize>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = delays;
        self
    }

    pub fn with_fail_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }
}

impl GenerationEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    fn generate(
        &mut self,
        prompts: &[Vec<TokenId>],
        spec: &SamplingSpec,
        show_progress: bool,
    ) -> BenchResult<Vec<GenerationOutput>> {
        let index = self.calls.len();
        self.calls.push(CallRecord {
            batch_size: prompts.len(),
            prompt_lengths: prompts.iter().map(Vec::len).collect(),
            all_sentinel: prompts.iter().flatten().all(|&t| t == 0),
            spec: spec.clone(),
            show_progress,
        });

        if self.fail_on_call == Some(index + 1) {
            return Err(engine_failure("generate", "injected failure"));
        }
        if let Some(delay) = self.delays.get(index) {
            std::thread::sleep(*delay);
        }

        Ok(prompts
            .iter()
            .enumerate()
            .flat_map(|(i, _)| {
                (0..spec.n).map(move |_| GenerationOutput {
                    prompt_index: i,
                    text: String::new(),
                    num_tokens: Some(spec.max_tokens),
                    finish_reason: Some("length".to_string()),
                })
            })
            .collect())
    }

    fn reset_state(&mut self) -> BenchResult<()> {
        self.resets += 1;
        Ok(())
    }
}

/// Tracer that counts start/stop calls
#[derive(Debug)]
pub struct RecordingTracer {
    pub starts: usize,
    pub stops: usize,
    output: PathBuf,
}

impl RecordingTracer {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        RecordingTracer {
            starts: 0,
            stops: 0,
            output: output.into(),
        }
    }
}

impl HardwareTracer for RecordingTracer {
    fn start(&mut self) -> ProfilingResult<()> {
        self.starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> ProfilingResult<()> {
        self.stops += 1;
        Ok(())
    }

    fn output(&self) -> &Path {
        &self.output
    }
}
