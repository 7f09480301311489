//! Warmup/run executor
//!
//! One invocation is exactly one blocking generate call. Without a trace
//! sink the call is timed with a monotonic clock; with a trace sink it runs
//! inside a [`TraceSession`] and is not timed at all.

use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, info_span};

use super::request::DummyBatch;
use super::sampling::SamplingSpec;
use crate::engine::GenerationEngine;
use crate::error::BenchResult;
use crate::profiling::TraceSession;

/// Issues single generate calls against a borrowed engine
pub struct RunExecutor<'e, E: GenerationEngine + ?Sized> {
    engine: &'e mut E,
    calls: usize,
}

impl<'e, E: GenerationEngine + ?Sized> RunExecutor<'e, E> {
    pub fn new(engine: &'e mut E) -> Self {
        RunExecutor { engine, calls: 0 }
    }

    /// Generate calls issued so far
    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut *self.engine
    }

    /// Run the batch to completion once.
    ///
    /// Returns the wall-clock latency in seconds, or `None` when the run was
    /// traced into `trace_sink`. Engine errors are returned as-is.
    pub fn run(
        &mut self,
        spec: &SamplingSpec,
        batch: &DummyBatch,
        trace_sink: Option<&Path>,
    ) -> BenchResult<Option<f64>> {
        self.calls += 1;
        match trace_sink {
            None => {
                let start = Instant::now();
                self.engine.generate(batch.prompts(), spec, false)?;
                let latency = start.elapsed().as_secs_f64();
                debug!(latency_s = latency, "run finished");
                Ok(Some(latency))
            }
            Some(sink) => {
                let session = TraceSession::new(sink);
                let engine = &mut *self.engine;
                let (_, report) = session.record(|| {
                    let _span = info_span!(
                        "generate",
                        batch = batch.batch_size() as u64,
                        input = batch.input_length() as u64,
                        output = spec.max_tokens as u64
                    )
                    .entered();
                    engine.generate(batch.prompts(), spec, false)
                })?;
                println!("{}", report.summary);
                info!(
                    trace = %report.path.display(),
                    events = report.events,
                    "profiling trace written"
                );
                Ok(None)
            }
        }
    }
}
