//! Sweep controller
//!
//! Walks the configuration grid (batch sizes, then output lengths, then
//! input lengths). Every configuration gets exactly one untimed warmup.
//! After that it either stops early (warmup-only, profiling or hardware
//! tracing) or takes `num_iters` timed samples and reduces them to a mean.
//!
//! Profiling and hardware tracing end the whole sweep after the first
//! configuration that reaches them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use super::executor::RunExecutor;
use super::request::{dummy_batch, DummyBatch};
use super::sampling::SamplingSpec;
use crate::config::SweepConfig;
use crate::distributed::RankGate;
use crate::engine::GenerationEngine;
use crate::error::{invalid_config, BenchError, BenchResult};
use crate::profiling::HardwareTracer;
use crate::report::{ReportRow, ReportTable};

/// Parent of the default profiling directories
pub const DEFAULT_PROFILE_ROOT: &str = "benchmark_result";

/// One point of the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfiguration {
    pub batch_size: usize,
    pub input_length: usize,
    pub output_length: usize,
}

impl fmt::Display for SweepConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Batch_size:{} Input_len:{} Output_len:{}",
            self.batch_size, self.input_length, self.output_length
        )
    }
}

/// How a sweep ended
#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    /// The whole grid ran
    Completed { measured: usize },
    /// Stopped after writing a profiling trace
    Profiled { trace_dir: PathBuf },
    /// Stopped after a hardware-traced run
    Traced { output: PathBuf },
}

impl SweepOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SweepOutcome::Completed { .. })
    }
}

/// Grid points in sweep order: batch (outer), output, input (inner)
pub fn configurations(config: &SweepConfig) -> Vec<SweepConfiguration> {
    let mut grid = Vec::with_capacity(
        config.batch_sizes.len() * config.output_lens.len() * config.input_lens.len(),
    );
    for &batch_size in &config.batch_sizes {
        for &output_length in &config.output_lens {
            for &input_length in &config.input_lens {
                grid.push(SweepConfiguration {
                    batch_size,
                    input_length,
                    output_length,
                });
            }
        }
    }
    grid
}

/// Arithmetic mean, `None` for no samples
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// `./benchmark_result/latency_result_<unix seconds>`
pub fn default_profile_dir() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Path::new(".").join(DEFAULT_PROFILE_ROOT).join(format!(
        "latency_result_{}.{:06}",
        now.as_secs(),
        now.subsec_micros()
    ))
}

/// Drives one sweep against a borrowed engine
pub struct SweepController<'a, E: GenerationEngine + ?Sized> {
    config: &'a SweepConfig,
    executor: RunExecutor<'a, E>,
    rank: &'a dyn RankGate,
    tracer: Option<&'a mut dyn HardwareTracer>,
}

impl<'a, E: GenerationEngine + ?Sized> SweepController<'a, E> {
    pub fn new(config: &'a SweepConfig, engine: &'a mut E, rank: &'a dyn RankGate) -> Self {
        SweepController {
            config,
            executor: RunExecutor::new(engine),
            rank,
            tracer: None,
        }
    }

    /// Tracer used when `rpd` is set
    pub fn with_tracer(mut self, tracer: &'a mut dyn HardwareTracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Run the grid, appending measured rows to `table`
    pub fn run(&mut self, table: &mut ReportTable) -> BenchResult<SweepOutcome> {
        self.config.validate()?;
        if self.config.rpd && !self.config.profile && self.tracer.is_none() {
            return Err(invalid_config("hardware tracing requested without a tracer"));
        }

        let grid = configurations(self.config);
        if grid.is_empty() {
            warn!("empty configuration grid, nothing to run");
        }
        info!(
            model = %self.config.model,
            tp = self.config.tensor_parallel_size,
            configurations = grid.len(),
            "starting latency sweep"
        );

        let mut measured = 0;
        for (index, point) in grid.iter().enumerate() {
            if index > 0 && self.config.reset_between_configs {
                debug!("resetting engine state");
                self.executor.engine_mut().reset_state()?;
            }

            println!(">>>RUNNING {} {}", self.config.model, point);
            info!(
                batch = point.batch_size,
                input = point.input_length,
                output = point.output_length,
                "running configuration"
            );

            let spec = SamplingSpec::for_output_len(
                point.output_length,
                self.config.n,
                self.config.use_beam_search,
            );
            println!("{}", spec);
            let batch = dummy_batch(point.batch_size, point.input_length)?;

            println!("Warming up...");
            self.executor.run(&spec, &batch, None)?;

            if self.config.warmup_only {
                println!(">>> Warmup only specified, exiting");
                continue;
            }

            if self.config.profile {
                let trace_dir = self
                    .config
                    .profile_result_dir
                    .clone()
                    .unwrap_or_else(default_profile_dir);
                println!(
                    "Profiling (results will be saved to '{}')...",
                    trace_dir.display()
                );
                self.executor.run(&spec, &batch, Some(&trace_dir))?;
                return Ok(SweepOutcome::Profiled { trace_dir });
            }

            if self.config.rpd {
                let tracer = self
                    .tracer
                    .as_deref_mut()
                    .ok_or_else(|| invalid_config("hardware tracing requested without a tracer"))?;
                tracer.start()?;
                println!("RPD Profiling...");
                let result = self.executor.run(&spec, &batch, None);
                // Always stop, even after a failed run
                tracer.stop()?;
                result?;
                return Ok(SweepOutcome::Traced {
                    output: tracer.output().to_path_buf(),
                });
            }

            let latency = self.measure(&spec, &batch)?;
            measured += 1;

            if self.rank.is_reporting_rank() {
                println!("Avg latency: {} seconds", latency);
                if self.config.report {
                    table.push(ReportRow {
                        model: self.config.model.clone(),
                        tp: self.config.tensor_parallel_size,
                        batch: point.batch_size,
                        input: point.input_length,
                        output: point.output_length,
                        latency,
                    });
                }
            }
        }

        info!(measured, calls = self.executor.calls(), "latency sweep completed");
        Ok(SweepOutcome::Completed { measured })
    }

    fn measure(&mut self, spec: &SamplingSpec, batch: &DummyBatch) -> BenchResult<f64> {
        let iters = self.config.num_iters;
        let bar = if self.rank.is_reporting_rank() {
            let bar = ProgressBar::new(iters as u64);
            let template = "Profiling iterations [{bar:40.cyan/blue}] {pos}/{len} ({eta})";
            if let Ok(style) = ProgressStyle::default_bar().template(template) {
                bar.set_style(style.progress_chars("=> "));
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        let mut latencies = Vec::with_capacity(iters);
        for _ in 0..iters {
            let latency = self
                .executor
                .run(spec, batch, None)?
                .ok_or_else(|| BenchError::InternalError("timed run returned no latency".to_string()))?;
            latencies.push(latency);
            bar.inc(1);
        }
        bar.finish_and_clear();

        debug!(?latencies, "iteration latencies");
        mean(&latencies)
            .ok_or_else(|| BenchError::InternalError("no latency samples".to_string()))
    }
}
