//! Simulated engine for dry runs and tests
//!
//! No model is loaded and no accelerator is touched. The engine behaves like
//! a batching server at the level the harness can observe:
//!
//! - the batch is split into steps of at most `max_num_seqs` sequences
//! - each step pays a prefill cost per uncached prompt token and a decode
//!   cost per generated token position
//! - prompts seen before hit a prefix cache and skip prefill, until
//!   [`GenerationEngine::reset_state`] clears it
//!
//! Prefill and decode are emitted as `activity = "device"` spans so trace
//! sessions attribute them to the accelerator.

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use tracing::{debug, info_span};

use super::{GenerationEngine, GenerationOutput, TokenId};
use crate::config::EngineArgs;
use crate::error::{invalid_config, BenchError, BenchResult};
use crate::sweep::SamplingSpec;

/// Cost model for [`SyntheticEngine`]
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    /// Simulated prefill cost per prompt token (microseconds)
    pub prefill_us_per_token: u64,
    /// Simulated decode cost per generated position (microseconds)
    pub decode_us_per_step: u64,
    /// Maximum sequences processed together in one step
    pub max_num_seqs: usize,
    /// Fail the k-th generate call (1-based)
    pub fail_on_call: Option<usize>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        SyntheticConfig {
            prefill_us_per_token: 2,
            decode_us_per_step: 50,
            max_num_seqs: 256,
            fail_on_call: None,
        }
    }
}

impl SyntheticConfig {
    /// Zero-cost configuration, useful in tests
    pub fn instant() -> Self {
        SyntheticConfig {
            prefill_us_per_token: 0,
            decode_us_per_step: 0,
            ..Default::default()
        }
    }

    pub fn with_prefill_us_per_token(mut self, us: u64) -> Self {
        self.prefill_us_per_token = us;
        self
    }

    pub fn with_decode_us_per_step(mut self, us: u64) -> Self {
        self.decode_us_per_step = us;
        self
    }

    pub fn with_max_num_seqs(mut self, max_num_seqs: usize) -> Self {
        self.max_num_seqs = max_num_seqs;
        self
    }

    pub fn with_fail_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }
}

/// Counters exposed for tests and debug logs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntheticStats {
    pub calls: usize,
    pub steps: usize,
    pub prefill_tokens: usize,
    pub cache_hits: usize,
    pub resets: usize,
}

/// In-process engine with a deterministic cost model
#[derive(Debug)]
pub struct SyntheticEngine {
    model: String,
    config: SyntheticConfig,
    prefix_cache: HashSet<Vec<TokenId>>,
    stats: SyntheticStats,
}

impl SyntheticEngine {
    pub fn new(args: EngineArgs, config: SyntheticConfig) -> BenchResult<Self> {
        if config.max_num_seqs == 0 {
            return Err(invalid_config("synthetic max_num_seqs must be at least 1"));
        }
        debug!(
            model = %args.model,
            tp = args.tensor_parallel_size,
            dtype = %args.dtype,
            max_num_seqs = config.max_num_seqs,
            "synthetic engine created"
        );
        Ok(SyntheticEngine {
            model: args.model,
            config,
            prefix_cache: HashSet::new(),
            stats: SyntheticStats::default(),
        })
    }

    pub fn stats(&self) -> &SyntheticStats {
        &self.stats
    }

    fn pause(us: u64) {
        if us > 0 {
            thread::sleep(Duration::from_micros(us));
        }
    }

    fn prefill_cost_us(&self, tokens: usize) -> u64 {
        self.config
            .prefill_us_per_token
            .saturating_mul(u64::try_from(tokens).unwrap_or(u64::MAX))
    }

    fn decode_cost_us(&self, positions: usize) -> u64 {
        self.config
            .decode_us_per_step
            .saturating_mul(u64::try_from(positions).unwrap_or(u64::MAX))
    }

    fn run_step(&mut self, step: usize, prompts: &[Vec<TokenId>], spec: &SamplingSpec) {
        let mut uncached = 0usize;
        for prompt in prompts {
            if self.prefix_cache.contains(prompt) {
                self.stats.cache_hits += 1;
            } else {
                uncached += prompt.len();
                self.prefix_cache.insert(prompt.clone());
            }
        }
        self.stats.prefill_tokens += uncached;

        {
            let _prefill = info_span!(
                "prefill",
                activity = "device",
                step = step as u64,
                tokens = uncached as u64
            )
            .entered();
            Self::pause(self.prefill_cost_us(uncached));
        }
        {
            let _decode = info_span!(
                "decode",
                activity = "device",
                step = step as u64,
                positions = spec.max_tokens as u64,
                seqs = (prompts.len() * spec.n) as u64
            )
            .entered();
            Self::pause(self.decode_cost_us(spec.max_tokens));
        }
        self.stats.steps += 1;
    }
}

impl GenerationEngine for SyntheticEngine {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn generate(
        &mut self,
        prompts: &[Vec<TokenId>],
        spec: &SamplingSpec,
        _show_progress: bool,
    ) -> BenchResult<Vec<GenerationOutput>> {
        self.stats.calls += 1;
        if self.config.fail_on_call == Some(self.stats.calls) {
            return Err(BenchError::EngineFailure(format!(
                "synthetic failure injected on call {}",
                self.stats.calls
            )));
        }
        if prompts.iter().any(Vec::is_empty) {
            return Err(BenchError::EngineFailure(
                "prompt must contain at least one token".to_string(),
            ));
        }

        debug!(
            model = %self.model,
            prompts = prompts.len(),
            max_tokens = spec.max_tokens,
            "synthetic generate"
        );

        // Beam search and n > 1 both multiply the sequences a prompt occupies
        let prompts_per_step = (self.config.max_num_seqs / spec.n.max(1)).max(1);
        for (step, chunk) in prompts.chunks(prompts_per_step).enumerate() {
            self.run_step(step, chunk, spec);
        }

        let mut outputs = Vec::with_capacity(prompts.len() * spec.n);
        for prompt_index in 0..prompts.len() {
            for _ in 0..spec.n {
                outputs.push(GenerationOutput {
                    prompt_index,
                    text: String::new(),
                    num_tokens: Some(spec.max_tokens),
                    finish_reason: Some("length".to_string()),
                });
            }
        }
        Ok(outputs)
    }

    fn reset_state(&mut self) -> BenchResult<()> {
        self.prefix_cache.clear();
        self.stats.resets += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(config: SyntheticConfig) -> SyntheticEngine {
        SyntheticEngine::new(EngineArgs::default(), config).unwrap()
    }

    #[test]
    fn test_step_costs_saturate() {
        let huge = engine(
            SyntheticConfig::instant()
                .with_prefill_us_per_token(u64::MAX / 2)
                .with_decode_us_per_step(u64::MAX / 2),
        );
        assert_eq!(huge.prefill_cost_us(3), u64::MAX);
        assert_eq!(huge.decode_cost_us(usize::MAX), u64::MAX);
        assert_eq!(huge.prefill_cost_us(0), 0);

        let default = engine(SyntheticConfig::default());
        assert_eq!(default.prefill_cost_us(10), 20);
        assert_eq!(default.decode_cost_us(4), 200);
    }

    #[test]
    fn test_outputs_cover_every_sequence() {
        let mut engine = engine(SyntheticConfig::instant());
        let spec = SamplingSpec::for_output_len(16, 2, false);
        let outputs = engine.generate(&vec![vec![0; 4]; 3], &spec, false).unwrap();

        assert_eq!(outputs.len(), 6);
        assert_eq!(outputs[0].prompt_index, 0);
        assert_eq!(outputs[5].prompt_index, 2);
        assert!(outputs.iter().all(|o| o.num_tokens == Some(16)));
    }

    #[test]
    fn test_batch_split_into_steps() {
        let mut engine = engine(SyntheticConfig::instant().with_max_num_seqs(4));
        let spec = SamplingSpec::for_output_len(8, 1, false);
        engine.generate(&vec![vec![0; 4]; 10], &spec, false).unwrap();
        // 10 prompts, 4 per step
        assert_eq!(engine.stats().steps, 3);

        let spec = SamplingSpec::for_output_len(8, 4, true);
        engine.generate(&vec![vec![1; 4]; 2], &spec, false).unwrap();
        // 4 beams fill a step on their own
        assert_eq!(engine.stats().steps, 5);
    }

    #[test]
    fn test_prefix_cache_and_reset() {
        let mut engine = engine(SyntheticConfig::instant());
        let spec = SamplingSpec::for_output_len(4, 1, false);
        let batch = vec![vec![0; 32]; 2];

        engine.generate(&batch, &spec, false).unwrap();
        assert_eq!(engine.stats().prefill_tokens, 32);
        assert_eq!(engine.stats().cache_hits, 1);

        engine.generate(&batch, &spec, false).unwrap();
        assert_eq!(engine.stats().prefill_tokens, 32);
        assert_eq!(engine.stats().cache_hits, 3);

        engine.reset_state().unwrap();
        engine.generate(&batch, &spec, false).unwrap();
        assert_eq!(engine.stats().prefill_tokens, 64);
        assert_eq!(engine.stats().resets, 1);
    }

    #[test]
    fn test_injected_failure() {
        let mut engine = engine(SyntheticConfig::instant().with_fail_on_call(2));
        let spec = SamplingSpec::for_output_len(4, 1, false);
        assert!(engine.generate(&[vec![0; 2]], &spec, false).is_ok());
        let err = engine.generate(&[vec![0; 2]], &spec, false).unwrap_err();
        assert!(matches!(err, BenchError::EngineFailure(_)));
        assert!(engine.generate(&[vec![0; 2]], &spec, false).is_ok());
    }

    #[test]
    fn test_rejects_zero_max_num_seqs() {
        let result = SyntheticEngine::new(
            EngineArgs::default(),
            SyntheticConfig::instant().with_max_num_seqs(0),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_cost_is_paid() {
        let mut engine = engine(SyntheticConfig::instant().with_decode_us_per_step(100));
        let spec = SamplingSpec::for_output_len(20, 1, false);
        let start = std::time::Instant::now();
        engine.generate(&[vec![0; 4]], &spec, false).unwrap();
        assert!(start.elapsed() >= Duration::from_micros(2000));
    }
}
