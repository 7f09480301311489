//! Sweep and engine configuration
//!
//! [`SweepConfig`] decides what the sweep controller runs; [`EngineArgs`]
//! is handed to whichever engine backend is constructed. Both follow the
//! `Default` + `with_*` builder pattern and are validated once, before the
//! engine is touched.

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::Serialize;

use crate::error::{invalid_config, BenchResult};

/// Model used when the operator does not pass `--model`
pub const DEFAULT_MODEL: &str = "facebook/opt-125m";

/// Report path used when `--report` is set without `--report-file`
pub const DEFAULT_REPORT_FILE: &str = "latency_report.csv";

/// Weight quantization scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantization {
    Awq,
    Gptq,
    Squeezellm,
    #[default]
    None,
}

/// Data type for weights and activations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// FP16 for FP32/FP16 checkpoints, BF16 for BF16 checkpoints
    #[default]
    Auto,
    Half,
    Float16,
    Bfloat16,
    Float,
    Float32,
}

/// Data type for KV cache storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KvCacheDtype {
    /// Same as the model dtype
    #[default]
    Auto,
    Fp8,
}

macro_rules! display_via_value_enum {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.to_possible_value() {
                    Some(value) => f.write_str(value.get_name()),
                    None => write!(f, "{:?}", self),
                }
            }
        }
    )*};
}

display_via_value_enum!(Quantization, DType, KvCacheDtype);

/// Construction-time options for the engine under test
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineArgs {
    pub model: String,
    /// Defaults to the model when unset
    pub tokenizer: Option<String>,
    pub quantization: Quantization,
    pub tensor_parallel_size: usize,
    pub trust_remote_code: bool,
    pub dtype: DType,
    /// Disable graph capture and always run eagerly
    pub enforce_eager: bool,
    pub kv_cache_dtype: KvCacheDtype,
}

impl Default for EngineArgs {
    fn default() -> Self {
        EngineArgs {
            model: DEFAULT_MODEL.to_string(),
            tokenizer: None,
            quantization: Quantization::None,
            tensor_parallel_size: 1,
            trust_remote_code: false,
            dtype: DType::Auto,
            enforce_eager: false,
            kv_cache_dtype: KvCacheDtype::Auto,
        }
    }
}

impl EngineArgs {
    pub fn new(model: impl Into<String>) -> Self {
        EngineArgs {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: impl Into<String>) -> Self {
        self.tokenizer = Some(tokenizer.into());
        self
    }

    pub fn with_quantization(mut self, quantization: Quantization) -> Self {
        self.quantization = quantization;
        self
    }

    pub fn with_tensor_parallel_size(mut self, tensor_parallel_size: usize) -> Self {
        self.tensor_parallel_size = tensor_parallel_size;
        self
    }

    pub fn with_trust_remote_code(mut self, trust_remote_code: bool) -> Self {
        self.trust_remote_code = trust_remote_code;
        self
    }

    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn with_enforce_eager(mut self, enforce_eager: bool) -> Self {
        self.enforce_eager = enforce_eager;
        self
    }

    pub fn with_kv_cache_dtype(mut self, kv_cache_dtype: KvCacheDtype) -> Self {
        self.kv_cache_dtype = kv_cache_dtype;
        self
    }

    /// Tokenizer to load, falling back to the model
    pub fn tokenizer(&self) -> &str {
        self.tokenizer.as_deref().unwrap_or(&self.model)
    }

    pub fn validate(&self) -> BenchResult<()> {
        if self.model.trim().is_empty() {
            return Err(invalid_config("model must not be empty"));
        }
        if self.tensor_parallel_size == 0 {
            return Err(invalid_config("tensor parallel size must be at least 1"));
        }
        Ok(())
    }
}

/// Everything the sweep controller needs to know
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    /// Model identity written into report rows
    pub model: String,
    pub tensor_parallel_size: usize,
    pub batch_sizes: Vec<usize>,
    pub input_lens: Vec<usize>,
    pub output_lens: Vec<usize>,
    /// Generated sequences per prompt
    pub n: usize,
    pub use_beam_search: bool,
    /// Timed iterations per configuration
    pub num_iters: usize,
    pub warmup_only: bool,
    pub profile: bool,
    pub profile_result_dir: Option<PathBuf>,
    /// Hardware tracer exit (rpd)
    pub rpd: bool,
    pub report: bool,
    pub report_file: Option<PathBuf>,
    /// Call the engine's reset hook between configurations
    pub reset_between_configs: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            model: DEFAULT_MODEL.to_string(),
            tensor_parallel_size: 1,
            batch_sizes: vec![8],
            input_lens: vec![32],
            output_lens: vec![128],
            n: 1,
            use_beam_search: false,
            num_iters: 3,
            warmup_only: false,
            profile: false,
            profile_result_dir: None,
            rpd: false,
            report: false,
            report_file: None,
            reset_between_configs: false,
        }
    }
}

impl SweepConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take model identity and tp width from the engine arguments
    pub fn for_engine(args: &EngineArgs) -> Self {
        SweepConfig {
            model: args.model.clone(),
            tensor_parallel_size: args.tensor_parallel_size,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_tensor_parallel_size(mut self, tensor_parallel_size: usize) -> Self {
        self.tensor_parallel_size = tensor_parallel_size;
        self
    }

    pub fn with_batch_sizes(mut self, batch_sizes: Vec<usize>) -> Self {
        self.batch_sizes = batch_sizes;
        self
    }

    pub fn with_input_lens(mut self, input_lens: Vec<usize>) -> Self {
        self.input_lens = input_lens;
        self
    }

    pub fn with_output_lens(mut self, output_lens: Vec<usize>) -> Self {
        self.output_lens = output_lens;
        self
    }

    pub fn with_n(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    pub fn with_beam_search(mut self, use_beam_search: bool) -> Self {
        self.use_beam_search = use_beam_search;
        self
    }

    pub fn with_num_iters(mut self, num_iters: usize) -> Self {
        self.num_iters = num_iters;
        self
    }

    pub fn with_warmup_only(mut self, warmup_only: bool) -> Self {
        self.warmup_only = warmup_only;
        self
    }

    pub fn with_profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_profile_result_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profile_result_dir = Some(dir.into());
        self
    }

    pub fn with_rpd(mut self, rpd: bool) -> Self {
        self.rpd = rpd;
        self
    }

    pub fn with_report(mut self, report: bool) -> Self {
        self.report = report;
        self
    }

    pub fn with_report_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_file = Some(path.into());
        self
    }

    pub fn with_reset_between_configs(mut self, reset: bool) -> Self {
        self.reset_between_configs = reset;
        self
    }

    /// Report destination, defaulting to [`DEFAULT_REPORT_FILE`]
    pub fn report_path(&self) -> PathBuf {
        self.report_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_FILE))
    }

    /// Reject grids and counts the sweep cannot run.
    ///
    /// Empty grid dimensions are allowed and simply produce no
    /// configurations.
    pub fn validate(&self) -> BenchResult<()> {
        for (name, values) in [
            ("batch size", &self.batch_sizes),
            ("input length", &self.input_lens),
            ("output length", &self.output_lens),
        ] {
            if let Some(pos) = values.iter().position(|&v| v == 0) {
                return Err(invalid_config(format!(
                    "{} must be positive (entry {} is 0)",
                    name, pos
                )));
            }
        }
        if self.n == 0 {
            return Err(invalid_config("n must be at least 1"));
        }
        if self.num_iters == 0 {
            return Err(invalid_config("num_iters must be at least 1"));
        }
        if self.tensor_parallel_size == 0 {
            return Err(invalid_config("tensor parallel size must be at least 1"));
        }
        Ok(())
    }
}

/// Parse a comma-separated list of integers ("1,2, 4").
///
/// Whitespace around entries is ignored and empty segments are skipped, so
/// an empty string yields an empty list.
pub fn parse_int_list(raw: &str) -> Result<Vec<usize>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<usize>()
                .map_err(|e| format!("invalid integer '{}': {}", part, e))
        })
        .collect()
}
