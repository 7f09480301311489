use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rocmforge_latency::config::{
    parse_int_list, DType, EngineArgs, KvCacheDtype, Quantization, SweepConfig, DEFAULT_MODEL,
};
use rocmforge_latency::distributed::{EnvRank, RankGate};
use rocmforge_latency::engine::{
    build_engine, EngineKind, GenerationEngine, SyntheticConfig, DEFAULT_ENDPOINT,
};
use rocmforge_latency::logging::{init_with_config, LogFormat, LogLevel, LoggingConfig};
use rocmforge_latency::profiling::RpdTracer;
use rocmforge_latency::report::{ReportTable, Reporter};
use rocmforge_latency::sweep::{SweepController, SweepOutcome};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "rocmforge-latency", version)]
#[command(
    about = "Benchmark the latency of processing a single batch of requests till completion",
    long_about = None
)]
struct Cli {
    /// Model name or path served by the engine
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Tokenizer name or path (defaults to the model)
    #[arg(long)]
    tokenizer: Option<String>,

    /// Weight quantization scheme
    #[arg(short = 'q', long, value_enum)]
    quantization: Option<Quantization>,

    /// Tensor-parallel width
    #[arg(long, visible_alias = "tp", default_value_t = 1)]
    tensor_parallel_size: usize,

    /// Comma-separated prompt lengths
    // Fully qualified so clap takes the whole list from one argument
    #[arg(long, value_parser = parse_int_list, default_value = "32")]
    input_len: ::std::vec::Vec<usize>,

    /// Comma-separated output lengths
    #[arg(long, value_parser = parse_int_list, default_value = "128")]
    output_len: ::std::vec::Vec<usize>,

    /// Comma-separated batch sizes
    #[arg(long, value_parser = parse_int_list, default_value = "8")]
    batch_size: ::std::vec::Vec<usize>,

    /// Number of generated sequences per prompt
    #[arg(long, default_value_t = 1)]
    n: usize,

    #[arg(long)]
    use_beam_search: bool,

    /// Number of timed iterations per configuration
    #[arg(long, default_value_t = 3)]
    num_iters: usize,

    /// Trust remote code from the model hub
    #[arg(long)]
    trust_remote_code: bool,

    /// Data type for weights and activations
    #[arg(long, value_enum, default_value_t = DType::Auto)]
    dtype: DType,

    /// Always run in eager mode, never capture graphs
    #[arg(long)]
    enforce_eager: bool,

    /// Data type for KV cache storage
    #[arg(long, value_enum, default_value_t = KvCacheDtype::Auto)]
    kv_cache_dtype: KvCacheDtype,

    /// Trace one run of the first configuration, then exit
    #[arg(long)]
    profile: bool,

    /// Directory for the profiling trace (default ./benchmark_result/latency_result_<time>)
    #[arg(long)]
    profile_result_dir: Option<PathBuf>,

    /// Record one run of the first configuration with the rpd tracer, then exit
    #[arg(long)]
    rpd: bool,

    /// Run only the warmup of every configuration
    #[arg(long)]
    warmup_only: bool,

    /// Write a CSV report
    #[arg(long)]
    report: bool,

    /// Report path (default latency_report.csv)
    #[arg(long)]
    report_file: Option<PathBuf>,

    /// Engine backend to drive
    #[arg(long, value_enum, default_value_t = EngineKind::Http)]
    engine: EngineKind,

    /// Base URL of the completion server (http engine)
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Drop engine caches before every configuration but the first
    #[arg(long)]
    reset_between_configs: bool,

    /// Simulated prefill cost per prompt token in microseconds (synthetic engine)
    #[arg(long, default_value_t = 2)]
    synthetic_prefill_us: u64,

    /// Simulated cost per decode step in microseconds (synthetic engine)
    #[arg(long, default_value_t = 50)]
    synthetic_decode_us: u64,

    /// Sequences per step (synthetic engine)
    #[arg(long, default_value_t = 256)]
    synthetic_max_num_seqs: usize,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log format (defaults to ROCFORGE_BENCH_LOG_FORMAT, then human)
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Include source file and line in log lines
    #[arg(long)]
    log_file_info: bool,
}

impl Cli {
    fn engine_args(&self) -> EngineArgs {
        let mut args = EngineArgs::new(self.model.clone())
            .with_tensor_parallel_size(self.tensor_parallel_size)
            .with_trust_remote_code(self.trust_remote_code)
            .with_dtype(self.dtype)
            .with_enforce_eager(self.enforce_eager)
            .with_kv_cache_dtype(self.kv_cache_dtype);
        if let Some(tokenizer) = &self.tokenizer {
            args = args.with_tokenizer(tokenizer.clone());
        }
        if let Some(quantization) = self.quantization {
            args = args.with_quantization(quantization);
        }
        args
    }

    fn sweep_config(&self, engine_args: &EngineArgs) -> SweepConfig {
        let mut config = SweepConfig::for_engine(engine_args)
            .with_batch_sizes(self.batch_size.clone())
            .with_input_lens(self.input_len.clone())
            .with_output_lens(self.output_len.clone())
            .with_n(self.n)
            .with_beam_search(self.use_beam_search)
            .with_num_iters(self.num_iters)
            .with_warmup_only(self.warmup_only)
            .with_profile(self.profile)
            .with_rpd(self.rpd)
            .with_report(self.report)
            .with_reset_between_configs(self.reset_between_configs);
        if let Some(dir) = &self.profile_result_dir {
            config = config.with_profile_result_dir(dir);
        }
        if let Some(path) = &self.report_file {
            config = config.with_report_file(path);
        }
        config
    }

    fn synthetic_config(&self) -> SyntheticConfig {
        SyntheticConfig::default()
            .with_prefill_us_per_token(self.synthetic_prefill_us)
            .with_decode_us_per_step(self.synthetic_decode_us)
            .with_max_num_seqs(self.synthetic_max_num_seqs)
    }

    fn logging_config(&self) -> LoggingConfig {
        let config = LoggingConfig::new()
            .with_level(self.log_level)
            .with_file_info(self.log_file_info);
        match self.log_format {
            Some(format) => config.with_format(format),
            None => config,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_with_config(&cli.logging_config())?;
    println!("{:?}", cli);

    let rank = EnvRank::from_env()?;
    let engine_args = cli.engine_args();
    let config = cli.sweep_config(&engine_args);
    config.validate()?;

    // Profiling wins over hardware tracing, so only bind rpd when it will run
    let mut tracer = if config.rpd && !config.profile {
        Some(RpdTracer::from_env()?)
    } else {
        None
    };

    println!(">>>Loading LLM");
    let mut engine = build_engine(cli.engine, &engine_args, &cli.endpoint, cli.synthetic_config())
        .with_context(|| format!("failed to start {} engine", cli.engine))?;
    info!(
        engine = engine.name(),
        rank = rank.rank(),
        world_size = rank.world_size(),
        "engine ready"
    );

    let mut table = ReportTable::new();
    let mut controller = SweepController::new(&config, &mut *engine, &rank);
    if let Some(tracer) = tracer.as_mut() {
        controller = controller.with_tracer(tracer);
    }
    let outcome = controller.run(&mut table)?;

    match outcome {
        SweepOutcome::Completed { measured } => {
            info!(measured, "sweep finished");
            if let Some(path) = Reporter::from_config(&config, &rank).finish(&table)? {
                info!(path = %path.display(), "latency report saved");
            }
        }
        SweepOutcome::Profiled { trace_dir } => {
            info!(trace_dir = %trace_dir.display(), "profiling finished");
        }
        SweepOutcome::Traced { output } => {
            info!(output = %output.display(), "rpd trace finished");
        }
    }
    Ok(())
}
