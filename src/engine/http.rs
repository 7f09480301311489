//! Engine adapter for an OpenAI-compatible completion server
//!
//! The server owns the model, tokenizer, tensor-parallel workers and KV
//! cache; the harness sends pre-tokenized prompts and waits for the whole
//! batch to finish. Requests are plain `POST /v1/completions` with token-id
//! prompts plus the sampling extensions servers of this kind accept
//! (`use_beam_search`, `ignore_eos`).
//!
//! Calls block the sweep thread on a private current-thread runtime. No
//! request timeout is set.

use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tracing::{debug, info, info_span};

use super::{GenerationEngine, GenerationOutput, TokenId};
use crate::config::EngineArgs;
use crate::error::{engine_failure, BenchError, BenchResult};
use crate::sweep::SamplingSpec;

/// Where the harness looks for a server by default
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000";

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a [Vec<TokenId>],
    n: usize,
    temperature: f32,
    top_p: f32,
    max_tokens: usize,
    use_beam_search: bool,
    ignore_eos: bool,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    index: usize,
    #[serde(default)]
    text: String,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    completion_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ModelCard {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelCard>,
}

/// Blocking client for a running completion server
#[derive(Debug)]
pub struct HttpEngine {
    base_url: String,
    model: String,
    client: reqwest::Client,
    runtime: Runtime,
}

impl HttpEngine {
    /// Connect and check that the server serves `args.model`.
    ///
    /// Server-side options (dtype, quantization, tensor parallelism) are
    /// fixed when the server starts; they are logged here so a report can be
    /// matched with the deployment it measured.
    pub fn connect(endpoint: &str, args: &EngineArgs) -> BenchResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| engine_failure("starting HTTP runtime", e))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| engine_failure("building HTTP client", e))?;

        let engine = HttpEngine {
            base_url: endpoint.trim_end_matches('/').to_string(),
            model: args.model.clone(),
            client,
            runtime,
        };

        let served = engine.served_models()?;
        if !served.iter().any(|id| id == &engine.model) {
            return Err(BenchError::EngineFailure(format!(
                "server at {} does not serve '{}' (available: {})",
                engine.base_url,
                engine.model,
                served.join(", ")
            )));
        }

        info!(
            endpoint = %engine.base_url,
            model = %args.model,
            tokenizer = %args.tokenizer(),
            tp = args.tensor_parallel_size,
            dtype = %args.dtype,
            quantization = %args.quantization,
            kv_cache_dtype = %args.kv_cache_dtype,
            enforce_eager = args.enforce_eager,
            trust_remote_code = args.trust_remote_code,
            "connected to completion server"
        );
        Ok(engine)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn served_models(&self) -> BenchResult<Vec<String>> {
        let url = self.url("/v1/models");
        let list: ModelList = self.runtime.block_on(async {
            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| engine_failure("GET /v1/models", e))?;
            let resp = check_status(resp, "GET /v1/models").await?;
            resp.json()
                .await
                .map_err(|e| engine_failure("decoding /v1/models", e))
        })?;
        Ok(list.data.into_iter().map(|card| card.id).collect())
    }
}

async fn check_status(resp: reqwest::Response, what: &str) -> BenchResult<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let text = resp
        .text()
        .await
        .unwrap_or_else(|e| format!("<failed to read error body: {}>", e));
    Err(BenchError::EngineFailure(format!(
        "{}: server returned {}: {}",
        what, status, text
    )))
}

impl GenerationEngine for HttpEngine {
    fn name(&self) -> &str {
        "http"
    }

    fn generate(
        &mut self,
        prompts: &[Vec<TokenId>],
        spec: &SamplingSpec,
        _show_progress: bool,
    ) -> BenchResult<Vec<GenerationOutput>> {
        let body = CompletionRequest {
            model: &self.model,
            prompt: prompts,
            n: spec.n,
            temperature: spec.temperature,
            top_p: spec.top_p,
            max_tokens: spec.max_tokens,
            use_beam_search: spec.use_beam_search,
            ignore_eos: spec.ignore_eos,
            stream: false,
        };
        let url = self.url("/v1/completions");
        let _span = info_span!("http_completion", prompts = prompts.len() as u64).entered();

        let response: CompletionResponse = self.runtime.block_on(async {
            let resp = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| engine_failure("POST /v1/completions", e))?;
            let resp = check_status(resp, "POST /v1/completions").await?;
            resp.json()
                .await
                .map_err(|e| engine_failure("decoding completion response", e))
        })?;

        let expected = prompts.len() * spec.n;
        if response.choices.len() != expected {
            return Err(BenchError::EngineFailure(format!(
                "expected {} choices, server returned {}",
                expected,
                response.choices.len()
            )));
        }
        debug!(
            choices = response.choices.len(),
            completion_tokens = response.usage.as_ref().map(|u| u.completion_tokens),
            "completion finished"
        );

        Ok(response
            .choices
            .into_iter()
            .map(|choice| GenerationOutput {
                // Choices are laid out prompt-major, n per prompt
                prompt_index: choice.index / spec.n.max(1),
                text: choice.text,
                num_tokens: None,
                finish_reason: choice.finish_reason,
            })
            .collect())
    }

    fn reset_state(&mut self) -> BenchResult<()> {
        let url = self.url("/reset_prefix_cache");
        self.runtime.block_on(async {
            let resp = self
                .client
                .post(&url)
                .send()
                .await
                .map_err(|e| engine_failure("POST /reset_prefix_cache", e))?;
            check_status(resp, "POST /reset_prefix_cache").await.map(|_| ())
        })?;
        info!(endpoint = %self.base_url, "prefix cache reset");
        Ok(())
    }
}
