//! Vision call: one page image + the form schema → one JSON object.
//!
//! The provider is created once per batch by [`resolve_provider`] and passed
//! into every call; nothing here reads global client state. Calls go through
//! the [`VisionModel`] trait, which every edgequake-llm provider implements.
//!
//! ## Retry Strategy
//!
//! Transport errors and timeouts are retried with exponential backoff
//! (`retry_backoff_ms * 2^attempt`). A reply that arrives but is not a JSON
//! object is not retried: it is reported as
//! [`RecordError::InvalidResponse`] straight away.

use crate::config::ExtractionConfig;
use crate::error::{Pdf2CsvError, RecordError};
use crate::output::PageOutcome;
use crate::pipeline::response::parse_page_answer;
use crate::prompts::JSON_ONLY_SYSTEM_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Text and token usage of one model reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisionReply {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// One chat round trip with a vision-capable model.
pub trait VisionModel: Send + Sync {
    /// Send `messages`; a transport or provider failure comes back as its message.
    fn ask(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> impl Future<Output = Result<VisionReply, String>> + Send;
}

impl VisionModel for Arc<dyn LLMProvider> {
    async fn ask(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<VisionReply, String> {
        let response = self
            .chat(messages, Some(options))
            .await
            .map_err(|e| e.to_string())?;
        Ok(VisionReply {
            content: response.content,
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
        })
    }
}

/// Extract one page's answers.
///
/// Always returns a [`PageOutcome`]; failures are stored in `outcome.error`
/// so one bad page never aborts the batch.
pub async fn extract_page<M: VisionModel>(
    model: &M,
    page_num: usize,
    image_data: ImageData,
    prompt: &str,
    config: &ExtractionConfig,
) -> PageOutcome {
    let start = Instant::now();
    let messages = build_messages(prompt, image_data);
    let options = build_options(config);
    let call_timeout = Duration::from_secs(config.api_timeout_secs);

    let mut outcome = PageOutcome::new(page_num);
    let mut last_err: Option<RecordError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Page {}: retry {}/{} after {}ms",
                page_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }
        outcome.retries = attempt as u8;

        match timeout(call_timeout, model.ask(&messages, &options)).await {
            Ok(Ok(response)) => {
                debug!(
                    "Page {}: {} input tokens, {} output tokens, {:?}",
                    page_num,
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                outcome.input_tokens = response.prompt_tokens;
                outcome.output_tokens = response.completion_tokens;
                outcome.duration_ms = start.elapsed().as_millis() as u64;

                match parse_page_answer(&response.content) {
                    Ok(answer) => outcome.answer = Some(answer),
                    Err(issue) => {
                        warn!("Page {}: {}", page_num, issue);
                        debug!("Page {} raw response: {}", page_num, response.content);
                        outcome.error = Some(RecordError::InvalidResponse {
                            page: page_num,
                            detail: issue.to_string(),
                        });
                    }
                }
                return outcome;
            }
            Ok(Err(e)) => {
                warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, e);
                last_err = Some(RecordError::ExtractionFailed {
                    page: page_num,
                    retries: attempt as u8,
                    detail: e.to_string(),
                });
            }
            Err(_) => {
                warn!(
                    "Page {}: attempt {} timed out after {}s",
                    page_num,
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_err = Some(RecordError::Timeout {
                    page: page_num,
                    secs: config.api_timeout_secs,
                });
            }
        }
    }

    outcome.duration_ms = start.elapsed().as_millis() as u64;
    outcome.error = Some(last_err.unwrap_or_else(|| RecordError::ExtractionFailed {
        page: page_num,
        retries: config.max_retries as u8,
        detail: "Unknown error".to_string(),
    }));
    outcome
}

/// System instruction, then the prompt text with the page image attached.
fn build_messages(prompt: &str, image_data: ImageData) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(JSON_ONLY_SYSTEM_PROMPT),
        ChatMessage::user_with_images(prompt, vec![image_data]),
    ]
}

fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Pdf2CsvError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2CsvError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the vision provider once for the whole batch.
///
/// Most specific wins:
/// 1. `config.provider` — a pre-built provider, used as-is
/// 2. `config.provider_name` + `config.model`
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set
/// 4. OpenAI when `OPENAI_API_KEY` is set
/// 5. `ProviderFactory::from_env` auto-detection
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, Pdf2CsvError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_vision_provider("openai", config.model_or_default());
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2CsvError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {e}"
            ),
        })?;

    Ok(llm_provider)
}
