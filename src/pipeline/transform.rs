//! LLM rewrite of extracted text.
//!
//! [`TextTransformer`] combines the rules and the text into one prompt
//! ([`crate::prompts::build_prompt`]), makes exactly one bounded call through
//! a [`TextGenerator`], and maps the answer onto [`TransformResult`].
//! [`LlmGenerator`] is the production generator over an
//! `edgequake_llm::LLMProvider`.

use super::postprocess::clean_output;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::output::TransformResult;
use crate::prompts::build_prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Provider tokens that identify a content-policy refusal in an error.
/// Plain words like "blocked" also appear in proxy and billing errors.
const BLOCKED_MARKERS: &[&str] = &[
    "content_filter",
    "content_policy",
    "SAFETY",
    "PROHIBITED_CONTENT",
];

/// What the service answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    Text(String),
    /// Refused on content-policy grounds.
    Blocked { reason: String },
    /// Answered, but with no content.
    Empty,
}

/// The call itself did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("{0}")]
    Service(String),
}

/// A generative text service bound to a model and credentials.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError>;
}

// ── LLM generator ────────────────────────────────────────────────────────

/// [`TextGenerator`] over an `edgequake_llm` provider.
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            options: CompletionOptions {
                temperature: Some(temperature),
                max_tokens: Some(max_tokens),
                ..Default::default()
            },
        }
    }

    /// Resolve the provider from `config` and wrap it.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let provider = resolve_provider(config)?;
        info!(
            "LLM provider resolved ({})",
            config.provider_name.as_deref().unwrap_or("auto")
        );
        Ok(Self::new(provider, config.temperature, config.max_tokens))
    }
}

#[async_trait]
impl TextGenerator for LlmGenerator {
    async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError> {
        let messages = vec![ChatMessage::user(prompt)];
        match self.provider.chat(&messages, Some(&self.options)).await {
            Ok(response) => {
                debug!(
                    "LLM: {} input tokens, {} output tokens",
                    response.prompt_tokens, response.completion_tokens
                );
                if response.content.trim().is_empty() {
                    Ok(Generation::Empty)
                } else {
                    Ok(Generation::Text(response.content))
                }
            }
            Err(e) => {
                let message = e.to_string();
                if is_blocked(&message) {
                    Ok(Generation::Blocked { reason: message })
                } else {
                    Err(GenerationError::Service(message))
                }
            }
        }
    }
}

fn is_blocked(message: &str) -> bool {
    BLOCKED_MARKERS.iter().any(|m| message.contains(m))
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PipelineError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. `config.provider`, used as-is.
/// 2. `config.provider_name` + `config.model` (default [`DEFAULT_MODEL`]).
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
/// 4. Gemini, when `GEMINI_API_KEY` is set.
/// 5. `ProviderFactory::from_env()` auto-detection.
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if std::env::var("GEMINI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider("gemini", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PipelineError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

// ── Transformer ──────────────────────────────────────────────────────────

/// Text + rules → [`TransformResult`].
pub struct TextTransformer {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl TextTransformer {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout_secs: u64) -> Self {
        Self {
            generator,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Rewrite `text` under `rules`. Whitespace-only text returns
    /// [`TransformResult::Empty`] without calling the service.
    pub async fn transform(&self, text: &str, rules: &str) -> TransformResult {
        if text.trim().is_empty() {
            return TransformResult::Empty;
        }
        if rules.trim().is_empty() {
            warn!("Rules are empty; sending text without instructions");
        }

        let prompt = build_prompt(rules, text);
        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.generator.generate(&prompt)).await;
        let elapsed = start.elapsed();

        match outcome {
            Err(_) => {
                warn!("LLM call timed out after {}s", self.timeout.as_secs());
                TransformResult::Failure {
                    reason: format!("LLM call timed out after {}s", self.timeout.as_secs()),
                }
            }
            Ok(Err(e)) => {
                warn!("LLM call failed after {:?}: {}", elapsed, e);
                TransformResult::Failure {
                    reason: e.to_string(),
                }
            }
            Ok(Ok(Generation::Blocked { reason })) => {
                warn!("LLM blocked the content: {}", reason);
                TransformResult::Blocked { reason }
            }
            Ok(Ok(Generation::Empty)) => TransformResult::Empty,
            Ok(Ok(Generation::Text(raw))) => {
                let text = clean_output(&raw);
                debug!(
                    "LLM returned {} chars ({} after cleanup) in {:?}",
                    raw.len(),
                    text.len(),
                    elapsed
                );
                if text.is_empty() {
                    TransformResult::Empty
                } else {
                    TransformResult::Success { text }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Scripted {
        reply: Result<Generation, GenerationError>,
        calls: AtomicUsize,
        last_prompt: Mutex<String>,
    }

    impl Scripted {
        fn new(reply: Result<Generation, GenerationError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(String::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = prompt.to_string();
            self.reply.clone()
        }
    }

    struct Slow;

    #[async_trait]
    impl TextGenerator for Slow {
        async fn generate(&self, _prompt: &str) -> Result<Generation, GenerationError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Generation::Empty)
        }
    }

    #[tokio::test]
    async fn empty_text_never_calls_service() {
        let gen = Scripted::new(Ok(Generation::Text("x".into())));
        let t = TextTransformer::new(gen.clone(), 5);
        assert_eq!(t.transform("", "rules").await, TransformResult::Empty);
        assert_eq!(t.transform(" \n\t", "rules").await, TransformResult::Empty);
        assert_eq!(gen.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn success_is_cleaned_and_prompt_carries_rules_and_text() {
        let gen = Scripted::new(Ok(Generation::Text("```\nنص مصحح\n```".into())));
        let t = TextTransformer::new(gen.clone(), 5);
        let r = t.transform("نص", "1. fix OCR").await;
        assert_eq!(r.text(), Some("نص مصحح"));
        assert_eq!(gen.calls.load(Ordering::SeqCst), 1);
        let prompt = gen.last_prompt.lock().unwrap().clone();
        assert!(prompt.contains("1. fix OCR") && prompt.contains("نص"));
    }

    #[tokio::test]
    async fn blocked_and_empty_and_failure_map_through() {
        let blocked = Scripted::new(Ok(Generation::Blocked {
            reason: "SAFETY".into(),
        }));
        let r = TextTransformer::new(blocked, 5).transform("x", "r").await;
        assert_eq!(r.reason(), Some("SAFETY"));

        let empty = Scripted::new(Ok(Generation::Text("  \u{200B} ".into())));
        let r = TextTransformer::new(empty, 5).transform("x", "r").await;
        assert_eq!(r, TransformResult::Empty);

        let failed = Scripted::new(Err(GenerationError::Service("429 quota".into())));
        let r = TextTransformer::new(failed.clone(), 5).transform("x", "r").await;
        assert_eq!(
            r,
            TransformResult::Failure {
                reason: "429 quota".into()
            }
        );
        assert_eq!(failed.calls.load(Ordering::SeqCst), 1, "no retries");
    }

    #[tokio::test]
    async fn slow_service_times_out_as_failure() {
        let t = TextTransformer::new(Arc::new(Slow), 1);
        let r = t.transform("x", "r").await;
        assert!(matches!(r, TransformResult::Failure { ref reason } if reason.contains("timed out")));
    }

    #[test]
    fn blocked_markers() {
        assert!(is_blocked("API error: content_filter triggered"));
        assert!(is_blocked("finish_reason: SAFETY"));
        assert!(is_blocked(r#"{"promptFeedback":{"blockReason":"PROHIBITED_CONTENT"}}"#));
        assert!(!is_blocked("connection reset by peer"));
        assert!(!is_blocked("request blocked by proxy"));
        assert!(!is_blocked("403: account blocked for billing"));
    }

    #[test]
    fn unknown_provider_name_is_not_configured() {
        let config = PipelineConfig::builder()
            .provider_name("no-such-provider")
            .build()
            .unwrap();
        match resolve_provider(&config) {
            Err(PipelineError::ProviderNotConfigured { provider, .. }) => {
                assert_eq!(provider, "no-such-provider")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("unknown provider must not resolve"),
        }
    }
}
