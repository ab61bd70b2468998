//! AI enhancement of manuscript spans.
//!
//! The orchestrator talks to one [`EnhancementCapability`]: a single async
//! method that turns an [`EnhancementRequest`] into an [`EnhancementResult`].
//! [`Enhancer::enhance_span`] issues exactly one call per span under a
//! timeout. Any failure degrades to the original text with the reason
//! recorded; enhancement never fails an invocation and is never retried.

pub mod prompt;
pub mod providers;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};

use thesisforge_shared::{AiProvider, ChapterType, Language, Result};

pub use providers::{ClaudeCapability, OpenAiCapability, UnavailableCapability, capability_for};

/// Which part of the manuscript a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum SpanKind {
    Abstract(Language),
    Keywords(Language),
    Summary(ChapterType),
}

impl std::fmt::Display for SpanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Abstract(lang) => write!(f, "abstract ({})", lang.as_str()),
            Self::Keywords(lang) => write!(f, "keywords ({})", lang.as_str()),
            Self::Summary(chapter) => write!(f, "summary ({chapter})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnhancementRequest {
    pub span: SpanKind,
    pub text: String,
    pub provider: AiProvider,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnhancementResult {
    pub enhanced_text: String,
    pub keywords: Vec<String>,
}

/// Something that can rewrite a span of text.
#[async_trait]
pub trait EnhancementCapability: Send + Sync {
    async fn enhance(&self, request: &EnhancementRequest) -> Result<EnhancementResult>;
}

/// What one span ended up as.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancementOutcome {
    pub span: SpanKind,
    pub text: String,
    pub keywords: Vec<String>,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EnhancementOutcome {
    fn degraded(span: SpanKind, text: String, reason: String) -> Self {
        Self {
            span,
            text,
            keywords: Vec::new(),
            degraded: true,
            reason: Some(reason),
        }
    }
}

/// Runs spans against a capability, one bounded call each.
#[derive(Clone)]
pub struct Enhancer {
    capability: Arc<dyn EnhancementCapability>,
    provider: AiProvider,
    timeout: Duration,
}

impl Enhancer {
    pub fn new(capability: Arc<dyn EnhancementCapability>, provider: AiProvider, timeout: Duration) -> Self {
        Self {
            capability,
            provider,
            timeout,
        }
    }

    pub fn provider(&self) -> AiProvider {
        self.provider
    }

    #[instrument(skip_all, fields(span = %span, provider = self.provider.as_str(), chars = text.len()))]
    pub async fn enhance_span(&self, span: SpanKind, text: &str) -> EnhancementOutcome {
        let request = EnhancementRequest {
            span,
            text: text.to_string(),
            provider: self.provider,
        };

        let result = tokio::time::timeout(self.timeout, self.capability.enhance(&request)).await;

        match result {
            Ok(Ok(result)) if matches!(span, SpanKind::Keywords(_)) && result.keywords.is_empty() => {
                let reason = "no keywords could be parsed from the completion".to_string();
                debug!(%reason, "enhancement degraded");
                EnhancementOutcome::degraded(span, request.text, reason)
            }
            Ok(Ok(result)) if !result.enhanced_text.trim().is_empty() => {
                debug!(keywords = result.keywords.len(), "span enhanced");
                EnhancementOutcome {
                    span,
                    text: result.enhanced_text,
                    keywords: result.keywords,
                    degraded: false,
                    reason: None,
                }
            }
            Ok(Ok(_)) => {
                let reason = "provider returned an empty completion".to_string();
                debug!(%reason, "enhancement degraded");
                EnhancementOutcome::degraded(span, request.text, reason)
            }
            Ok(Err(e)) => {
                let reason = e.to_string();
                debug!(%reason, "enhancement degraded");
                EnhancementOutcome::degraded(span, request.text, reason)
            }
            Err(_) => {
                let reason = format!("timed out after {}s", self.timeout.as_secs_f32());
                debug!(%reason, "enhancement degraded");
                EnhancementOutcome::degraded(span, request.text, reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use thesisforge_shared::ThesisForgeError;

    use super::*;

    struct Echo;

    #[async_trait]
    impl EnhancementCapability for Echo {
        async fn enhance(&self, request: &EnhancementRequest) -> Result<EnhancementResult> {
            Ok(EnhancementResult {
                enhanced_text: request.text.to_uppercase(),
                keywords: vec!["echo".into()],
            })
        }
    }

    struct Slow;

    #[async_trait]
    impl EnhancementCapability for Slow {
        async fn enhance(&self, _request: &EnhancementRequest) -> Result<EnhancementResult> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(EnhancementResult::default())
        }
    }

    struct Unparseable;

    #[async_trait]
    impl EnhancementCapability for Unparseable {
        async fn enhance(&self, request: &EnhancementRequest) -> Result<EnhancementResult> {
            Ok(prompt::interpret(request, "  \n ; , "))
        }
    }

    struct Failing(AtomicUsize);

    #[async_trait]
    impl EnhancementCapability for Failing {
        async fn enhance(&self, _request: &EnhancementRequest) -> Result<EnhancementResult> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(ThesisForgeError::Enhancement("rate limited".into()))
        }
    }

    const SPAN: SpanKind = SpanKind::Abstract(Language::English);

    #[tokio::test]
    async fn successful_call_returns_enhanced_text() {
        let enhancer = Enhancer::new(Arc::new(Echo), AiProvider::Claude, Duration::from_secs(1));
        let out = enhancer.enhance_span(SPAN, "abstract").await;
        assert!(!out.degraded);
        assert_eq!(out.text, "ABSTRACT");
        assert_eq!(out.keywords, vec!["echo"]);
    }

    #[tokio::test]
    async fn timeout_degrades_to_original_text() {
        let enhancer = Enhancer::new(Arc::new(Slow), AiProvider::Gpt4, Duration::from_millis(20));
        let out = enhancer.enhance_span(SPAN, "original").await;
        assert!(out.degraded);
        assert_eq!(out.text, "original");
        assert!(out.keywords.is_empty());
        assert!(out.reason.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn keyword_span_without_keywords_is_degraded() {
        let enhancer = Enhancer::new(Arc::new(Unparseable), AiProvider::Claude, Duration::from_secs(1));
        let out = enhancer
            .enhance_span(SpanKind::Keywords(Language::Indonesian), "judul dan abstrak")
            .await;
        assert!(out.degraded);
        assert_eq!(out.text, "judul dan abstrak");
        assert!(out.keywords.is_empty());
        assert!(out.reason.unwrap().contains("no keywords"));
    }

    #[tokio::test]
    async fn failures_are_not_retried() {
        let failing = Arc::new(Failing(AtomicUsize::new(0)));
        let enhancer = Enhancer::new(failing.clone(), AiProvider::Claude, Duration::from_secs(1));
        let out = enhancer.enhance_span(SPAN, "original").await;
        assert!(out.degraded);
        assert!(out.reason.unwrap().contains("rate limited"));
        assert_eq!(failing.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn span_kind_serializes_with_target() {
        let json = serde_json::to_string(&SpanKind::Summary(ChapterType::Methods)).unwrap();
        assert_eq!(json, r#"{"kind":"summary","target":"methods"}"#);
    }
}
