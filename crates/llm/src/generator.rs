//! Answer Generator
//!
//! `generate(question, level, context)` builds the level prompt, calls the
//! backend under the retry policy and falls back to one context-free call
//! when the context-aware strategy fails. Output is cleaned for playback.

use std::sync::Arc;
use std::time::Instant;

use voice_tutor_config::Settings;
use voice_tutor_core::{AcademicLevel, GenerationContext};

use crate::backend::LlmBackend;
use crate::prompt::{HistoryBounds, PromptBuilder};
use crate::retry::{with_retry, AttemptPlan, AttemptStrategy, RetryPolicy};
use crate::voice_text::clean_for_voice;
use crate::LlmError;

/// Generated answer ready for synthesis
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Cleaned answer text
    pub text: String,
    pub tokens_used: usize,
    /// Backend calls made across all strategies
    pub attempts: u32,
    /// True when the context-free fallback produced the answer
    pub used_fallback: bool,
    pub elapsed_ms: u64,
}

/// Context-aware answer generation with retry and fallback
pub struct AnswerGenerator {
    backend: Arc<dyn LlmBackend>,
    policy: RetryPolicy,
    bounds: HistoryBounds,
}

impl AnswerGenerator {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            policy: RetryPolicy::default(),
            bounds: HistoryBounds::default(),
        }
    }

    /// Build with retry and history bounds from settings
    pub fn from_settings(backend: Arc<dyn LlmBackend>, settings: &Settings) -> Self {
        Self::new(backend)
            .with_policy(RetryPolicy::from_settings(&settings.llm))
            .with_bounds(HistoryBounds::from(&settings.history))
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_bounds(mut self, bounds: HistoryBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// Generate an answer for `question` at `level`
    ///
    /// An empty context is treated like no context. If every strategy in the
    /// plan fails, the error of the last one is returned.
    pub async fn generate(
        &self,
        question: &str,
        level: AcademicLevel,
        context: Option<&GenerationContext>,
    ) -> Result<Answer, LlmError> {
        let start = Instant::now();
        let context = context.filter(|c| !c.is_empty());
        let plan = AttemptPlan::for_turn(context.is_some(), self.policy);
        let prompt = PromptBuilder::new(level).with_bounds(self.bounds);

        let mut attempts = 0u32;
        let mut last_error = None;

        for (index, (strategy, policy)) in plan.steps().iter().enumerate() {
            let messages = match strategy {
                AttemptStrategy::WithContext => prompt.build(question, context),
                AttemptStrategy::ContextFree => prompt.build(question, None),
            };

            if index > 0 {
                tracing::info!(
                    level = %level,
                    ?strategy,
                    "Attempting fallback without conversation context"
                );
            }

            let backend = self.backend.as_ref();
            let messages = &messages;
            let outcome = with_retry(*policy, |_| {
                attempts += 1;
                async move {
                    let result = backend.generate(messages).await?;
                    let text = clean_for_voice(&result.text);
                    if text.is_empty() {
                        return Err(LlmError::InvalidResponse("Empty completion".to_string()));
                    }
                    Ok((text, result.tokens))
                }
            })
            .await;

            match outcome {
                Ok((text, tokens_used)) => {
                    let elapsed_ms = start.elapsed().as_millis() as u64;
                    tracing::info!(
                        level = %level,
                        ?strategy,
                        attempts,
                        tokens_used,
                        elapsed_ms,
                        "Answer generated"
                    );
                    return Ok(Answer {
                        text,
                        tokens_used,
                        attempts,
                        used_fallback: index > 0,
                        elapsed_ms,
                    });
                }
                Err(e) => {
                    tracing::warn!(level = %level, ?strategy, error = %e, "Generation strategy failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::InvalidResponse("No generation strategy ran".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FinishReason, GenerationResult};
    use crate::prompt::{Message, Role};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::time::Instant as TokioInstant;

    /// Backend returning scripted outcomes and recording each call
    struct ScriptedBackend {
        script: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: Mutex<Vec<(TokioInstant, Vec<Message>)>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }

        fn has_history(messages: &[Message]) -> bool {
            messages.iter().any(|m| m.role == Role::Assistant)
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
            self.calls
                .lock()
                .push((TokioInstant::now(), messages.to_vec()));
            let next = self
                .script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::Api { status: 500, message: "script exhausted".into() }));
            next.map(|text| GenerationResult {
                text,
                tokens: 42,
                total_time_ms: 1,
                finish_reason: FinishReason::Stop,
            })
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn rate_limited() -> Result<String, LlmError> {
        Err(LlmError::RateLimited("429".into()))
    }

    fn context() -> GenerationContext {
        GenerationContext {
            recent_questions: vec!["What is force?".into()],
            recent_answers: vec!["A push or a pull.".into()],
            preferred_level: Some(AcademicLevel::HigherSecondary),
            total_turns: 1,
        }
    }

    fn generator(backend: Arc<ScriptedBackend>) -> AnswerGenerator {
        AnswerGenerator::new(backend).with_policy(RetryPolicy::new(3, Duration::from_millis(2000)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_twice_then_success() {
        let backend = ScriptedBackend::new(vec![
            rate_limited(),
            rate_limited(),
            Ok("**F = ma**".into()),
        ]);
        let answer = generator(backend.clone())
            .generate("What is Newton's second law?", AcademicLevel::HigherSecondary, Some(&context()))
            .await
            .unwrap();

        assert_eq!(answer.text, "F = ma");
        assert_eq!(answer.tokens_used, 42);
        assert_eq!(answer.attempts, 3);
        assert!(!answer.used_fallback);

        let calls = backend.calls.lock();
        assert_eq!(calls.len(), 3);
        let first_wait = calls[1].0 - calls[0].0;
        let second_wait = calls[2].0 - calls[1].0;
        assert!(first_wait < second_wait);
        assert_eq!(first_wait, Duration::from_millis(2000));
        assert_eq!(second_wait, Duration::from_millis(4000));
        assert!(calls.iter().all(|(_, m)| ScriptedBackend::has_history(m)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_context_triggers_one_fallback() {
        let backend = ScriptedBackend::new(vec![
            rate_limited(),
            rate_limited(),
            rate_limited(),
            Ok("Fallback answer".into()),
        ]);
        let answer = generator(backend.clone())
            .generate("q", AcademicLevel::Primary, Some(&context()))
            .await
            .unwrap();

        assert!(answer.used_fallback);
        assert_eq!(answer.attempts, 4);
        assert_eq!(answer.text, "Fallback answer");

        let calls = backend.calls.lock();
        assert_eq!(calls.len(), 4);
        assert!(!ScriptedBackend::has_history(&calls[3].1));
        assert!(!calls[3].1[0].content.contains("Recent Conversation History"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_failure_surfaces_generation_error() {
        let backend = ScriptedBackend::new(vec![
            Err(LlmError::Api { status: 400, message: "bad".into() }),
            rate_limited(),
        ]);
        let result = generator(backend.clone())
            .generate("q", AcademicLevel::Arts, Some(&context()))
            .await;

        // exactly one context-aware call (non-retryable) plus one fallback (no retry)
        assert_eq!(backend.call_count(), 2);
        assert!(matches!(result, Err(LlmError::RateLimited(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_context_has_no_fallback() {
        let backend = ScriptedBackend::new(vec![Err(LlmError::Api {
            status: 401,
            message: "invalid key".into(),
        })]);
        let result = generator(backend.clone())
            .generate("q", AcademicLevel::Commerce, None)
            .await;

        assert!(matches!(result, Err(LlmError::Api { status: 401, .. })));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_completion_is_failure() {
        let backend = ScriptedBackend::new(vec![Ok("  **  ".into())]);
        let result = generator(backend).generate("q", AcademicLevel::Medical, None).await;
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }
}
