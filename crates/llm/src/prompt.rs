//! Prompt Building
//!
//! Constructs the tutor system prompt for an academic level and replays
//! bounded conversation history as prior message turns.

use serde::{Deserialize, Serialize};
use std::fmt;

use voice_tutor_config::HistoryConfig;
use voice_tutor_core::{AcademicLevel, GenerationContext};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Limits on how much history reaches the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryBounds {
    /// Most recent turns replayed as messages
    pub max_turns: usize,
    /// Most recent pairs summarized in the system prompt
    pub prompt_pairs: usize,
    /// Prior answers are cut to this many characters
    pub answer_preview_chars: usize,
}

impl Default for HistoryBounds {
    fn default() -> Self {
        Self::from(&HistoryConfig::default())
    }
}

impl From<&HistoryConfig> for HistoryBounds {
    fn from(config: &HistoryConfig) -> Self {
        Self {
            max_turns: config.context_turns,
            prompt_pairs: config.prompt_pairs,
            answer_preview_chars: config.answer_preview_chars,
        }
    }
}

/// Cut `text` to `max_chars` characters, marking the cut with "..."
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Prompt builder for one academic level
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    level: AcademicLevel,
    bounds: HistoryBounds,
}

impl PromptBuilder {
    pub fn new(level: AcademicLevel) -> Self {
        Self {
            level,
            bounds: HistoryBounds::default(),
        }
    }

    pub fn with_bounds(mut self, bounds: HistoryBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Build the system prompt, summarizing recent pairs when context is present
    pub fn system_prompt(&self, context: Option<&GenerationContext>) -> String {
        let category = self.level.category();

        let mut prompt = format!(
            r#"You are GuruCall, an AI-powered voice tutor that helps students learn through phone calls.

## Your Role:
{role}

## Response Guidelines:
1. Keep responses concise but complete (ideal for voice playback)
2. Structure your answer clearly with main points
3. Use natural, conversational language suitable for audio
4. Avoid using special characters, markdown, or formatting
5. Aim for responses under 200 words for quick delivery
6. Be accurate and educational while being engaging

## Current Education Level: {name} ({description})
## Tone: {tone}"#,
            role = category.prompt,
            name = category.name,
            description = category.description,
            tone = category.tone,
        );

        let pairs = self.recent_pairs(context, self.bounds.prompt_pairs);
        if !pairs.is_empty() {
            prompt.push_str("\n\n## Recent Conversation History (for context):");
            for (i, (question, answer)) in pairs.iter().enumerate() {
                prompt.push_str(&format!("\nPrevious Q{}: {}", i + 1, question));
                if let Some(answer) = answer {
                    prompt.push_str(&format!(
                        "\nPrevious A{}: {}",
                        i + 1,
                        truncate_preview(answer, self.bounds.answer_preview_chars)
                    ));
                }
            }
            prompt.push_str("\n\nUse this history to provide continuity and avoid repetition.");
        }

        prompt
    }

    /// Full message list: system prompt, replayed turns, then the question
    pub fn build(&self, question: &str, context: Option<&GenerationContext>) -> Vec<Message> {
        let mut messages = vec![Message::system(self.system_prompt(context))];

        for (q, a) in self.recent_pairs(context, self.bounds.max_turns) {
            messages.push(Message::user(q));
            if let Some(a) = a {
                messages.push(Message::assistant(truncate_preview(
                    a,
                    self.bounds.answer_preview_chars,
                )));
            }
        }

        messages.push(Message::user(format!("Student's Question: {}", question)));
        messages
    }

    /// The newest `n` pairs, oldest first
    fn recent_pairs<'a>(
        &self,
        context: Option<&'a GenerationContext>,
        n: usize,
    ) -> Vec<(&'a str, Option<&'a str>)> {
        let Some(context) = context else {
            return Vec::new();
        };
        let pairs: Vec<_> = context.pairs().collect();
        let skip = pairs.len().saturating_sub(n);
        pairs.into_iter().skip(skip).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(n: usize, answer_len: usize) -> GenerationContext {
        GenerationContext {
            recent_questions: (0..n).map(|i| format!("question {}", i)).collect(),
            recent_answers: (0..n).map(|i| format!("{}{}", i, "x".repeat(answer_len))).collect(),
            preferred_level: None,
            total_turns: n as u64,
        }
    }

    #[test]
    fn test_system_prompt_level_fields() {
        let prompt = PromptBuilder::new(AcademicLevel::HigherSecondary).system_prompt(None);
        assert!(prompt.starts_with("You are GuruCall"));
        assert!(prompt.contains("## Current Education Level: Class 11-12 (Higher Secondary)"));
        assert!(prompt.contains("## Tone: Academic & Conceptual"));
        assert!(!prompt.contains("Recent Conversation History"));
    }

    #[test]
    fn test_empty_context_has_no_history() {
        let builder = PromptBuilder::new(AcademicLevel::Primary);
        let messages = builder.build("What is rain?", Some(&GenerationContext::empty()));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "Student's Question: What is rain?");
    }

    #[test]
    fn test_history_bounded_to_five_turns() {
        let builder = PromptBuilder::new(AcademicLevel::Engineering);
        let ctx = context(8, 10);
        let messages = builder.build("Next?", Some(&ctx));

        let replayed: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::User && m.content.starts_with("question"))
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(
            replayed,
            vec!["question 3", "question 4", "question 5", "question 6", "question 7"]
        );
        // system + 5 pairs + question
        assert_eq!(messages.len(), 1 + 10 + 1);
        assert_eq!(messages.last().unwrap().content, "Student's Question: Next?");
    }

    #[test]
    fn test_system_prompt_summarizes_recent_pairs() {
        let builder = PromptBuilder::new(AcademicLevel::Arts);
        let prompt = builder.system_prompt(Some(&context(5, 10)));
        assert!(prompt.contains("Previous Q1: question 2"));
        assert!(prompt.contains("Previous Q3: question 4"));
        assert!(!prompt.contains("question 1"));
        assert!(prompt.ends_with("Use this history to provide continuity and avoid repetition."));
    }

    #[test]
    fn test_answers_never_untruncated() {
        let builder = PromptBuilder::new(AcademicLevel::Medical);
        let ctx = context(5, 400);
        let messages = builder.build("q", Some(&ctx));

        for answer in &ctx.recent_answers {
            for m in &messages {
                assert!(!m.content.contains(answer.as_str()));
            }
        }
        for m in messages.iter().filter(|m| m.role == Role::Assistant) {
            assert_eq!(m.content.chars().count(), 103);
            assert!(m.content.ends_with("..."));
        }
    }

    #[test]
    fn test_truncate_preview() {
        assert_eq!(truncate_preview("short", 100), "short");
        assert_eq!(truncate_preview("abcdef", 3), "abc...");
        assert_eq!(truncate_preview("नमस्ते दुनिया", 4), "नमस्...");
        assert_eq!(truncate_preview("exact", 5), "exact");
    }
}
