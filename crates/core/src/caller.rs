//! Caller and Turn records
//!
//! A `Caller` is identified by normalized phone number. `Turn`s are the
//! append-only question/answer history for one caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::level::AcademicLevel;

/// A phone-identified user of the tutor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
    pub id: Uuid,
    /// Normalized phone number
    pub phone_number: String,
    pub display_name: Option<String>,
    pub preferred_level: AcademicLevel,
    /// Completed turns across all calls
    #[serde(rename = "totalCalls")]
    pub total_turns: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Caller {
    /// New caller with default level and zero turns
    pub fn new(phone_number: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            phone_number: phone_number.into(),
            display_name: None,
            preferred_level: AcademicLevel::default(),
            total_turns: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One persisted question/answer exchange. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub id: Uuid,
    pub caller_id: Uuid,
    pub phone_number: String,
    #[serde(rename = "educationLevel")]
    pub level: AcademicLevel,
    pub question: String,
    pub answer: String,
    pub audio_url: Option<String>,
    /// Pipeline latency in milliseconds
    pub response_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// Bounded recent history fed to the answer generator
///
/// Questions and answers are index-aligned and in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationContext {
    pub recent_questions: Vec<String>,
    pub recent_answers: Vec<String>,
    pub preferred_level: Option<AcademicLevel>,
    pub total_turns: u64,
}

impl GenerationContext {
    /// Build from turns in chronological order, keeping the newest `limit`
    pub fn from_turns<'a, I>(turns: I, limit: usize, total_turns: u64) -> Self
    where
        I: IntoIterator<Item = &'a Turn>,
    {
        let turns: Vec<&Turn> = turns.into_iter().collect();
        let skip = turns.len().saturating_sub(limit);
        let kept = &turns[skip..];

        Self {
            recent_questions: kept.iter().map(|t| t.question.clone()).collect(),
            recent_answers: kept.iter().map(|t| t.answer.clone()).collect(),
            preferred_level: kept.last().map(|t| t.level),
            total_turns,
        }
    }

    /// Context with no prior turns
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.recent_questions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.recent_questions.len()
    }

    /// Question/answer pairs, oldest first
    pub fn pairs(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.recent_questions
            .iter()
            .enumerate()
            .map(move |(i, q)| (q.as_str(), self.recent_answers.get(i).map(String::as_str)))
    }
}

/// Per-level usage count for statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelUsage {
    pub level: AcademicLevel,
    pub count: u64,
}

/// Aggregated statistics for one caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerStats {
    pub caller: Caller,
    pub total_conversations: u64,
    /// Sorted by count, descending
    pub level_usage: Vec<LevelUsage>,
    pub avg_response_time_ms: f64,
}

impl CallerStats {
    /// Reduce a caller's turns into statistics
    pub fn from_turns(caller: Caller, turns: &[Turn]) -> Self {
        let mut counts: Vec<LevelUsage> = Vec::new();
        for turn in turns {
            match counts.iter_mut().find(|u| u.level == turn.level) {
                Some(usage) => usage.count += 1,
                None => counts.push(LevelUsage { level: turn.level, count: 1 }),
            }
        }
        counts.sort_by(|a, b| b.count.cmp(&a.count).then(a.level.digit().cmp(&b.level.digit())));

        let avg = if turns.is_empty() {
            0.0
        } else {
            turns.iter().map(|t| t.response_time_ms as f64).sum::<f64>() / turns.len() as f64
        };

        Self {
            caller,
            total_conversations: turns.len() as u64,
            level_usage: counts,
            avg_response_time_ms: avg,
        }
    }
}
