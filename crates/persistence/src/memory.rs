//! In-memory history store
//!
//! Used when ScyllaDB persistence is disabled or unreachable, and in tests.
//! History is lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use voice_tutor_core::{normalize_phone, AcademicLevel, Caller, Turn};

use crate::history::{HistoryStore, NewTurn};
use crate::PersistenceError;

#[derive(Default)]
pub struct InMemoryHistoryStore {
    callers: RwLock<HashMap<Uuid, Caller>>,
    phone_index: RwLock<HashMap<String, Uuid>>,
    /// Per caller, oldest first
    turns: RwLock<HashMap<Uuid, Vec<Turn>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total turns across all callers
    pub fn turn_count(&self) -> usize {
        self.turns.read().values().map(Vec::len).sum()
    }

    pub fn caller_count(&self) -> usize {
        self.callers.read().len()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn find_or_create_caller(&self, phone: &str) -> Result<Caller, PersistenceError> {
        let phone = normalize_phone(phone);

        let mut index = self.phone_index.write();
        if let Some(id) = index.get(&phone) {
            if let Some(caller) = self.callers.read().get(id) {
                return Ok(caller.clone());
            }
        }

        let caller = Caller::new(phone.clone());
        index.insert(phone, caller.id);
        self.callers.write().insert(caller.id, caller.clone());

        tracing::info!(caller_id = %caller.id, phone = %caller.phone_number, "Caller created");
        Ok(caller)
    }

    async fn get_caller(&self, caller_id: Uuid) -> Result<Option<Caller>, PersistenceError> {
        Ok(self.callers.read().get(&caller_id).cloned())
    }

    async fn find_caller_by_phone(&self, phone: &str) -> Result<Option<Caller>, PersistenceError> {
        let phone = normalize_phone(phone);
        let id = match self.phone_index.read().get(&phone) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.callers.read().get(&id).cloned())
    }

    async fn record_turn(&self, turn: NewTurn) -> Result<Turn, PersistenceError> {
        let mut callers = self.callers.write();
        let caller = callers
            .get_mut(&turn.caller_id)
            .ok_or_else(|| PersistenceError::NotFound(format!("caller {}", turn.caller_id)))?;

        let turn = turn.into_turn(Utc::now());
        caller.total_turns += 1;
        caller.updated_at = turn.created_at;

        self.turns
            .write()
            .entry(turn.caller_id)
            .or_default()
            .push(turn.clone());

        Ok(turn)
    }

    async fn recent_turns(&self, caller_id: Uuid, limit: usize) -> Result<Vec<Turn>, PersistenceError> {
        Ok(self
            .turns
            .read()
            .get(&caller_id)
            .map(|turns| turns.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn all_turns(&self, caller_id: Uuid) -> Result<Vec<Turn>, PersistenceError> {
        self.recent_turns(caller_id, usize::MAX).await
    }

    async fn update_preferred_level(
        &self,
        caller_id: Uuid,
        level: AcademicLevel,
    ) -> Result<(), PersistenceError> {
        let mut callers = self.callers.write();
        let caller = callers
            .get_mut(&caller_id)
            .ok_or_else(|| PersistenceError::NotFound(format!("caller {}", caller_id)))?;
        caller.preferred_level = level;
        caller.updated_at = Utc::now();
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_turn(caller: &Caller, level: AcademicLevel, question: &str, ms: u64) -> NewTurn {
        NewTurn {
            caller_id: caller.id,
            phone_number: caller.phone_number.clone(),
            level,
            question: question.to_string(),
            answer: format!("Answer: {}", question),
            audio_url: None,
            response_time_ms: ms,
        }
    }

    #[tokio::test]
    async fn test_find_or_create_normalizes_phone() {
        let store = InMemoryHistoryStore::new();
        let first = store.find_or_create_caller("+91 98765-43210").await.unwrap();
        let second = store.find_or_create_caller("+919876543210").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.phone_number, "+919876543210");
        assert_eq!(store.caller_count(), 1);
        assert!(store.find_caller_by_phone("+91-98765 43210").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_record_turn_increments_count() {
        let store = InMemoryHistoryStore::new();
        let caller = store.find_or_create_caller("+15550001").await.unwrap();

        let turn = store
            .record_turn(new_turn(&caller, AcademicLevel::HigherSecondary, "What is Newton's second law?", 900))
            .await
            .unwrap();

        assert_eq!(turn.level.code(), "3");
        let caller = store.get_caller(caller.id).await.unwrap().unwrap();
        assert_eq!(caller.total_turns, 1);
        assert_eq!(store.turn_count(), 1);
    }

    #[tokio::test]
    async fn test_record_turn_unknown_caller() {
        let store = InMemoryHistoryStore::new();
        let ghost = Caller::new("+1");
        let err = store
            .record_turn(new_turn(&ghost, AcademicLevel::Primary, "q", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_recent_turns_newest_first() {
        let store = InMemoryHistoryStore::new();
        let caller = store.find_or_create_caller("+15550002").await.unwrap();
        for i in 0..7 {
            store
                .record_turn(new_turn(&caller, AcademicLevel::Arts, &format!("q{}", i), 10))
                .await
                .unwrap();
        }

        let recent = store.recent_turns(caller.id, 3).await.unwrap();
        let questions: Vec<_> = recent.iter().map(|t| t.question.as_str()).collect();
        assert_eq!(questions, vec!["q6", "q5", "q4"]);
    }

    #[tokio::test]
    async fn test_recent_context_is_chronological_and_bounded() {
        let store = InMemoryHistoryStore::new();
        let caller = store.find_or_create_caller("+15550003").await.unwrap();
        for i in 0..8 {
            store
                .record_turn(new_turn(&caller, AcademicLevel::Engineering, &format!("q{}", i), 10))
                .await
                .unwrap();
        }
        store
            .update_preferred_level(caller.id, AcademicLevel::Engineering)
            .await
            .unwrap();

        let context = store.recent_context(caller.id, 5).await;
        assert_eq!(context.recent_questions, vec!["q3", "q4", "q5", "q6", "q7"]);
        assert_eq!(context.total_turns, 8);
        assert_eq!(context.preferred_level, Some(AcademicLevel::Engineering));
    }

    #[tokio::test]
    async fn test_recent_context_unknown_caller_is_empty() {
        let store = InMemoryHistoryStore::new();
        let context = store.recent_context(Uuid::new_v4(), 5).await;
        assert!(context.is_empty());
        assert_eq!(context.total_turns, 0);
    }

    #[tokio::test]
    async fn test_turns_isolated_per_caller() {
        let store = InMemoryHistoryStore::new();
        let a = store.find_or_create_caller("+1111").await.unwrap();
        let b = store.find_or_create_caller("+2222").await.unwrap();
        store.record_turn(new_turn(&a, AcademicLevel::Primary, "a-q", 1)).await.unwrap();

        assert!(store.recent_context(b.id, 5).await.is_empty());
        assert!(store.recent_turns_by_phone("+2222", 10).await.unwrap().is_empty());
        assert_eq!(store.recent_turns_by_phone("+1 111", 10).await.unwrap().len(), 1);
        assert!(store.recent_turns_by_phone("+9999", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_caller_stats_reduce() {
        let store = InMemoryHistoryStore::new();
        let caller = store.find_or_create_caller("+15550004").await.unwrap();
        store.record_turn(new_turn(&caller, AcademicLevel::Medical, "a", 100)).await.unwrap();
        store.record_turn(new_turn(&caller, AcademicLevel::Medical, "b", 300)).await.unwrap();
        store.record_turn(new_turn(&caller, AcademicLevel::Commerce, "c", 200)).await.unwrap();

        let stats = store.caller_stats("+15550004").await.unwrap().unwrap();
        assert_eq!(stats.total_conversations, 3);
        assert_eq!(stats.level_usage[0].level, AcademicLevel::Medical);
        assert_eq!(stats.level_usage[0].count, 2);
        assert!((stats.avg_response_time_ms - 200.0).abs() < f64::EPSILON);

        assert!(store.caller_stats("+0000").await.unwrap().is_none());
    }
}
