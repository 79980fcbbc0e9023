//! Caller and turn history
//!
//! `HistoryStore` is the session/history contract used by the call flow and
//! the web API. Callers are looked up by normalized phone number; turns are
//! append-only and read back newest first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::frame::response::result::{CqlValue, Row};
use uuid::Uuid;

use voice_tutor_core::{normalize_phone, AcademicLevel, Caller, CallerStats, GenerationContext, Turn};

use crate::{PersistenceError, ScyllaClient};

/// Input for a new turn record
#[derive(Debug, Clone)]
pub struct NewTurn {
    pub caller_id: Uuid,
    pub phone_number: String,
    pub level: AcademicLevel,
    pub question: String,
    pub answer: String,
    pub audio_url: Option<String>,
    pub response_time_ms: u64,
}

impl NewTurn {
    pub(crate) fn into_turn(self, created_at: DateTime<Utc>) -> Turn {
        Turn {
            id: Uuid::new_v4(),
            caller_id: self.caller_id,
            phone_number: self.phone_number,
            level: self.level,
            question: self.question,
            answer: self.answer,
            audio_url: self.audio_url,
            response_time_ms: self.response_time_ms,
            created_at,
        }
    }
}

/// Session/history store
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Look up the caller for `phone`, creating one on first contact
    async fn find_or_create_caller(&self, phone: &str) -> Result<Caller, PersistenceError>;

    async fn get_caller(&self, caller_id: Uuid) -> Result<Option<Caller>, PersistenceError>;

    async fn find_caller_by_phone(&self, phone: &str) -> Result<Option<Caller>, PersistenceError>;

    /// Append a turn and bump the caller's turn count
    async fn record_turn(&self, turn: NewTurn) -> Result<Turn, PersistenceError>;

    /// Most recent turns, newest first
    async fn recent_turns(&self, caller_id: Uuid, limit: usize) -> Result<Vec<Turn>, PersistenceError>;

    /// Every turn of a caller, newest first
    async fn all_turns(&self, caller_id: Uuid) -> Result<Vec<Turn>, PersistenceError>;

    async fn update_preferred_level(
        &self,
        caller_id: Uuid,
        level: AcademicLevel,
    ) -> Result<(), PersistenceError>;

    /// Backend label for health reporting
    fn backend_name(&self) -> &'static str;

    /// Recent turns for a phone number; unknown numbers have no history
    async fn recent_turns_by_phone(
        &self,
        phone: &str,
        limit: usize,
    ) -> Result<Vec<Turn>, PersistenceError> {
        match self.find_caller_by_phone(phone).await? {
            Some(caller) => self.recent_turns(caller.id, limit).await,
            None => Ok(Vec::new()),
        }
    }

    /// Usage statistics, reduced from the caller's turns
    async fn caller_stats(&self, phone: &str) -> Result<Option<CallerStats>, PersistenceError> {
        let Some(caller) = self.find_caller_by_phone(phone).await? else {
            return Ok(None);
        };
        let turns = self.all_turns(caller.id).await?;
        Ok(Some(CallerStats::from_turns(caller, &turns)))
    }

    /// Generation context in chronological order
    ///
    /// Never fails: a storage error yields an empty context.
    async fn recent_context(&self, caller_id: Uuid, limit: usize) -> GenerationContext {
        let turns = match self.recent_turns(caller_id, limit).await {
            Ok(turns) => turns,
            Err(e) => {
                tracing::warn!(caller_id = %caller_id, error = %e, "Context fetch failed, continuing without history");
                return GenerationContext::empty();
            }
        };

        let caller = match self.get_caller(caller_id).await {
            Ok(caller) => caller,
            Err(e) => {
                tracing::warn!(caller_id = %caller_id, error = %e, "Caller lookup failed while building context");
                None
            }
        };

        let total = caller
            .as_ref()
            .map(|c| c.total_turns)
            .unwrap_or(turns.len() as u64);
        let mut context = GenerationContext::from_turns(turns.iter().rev(), limit, total);
        if let Some(caller) = caller {
            context.preferred_level = Some(caller.preferred_level);
        }
        context
    }
}

/// ScyllaDB implementation of the history store
#[derive(Clone)]
pub struct ScyllaHistoryStore {
    client: ScyllaClient,
}

type CallerRow = (Uuid, String, Option<String>, Option<String>, Option<i64>, i64, i64);
type TurnRow = (Uuid, Uuid, i64, String, String, String, String, Option<String>, i64);

const CALLER_COLUMNS: &str =
    "caller_id, phone_number, display_name, preferred_level, total_turns, created_at_ms, updated_at_ms";
const TURN_COLUMNS: &str =
    "turn_id, caller_id, created_at_ms, phone_number, level, question, answer, audio_url, response_time_ms";

impl ScyllaHistoryStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    fn row_to_caller(row: scylla::frame::response::result::Row) -> Result<Caller, PersistenceError> {
        let (id, phone_number, display_name, preferred_level, total_turns, created_at, updated_at): CallerRow = row
            .into_typed()
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

        Ok(Caller {
            id,
            phone_number,
            display_name,
            preferred_level: AcademicLevel::resolve(preferred_level.as_deref()),
            total_turns: total_turns.unwrap_or(0).max(0) as u64,
            created_at: DateTime::from_timestamp_millis(created_at).unwrap_or_else(Utc::now),
            updated_at: DateTime::from_timestamp_millis(updated_at).unwrap_or_else(Utc::now),
        })
    }

    fn row_to_turn(row: scylla::frame::response::result::Row) -> Result<Turn, PersistenceError> {
        let (id, caller_id, created_at, phone_number, level, question, answer, audio_url, response_time_ms): TurnRow =
            row.into_typed()
                .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

        Ok(Turn {
            id,
            caller_id,
            phone_number,
            level: AcademicLevel::resolve(Some(&level)),
            question,
            answer,
            audio_url,
            response_time_ms: response_time_ms.max(0) as u64,
            created_at: DateTime::from_timestamp_millis(created_at).unwrap_or_else(Utc::now),
        })
    }

    /// Write the caller row, then claim the phone number
    ///
    /// Returns `false` when another caller already holds the number; the
    /// row written here is removed again.
    async fn insert_caller(&self, caller: &Caller) -> Result<bool, PersistenceError> {
        let query = format!(
            "INSERT INTO {}.callers ({}) VALUES (?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace(),
            CALLER_COLUMNS
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (
                    caller.id,
                    &caller.phone_number,
                    &caller.display_name,
                    caller.preferred_level.code(),
                    caller.total_turns as i64,
                    caller.created_at.timestamp_millis(),
                    caller.updated_at.timestamp_millis(),
                ),
            )
            .await?;

        let index = format!(
            "INSERT INTO {}.caller_phone_index (phone_number, caller_id) VALUES (?, ?) IF NOT EXISTS",
            self.client.keyspace()
        );
        let claim = self
            .client
            .session()
            .query_unpaged(index, (&caller.phone_number, caller.id))
            .await?;

        if lwt_applied(claim.rows.as_deref()) {
            return Ok(true);
        }

        let orphan = format!("DELETE FROM {}.callers WHERE caller_id = ?", self.client.keyspace());
        if let Err(e) = self.client.session().query_unpaged(orphan, (caller.id,)).await {
            tracing::warn!(caller_id = %caller.id, error = %e, "Failed to remove losing caller row");
        }
        Ok(false)
    }

    async fn select_turns(&self, caller_id: Uuid, limit: Option<usize>) -> Result<Vec<Turn>, PersistenceError> {
        let result = match limit {
            Some(limit) => {
                let query = format!(
                    "SELECT {} FROM {}.turns WHERE caller_id = ? LIMIT ?",
                    TURN_COLUMNS,
                    self.client.keyspace()
                );
                self.client
                    .session()
                    .query_unpaged(query, (caller_id, limit.min(i32::MAX as usize) as i32))
                    .await?
            }
            None => {
                let query = format!(
                    "SELECT {} FROM {}.turns WHERE caller_id = ?",
                    TURN_COLUMNS,
                    self.client.keyspace()
                );
                self.client.session().query_unpaged(query, (caller_id,)).await?
            }
        };

        let mut turns = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                turns.push(Self::row_to_turn(row)?);
            }
        }
        Ok(turns)
    }
}

/// `[applied]` flag of a conditional write's result
fn lwt_applied(rows: Option<&[Row]>) -> bool {
    rows.and_then(|rows| rows.first())
        .and_then(|row| row.columns.first())
        .and_then(Option::as_ref)
        .and_then(CqlValue::as_boolean)
        .unwrap_or(false)
}

#[async_trait]
impl HistoryStore for ScyllaHistoryStore {
    async fn find_or_create_caller(&self, phone: &str) -> Result<Caller, PersistenceError> {
        if let Some(caller) = self.find_caller_by_phone(phone).await? {
            return Ok(caller);
        }

        let caller = Caller::new(normalize_phone(phone));
        if self.insert_caller(&caller).await? {
            tracing::info!(caller_id = %caller.id, phone = %caller.phone_number, "Caller created in ScyllaDB");
            return Ok(caller);
        }

        // A concurrent call from the same number created the caller first
        tracing::debug!(phone = %caller.phone_number, "Caller created concurrently, using existing row");
        self.find_caller_by_phone(phone)
            .await?
            .ok_or_else(|| PersistenceError::NotFound(format!("caller for {}", caller.phone_number)))
    }

    async fn get_caller(&self, caller_id: Uuid) -> Result<Option<Caller>, PersistenceError> {
        let query = format!(
            "SELECT {} FROM {}.callers WHERE caller_id = ?",
            CALLER_COLUMNS,
            self.client.keyspace()
        );
        let result = self.client.session().query_unpaged(query, (caller_id,)).await?;

        if let Some(rows) = result.rows {
            if let Some(row) = rows.into_iter().next() {
                return Ok(Some(Self::row_to_caller(row)?));
            }
        }
        Ok(None)
    }

    async fn find_caller_by_phone(&self, phone: &str) -> Result<Option<Caller>, PersistenceError> {
        let phone = normalize_phone(phone);
        let query = format!(
            "SELECT caller_id FROM {}.caller_phone_index WHERE phone_number = ?",
            self.client.keyspace()
        );
        let result = self.client.session().query_unpaged(query, (&phone,)).await?;

        let caller_id = match result.rows.and_then(|rows| rows.into_iter().next()) {
            Some(row) => {
                let (id,): (Uuid,) = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
                id
            }
            None => return Ok(None),
        };

        self.get_caller(caller_id).await
    }

    async fn record_turn(&self, turn: NewTurn) -> Result<Turn, PersistenceError> {
        let turn = turn.into_turn(Utc::now());

        let query = format!(
            "INSERT INTO {}.turns ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace(),
            TURN_COLUMNS
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (
                    turn.id,
                    turn.caller_id,
                    turn.created_at.timestamp_millis(),
                    &turn.phone_number,
                    turn.level.code(),
                    &turn.question,
                    &turn.answer,
                    &turn.audio_url,
                    turn.response_time_ms as i64,
                ),
            )
            .await?;

        // Read-modify-write; concurrent turns for one caller may undercount.
        let caller = self
            .get_caller(turn.caller_id)
            .await?
            .ok_or_else(|| PersistenceError::NotFound(format!("caller {}", turn.caller_id)))?;

        let update = format!(
            "UPDATE {}.callers SET total_turns = ?, updated_at_ms = ? WHERE caller_id = ?",
            self.client.keyspace()
        );
        self.client
            .session()
            .query_unpaged(
                update,
                (
                    caller.total_turns as i64 + 1,
                    Utc::now().timestamp_millis(),
                    turn.caller_id,
                ),
            )
            .await?;

        tracing::debug!(turn_id = %turn.id, caller_id = %turn.caller_id, level = %turn.level, "Turn recorded");
        Ok(turn)
    }

    async fn recent_turns(&self, caller_id: Uuid, limit: usize) -> Result<Vec<Turn>, PersistenceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.select_turns(caller_id, Some(limit)).await
    }

    async fn all_turns(&self, caller_id: Uuid) -> Result<Vec<Turn>, PersistenceError> {
        self.select_turns(caller_id, None).await
    }

    async fn update_preferred_level(
        &self,
        caller_id: Uuid,
        level: AcademicLevel,
    ) -> Result<(), PersistenceError> {
        let query = format!(
            "UPDATE {}.callers SET preferred_level = ?, updated_at_ms = ? WHERE caller_id = ?",
            self.client.keyspace()
        );
        self.client
            .session()
            .query_unpaged(query, (level.code(), Utc::now().timestamp_millis(), caller_id))
            .await?;

        tracing::debug!(caller_id = %caller_id, level = %level, "Preferred level updated");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "scylladb"
    }
}
