//! ScyllaDB schema creation

use crate::error::PersistenceError;
use scylla::Session;

/// Create the keyspace if it doesn't exist
pub async fn create_keyspace(
    session: &Session,
    keyspace: &str,
    replication_factor: u8,
) -> Result<(), PersistenceError> {
    let query = format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
        keyspace, replication_factor
    );

    session
        .query_unpaged(query, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create keyspace: {}", e)))?;

    Ok(())
}

/// Create all required tables
pub async fn create_tables(session: &Session, keyspace: &str) -> Result<(), PersistenceError> {
    // Callers, keyed by id
    let callers_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.callers (
            caller_id UUID,
            phone_number TEXT,
            display_name TEXT,
            preferred_level TEXT,
            total_turns BIGINT,
            created_at_ms BIGINT,
            updated_at_ms BIGINT,
            PRIMARY KEY (caller_id)
        )
    "#,
        keyspace
    );

    session
        .query_unpaged(callers_table, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create callers table: {}", e)))?;

    // Normalized phone number -> caller id
    let phone_index_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.caller_phone_index (
            phone_number TEXT,
            caller_id UUID,
            PRIMARY KEY (phone_number)
        )
    "#,
        keyspace
    );

    session
        .query_unpaged(phone_index_table, &[])
        .await
        .map_err(|e| {
            PersistenceError::SchemaError(format!("Failed to create caller_phone_index table: {}", e))
        })?;

    // Append-only turn history, newest first within a caller partition
    let turns_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.turns (
            caller_id UUID,
            created_at_ms BIGINT,
            turn_id UUID,
            phone_number TEXT,
            level TEXT,
            question TEXT,
            answer TEXT,
            audio_url TEXT,
            response_time_ms BIGINT,
            PRIMARY KEY ((caller_id), created_at_ms, turn_id)
        ) WITH CLUSTERING ORDER BY (created_at_ms DESC, turn_id ASC)
    "#,
        keyspace
    );

    session
        .query_unpaged(turns_table, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create turns table: {}", e)))?;

    tracing::info!("All ScyllaDB tables created");
    Ok(())
}
