// Database migrations for NoteInsight
// Creates and updates the database schema

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Current schema version
const SCHEMA_VERSION: i32 = 4;

/// Run all necessary migrations to bring the database up to date, then
/// verify the required tables actually exist.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    if current_version < 2 {
        migrate_v2(conn)?;
    }

    if current_version < 3 {
        migrate_v3(conn)?;
    }

    if current_version < 4 {
        migrate_v4(conn)?;
    }

    repair_schema(conn)?;

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    ).unwrap_or(false);

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT MAX(version) FROM schema_version",
        [],
        |row| row.get(0),
    ).unwrap_or(0);

    Ok(version)
}

/// Initial schema creation (version 1)
fn migrate_v1(conn: &Connection) -> Result<()> {
    log::info!("Running database migration v1");

    conn.execute_batch(r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Notes table: one row per recording session
        CREATE TABLE IF NOT EXISTS notes (
            id TEXT PRIMARY KEY NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            title TEXT NOT NULL,
            duration_ms INTEGER,
            audio_path TEXT
        );

        -- Segments table: transcribed phrases of a note
        CREATE TABLE IF NOT EXISTS segments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            note_id TEXT NOT NULL,
            start_ms INTEGER NOT NULL,
            end_ms INTEGER NOT NULL,
            text TEXT NOT NULL,
            is_final INTEGER NOT NULL DEFAULT 1,
            UNIQUE(note_id, start_ms, end_ms),
            FOREIGN KEY (note_id) REFERENCES notes(id) ON DELETE CASCADE
        );

        -- Index for ordered transcript reads
        CREATE INDEX IF NOT EXISTS idx_segments_note_start
        ON segments(note_id, start_ms);

        -- Record migration
        INSERT INTO schema_version (version) VALUES (1);
    "#).context("Failed to run migration v1")?;

    log::info!("Migration v1 completed successfully");
    Ok(())
}

/// Language support (version 2)
fn migrate_v2(conn: &Connection) -> Result<()> {
    log::info!("Running database migration v2 - Language tracking");

    conn.execute_batch(r#"
        -- Per-note language decision and per-segment language tag
        ALTER TABLE notes ADD COLUMN language_lock TEXT;
        ALTER TABLE segments ADD COLUMN lang TEXT;

        -- Record migration
        INSERT INTO schema_version (version) VALUES (2);
    "#).context("Failed to run migration v2")?;

    log::info!("Migration v2 completed successfully");
    Ok(())
}

/// Model tracking (version 3)
fn migrate_v3(conn: &Connection) -> Result<()> {
    log::info!("Running database migration v3 - Model tracking");

    conn.execute_batch(r#"
        -- Which models produced the transcript and insights
        ALTER TABLE notes ADD COLUMN asr_model TEXT;
        ALTER TABLE notes ADD COLUMN llm_model TEXT;

        -- Record migration
        INSERT INTO schema_version (version) VALUES (3);
    "#).context("Failed to run migration v3")?;

    log::info!("Migration v3 completed successfully");
    Ok(())
}

/// Insights pipeline status (version 4)
fn migrate_v4(conn: &Connection) -> Result<()> {
    log::info!("Running database migration v4 - Insights status");

    conn.execute_batch(r#"
        -- Opaque status consumed by the insights pipeline
        ALTER TABLE notes ADD COLUMN insights_status TEXT;

        -- Record migration
        INSERT INTO schema_version (version) VALUES (4);
    "#).context("Failed to run migration v4")?;

    log::info!("Migration v4 completed successfully");
    Ok(())
}

/// Verify every required table exists and recreate any that are missing.
/// Idempotent; a recreated table gets the current (v4) shape directly.
pub fn repair_schema(conn: &Connection) -> Result<()> {
    if !table_exists(conn, "notes")? {
        log::warn!("⚠️ Required table 'notes' missing after migration, recreating");
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                title TEXT NOT NULL,
                duration_ms INTEGER,
                audio_path TEXT,
                language_lock TEXT,
                asr_model TEXT,
                llm_model TEXT,
                insights_status TEXT
            );
        "#).context("Failed to recreate notes table")?;
    }

    if !table_exists(conn, "segments")? {
        log::warn!("⚠️ Required table 'segments' missing after migration, recreating");
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS segments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                note_id TEXT NOT NULL,
                start_ms INTEGER NOT NULL,
                end_ms INTEGER NOT NULL,
                text TEXT NOT NULL,
                is_final INTEGER NOT NULL DEFAULT 1,
                lang TEXT,
                UNIQUE(note_id, start_ms, end_ms),
                FOREIGN KEY (note_id) REFERENCES notes(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_segments_note_start
            ON segments(note_id, start_ms);
        "#).context("Failed to recreate segments table")?;
    }

    Ok(())
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
        [name],
        |row| row.get(0),
    ).context("Failed to query sqlite_master")?;
    Ok(exists)
}
