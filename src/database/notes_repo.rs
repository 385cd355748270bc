// Notes repository for NoteInsight
// Handles CRUD operations for voice notes

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::Note;
use super::DatabaseManager;

impl DatabaseManager {
    /// Create a new note
    pub fn create_note(&self, note: &Note) -> Result<String> {
        self.with_connection(|conn| create_note_impl(conn, note))
    }

    /// Get a note by ID
    pub fn get_note(&self, id: &str) -> Result<Option<Note>> {
        self.with_connection(|conn| get_note_impl(conn, id))
    }

    /// Get all notes, most recently updated first
    pub fn list_notes(&self, limit: Option<i64>) -> Result<Vec<Note>> {
        self.with_connection(|conn| list_notes_impl(conn, limit))
    }

    /// Rename a note
    pub fn rename_note(&self, id: &str, title: &str) -> Result<()> {
        self.with_connection(|conn| rename_note_impl(conn, id, title))
    }

    /// Delete a note (segments cascade)
    pub fn delete_note(&self, id: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM notes WHERE id = ?1", params![id])
                .context("Failed to delete note")?;
            Ok(())
        })
    }

    /// Bump a note's updated_at to now
    pub fn touch_note(&self, id: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "UPDATE notes SET updated_at = ?1 WHERE id = ?2",
                params![chrono::Utc::now().timestamp_millis(), id],
            )
            .context("Failed to touch note")?;
            Ok(())
        })
    }

    /// Record the language the final transcription resolved to
    pub fn update_note_language_lock(&self, id: &str, language_lock: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "UPDATE notes SET language_lock = ?1, updated_at = ?2 WHERE id = ?3",
                params![language_lock, chrono::Utc::now().timestamp_millis(), id],
            )
            .context("Failed to update language lock")?;
            Ok(())
        })
    }

    /// Record the outcome of a finished recording session. Called only after
    /// the WAV writer has finalized the file at `audio_path`.
    pub fn complete_note(
        &self,
        id: &str,
        duration_ms: i64,
        audio_path: &str,
        language_lock: &str,
        asr_model: &str,
    ) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                r#"
                UPDATE notes
                SET duration_ms = ?1, audio_path = ?2, language_lock = ?3,
                    asr_model = ?4, updated_at = ?5
                WHERE id = ?6
                "#,
                params![
                    duration_ms,
                    audio_path,
                    language_lock,
                    asr_model,
                    chrono::Utc::now().timestamp_millis(),
                    id,
                ],
            )
            .context("Failed to complete note")?;
            Ok(())
        })
    }
}

fn create_note_impl(conn: &Connection, note: &Note) -> Result<String> {
    conn.execute(
        r#"
        INSERT INTO notes (
            id, created_at, updated_at, title, duration_ms,
            language_lock, audio_path, asr_model, llm_model, insights_status
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            note.id,
            note.created_at,
            note.updated_at,
            note.title,
            note.duration_ms,
            note.language_lock,
            note.audio_path,
            note.asr_model,
            note.llm_model,
            note.insights_status,
        ],
    )
    .context("Failed to create note")?;

    Ok(note.id.clone())
}

fn get_note_impl(conn: &Connection, id: &str) -> Result<Option<Note>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT id, created_at, updated_at, title, duration_ms,
                   language_lock, audio_path, asr_model, llm_model, insights_status
            FROM notes WHERE id = ?1
            "#,
        )
        .context("Failed to prepare get_note query")?;

    let note = stmt
        .query_row(params![id], row_to_note)
        .optional()
        .context("Failed to query note")?;

    Ok(note)
}

fn list_notes_impl(conn: &Connection, limit: Option<i64>) -> Result<Vec<Note>> {
    let sql = r#"
        SELECT id, created_at, updated_at, title, duration_ms,
               language_lock, audio_path, asr_model, llm_model, insights_status
        FROM notes ORDER BY updated_at DESC
    "#;

    let mut notes = Vec::new();
    let mut push_rows = |stmt: &mut rusqlite::Statement| -> Result<()> {
        let rows = stmt
            .query_map([], row_to_note)
            .context("Failed to query notes")?;
        for row in rows {
            notes.push(row.context("Failed to read note row")?);
        }
        Ok(())
    };

    match limit {
        Some(limit) => {
            let mut stmt = conn
                .prepare(&format!("{} LIMIT {}", sql, limit))
                .context("Failed to prepare list_notes query")?;
            push_rows(&mut stmt)?;
        }
        None => {
            let mut stmt = conn.prepare(sql).context("Failed to prepare list_notes query")?;
            push_rows(&mut stmt)?;
        }
    }

    Ok(notes)
}

fn rename_note_impl(conn: &Connection, id: &str, title: &str) -> Result<()> {
    conn.execute(
        "UPDATE notes SET title = ?1, updated_at = ?2 WHERE id = ?3",
        params![title, chrono::Utc::now().timestamp_millis(), id],
    )
    .context("Failed to rename note")?;
    Ok(())
}

fn row_to_note(row: &rusqlite::Row) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        title: row.get(3)?,
        duration_ms: row.get(4)?,
        language_lock: row.get(5)?,
        audio_path: row.get(6)?,
        asr_model: row.get(7)?,
        llm_model: row.get(8)?,
        insights_status: row.get(9)?,
    })
}
