// Segments repository for NoteInsight
// Handles persistence of final transcript segments

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use super::models::{NewSegment, Segment};
use super::DatabaseManager;

impl DatabaseManager {
    /// Insert a final segment, silently ignoring duplicates on
    /// (note_id, start_ms, end_ms). Returns true if a row was inserted.
    pub fn insert_final_segment(&self, segment: &NewSegment) -> Result<bool> {
        self.with_connection(|conn| insert_final_segment_impl(conn, segment))
    }

    /// Insert a batch of final segments. Returns how many rows were new.
    pub fn insert_final_segments(&self, segments: &[NewSegment]) -> Result<usize> {
        self.with_connection(|conn| {
            let mut inserted = 0;
            for segment in segments {
                if insert_final_segment_impl(conn, segment)? {
                    inserted += 1;
                }
            }
            Ok(inserted)
        })
    }

    /// Get all segments for a note in playback order
    pub fn get_segments(&self, note_id: &str) -> Result<Vec<Segment>> {
        self.with_connection(|conn| get_segments_impl(conn, note_id))
    }

    /// Number of segments stored for a note
    pub fn segment_count(&self, note_id: &str) -> Result<i64> {
        self.with_connection(|conn| {
            let count = conn
                .query_row(
                    "SELECT COUNT(*) FROM segments WHERE note_id = ?1",
                    params![note_id],
                    |row| row.get(0),
                )
                .context("Failed to count segments")?;
            Ok(count)
        })
    }

    /// Full transcript of a note: segment texts joined in order
    pub fn get_full_transcript(&self, note_id: &str) -> Result<String> {
        let segments = self.get_segments(note_id)?;
        Ok(segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" "))
    }
}

fn insert_final_segment_impl(conn: &Connection, segment: &NewSegment) -> Result<bool> {
    let changed = conn
        .execute(
            r#"
            INSERT OR IGNORE INTO segments (note_id, start_ms, end_ms, text, is_final, lang)
            VALUES (?1, ?2, ?3, ?4, 1, ?5)
            "#,
            params![
                segment.note_id,
                segment.start_ms,
                segment.end_ms,
                segment.text,
                segment.lang,
            ],
        )
        .context("Failed to insert segment")?;

    Ok(changed > 0)
}

fn get_segments_impl(conn: &Connection, note_id: &str) -> Result<Vec<Segment>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT id, note_id, start_ms, end_ms, text, is_final, lang
            FROM segments WHERE note_id = ?1
            ORDER BY start_ms, end_ms
            "#,
        )
        .context("Failed to prepare get_segments query")?;

    let rows = stmt
        .query_map(params![note_id], |row| {
            Ok(Segment {
                id: row.get(0)?,
                note_id: row.get(1)?,
                start_ms: row.get(2)?,
                end_ms: row.get(3)?,
                text: row.get(4)?,
                is_final: row.get::<_, i64>(5)? != 0,
                lang: row.get(6)?,
            })
        })
        .context("Failed to query segments")?;

    let mut segments = Vec::new();
    for row in rows {
        segments.push(row.context("Failed to read segment row")?);
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Note;
    use tempfile::tempdir;

    fn test_db_with_note(note_id: &str) -> (tempfile::TempDir, DatabaseManager) {
        let dir = tempdir().unwrap();
        let db = DatabaseManager::new(dir.path().join("segments.db")).unwrap();
        db.create_note(&Note::new(note_id.into(), "Note".into())).unwrap();
        (dir, db)
    }

    fn segment(note_id: &str, start_ms: i64, end_ms: i64, text: &str) -> NewSegment {
        NewSegment {
            note_id: note_id.into(),
            start_ms,
            end_ms,
            text: text.into(),
            lang: Some("en".into()),
        }
    }

    #[test]
    fn test_insert_and_read_in_order() {
        let (_dir, db) = test_db_with_note("n1");

        assert!(db.insert_final_segment(&segment("n1", 2_500, 5_000, "second")).unwrap());
        assert!(db.insert_final_segment(&segment("n1", 0, 2_500, "first")).unwrap());

        let segments = db.get_segments("n1").unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "first");
        assert_eq!(segments[1].text, "second");
        assert!(segments.iter().all(|s| s.is_final));
        assert_eq!(db.get_full_transcript("n1").unwrap(), "first second");
    }

    #[test]
    fn test_duplicate_key_is_ignored() {
        let (_dir, db) = test_db_with_note("n1");

        assert!(db.insert_final_segment(&segment("n1", 0, 1_000, "hello")).unwrap());
        // Same (note_id, start_ms, end_ms), different text: dropped silently
        assert!(!db.insert_final_segment(&segment("n1", 0, 1_000, "other")).unwrap());

        let segments = db.get_segments("n1").unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "hello");
    }

    #[test]
    fn test_batch_insert_counts_new_rows() {
        let (_dir, db) = test_db_with_note("n1");

        let batch = vec![
            segment("n1", 0, 1_000, "a"),
            segment("n1", 1_000, 2_000, "b"),
            segment("n1", 0, 1_000, "a"),
        ];
        assert_eq!(db.insert_final_segments(&batch).unwrap(), 2);
    }

    #[test]
    fn test_delete_note_cascades_to_segments() {
        let (_dir, db) = test_db_with_note("n1");
        db.create_note(&Note::new("n2".into(), "Other".into())).unwrap();

        for i in 0..7 {
            db.insert_final_segment(&segment("n1", i * 100, i * 100 + 100, "x")).unwrap();
        }
        db.insert_final_segment(&segment("n2", 0, 100, "keep")).unwrap();

        db.delete_note("n1").unwrap();

        assert_eq!(db.segment_count("n1").unwrap(), 0);
        assert_eq!(db.segment_count("n2").unwrap(), 1);

        // No dangling rows anywhere
        db.with_connection(|conn| {
            let total: i64 = conn.query_row("SELECT COUNT(*) FROM segments", [], |r| r.get(0))?;
            assert_eq!(total, 1);
            Ok(())
        }).unwrap();
    }

    #[test]
    fn test_segment_language_is_concrete() {
        let (_dir, db) = test_db_with_note("n1");
        db.insert_final_segment(&segment("n1", 0, 100, "hi")).unwrap();

        for s in db.get_segments("n1").unwrap() {
            assert!(matches!(s.lang.as_deref(), Some("en") | Some("tr") | None));
        }
    }
}
