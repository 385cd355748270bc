// Database models - Segment
use serde::{Deserialize, Serialize};

/// A persisted transcript segment. Only final segments ever reach this
/// table; partials live in memory on the session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: i64,
    pub note_id: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    pub is_final: bool,
    pub lang: Option<String>,
}

/// A segment about to be inserted. The store stamps `is_final = true`.
#[derive(Debug, Clone)]
pub struct NewSegment {
    pub note_id: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    pub lang: Option<String>,
}
