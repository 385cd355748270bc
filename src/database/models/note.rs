// Database models - Note
use serde::{Deserialize, Serialize};

/// A voice note: one row per recording session.
///
/// `audio_path` is only populated once the WAV has been finalized, so a
/// non-null path always references a playable file. `insights_status` is
/// opaque to the recording core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub title: String,
    pub duration_ms: Option<i64>,
    pub language_lock: Option<String>,
    pub audio_path: Option<String>,
    pub asr_model: Option<String>,
    pub llm_model: Option<String>,
    pub insights_status: Option<String>,
}

impl Note {
    pub fn new(id: String, title: String) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id,
            created_at: now,
            updated_at: now,
            title,
            duration_ms: None,
            language_lock: None,
            audio_path: None,
            asr_model: None,
            llm_model: None,
            insights_status: None,
        }
    }
}
