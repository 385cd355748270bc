// Session layer: recording lifecycle, event routing, persistence gating
//
// The session emits typed events over a single-producer channel; the
// coordinator is the only consumer and the only path that ever writes
// segments.

pub mod coordinator;
pub mod session;
pub mod store;

pub use coordinator::SessionCoordinator;
pub use session::{InputFactory, Recorder, StartArgs, StopArgs, StopResult};
pub use store::{new_shared_store, LiveSession, LiveSessionStore, SharedSessionStore};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::AudioError;
use crate::transcription::{LanguageLock, LanguageMode, SegmentDraft};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Recording,
    Stopping,
}

/// Low-latency caption refresh over the rolling window. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialEvent {
    pub note_id: String,
    pub session_id: String,
    pub segments: Vec<SegmentDraft>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_lock: Option<LanguageLock>,
}

/// Whole-file transcription outcome. The only source of stored segments.
/// `error` is populated whenever `segments` is empty for a reason the UI
/// should surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalEvent {
    pub note_id: String,
    pub session_id: String,
    pub segments: Vec<SegmentDraft>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_lock: Option<LanguageLock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Lifecycle transition snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEvent {
    pub note_id: String,
    pub session_id: String,
    pub status: SessionStatus,
    pub language_mode: LanguageMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_lock: Option<LanguageLock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionEvent {
    Partial(PartialEvent),
    Final(FinalEvent),
    State(StateEvent),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Recording already in progress")]
    AlreadyRecording,

    #[error("No recording in progress for note {0}")]
    NotRecording(String),

    #[error("Session identifier does not match the live session")]
    SessionMismatch,

    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("No speech model loaded")]
    ModelNotLoaded,

    #[error("Audio initialization failed: {0}")]
    AudioInit(String),

    #[error("Audio file error: {0}")]
    WavIo(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<AudioError> for SessionError {
    fn from(error: AudioError) -> Self {
        match error {
            AudioError::PermissionDenied => SessionError::PermissionDenied,
            AudioError::Wav(e) => SessionError::WavIo(e.to_string()),
            AudioError::InvalidWav(e) => SessionError::WavIo(e),
            other => SessionError::AudioInit(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::Lang;

    // Events are forwarded verbatim to the UI layer, so the JSON shape is a
    // contract: camelCase fields, lowercase type tags, snake_case locks.

    #[test]
    fn test_final_event_wire_format() {
        let event = SessionEvent::Final(FinalEvent {
            note_id: "n1".into(),
            session_id: "s1".into(),
            segments: vec![SegmentDraft {
                start_ms: 0,
                end_ms: 2_500,
                text: "Merhaba.".into(),
                lang: Lang::Tr,
            }],
            language_lock: Some(LanguageLock::AutoTr),
            duration_ms: Some(2_500),
            error: None,
        });

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "final");
        assert_eq!(value["noteId"], "n1");
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["languageLock"], "auto_tr");
        assert_eq!(value["durationMs"], 2_500);
        assert_eq!(value["segments"][0]["startMs"], 0);
        assert_eq!(value["segments"][0]["endMs"], 2_500);
        assert_eq!(value["segments"][0]["lang"], "tr");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_partial_event_omits_unset_lock() {
        let event = SessionEvent::Partial(PartialEvent {
            note_id: "n1".into(),
            session_id: "s1".into(),
            segments: Vec::new(),
            language_lock: None,
        });

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "partial");
        assert!(value.get("languageLock").is_none());
    }

    #[test]
    fn test_state_event_round_trips() {
        let event = SessionEvent::State(StateEvent {
            note_id: "n1".into(),
            session_id: "s1".into(),
            status: SessionStatus::Stopping,
            language_mode: LanguageMode::Auto,
            language_lock: Some(LanguageLock::AutoEn),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"status\":\"stopping\""));

        let back: SessionEvent = serde_json::from_str(&json).unwrap();
        match back {
            SessionEvent::State(state) => {
                assert_eq!(state.status, SessionStatus::Stopping);
                assert_eq!(state.language_lock, Some(LanguageLock::AutoEn));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
