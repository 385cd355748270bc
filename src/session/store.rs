// Live session store
//
// Shared between the recorder (writer) and the coordinator (reader). One
// live session at a time; partial segments live here and nowhere else.

use std::sync::{Arc, Mutex};

use super::SessionStatus;
use crate::transcription::{LanguageLock, LanguageMode, SegmentDraft};

/// The transient per-recording state. Created on start, destroyed on stop.
#[derive(Debug, Clone)]
pub struct LiveSession {
    pub note_id: String,
    pub session_id: String,
    pub status: SessionStatus,
    pub language_mode: LanguageMode,
    pub language_lock: Option<LanguageLock>,
    pub partial_segments: Vec<SegmentDraft>,
}

#[derive(Debug, Default)]
pub struct LiveSessionStore {
    session: Option<LiveSession>,
}

impl LiveSessionStore {
    /// Install a fresh live session, replacing any previous one.
    pub fn begin(&mut self, note_id: String, session_id: String, language_mode: LanguageMode) {
        self.session = Some(LiveSession {
            note_id,
            session_id,
            status: SessionStatus::Recording,
            language_mode,
            language_lock: None,
            partial_segments: Vec::new(),
        });
    }

    /// Destroy the live session.
    pub fn clear(&mut self) {
        self.session = None;
    }

    pub fn session(&self) -> Option<&LiveSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut LiveSession> {
        self.session.as_mut()
    }

    /// True when the given identifiers name the live session.
    pub fn is_live(&self, session_id: &str, note_id: &str) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.session_id == session_id && s.note_id == note_id)
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        if let Some(session) = self.session.as_mut() {
            session.status = status;
        }
    }

    /// Adopt a lock reported by an event if none is set yet.
    pub fn set_lock_if_unset(&mut self, lock: LanguageLock) {
        if let Some(session) = self.session.as_mut() {
            if session.language_lock.is_none() {
                session.language_lock = Some(lock);
            }
        }
    }

    /// Replace (never append) the in-memory partial caption list.
    pub fn replace_partials(&mut self, segments: Vec<SegmentDraft>) {
        if let Some(session) = self.session.as_mut() {
            session.partial_segments = segments;
        }
    }
}

pub type SharedSessionStore = Arc<Mutex<LiveSessionStore>>;

pub fn new_shared_store() -> SharedSessionStore {
    Arc::new(Mutex::new(LiveSessionStore::default()))
}
