// Session coordinator
//
// The single consumer of session events and the only code path that writes
// segments. Events are gated on the live session identity; finals that
// arrive after the session store was reset are accepted exactly once when
// they match the last active session.

use log::{debug, error, info};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::store::SharedSessionStore;
use super::{FinalEvent, PartialEvent, SessionEvent, SessionStatus, StateEvent};
use crate::database::{DatabaseManager, NewSegment};

pub struct SessionCoordinator {
    db: Arc<DatabaseManager>,
    store: SharedSessionStore,
    last_active_session_id: Option<String>,
    last_active_note_id: Option<String>,
    inserted_final_keys: HashSet<String>,
}

impl SessionCoordinator {
    pub fn new(db: Arc<DatabaseManager>, store: SharedSessionStore) -> Self {
        Self {
            db,
            store,
            last_active_session_id: None,
            last_active_note_id: None,
            inserted_final_keys: HashSet::new(),
        }
    }

    /// Consume events until the channel closes.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        debug!("Session coordinator event channel closed");
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Partial(partial) => self.handle_partial(partial),
            SessionEvent::Final(finalized) => self.handle_final(finalized),
            SessionEvent::State(state) => self.handle_state(state),
        }
    }

    fn handle_state(&mut self, event: StateEvent) {
        if event.status == SessionStatus::Recording {
            // A new live session invalidates everything remembered from the
            // previous one
            self.last_active_session_id = Some(event.session_id.clone());
            self.last_active_note_id = Some(event.note_id.clone());
            self.inserted_final_keys.clear();
        }
        debug!(
            "Session {} state: {:?} (note {})",
            event.session_id, event.status, event.note_id
        );
    }

    fn handle_partial(&mut self, event: PartialEvent) {
        let mut store = self.store.lock().unwrap();
        if !store.is_live(&event.session_id, &event.note_id) {
            info!(
                "Dropping stale partial for session {} (note {})",
                event.session_id, event.note_id
            );
            return;
        }

        if let Some(lock) = event.language_lock {
            store.set_lock_if_unset(lock);
        }
        store.replace_partials(event.segments);
    }

    fn handle_final(&mut self, event: FinalEvent) {
        let accepted = {
            let store = self.store.lock().unwrap();
            match store.session() {
                Some(live) => live.session_id == event.session_id,
                None => {
                    self.last_active_session_id.as_deref() == Some(event.session_id.as_str())
                        && self.last_active_note_id.as_deref() == Some(event.note_id.as_str())
                }
            }
        };

        if !accepted {
            info!(
                "Dropping stale final for session {} (note {})",
                event.session_id, event.note_id
            );
            return;
        }

        if let Some(error) = &event.error {
            info!(
                "Final for session {} carried no segments: {}",
                event.session_id, error
            );
        }

        let mut inserted = 0usize;
        for segment in &event.segments {
            let key = format!(
                "{}:{}:{}:{}",
                event.note_id, segment.start_ms, segment.end_ms, segment.text
            );
            if self.inserted_final_keys.contains(&key) {
                continue;
            }

            let row = NewSegment {
                note_id: event.note_id.clone(),
                start_ms: segment.start_ms,
                end_ms: segment.end_ms,
                text: segment.text.clone(),
                lang: Some(segment.lang.as_str().to_string()),
            };
            match self.db.insert_final_segment(&row) {
                Ok(was_new) => {
                    self.inserted_final_keys.insert(key);
                    if was_new {
                        inserted += 1;
                    }
                }
                Err(e) => error!("Failed to persist segment: {}", e),
            }
        }

        if inserted > 0 {
            // Record the resolved language on the note and consume the
            // late-final token so duplicate finals cannot re-insert
            if let Some(lock) = event.language_lock {
                if let Err(e) = self.db.update_note_language_lock(&event.note_id, lock.as_str()) {
                    error!("Failed to record language lock: {}", e);
                }
            }
            self.last_active_session_id = None;
            self.last_active_note_id = None;
            info!(
                "💾 Persisted {} final segment(s) for note {}",
                inserted, event.note_id
            );
        }
    }
}
