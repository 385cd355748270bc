// NoteInsight core
//
// On-device voice note recorder: streaming capture with live partial
// captions, canonical WAV authoring, stop-time transcription with language
// fallback, and a session-gated coordinator writing final segments to
// SQLite.

pub mod audio;
pub mod config;
pub mod database;
pub mod session;
pub mod transcription;

pub use config::{AppPaths, RecorderConfig};
pub use database::DatabaseManager;
pub use session::{
    new_shared_store, Recorder, SessionCoordinator, SessionEvent, StartArgs, StopArgs, StopResult,
};
pub use transcription::{Lang, LanguageLock, LanguageMode, Recognizer, TranscriptionResult};
#[cfg(feature = "whisper")]
pub use transcription::WhisperRecognizer;

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Fully wired recording core: one recorder, one coordinator consuming its
/// events, one database.
pub struct NoteInsightApp {
    pub recorder: Recorder,
    pub db: Arc<DatabaseManager>,
    pub coordinator: JoinHandle<()>,
}

/// Wire the production components together: database with migrations, the
/// shared session store, the event channel, the coordinator task, and a
/// recorder capturing from the default microphone.
pub fn bootstrap(
    paths: AppPaths,
    config: RecorderConfig,
    recognizer: Arc<dyn Recognizer>,
) -> Result<NoteInsightApp> {
    let db = Arc::new(DatabaseManager::new(paths.db_path())?);
    let store = new_shared_store();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let coordinator = SessionCoordinator::new(db.clone(), store.clone());
    let coordinator = tokio::spawn(coordinator.run(events_rx));

    let recorder = Recorder::new(
        paths,
        config,
        db.clone(),
        recognizer,
        events_tx,
        store,
        Box::new(|| Box::new(audio::CpalInput::new())),
    );

    Ok(NoteInsightApp {
        recorder,
        db,
        coordinator,
    })
}
