// Recording session lifecycle
//
// One live session at a time: idle → recording → stopping → idle. Start
// wires the capture pipeline (ring buffer, WAV writer, partial scheduler);
// stop tears it down with a serial-queue barrier and schedules the final
// transcription in the background. The stop call returns synchronously with
// the audio path and the frame-counted duration; the `final` event follows
// when background finalization completes.

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::store::SharedSessionStore;
use super::{FinalEvent, SessionError, SessionEvent, SessionStatus, StateEvent};
use crate::audio::pipeline::WriterHandle;
use crate::audio::{AudioFanout, AudioInput, BlockSink, RingBuffer, WavWriter};
use crate::config::{AppPaths, RecorderConfig, SAMPLE_RATE};
use crate::database::{DatabaseManager, Note};
use crate::transcription::scheduler::{spawn_partial_scheduler, PartialContext};
use crate::transcription::segmenter::build_segments;
use crate::transcription::{
    language::resolve_final, Lang, LanguageLock, LanguageMode, LanguageState, Recognizer,
    TranscriptionError,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartArgs {
    pub note_id: String,
    pub session_id: String,
    pub language_mode: LanguageMode,
    pub asr_model: String,
}

impl StartArgs {
    /// Start arguments with a freshly minted session identifier. Every
    /// session gets its own id; events carrying an older one are dropped by
    /// the coordinator.
    pub fn with_fresh_session(
        note_id: String,
        language_mode: LanguageMode,
        asr_model: String,
    ) -> Self {
        Self {
            note_id,
            session_id: uuid::Uuid::new_v4().to_string(),
            language_mode,
            asr_model,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopArgs {
    pub note_id: String,
    pub session_id: String,
    pub language_lock: LanguageLock,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopResult {
    pub audio_path: String,
    pub duration_ms: i64,
    pub language_lock: LanguageLock,
}

/// Builds the capture backend for a new session. Production passes
/// `|| Box::new(CpalInput::new())`; tests inject scripted inputs.
pub type InputFactory = Box<dyn Fn() -> Box<dyn AudioInput> + Send + Sync>;

struct ActiveRecording {
    note_id: String,
    session_id: String,
    asr_model: String,
    language: Arc<LanguageState>,
    fanout: Arc<AudioFanout>,
    input: Box<dyn AudioInput>,
    writer: WriterHandle,
    scheduler: JoinHandle<()>,
    cancel: CancellationToken,
    inference_in_flight: Arc<AtomicBool>,
}

/// Owns the live recording session and the components behind it.
pub struct Recorder {
    paths: AppPaths,
    config: RecorderConfig,
    db: Arc<DatabaseManager>,
    recognizer: Arc<dyn Recognizer>,
    events: mpsc::UnboundedSender<SessionEvent>,
    store: SharedSessionStore,
    input_factory: InputFactory,
    active: Option<ActiveRecording>,
}

impl Recorder {
    pub fn new(
        paths: AppPaths,
        config: RecorderConfig,
        db: Arc<DatabaseManager>,
        recognizer: Arc<dyn Recognizer>,
        events: mpsc::UnboundedSender<SessionEvent>,
        store: SharedSessionStore,
        input_factory: InputFactory,
    ) -> Self {
        Self {
            paths,
            config,
            db,
            recognizer,
            events,
            store,
            input_factory,
            active: None,
        }
    }

    /// Start a new recording session. Fatal errors (permission, audio init,
    /// file creation) abort the start and leave the session idle; no
    /// `final` event is emitted for them.
    pub fn start_recording(&mut self, args: StartArgs) -> Result<(), SessionError> {
        if self.active.is_some() {
            return Err(SessionError::AlreadyRecording);
        }
        if !self.recognizer.is_model_loaded() {
            return Err(SessionError::ModelNotLoaded);
        }

        self.paths
            .ensure_dirs()
            .map_err(|e| SessionError::AudioInit(e.to_string()))?;
        self.ensure_note_exists(&args.note_id)?;

        let audio_path = self.paths.audio_path(&args.note_id);
        let wav = WavWriter::create(&audio_path).map_err(SessionError::from)?;
        let (writer_tx, writer) = crate::audio::pipeline::spawn_writer_task(wav);

        let ring = Arc::new(RingBuffer::new(self.config.window_samples));
        let fanout = Arc::new(AudioFanout::new(ring.clone(), writer_tx));

        let mut input = (self.input_factory)();
        let sink: BlockSink = {
            let fanout = fanout.clone();
            Arc::new(move |block: &[f32]| fanout.process_block(block))
        };
        if let Err(e) = input.start(sink) {
            // Let the writer task drain and leave the placeholder WAV behind
            writer.abort();
            return Err(SessionError::from(e));
        }

        let language = Arc::new(LanguageState::new(args.language_mode));
        let cancel = CancellationToken::new();
        let inference_in_flight = Arc::new(AtomicBool::new(false));

        let scheduler = spawn_partial_scheduler(PartialContext {
            note_id: args.note_id.clone(),
            session_id: args.session_id.clone(),
            ring,
            recognizer: self.recognizer.clone(),
            language: language.clone(),
            events: self.events.clone(),
            scratch_dir: self.paths.scratch_dir(),
            config: self.config.clone(),
            inference_in_flight: inference_in_flight.clone(),
            cancel: cancel.clone(),
        });

        self.store.lock().unwrap().begin(
            args.note_id.clone(),
            args.session_id.clone(),
            args.language_mode,
        );

        info!(
            "🎙️ Recording started: note {} session {}",
            args.note_id, args.session_id
        );
        self.emit_state(&args.note_id, &args.session_id, SessionStatus::Recording, args.language_mode, None);

        self.active = Some(ActiveRecording {
            note_id: args.note_id,
            session_id: args.session_id,
            asr_model: args.asr_model,
            language,
            fanout,
            input,
            writer,
            scheduler,
            cancel,
            inference_in_flight,
        });

        Ok(())
    }

    /// Stop the live session. Returns synchronously once the audio file is
    /// finalized; the final transcription continues in the background and
    /// surfaces as a `final` event.
    pub async fn stop_recording(&mut self, args: StopArgs) -> Result<StopResult, SessionError> {
        {
            let active = self
                .active
                .as_ref()
                .ok_or_else(|| SessionError::NotRecording(args.note_id.clone()))?;
            if active.session_id != args.session_id || active.note_id != args.note_id {
                return Err(SessionError::SessionMismatch);
            }
        }
        let mut active = self.active.take().unwrap();

        let language_mode = active.language.mode();
        self.store.lock().unwrap().set_status(SessionStatus::Stopping);
        self.emit_state(
            &active.note_id,
            &active.session_id,
            SessionStatus::Stopping,
            language_mode,
            active.language.lock(),
        );

        // Cancel the timer first; an in-flight inference gets a grace period
        // but is never interrupted
        active.cancel.cancel();
        let grace_start = tokio::time::Instant::now();
        while active.inference_in_flight.load(Ordering::Acquire) {
            if grace_start.elapsed() >= self.config.stop_grace {
                warn!("⏱️ Partial inference still running after grace period, proceeding with stop");
                break;
            }
            tokio::time::sleep(self.config.grace_poll).await;
        }
        let _ = (&mut active.scheduler).await;

        // Release the microphone, then run the serial-queue barrier: once
        // the writer resolves every scheduled write has landed and the WAV
        // header is patched
        active.input.stop();
        drop(active.fanout);

        let (audio_path, total_frames) = match active.writer.await {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => {
                let message = e.to_string();
                self.store.lock().unwrap().clear();
                self.emit_failed_final(&active.note_id, &active.session_id, &message);
                return Err(SessionError::from(e));
            }
            Err(e) => {
                let message = format!("Audio writer task failed: {}", e);
                self.store.lock().unwrap().clear();
                self.emit_failed_final(&active.note_id, &active.session_id, &message);
                return Err(SessionError::WavIo(message));
            }
        };

        let duration_ms = (total_frames * 1000 / SAMPLE_RATE as u64) as i64;
        let audio_path_str = audio_path.to_string_lossy().to_string();

        // The WAV is finalized: only now does the note row learn its path
        if let Err(e) = self.db.complete_note(
            &active.note_id,
            duration_ms,
            &audio_path_str,
            args.language_lock.as_str(),
            &active.asr_model,
        ) {
            error!("Failed to record session outcome: {}", e);
        }

        // Session destroyed; late events fall back to the coordinator's
        // last-active gate
        self.store.lock().unwrap().clear();

        info!(
            "⏹️ Recording stopped: note {} ({} ms, {} frames)",
            active.note_id, duration_ms, total_frames
        );

        // The requested lock only wins when it pins a language; otherwise an
        // auto lock established by the partials carries over
        let effective_lock = if args.language_lock.pinned_lang().is_some() {
            args.language_lock
        } else {
            active.language.lock().unwrap_or(args.language_lock)
        };

        spawn_finalization(FinalizationContext {
            note_id: active.note_id.clone(),
            session_id: active.session_id.clone(),
            audio_path: audio_path.clone(),
            duration_ms,
            requested_lock: effective_lock,
            language_mode,
            recognizer: self.recognizer.clone(),
            events: self.events.clone(),
        });

        Ok(StopResult {
            audio_path: audio_path_str,
            duration_ms,
            language_lock: args.language_lock,
        })
    }

    /// Switch the language mode mid-recording. Only meaningful while the
    /// named note is being recorded.
    pub fn set_language(&mut self, note_id: &str, mode: LanguageMode) -> Result<(), SessionError> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| SessionError::NotRecording(note_id.to_string()))?;
        if active.note_id != note_id {
            return Err(SessionError::NotRecording(note_id.to_string()));
        }

        active.language.set_mode(mode);
        if let Some(session) = self.store.lock().unwrap().session_mut() {
            session.language_mode = mode;
        }
        info!("Language mode for note {} set to {:?}", note_id, mode);
        Ok(())
    }

    /// Snapshot of the current session state for the given note.
    pub fn get_state(&self, note_id: &str) -> StateEvent {
        let store = self.store.lock().unwrap();
        match store.session() {
            Some(session) if session.note_id == note_id => StateEvent {
                note_id: session.note_id.clone(),
                session_id: session.session_id.clone(),
                status: session.status,
                language_mode: session.language_mode,
                language_lock: session.language_lock,
            },
            _ => StateEvent {
                note_id: note_id.to_string(),
                session_id: String::new(),
                status: SessionStatus::Idle,
                language_mode: LanguageMode::Auto,
                language_lock: None,
            },
        }
    }

    fn ensure_note_exists(&self, note_id: &str) -> Result<(), SessionError> {
        let existing = self
            .db
            .get_note(note_id)
            .map_err(|e| SessionError::Database(e.to_string()))?;
        if existing.is_none() {
            let title = format!(
                "Note {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M")
            );
            self.db
                .create_note(&Note::new(note_id.to_string(), title))
                .map_err(|e| SessionError::Database(e.to_string()))?;
        }
        Ok(())
    }

    fn emit_state(
        &self,
        note_id: &str,
        session_id: &str,
        status: SessionStatus,
        language_mode: LanguageMode,
        language_lock: Option<LanguageLock>,
    ) {
        let _ = self.events.send(SessionEvent::State(StateEvent {
            note_id: note_id.to_string(),
            session_id: session_id.to_string(),
            status,
            language_mode,
            language_lock,
        }));
    }

    fn emit_failed_final(&self, note_id: &str, session_id: &str, message: &str) {
        let _ = self.events.send(SessionEvent::Final(FinalEvent {
            note_id: note_id.to_string(),
            session_id: session_id.to_string(),
            segments: Vec::new(),
            language_lock: None,
            duration_ms: None,
            error: Some(message.to_string()),
        }));
    }
}

struct FinalizationContext {
    note_id: String,
    session_id: String,
    audio_path: std::path::PathBuf,
    duration_ms: i64,
    requested_lock: LanguageLock,
    language_mode: LanguageMode,
    recognizer: Arc<dyn Recognizer>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

/// Run the whole-file transcription off the stop path. Every outcome emits
/// exactly one `final` event (empty segments plus an error string when
/// nothing usable came back) followed by the idle transition, so consumers
/// never hang.
fn spawn_finalization(ctx: FinalizationContext) {
    tokio::spawn(async move {
        let recognizer = ctx.recognizer.clone();
        let audio_path = ctx.audio_path.clone();
        let requested = ctx.requested_lock;

        let resolution = tokio::task::spawn_blocking(move || {
            resolve_final(recognizer.as_ref(), &audio_path, requested)
        })
        .await;

        let event = match resolution {
            Ok(resolution) => {
                if let Some(error) = resolution.result.error.clone() {
                    FinalEvent {
                        note_id: ctx.note_id.clone(),
                        session_id: ctx.session_id.clone(),
                        segments: Vec::new(),
                        language_lock: None,
                        duration_ms: Some(ctx.duration_ms),
                        error: Some(TranscriptionError::RecognizerFailed(error).to_string()),
                    }
                } else {
                    let lang = resolution.lock.pinned_lang().unwrap_or(Lang::En);
                    let segments =
                        build_segments(&resolution.result.text, ctx.duration_ms, lang, None);
                    if segments.is_empty() {
                        FinalEvent {
                            note_id: ctx.note_id.clone(),
                            session_id: ctx.session_id.clone(),
                            segments: Vec::new(),
                            language_lock: Some(resolution.lock),
                            duration_ms: Some(ctx.duration_ms),
                            error: Some(TranscriptionError::EmptyTranscription.to_string()),
                        }
                    } else {
                        FinalEvent {
                            note_id: ctx.note_id.clone(),
                            session_id: ctx.session_id.clone(),
                            segments,
                            language_lock: Some(resolution.lock),
                            duration_ms: Some(ctx.duration_ms),
                            error: None,
                        }
                    }
                }
            }
            Err(e) => FinalEvent {
                note_id: ctx.note_id.clone(),
                session_id: ctx.session_id.clone(),
                segments: Vec::new(),
                language_lock: None,
                duration_ms: Some(ctx.duration_ms),
                error: Some(format!("Final transcription task failed: {}", e)),
            },
        };

        let _ = ctx.events.send(SessionEvent::Final(event));
        let _ = ctx.events.send(SessionEvent::State(StateEvent {
            note_id: ctx.note_id,
            session_id: ctx.session_id,
            status: SessionStatus::Idle,
            language_mode: ctx.language_mode,
            language_lock: None,
        }));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioError;
    use crate::session::{new_shared_store, SessionCoordinator};
    use crate::transcription::TranscriptionResult;
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Capture backend that replays canned 16 kHz blocks on start.
    struct ScriptedInput {
        blocks: Vec<Vec<f32>>,
        sink: Option<BlockSink>,
    }

    impl AudioInput for ScriptedInput {
        fn start(&mut self, sink: BlockSink) -> Result<(), AudioError> {
            for block in &self.blocks {
                sink(block);
            }
            // Hold the sink like a live stream would; dropping it on stop
            // lets the writer channel close
            self.sink = Some(sink);
            Ok(())
        }

        fn stop(&mut self) {
            self.sink = None;
        }
    }

    struct StubRecognizer {
        by_language: HashMap<&'static str, TranscriptionResult>,
    }

    impl StubRecognizer {
        fn mapping(entries: &[(&'static str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                by_language: entries
                    .iter()
                    .map(|(code, text)| {
                        (
                            *code,
                            TranscriptionResult {
                                text: text.to_string(),
                                ..Default::default()
                            },
                        )
                    })
                    .collect(),
            })
        }
    }

    impl Recognizer for StubRecognizer {
        fn is_model_loaded(&self) -> bool {
            true
        }

        fn transcribe(&self, _wav_path: &Path, language: &str) -> TranscriptionResult {
            self.by_language.get(language).cloned().unwrap_or_default()
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        paths: AppPaths,
        db: Arc<DatabaseManager>,
        recorder: Recorder,
        coordinator: SessionCoordinator,
        events: mpsc::UnboundedReceiver<SessionEvent>,
    }

    fn harness(recognizer: Arc<dyn Recognizer>, blocks: Vec<Vec<f32>>) -> Harness {
        let dir = tempdir().unwrap();
        let paths = AppPaths::new(dir.path().to_path_buf());
        let db = Arc::new(DatabaseManager::new(paths.db_path()).unwrap());
        let store = new_shared_store();
        let (tx, rx) = mpsc::unbounded_channel();

        let factory: InputFactory = Box::new(move || {
            Box::new(ScriptedInput {
                blocks: blocks.clone(),
                sink: None,
            })
        });

        let recorder = Recorder::new(
            paths.clone(),
            RecorderConfig::default(),
            db.clone(),
            recognizer,
            tx,
            store.clone(),
            factory,
        );
        let coordinator = SessionCoordinator::new(db.clone(), store);

        Harness {
            _dir: dir,
            paths,
            db,
            recorder,
            coordinator,
            events: rx,
        }
    }

    /// Feed events to the coordinator until the final arrives.
    async fn wait_for_final(harness: &mut Harness) -> FinalEvent {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(10), harness.events.recv())
                .await
                .expect("timed out waiting for final event")
                .expect("event channel closed");
            harness.coordinator.handle_event(event.clone());
            if let SessionEvent::Final(finalized) = event {
                return finalized;
            }
        }
    }

    fn tone_blocks(seconds: f64) -> Vec<Vec<f32>> {
        let total = (seconds * SAMPLE_RATE as f64) as usize;
        // 100 ms blocks of a quiet constant tone
        let block = vec![0.25f32; SAMPLE_RATE as usize / 10];
        let mut blocks = Vec::new();
        let mut fed = 0;
        while fed < total {
            let n = block.len().min(total - fed);
            blocks.push(block[..n].to_vec());
            fed += n;
        }
        blocks
    }

    fn start_args(mode: LanguageMode) -> StartArgs {
        StartArgs {
            note_id: "note-1".into(),
            session_id: "session-1".into(),
            language_mode: mode,
            asr_model: "whisper-base".into(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_nominal_english_session() {
        let recognizer = StubRecognizer::mapping(&[("en", "Hello world. This is a test.")]);
        let mut harness = harness(recognizer, tone_blocks(5.0));

        harness.recorder.start_recording(start_args(LanguageMode::En)).unwrap();
        let stop = harness
            .recorder
            .stop_recording(StopArgs {
                note_id: "note-1".into(),
                session_id: "session-1".into(),
                language_lock: LanguageLock::En,
            })
            .await
            .unwrap();

        assert_eq!(stop.duration_ms, 5_000);
        assert_eq!(stop.language_lock, LanguageLock::En);

        // Canonical WAV: 44-byte header + 5000 ms * 32 bytes/ms
        let wav_len = std::fs::metadata(harness.paths.audio_path("note-1")).unwrap().len();
        assert_eq!(wav_len, 44 + 5_000 * 32);

        let finalized = wait_for_final(&mut harness).await;
        assert!(finalized.error.is_none());
        assert_eq!(finalized.duration_ms, Some(5_000));
        assert_eq!(finalized.segments.len(), 2);
        assert_eq!(finalized.segments[0].text, "Hello world.");
        assert_eq!(finalized.segments[1].text, "This is a test.");
        assert_eq!(finalized.segments[0].start_ms, 0);
        assert_eq!(finalized.segments[1].start_ms, finalized.segments[0].end_ms);
        assert!(finalized.segments[1].end_ms <= 5_000);
        assert!(finalized.segments.iter().all(|s| s.lang == Lang::En));

        // Coordinator persisted exactly the final segments
        assert_eq!(harness.db.segment_count("note-1").unwrap(), 2);
        let note = harness.db.get_note("note-1").unwrap().unwrap();
        assert_eq!(note.duration_ms, Some(5_000));
        assert!(note.audio_path.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_auto_fallback_to_turkish_by_scoring() {
        let recognizer = StubRecognizer::mapping(&[
            ("auto", ""),
            ("en", "the the the the the"),
            ("tr", "merhaba bu bir test cümlesidir"),
        ]);
        let mut harness = harness(recognizer, tone_blocks(5.0));

        harness.recorder.start_recording(start_args(LanguageMode::Auto)).unwrap();
        harness
            .recorder
            .stop_recording(StopArgs {
                note_id: "note-1".into(),
                session_id: "session-1".into(),
                language_lock: LanguageLock::Auto,
            })
            .await
            .unwrap();

        let finalized = wait_for_final(&mut harness).await;
        assert!(finalized.error.is_none());
        assert_eq!(finalized.language_lock, Some(LanguageLock::AutoTr));
        assert_eq!(finalized.segments.len(), 1);
        assert_eq!(finalized.segments[0].lang, Lang::Tr);

        let stored = harness.db.get_segments("note-1").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].lang.as_deref(), Some("tr"));

        // The resolved lock lands on the note row
        let note = harness.db.get_note("note-1").unwrap().unwrap();
        assert_eq!(note.language_lock.as_deref(), Some("auto_tr"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sub_second_recording_skips_partials() {
        let recognizer = StubRecognizer::mapping(&[("en", "")]);
        let mut harness = harness(recognizer, tone_blocks(0.4));

        harness.recorder.start_recording(start_args(LanguageMode::En)).unwrap();
        let stop = harness
            .recorder
            .stop_recording(StopArgs {
                note_id: "note-1".into(),
                session_id: "session-1".into(),
                language_lock: LanguageLock::En,
            })
            .await
            .unwrap();

        assert_eq!(stop.duration_ms, 400);

        let mut saw_partial = false;
        let finalized = loop {
            let event = tokio::time::timeout(Duration::from_secs(10), harness.events.recv())
                .await
                .expect("timed out")
                .expect("channel closed");
            if matches!(event, SessionEvent::Partial(_)) {
                saw_partial = true;
            }
            harness.coordinator.handle_event(event.clone());
            if let SessionEvent::Final(finalized) = event {
                break finalized;
            }
        };

        // Under a second of audio: every partial tick was skipped
        assert!(!saw_partial);
        assert!(finalized.segments.is_empty());
        assert_eq!(finalized.error.as_deref(), Some("Empty transcription"));

        // The WAV is still valid
        let (samples, rate) = crate::audio::file_io::read_wav_samples(
            &harness.paths.audio_path("note-1"),
        )
        .unwrap();
        assert_eq!(rate, SAMPLE_RATE);
        assert_eq!(samples.len(), 6_400);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_second_start_rejected_while_recording() {
        let recognizer = StubRecognizer::mapping(&[("en", "hello")]);
        let mut harness = harness(recognizer, tone_blocks(1.0));

        harness.recorder.start_recording(start_args(LanguageMode::En)).unwrap();
        let rejected = harness.recorder.start_recording(StartArgs {
            note_id: "note-2".into(),
            session_id: "session-2".into(),
            language_mode: LanguageMode::En,
            asr_model: "whisper-base".into(),
        });
        assert!(matches!(rejected, Err(SessionError::AlreadyRecording)));

        // Cleanup so the writer task resolves
        let _ = harness
            .recorder
            .stop_recording(StopArgs {
                note_id: "note-1".into(),
                session_id: "session-1".into(),
                language_lock: LanguageLock::En,
            })
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_with_wrong_session_id_rejected() {
        let recognizer = StubRecognizer::mapping(&[("en", "hello")]);
        let mut harness = harness(recognizer, tone_blocks(0.5));

        harness.recorder.start_recording(start_args(LanguageMode::En)).unwrap();
        let mismatch = harness
            .recorder
            .stop_recording(StopArgs {
                note_id: "note-1".into(),
                session_id: "other-session".into(),
                language_lock: LanguageLock::En,
            })
            .await;
        assert!(matches!(mismatch, Err(SessionError::SessionMismatch)));

        // The real stop still works afterwards
        harness
            .recorder
            .stop_recording(StopArgs {
                note_id: "note-1".into(),
                session_id: "session-1".into(),
                language_lock: LanguageLock::En,
            })
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_state_reflects_lifecycle() {
        let recognizer = StubRecognizer::mapping(&[("en", "hello")]);
        let mut harness = harness(recognizer, tone_blocks(0.5));

        assert_eq!(harness.recorder.get_state("note-1").status, SessionStatus::Idle);

        // A fresh session id is minted for every start
        let args = StartArgs::with_fresh_session(
            "note-1".into(),
            LanguageMode::Tr,
            "whisper-base".into(),
        );
        harness.recorder.start_recording(args).unwrap();
        let state = harness.recorder.get_state("note-1");
        assert_eq!(state.status, SessionStatus::Recording);
        assert_eq!(state.language_mode, LanguageMode::Tr);
        assert!(!state.session_id.is_empty());

        harness.recorder.set_language("note-1", LanguageMode::En).unwrap();
        assert_eq!(harness.recorder.get_state("note-1").language_mode, LanguageMode::En);

        harness
            .recorder
            .stop_recording(StopArgs {
                note_id: "note-1".into(),
                session_id: state.session_id.clone(),
                language_lock: LanguageLock::En,
            })
            .await
            .unwrap();
        assert_eq!(harness.recorder.get_state("note-1").status, SessionStatus::Idle);
    }
}
