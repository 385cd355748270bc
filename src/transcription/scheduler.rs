// Partial transcription scheduler
//
// A periodic task snapshots the rolling window, runs the recognizer on a
// scratch WAV, and emits `partial` events for live captions. At most one
// inference is ever in flight; ticks that would overlap are skipped, as are
// ticks with less than a second of buffered audio. Failures local to one
// tick never propagate.

use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::language::{confident_detection, Lang, LanguageState, LOCK_THRESHOLD};
use super::recognizer::Recognizer;
use super::segmenter::build_segments;
use super::types::TranscriptionError;
use crate::audio::{RingBuffer, WavWriter};
use crate::config::RecorderConfig;
use crate::session::{PartialEvent, SessionEvent};

/// Everything one scheduler task needs, cloned from the active session.
pub struct PartialContext {
    pub note_id: String,
    pub session_id: String,
    pub ring: Arc<RingBuffer>,
    pub recognizer: Arc<dyn Recognizer>,
    pub language: Arc<LanguageState>,
    pub events: mpsc::UnboundedSender<SessionEvent>,
    pub scratch_dir: PathBuf,
    pub config: RecorderConfig,
    pub inference_in_flight: Arc<AtomicBool>,
    pub cancel: CancellationToken,
}

/// Spawn the periodic partial-inference loop. The loop exits when the token
/// cancels; an inference already in flight finishes on its own (its event is
/// gated out downstream once the session is gone).
pub fn spawn_partial_scheduler(ctx: PartialContext) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(ctx.config.partial_tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let last_emitted = Arc::new(Mutex::new(String::new()));
        let tick_counter = Arc::new(AtomicU64::new(0));

        info!(
            "Partial scheduler started for session {} ({:?} cadence)",
            ctx.session_id, ctx.config.partial_tick
        );

        loop {
            tokio::select! {
                _ = ctx.cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            if ctx.inference_in_flight.load(Ordering::Acquire) {
                debug!("Partial tick skipped: inference still in flight");
                continue;
            }
            if ctx.ring.count() < ctx.config.min_window_samples {
                debug!("Partial tick skipped: only {} samples buffered", ctx.ring.count());
                continue;
            }

            let snapshot = ctx.ring.snapshot(ctx.config.window_samples);
            ctx.inference_in_flight.store(true, Ordering::Release);

            let tick = tick_counter.fetch_add(1, Ordering::Relaxed);
            run_tick(&ctx, snapshot, tick, last_emitted.clone());
        }

        debug!("Partial scheduler stopped for session {}", ctx.session_id);
    })
}

/// Run one inference off the timer loop so cancellation never interrupts it.
fn run_tick(ctx: &PartialContext, snapshot: Vec<i16>, tick: u64, last_emitted: Arc<Mutex<String>>) {
    let scratch_path = ctx
        .scratch_dir
        .join(format!("partial-{}-{}.wav", ctx.session_id, tick));
    let recognizer = ctx.recognizer.clone();
    let language = ctx.language.clone();
    let events = ctx.events.clone();
    let in_flight = ctx.inference_in_flight.clone();
    let note_id = ctx.note_id.clone();
    let session_id = ctx.session_id.clone();
    let window_ms = ctx.config.partial_window_ms;
    let cap = ctx.config.max_partial_segments;

    tokio::spawn(async move {
        let language_for_infer = language.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let outcome = infer_window(recognizer.as_ref(), &language_for_infer, &scratch_path, &snapshot);
            // Scratch files never outlive their tick
            if let Err(e) = std::fs::remove_file(&scratch_path) {
                debug!("Could not remove scratch WAV {:?}: {}", scratch_path, e);
            }
            outcome
        })
        .await;

        let (text, lang) = match outcome {
            Ok(Some(pair)) => pair,
            Ok(None) => {
                in_flight.store(false, Ordering::Release);
                return;
            }
            Err(e) => {
                warn!("Partial inference task failed: {}", e);
                in_flight.store(false, Ordering::Release);
                return;
            }
        };

        let segments = build_segments(&text, window_ms, lang, Some(cap));
        let concatenated = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        {
            let mut last = last_emitted.lock().unwrap();
            if !should_emit(&last, &concatenated) {
                in_flight.store(false, Ordering::Release);
                return;
            }
            *last = concatenated;
        }

        let event = SessionEvent::Partial(PartialEvent {
            note_id,
            session_id,
            segments,
            language_lock: language.lock(),
        });
        let _ = events.send(event);
        in_flight.store(false, Ordering::Release);
    });
}

/// Write the snapshot to a scratch WAV and run the partial language policy.
/// Returns the raw text plus the language segments should be tagged with,
/// or `None` when the tick should be skipped silently.
fn infer_window(
    recognizer: &dyn Recognizer,
    language: &LanguageState,
    scratch_path: &std::path::Path,
    snapshot: &[i16],
) -> Option<(String, Lang)> {
    let mut writer = match WavWriter::create(scratch_path) {
        Ok(writer) => writer,
        Err(e) => {
            warn!("Could not create scratch WAV: {}", e);
            return None;
        }
    };
    if let Err(e) = writer.append(snapshot) {
        warn!("Could not write scratch WAV: {}", e);
        return None;
    }
    if let Err(e) = writer.finish() {
        warn!("Could not finalize scratch WAV: {}", e);
        return None;
    }

    let language_code = language.effective_partial_language();
    let mut result = recognizer.transcribe(scratch_path, language_code);
    if let Some(error) = result.error.clone() {
        debug!(
            "Partial tick skipped: {}",
            TranscriptionError::RecognizerFailed(error)
        );
        return None;
    }

    let mut lang = Lang::from_code(language_code).unwrap_or(Lang::En);

    // Auto detection returned nothing: force the detected language and lock
    // it for subsequent ticks once confidence is high enough
    if language_code == "auto" {
        if result.trimmed_text().is_empty() {
            if let Some((detected, probability)) = confident_detection(&result) {
                let rerun = recognizer.transcribe(scratch_path, detected.as_str());
                if rerun.is_ok() && !rerun.trimmed_text().is_empty() {
                    if probability >= LOCK_THRESHOLD {
                        language.set_lock(super::language::LanguageLock::auto_variant(detected));
                    }
                    result = rerun;
                    lang = detected;
                }
            }
        } else if let Some((detected, _)) = confident_detection(&result) {
            lang = detected;
        }
    }

    if result.trimmed_text().is_empty() {
        debug!("Partial tick skipped: {}", TranscriptionError::EmptyTranscription);
        return None;
    }

    Some((result.text, lang))
}

/// Anti-flicker gate: emit only when the caption grew by at least three
/// characters or stopped being a pure extension of the previous one.
fn should_emit(last: &str, new: &str) -> bool {
    if new == last {
        return false;
    }
    if !new.starts_with(last) {
        return true;
    }
    new.chars().count() as i64 - last.chars().count() as i64 >= 3
}
