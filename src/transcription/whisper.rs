// Whisper-backed recognizer
//
// The one concrete Recognizer implementation, wrapping whisper.cpp through
// whisper-rs. Input must be the canonical 16 kHz mono 16-bit PCM WAV; other
// rates are rejected rather than resampled here. Requires the `whisper`
// cargo feature (and cmake at build time).

use log::{info, warn};
use std::path::Path;
use std::sync::{Mutex, Once};

use whisper_rs::{
    install_logging_hooks, FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters,
};

use super::recognizer::{Recognizer, TranscriptionResult};
use super::types::TranscriptionError;
use crate::audio::file_io::read_wav_samples;
use crate::config::SAMPLE_RATE;

static LOGGING_HOOKS_INSTALLED: Once = Once::new();

pub struct WhisperRecognizer {
    context: Mutex<Option<WhisperContext>>,
}

impl WhisperRecognizer {
    pub fn new() -> Self {
        // Route whisper.cpp's stderr chatter through the log facade once
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });
        Self {
            context: Mutex::new(None),
        }
    }

    /// Load a ggml model file, replacing any previously loaded model.
    pub fn load_model(&self, model_path: &Path) -> bool {
        if !model_path.exists() {
            warn!("Whisper model not found at {:?}", model_path);
            return false;
        }

        let mut params = WhisperContextParameters::default();
        params.use_gpu(true);

        let path_str = match model_path.to_str() {
            Some(path) => path,
            None => {
                warn!("Whisper model path is not valid UTF-8");
                return false;
            }
        };

        match WhisperContext::new_with_params(path_str, params) {
            Ok(context) => {
                info!("✅ Whisper model loaded from {:?}", model_path);
                *self.context.lock().unwrap() = Some(context);
                true
            }
            Err(e) => {
                warn!("Failed to load whisper model: {}", e);
                false
            }
        }
    }

    /// Drop the loaded model to free memory.
    pub fn unload_model(&self) {
        *self.context.lock().unwrap() = None;
    }
}

impl Default for WhisperRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Recognizer for WhisperRecognizer {
    fn is_model_loaded(&self) -> bool {
        self.context.lock().unwrap().is_some()
    }

    fn transcribe(&self, wav_path: &Path, language: &str) -> TranscriptionResult {
        let (samples, sample_rate) = match read_wav_samples(wav_path) {
            Ok(pair) => pair,
            Err(e) => {
                return TranscriptionResult::from_error(TranscriptionError::RecognizerFailed(
                    format!("cannot read WAV: {}", e),
                ))
            }
        };
        if sample_rate != SAMPLE_RATE {
            return TranscriptionResult::from_error(TranscriptionError::RecognizerFailed(format!(
                "expected {} Hz input, got {} Hz",
                SAMPLE_RATE, sample_rate
            )));
        }

        let duration_ms = samples.len() as i64 * 1000 / SAMPLE_RATE as i64;
        let audio: Vec<f32> = samples.iter().map(|&s| s as f32 / 32768.0).collect();

        let guard = self.context.lock().unwrap();
        let context = match guard.as_ref() {
            Some(context) => context,
            None => return TranscriptionResult::from_error(TranscriptionError::ModelNotLoaded),
        };

        let mut state = match context.create_state() {
            Ok(state) => state,
            Err(e) => {
                return TranscriptionResult::from_error(TranscriptionError::RecognizerFailed(
                    format!("whisper state: {}", e),
                ))
            }
        };

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        match language {
            "auto" => params.set_language(None),
            code => params.set_language(Some(code)),
        }
        params.set_translate(false);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_suppress_blank(true);

        if let Err(e) = state.full(params, &audio) {
            return TranscriptionResult::from_error(TranscriptionError::RecognizerFailed(format!(
                "whisper inference: {}",
                e
            )));
        }

        // Mean token probability doubles as the detection confidence; the
        // no-speech probability is useless for this (always ~0 on speech)
        let mut text = String::new();
        let mut probability_sum = 0.0f64;
        let mut token_count = 0u32;

        for segment in state.as_iter() {
            if let Ok(segment_text) = segment.to_str_lossy() {
                text.push_str(&segment_text);
            }
            for i in 0..segment.n_tokens() {
                if let Some(token) = segment.get_token(i) {
                    probability_sum += token.token_probability() as f64;
                    token_count += 1;
                }
            }
        }

        let lang_id = state.full_lang_id_from_state();
        let detected_language = whisper_rs::get_lang_str(lang_id).map(|s| s.to_string());
        let detected_probability = if token_count > 0 {
            (probability_sum / token_count as f64).clamp(0.0, 1.0) as f32
        } else {
            0.0
        };

        TranscriptionResult {
            text: text.trim().to_string(),
            duration_ms,
            detected_language,
            detected_probability,
            error: None,
        }
    }
}
