// Recognizer seam
//
// The inference library is a black box behind this trait. The production
// implementation wraps whisper.cpp (see whisper.rs); tests substitute pure
// stubs. Implementations must be safe to invoke serially from any thread.

use std::path::Path;

use super::types::TranscriptionError;

/// Outcome of one recognizer invocation. `error` is the failure channel:
/// the call itself never panics or returns a Rust error, mirroring the
/// native engine contract. Empty `text` with no error means silence.
#[derive(Debug, Clone, Default)]
pub struct TranscriptionResult {
    pub text: String,
    pub duration_ms: i64,
    pub detected_language: Option<String>,
    pub detected_probability: f32,
    pub error: Option<String>,
}

impl TranscriptionResult {
    /// A failed invocation, carrying the stringified taxonomy error the way
    /// the native engine reports failures.
    pub fn from_error(error: TranscriptionError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }
}

/// Speech recognizer over 16 kHz mono 16-bit PCM WAV files.
///
/// `language` is an ISO code (e.g. "en", "tr") or the literal "auto".
pub trait Recognizer: Send + Sync {
    fn is_model_loaded(&self) -> bool;

    fn transcribe(&self, wav_path: &Path, language: &str) -> TranscriptionResult;
}
