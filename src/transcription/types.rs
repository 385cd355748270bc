// Transcription data types

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::language::Lang;

/// One transcribed phrase with window-relative timestamps, carried by
/// `partial` and `final` events. Only finals ever reach the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentDraft {
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    pub lang: Lang,
}

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("No model loaded")]
    ModelNotLoaded,

    #[error("Recognizer failed: {0}")]
    RecognizerFailed(String),

    #[error("Empty transcription")]
    EmptyTranscription,
}
