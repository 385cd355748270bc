// Transcription module: recognizer seam, language resolution, partial scheduling
//
// Module structure:
// - recognizer.rs: Recognizer trait and result contract
// - whisper.rs: whisper-rs backed implementation (feature "whisper")
// - language.rs: language modes, locks, partial/final policies, quality score
// - segmenter.rs: sentence splitting and timestamp distribution
// - scheduler.rs: periodic partial inference over the rolling window
// - types.rs: segment drafts and transcription errors

pub mod language;
pub mod recognizer;
pub mod scheduler;
pub mod segmenter;
pub mod types;
#[cfg(feature = "whisper")]
pub mod whisper;

pub use language::{Lang, LanguageLock, LanguageMode, LanguageState};
pub use recognizer::{Recognizer, TranscriptionResult};
pub use scheduler::{spawn_partial_scheduler, PartialContext};
pub use types::{SegmentDraft, TranscriptionError};
#[cfg(feature = "whisper")]
pub use whisper::WhisperRecognizer;
