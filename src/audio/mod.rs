// Audio subsystem: capture, rolling window, WAV authoring

pub mod file_io;
pub mod pipeline;
pub mod ring_buffer;

pub use file_io::WavWriter;
pub use pipeline::{AudioFanout, AudioInput, BlockSink, CpalInput};
pub use ring_buffer::RingBuffer;

use thiserror::Error;

/// Errors raised by the audio subsystem.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("No input device available")]
    DeviceUnavailable,

    #[error("Audio stream setup failed: {0}")]
    StreamFailed(String),

    #[error("Resampler setup failed: {0}")]
    ResamplerFailed(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Not a valid WAV file: {0}")]
    InvalidWav(String),
}
