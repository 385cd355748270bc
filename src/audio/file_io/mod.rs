// File I/O for canonical and scratch WAV files

pub mod wav_writer;

pub use wav_writer::{read_wav_samples, wav_duration_ms, WavWriter};
