// File I/O - WAV authoring
//
// Canonical and scratch audio files are 16 kHz mono 16-bit PCM WAV. hound
// owns the RIFF layout: creation writes a placeholder header with zeroed
// size fields and `finish` patches them, so a file abandoned by a crash
// mid-session is not a valid WAV. Callers record the path only after
// `finish` returns.

use hound::{SampleFormat, WavSpec};
use log::{debug, info};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use super::super::AudioError;
use crate::config::SAMPLE_RATE;

fn canonical_spec() -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

pub struct WavWriter {
    writer: hound::WavWriter<BufWriter<File>>,
    path: PathBuf,
}

impl WavWriter {
    /// Create (truncating any existing file) with the placeholder header.
    pub fn create(path: &Path) -> Result<Self, AudioError> {
        let writer = hound::WavWriter::create(path, canonical_spec())?;
        debug!("WAV writer opened at {:?}", path);
        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    /// Append raw int16 samples.
    pub fn append(&mut self, samples: &[i16]) -> Result<(), AudioError> {
        for &sample in samples {
            self.writer.write_sample(sample)?;
        }
        Ok(())
    }

    /// Bytes of PCM data written so far.
    pub fn data_size(&self) -> u32 {
        self.writer.len() * 2
    }

    /// Flush, patch the header with the real sizes, and close.
    pub fn finish(self) -> Result<PathBuf, AudioError> {
        let data_size = self.writer.len() * 2;
        self.writer.finalize()?;
        info!(
            "WAV finalized at {:?} ({} data bytes, {:.2}s)",
            self.path,
            data_size,
            data_size as f64 / (SAMPLE_RATE as f64 * 2.0)
        );
        Ok(self.path)
    }
}

/// Read a PCM WAV file back as i16 samples, folding stereo to mono.
///
/// Returns the samples and the file's sample rate. Used by the whisper
/// backend and by tests that verify authored files.
pub fn read_wav_samples(path: &Path) -> Result<(Vec<i16>, u32), AudioError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(AudioError::InvalidWav(format!(
            "unsupported sample format {:?} at {} bits",
            spec.sample_format, spec.bits_per_sample
        )));
    }

    let raw: Vec<i16> = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()?;

    let samples = match spec.channels {
        1 => raw,
        2 => raw
            .chunks_exact(2)
            .map(|frame| ((frame[0] as i32 + frame[1] as i32) / 2) as i16)
            .collect(),
        n => {
            return Err(AudioError::InvalidWav(format!(
                "unsupported channel count {}",
                n
            )))
        }
    };

    Ok((samples, spec.sample_rate))
}

/// Duration of a canonical WAV from its data size.
pub fn wav_duration_ms(path: &Path) -> Result<i64, AudioError> {
    let (samples, sample_rate) = read_wav_samples(path)?;
    Ok(samples.len() as i64 * 1000 / sample_rate as i64)
}
