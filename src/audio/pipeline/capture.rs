// Microphone capture backend
//
// Acquires the default input device at its native rate and produces 16 kHz
// mono float32 blocks through a persistent sinc resampler. The cpal stream
// is confined to a dedicated thread (streams are not Send); `stop` signals
// the thread and joins it, which drops the stream and releases the device
// before returning.

use log::{error, info, warn};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::super::AudioError;
use crate::config::SAMPLE_RATE;

/// Fixed input size for the persistent resampler. Variable-size capture
/// callbacks are accumulated to this granularity; resampling chunk-per-chunk
/// would distort energy across block boundaries.
const RESAMPLER_CHUNK_SIZE: usize = 512;

/// Callback receiving 16 kHz mono float blocks on the capture thread.
pub type BlockSink = Arc<dyn Fn(&[f32]) + Send + Sync>;

/// Seam between the session and the platform capture stack. The production
/// implementation is [`CpalInput`]; tests feed blocks directly.
pub trait AudioInput: Send {
    fn start(&mut self, sink: BlockSink) -> Result<(), AudioError>;
    fn stop(&mut self);
}

pub struct CpalInput {
    worker: Option<CaptureWorker>,
}

struct CaptureWorker {
    stop_tx: std_mpsc::Sender<()>,
    thread: thread::JoinHandle<()>,
}

impl CpalInput {
    pub fn new() -> Self {
        Self { worker: None }
    }
}

impl Default for CpalInput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioInput for CpalInput {
    fn start(&mut self, sink: BlockSink) -> Result<(), AudioError> {
        if self.worker.is_some() {
            return Err(AudioError::StreamFailed("capture already running".into()));
        }

        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (init_tx, init_rx) = std_mpsc::channel::<Result<(), AudioError>>();

        let thread = thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || match build_stream(sink) {
                Ok(stream) => {
                    if let Err(e) = stream.play() {
                        let _ = init_tx.send(Err(classify_stream_error(&e.to_string())));
                        return;
                    }
                    let _ = init_tx.send(Ok(()));
                    // Park until stop; dropping the stream releases the mic
                    let _ = stop_rx.recv();
                }
                Err(e) => {
                    let _ = init_tx.send(Err(e));
                }
            })
            .map_err(|e| AudioError::StreamFailed(e.to_string()))?;

        match init_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(CaptureWorker { stop_tx, thread });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AudioError::StreamFailed("capture thread died during setup".into()))
            }
        }
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            if worker.thread.join().is_err() {
                warn!("Capture thread panicked during shutdown");
            }
        }
    }
}

impl Drop for CpalInput {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_stream(sink: BlockSink) -> Result<cpal::Stream, AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(AudioError::DeviceUnavailable)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".into());

    let config = device
        .default_input_config()
        .map_err(|e| classify_stream_error(&e.to_string()))?;

    if config.sample_format() != cpal::SampleFormat::F32 {
        return Err(AudioError::StreamFailed(format!(
            "unsupported sample format {:?}",
            config.sample_format()
        )));
    }

    let native_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    let needs_resampling = native_rate != SAMPLE_RATE;

    if needs_resampling {
        info!(
            "🎙️ Input device '{}': {} Hz, {} ch → resampling to {} Hz mono",
            device_name, native_rate, channels, SAMPLE_RATE
        );
    } else {
        info!(
            "🎙️ Input device '{}' already at {} Hz ({} ch)",
            device_name, SAMPLE_RATE, channels
        );
    }

    let mut resampler = if needs_resampling {
        Some(make_resampler(native_rate)?)
    } else {
        None
    };
    let mut pending: Vec<f32> = Vec::with_capacity(RESAMPLER_CHUNK_SIZE * 2);

    let stream_config: cpal::StreamConfig = config.into();
    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mono = to_mono(data, channels);

                match resampler.as_mut() {
                    None => sink(&mono),
                    Some(resampler) => {
                        // Accumulate to the fixed resampler granularity;
                        // leftovers wait for the next callback
                        pending.extend_from_slice(&mono);
                        let mut out = Vec::new();
                        while pending.len() >= RESAMPLER_CHUNK_SIZE {
                            let chunk: Vec<f32> =
                                pending.drain(..RESAMPLER_CHUNK_SIZE).collect();
                            match resampler.process(&[chunk], None) {
                                Ok(mut waves) => {
                                    if let Some(wave) = waves.pop() {
                                        out.extend_from_slice(&wave);
                                    }
                                }
                                Err(e) => {
                                    warn!("⚠️ Resampler processing failed: {}", e);
                                    break;
                                }
                            }
                        }
                        if !out.is_empty() {
                            sink(&out);
                        }
                    }
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| classify_stream_error(&e.to_string()))?;

    Ok(stream)
}

fn make_resampler(native_rate: u32) -> Result<SincFixedIn<f32>, AudioError> {
    let ratio = SAMPLE_RATE as f64 / native_rate as f64;

    // Heavier anti-aliasing for larger downsampling ratios (48 kHz → 16 kHz
    // is the common case)
    let (sinc_len, interpolation, oversampling) = if ratio <= 0.5 {
        (512, SincInterpolationType::Cubic, 512)
    } else if ratio < 1.0 {
        (384, SincInterpolationType::Linear, 384)
    } else {
        (256, SincInterpolationType::Linear, 256)
    };

    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: 0.95,
        interpolation,
        oversampling_factor: oversampling,
        window: WindowFunction::BlackmanHarris2,
    };

    SincFixedIn::<f32>::new(ratio, 2.0, params, RESAMPLER_CHUNK_SIZE, 1)
        .map_err(|e| AudioError::ResamplerFailed(e.to_string()))
}

fn to_mono(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn classify_stream_error(message: &str) -> AudioError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("access denied") {
        AudioError::PermissionDenied
    } else if lower.contains("no device")
        || lower.contains("device not found")
        || lower.contains("no longer available")
    {
        AudioError::DeviceUnavailable
    } else {
        AudioError::StreamFailed(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_mono_averages_frames() {
        let stereo = [0.2f32, 0.4, -1.0, 1.0];
        let mono = to_mono(&stereo, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert!(mono[1].abs() < 1e-6);
    }

    #[test]
    fn test_classify_stream_error() {
        assert!(matches!(
            classify_stream_error("Access denied by the system"),
            AudioError::PermissionDenied
        ));
        assert!(matches!(
            classify_stream_error("the device is no longer available"),
            AudioError::DeviceUnavailable
        ));
        assert!(matches!(
            classify_stream_error("backend exploded"),
            AudioError::StreamFailed(_)
        ));
    }
}
