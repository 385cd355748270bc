// Fan-out from the capture callback to the rolling window and the WAV file
//
// The capture thread only does format conversion, a locked push into the
// ring buffer, and a channel send toward the serial writer task. All file
// writes happen on that single task, strictly FIFO, which also owns the
// authoritative frame counter.

use log::{error, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::super::{AudioError, RingBuffer, WavWriter};

/// Handle to the serial writer task. Awaiting it after the senders are
/// dropped is the stop barrier: every scheduled write has completed and the
/// WAV header has been patched when it resolves.
pub type WriterHandle = JoinHandle<Result<(PathBuf, u64), AudioError>>;

/// Spawn the serial writer task that owns the WavWriter.
///
/// Returns the sender side for sample blocks. When the last sender drops,
/// the task finalizes the file and resolves with the path and the total
/// frames written (`duration_ms = frames * 1000 / 16000`).
pub fn spawn_writer_task(mut wav: WavWriter) -> (mpsc::UnboundedSender<Vec<i16>>, WriterHandle) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<i16>>();

    let handle = tokio::spawn(async move {
        let mut total_frames: u64 = 0;
        while let Some(block) = rx.recv().await {
            wav.append(&block)?;
            total_frames += block.len() as u64;
        }
        let path = wav.finish()?;
        Ok((path, total_frames))
    });

    (tx, handle)
}

/// Converts incoming 16 kHz mono float blocks and fans them out.
pub struct AudioFanout {
    ring: Arc<RingBuffer>,
    writer_tx: mpsc::UnboundedSender<Vec<i16>>,
    writer_gone: AtomicBool,
}

impl AudioFanout {
    pub fn new(ring: Arc<RingBuffer>, writer_tx: mpsc::UnboundedSender<Vec<i16>>) -> Self {
        Self {
            ring,
            writer_tx,
            writer_gone: AtomicBool::new(false),
        }
    }

    /// Invoked on the capture thread for every resampled block.
    pub fn process_block(&self, block: &[f32]) {
        if block.is_empty() {
            return;
        }

        let samples: Vec<i16> = block
            .iter()
            .map(|&sample| (sample.clamp(-1.0, 1.0) * 32767.0) as i16)
            .collect();

        self.ring.append(&samples);

        if self.writer_tx.send(samples).is_err() {
            // Writer task ended early (I/O failure); warn once, keep the
            // ring alive so partials continue until stop surfaces the error
            if !self.writer_gone.swap(true, Ordering::SeqCst) {
                error!("❌ Audio writer queue closed, file writes are being dropped");
            }
        }
    }
}

impl Drop for AudioFanout {
    fn drop(&mut self) {
        if self.writer_gone.load(Ordering::SeqCst) {
            warn!("Audio fan-out dropped after writer failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::file_io::read_wav_samples;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_fanout_feeds_ring_and_file_identically() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fanout.wav");

        let ring = Arc::new(RingBuffer::new(96_000));
        let wav = WavWriter::create(&path).unwrap();
        let (tx, handle) = spawn_writer_task(wav);
        let fanout = AudioFanout::new(ring.clone(), tx);

        fanout.process_block(&[0.0, 0.5, -0.5]);
        fanout.process_block(&[1.0, -1.0, 2.0, -2.0]); // out-of-range clamps
        drop(fanout);

        let (out_path, frames) = handle.await.unwrap().unwrap();
        assert_eq!(out_path, path);
        assert_eq!(frames, 7);

        let expected = vec![0i16, 16383, -16383, 32767, -32767, 32767, -32767];
        assert_eq!(ring.snapshot(100), expected);
        let (decoded, _) = read_wav_samples(&path).unwrap();
        assert_eq!(decoded, expected);
    }

    #[tokio::test]
    async fn test_writer_counts_frames_for_duration() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("count.wav");

        let ring = Arc::new(RingBuffer::new(96_000));
        let (tx, handle) = spawn_writer_task(WavWriter::create(&path).unwrap());
        let fanout = AudioFanout::new(ring, tx);

        // 0.4 s of silence at 16 kHz
        for _ in 0..4 {
            fanout.process_block(&vec![0.0f32; 1600]);
        }
        drop(fanout);

        let (_, frames) = handle.await.unwrap().unwrap();
        assert_eq!(frames, 6400);
        assert_eq!(frames * 1000 / 16_000, 400);
    }
}
