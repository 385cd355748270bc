// Application paths and recorder configuration

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Target sample rate for everything downstream of capture.
pub const SAMPLE_RATE: u32 = 16_000;

/// Filesystem layout rooted at the application data directory.
///
/// Canonical audio lives under `Audio/<note_id>.wav`, the database is
/// `noteinsight.db`, and scratch WAVs for partial inference go under
/// `scratch/` (deleted after every tick).
#[derive(Debug, Clone)]
pub struct AppPaths {
    root: PathBuf,
}

impl AppPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Root under the platform data directory (e.g. `~/.local/share/NoteInsight`).
    pub fn default_location() -> Result<Self> {
        let root = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| anyhow!("Could not find system data directory"))?
            .join("NoteInsight");
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join("Audio")
    }

    pub fn audio_path(&self, note_id: &str) -> PathBuf {
        self.audio_dir().join(format!("{}.wav", note_id))
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join("noteinsight.db")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join("scratch")
    }

    /// Create the directory tree. Called once before recording can start.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.audio_dir())
            .context("Failed to create audio directory")?;
        std::fs::create_dir_all(self.scratch_dir())
            .context("Failed to create scratch directory")?;
        Ok(())
    }
}

/// Tuning knobs for the recording session and partial scheduler.
///
/// Defaults match production behavior; tests shrink the timings.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Partial inference cadence.
    pub partial_tick: Duration,
    /// Rolling window capacity in samples (6 s at 16 kHz).
    pub window_samples: usize,
    /// Minimum buffered samples before a partial tick runs (1 s).
    pub min_window_samples: usize,
    /// Nominal duration of the rolling window, used to timestamp partials.
    pub partial_window_ms: i64,
    /// Cap on segments carried by one partial event.
    pub max_partial_segments: usize,
    /// How long `stop` waits for an in-flight partial inference.
    pub stop_grace: Duration,
    /// Poll interval while waiting out the grace period.
    pub grace_poll: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            partial_tick: Duration::from_millis(900),
            window_samples: 6 * SAMPLE_RATE as usize,
            min_window_samples: SAMPLE_RATE as usize,
            partial_window_ms: 6_000,
            max_partial_segments: 10,
            stop_grace: Duration::from_secs(5),
            grace_poll: Duration::from_millis(50),
        }
    }
}
