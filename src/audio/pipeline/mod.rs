// Capture pipeline: microphone → 16 kHz mono float blocks → fan-out

pub mod capture;
pub mod fanout;

pub use capture::{AudioInput, BlockSink, CpalInput};
pub use fanout::{spawn_writer_task, AudioFanout, WriterHandle};
