// Database models

pub mod note;
pub mod segment;

pub use note::Note;
pub use segment::{NewSegment, Segment};
