//! Frame ingestion sources.
//!
//! Sources hand out owned `Frame`s one at a time. End of stream is a value,
//! not an error; a source that cannot be opened at all is a setup error.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
#[cfg(feature = "ingest-image")]
pub(crate) mod still;
pub mod playback;
pub mod synthetic;

pub use file::{FileConfig, FileSource, FileStats};
pub use playback::{FrameSource, Playback, PlaybackEvent, MAX_CONSECUTIVE_FAILURES};
