//! Local video frame source.
//!
//! `FileSource` reads frames from a local file in order and reports
//! end-of-stream as `Ok(None)`. Looping is the caller's decision: `rewind`
//! restarts from the first frame.
//!
//! Backends:
//! - `stub://...` paths: deterministic synthetic lot (always available)
//! - still images (`.png`, `.jpg`, `.jpeg`; feature `ingest-image`)
//! - video files (feature `ingest-file-ffmpeg`)

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
#[cfg(feature = "ingest-image")]
use super::still::StillImageSource;
use super::synthetic::SyntheticLot;
use crate::frame::Frame;

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path, or `stub://<name>` for the synthetic lot.
    pub path: String,
    /// Synthetic lot frame size.
    pub stub_width: usize,
    pub stub_height: usize,
    /// Synthetic lot length in frames before end-of-stream.
    pub stub_frames: u64,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            stub_width: 640,
            stub_height: 480,
            stub_frames: 300,
        }
    }
}

impl FileConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-image")]
    Still(StillImageSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    /// Open the source. Fails if the path is remote, missing, or no backend
    /// for it was compiled in.
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes): '{}'",
                config.path
            ));
        }
        if config.path.starts_with("stub://") {
            return Ok(Self {
                backend: FileBackend::Synthetic(SyntheticFileSource::new(config)),
            });
        }
        if is_still_image(&config.path) {
            #[cfg(feature = "ingest-image")]
            {
                return Ok(Self {
                    backend: FileBackend::Still(StillImageSource::new(config)?),
                });
            }
            #[cfg(not(feature = "ingest-image"))]
            {
                return Err(anyhow!(
                    "still image input '{}' requires the ingest-image feature",
                    config.path
                ));
            }
        }
        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(Self {
                backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)?),
            })
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(anyhow!(
                "video input '{}' requires the ingest-file-ffmpeg feature",
                config.path
            ))
        }
    }

    /// Next frame, or `None` at end of stream.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => Ok(source.next_frame()),
            #[cfg(feature = "ingest-image")]
            FileBackend::Still(source) => Ok(source.next_frame()),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    /// Restart from the first frame.
    pub fn rewind(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.rewind(),
            #[cfg(feature = "ingest-image")]
            FileBackend::Still(source) => source.rewind(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.rewind()?,
        }
        log::debug!("FileSource: rewound {}", self.stats().path);
        Ok(())
    }

    pub fn stats(&self) -> FileStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-image")]
            FileBackend::Still(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    /// Frames delivered since the source was opened, across rewinds.
    pub frames_captured: u64,
    /// Completed passes over the input.
    pub rewinds: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and demos
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    config: FileConfig,
    lot: SyntheticLot,
    position: u64,
    frames_captured: u64,
    rewinds: u64,
}

impl SyntheticFileSource {
    fn new(config: FileConfig) -> Self {
        let lot = SyntheticLot::new(config.stub_width, config.stub_height);
        let (w, h) = lot.size();
        log::info!(
            "FileSource: opened {} (synthetic {}x{}, {} frames)",
            config.path,
            w,
            h,
            config.stub_frames
        );
        Self {
            config,
            lot,
            position: 0,
            frames_captured: 0,
            rewinds: 0,
        }
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.position >= self.config.stub_frames {
            return None;
        }
        let frame = self.lot.render(self.position);
        self.position += 1;
        self.frames_captured += 1;
        Some(frame)
    }

    fn rewind(&mut self) {
        self.position = 0;
        self.rewinds += 1;
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.frames_captured,
            rewinds: self.rewinds,
            path: self.config.path.clone(),
        }
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}

fn is_still_image(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    [".png", ".jpg", ".jpeg"].iter().any(|ext| lower.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub(frames: u64) -> FileSource {
        FileSource::new(FileConfig {
            stub_width: 160,
            stub_height: 200,
            stub_frames: frames,
            ..FileConfig::new("stub://lot")
        })
        .unwrap()
    }

    #[test]
    fn rejects_remote_and_empty_paths() {
        assert!(FileSource::new(FileConfig::new("rtsp://camera/stream")).is_err());
        assert!(FileSource::new(FileConfig::new("  ")).is_err());
    }

    #[test]
    fn stub_ends_and_rewinds() {
        let mut source = stub(3);
        let first = source.next_frame().unwrap().unwrap();
        assert_eq!((first.width(), first.height()), (160, 200));
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());

        source.rewind().unwrap();
        assert_eq!(source.next_frame().unwrap().unwrap(), first);
        let stats = source.stats();
        assert_eq!(stats.frames_captured, 4);
        assert_eq!(stats.rewinds, 1);
        assert_eq!(stats.path, "stub://lot");
    }

    #[test]
    fn recognises_still_images() {
        assert!(is_still_image("lot.PNG"));
        assert!(is_still_image("/tmp/ref.jpeg"));
        assert!(!is_still_image("car_parking.mp4"));
    }
}
