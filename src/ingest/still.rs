//! Single still image served as a one-frame stream.

use anyhow::{Context, Result};

use super::file::{FileConfig, FileStats};
use crate::frame::Frame;

pub(crate) struct StillImageSource {
    config: FileConfig,
    frame: Frame,
    served: bool,
    frames_captured: u64,
    rewinds: u64,
}

impl StillImageSource {
    pub(crate) fn new(config: FileConfig) -> Result<Self> {
        let rgb = image::open(&config.path)
            .with_context(|| format!("failed to decode image '{}'", config.path))?
            .to_rgb8();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        let frame = Frame::new(rgb.into_raw(), width, height)?;
        log::info!(
            "FileSource: opened {} (still image {}x{})",
            config.path,
            width,
            height
        );
        Ok(Self {
            config,
            frame,
            served: false,
            frames_captured: 0,
            rewinds: 0,
        })
    }

    pub(crate) fn next_frame(&mut self) -> Option<Frame> {
        if self.served {
            return None;
        }
        self.served = true;
        self.frames_captured += 1;
        Some(self.frame.clone())
    }

    pub(crate) fn rewind(&mut self) {
        self.served = false;
        self.rewinds += 1;
    }

    pub(crate) fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.frames_captured,
            rewinds: self.rewinds,
            path: self.config.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::FileSource;

    #[test]
    fn png_is_served_once_per_pass() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.png");
        let mut img = image::RgbImage::new(4, 3);
        img.put_pixel(1, 2, image::Rgb([10, 20, 30]));
        img.save(&path).unwrap();

        let mut source = FileSource::new(FileConfig::new(path.to_str().unwrap())).unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (4, 3));
        assert_eq!(frame.pixel(1, 2), [10, 20, 30]);
        assert!(source.next_frame().unwrap().is_none());
        source.rewind().unwrap();
        assert!(source.next_frame().unwrap().is_some());
    }
}
