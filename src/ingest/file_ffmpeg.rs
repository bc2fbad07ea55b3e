//! Local video decoding through FFmpeg.
//!
//! Frames are converted to packed RGB in memory; nothing is written to disk.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;

use super::file::{FileConfig, FileStats};
use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    eof_sent: bool,
    frames_captured: u64,
    rewinds: u64,
}

impl FfmpegFileSource {
    pub(crate) fn new(config: FileConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("failed to open video '{}' with ffmpeg", config.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("'{}' has no video track", config.path))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "FileSource: opened {} (ffmpeg {}x{})",
            config.path,
            decoder.width(),
            decoder.height()
        );
        Ok(Self {
            config,
            input,
            stream_index,
            decoder,
            scaler,
            eof_sent: false,
            frames_captured: 0,
            rewinds: 0,
        })
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let frame = self.convert(&decoded)?;
                self.frames_captured += 1;
                return Ok(Some(frame));
            }
            if self.eof_sent {
                return Ok(None);
            }
            match self.next_packet() {
                Some(packet) => {
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        log::warn!(
                            "FileSource: {} dropped a packet the decoder rejected: {}",
                            self.config.path,
                            e
                        );
                    }
                }
                None => {
                    self.decoder.send_eof().context("flush ffmpeg decoder")?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn next_packet(&mut self) -> Option<ffmpeg::Packet> {
        let stream_index = self.stream_index;
        self.input
            .packets()
            .find(|(stream, _)| stream.index() == stream_index)
            .map(|(_, packet)| packet)
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Result<Frame> {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let width = rgb_frame.width() as usize;
        let height = rgb_frame.height() as usize;
        let row_bytes = width * 3;
        let stride = rgb_frame.stride(0);
        let data = rgb_frame.data(0);

        let mut pixels = Vec::with_capacity(row_bytes * height);
        for row in 0..height {
            let start = row * stride;
            pixels.extend_from_slice(
                data.get(start..start + row_bytes)
                    .context("ffmpeg frame row is out of bounds")?,
            );
        }
        Frame::new(pixels, width, height)
    }

    pub(crate) fn rewind(&mut self) -> Result<()> {
        self.input
            .seek(0, ..)
            .with_context(|| format!("failed to seek '{}' to start", self.config.path))?;
        self.decoder.flush();
        self.eof_sent = false;
        self.rewinds += 1;
        Ok(())
    }

    pub(crate) fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.frames_captured,
            rewinds: self.rewinds,
            path: self.config.path.clone(),
        }
    }
}
