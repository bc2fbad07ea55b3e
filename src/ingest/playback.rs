//! Continuous playback over a frame source.
//!
//! A frame that fails to decode is skipped with a warning. Playback only
//! gives up after `MAX_CONSECUTIVE_FAILURES` reads in a row have failed.

use anyhow::{anyhow, Result};

use super::file::FileSource;
use crate::frame::Frame;

pub const MAX_CONSECUTIVE_FAILURES: u32 = 30;

/// Anything that hands out frames in order and can restart from the first.
pub trait FrameSource {
    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Restart from the first frame.
    fn rewind(&mut self) -> Result<()>;
}

impl FrameSource for FileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        FileSource::next_frame(self)
    }

    fn rewind(&mut self) -> Result<()> {
        FileSource::rewind(self)
    }
}

#[derive(Debug)]
pub enum PlaybackEvent {
    Frame(Frame),
    /// First frame after the source looped back to its start. Temporal
    /// state built from earlier frames no longer applies.
    Restarted(Frame),
    /// A frame could not be read and was dropped.
    Skipped,
    /// End of stream with looping disabled.
    Finished,
}

pub struct Playback<S: FrameSource> {
    source: S,
    looping: bool,
    max_failures: u32,
    consecutive_failures: u32,
    skipped: u64,
    restarted: bool,
}

impl<S: FrameSource> Playback<S> {
    pub fn new(source: S, looping: bool) -> Self {
        Self {
            source,
            looping,
            max_failures: MAX_CONSECUTIVE_FAILURES,
            consecutive_failures: 0,
            skipped: 0,
            restarted: false,
        }
    }

    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures.max(1);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Frames dropped since playback started.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Advance by one frame.
    ///
    /// Errors only when the source keeps failing, or when a looping source
    /// has no frames at all.
    pub fn advance(&mut self) -> Result<PlaybackEvent> {
        match self.source.next_frame() {
            Ok(Some(frame)) => Ok(self.deliver(frame)),
            Ok(None) if !self.looping => Ok(PlaybackEvent::Finished),
            Ok(None) => {
                if self.restarted {
                    return Err(anyhow!("frame source is empty after rewinding"));
                }
                if let Err(e) = self.source.rewind() {
                    return self.fail(e.context("failed to rewind frame source"));
                }
                self.restarted = true;
                self.advance()
            }
            Err(e) => self.fail(e),
        }
    }

    fn deliver(&mut self, frame: Frame) -> PlaybackEvent {
        self.consecutive_failures = 0;
        if std::mem::take(&mut self.restarted) {
            PlaybackEvent::Restarted(frame)
        } else {
            PlaybackEvent::Frame(frame)
        }
    }

    fn fail(&mut self, e: anyhow::Error) -> Result<PlaybackEvent> {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.max_failures {
            return Err(e.context(format!(
                "giving up after {} consecutive frame failures",
                self.consecutive_failures
            )));
        }
        self.skipped += 1;
        log::warn!(
            "frame skipped ({} failures in a row): {:#}",
            self.consecutive_failures,
            e
        );
        Ok(PlaybackEvent::Skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Numbered solid frames; reads listed in `bad` fail like a corrupt packet.
    struct ScriptedSource {
        frames: usize,
        bad: HashSet<usize>,
        position: usize,
        rewind_fails: bool,
    }

    impl ScriptedSource {
        fn new(frames: usize, bad: &[usize]) -> Self {
            Self {
                frames,
                bad: bad.iter().copied().collect(),
                position: 0,
                rewind_fails: false,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.position >= self.frames {
                return Ok(None);
            }
            let index = self.position;
            self.position += 1;
            if self.bad.contains(&index) {
                return Err(anyhow!("invalid data found when processing input"));
            }
            Ok(Some(Frame::filled(4, 4, [index as u8; 3])))
        }

        fn rewind(&mut self) -> Result<()> {
            if self.rewind_fails {
                return Err(anyhow!("seek failed"));
            }
            self.position = 0;
            Ok(())
        }
    }

    fn shade(event: &PlaybackEvent) -> Option<u8> {
        match event {
            PlaybackEvent::Frame(frame) | PlaybackEvent::Restarted(frame) => {
                Some(frame.pixel(0, 0)[0])
            }
            _ => None,
        }
    }

    #[test]
    fn corrupt_frame_is_skipped_and_playback_continues() {
        let mut playback = Playback::new(ScriptedSource::new(4, &[1]), false);

        assert_eq!(shade(&playback.advance().unwrap()), Some(0));
        assert!(matches!(playback.advance().unwrap(), PlaybackEvent::Skipped));
        assert_eq!(shade(&playback.advance().unwrap()), Some(2));
        assert_eq!(shade(&playback.advance().unwrap()), Some(3));
        assert!(matches!(playback.advance().unwrap(), PlaybackEvent::Finished));
        assert_eq!(playback.skipped(), 1);
    }

    #[test]
    fn looping_marks_the_first_frame_after_restart() {
        let mut playback = Playback::new(ScriptedSource::new(2, &[]), true);

        assert!(matches!(playback.advance().unwrap(), PlaybackEvent::Frame(_)));
        assert!(matches!(playback.advance().unwrap(), PlaybackEvent::Frame(_)));
        let event = playback.advance().unwrap();
        assert!(matches!(event, PlaybackEvent::Restarted(_)));
        assert_eq!(shade(&event), Some(0));
        assert!(matches!(playback.advance().unwrap(), PlaybackEvent::Frame(_)));
    }

    #[test]
    fn restart_is_reported_even_when_first_frame_is_bad() {
        let mut playback = Playback::new(ScriptedSource::new(3, &[0]), true);

        assert!(matches!(playback.advance().unwrap(), PlaybackEvent::Skipped));
        assert!(matches!(playback.advance().unwrap(), PlaybackEvent::Frame(_)));
        assert!(matches!(playback.advance().unwrap(), PlaybackEvent::Frame(_)));
        assert!(matches!(playback.advance().unwrap(), PlaybackEvent::Skipped));
        let event = playback.advance().unwrap();
        assert!(matches!(event, PlaybackEvent::Restarted(_)));
        assert_eq!(shade(&event), Some(1));
    }

    #[test]
    fn gives_up_after_consecutive_failures() {
        let bad: Vec<usize> = (0..10).collect();
        let mut playback = Playback::new(ScriptedSource::new(10, &bad), false).with_max_failures(3);

        assert!(matches!(playback.advance().unwrap(), PlaybackEvent::Skipped));
        assert!(matches!(playback.advance().unwrap(), PlaybackEvent::Skipped));
        assert!(playback.advance().is_err());
    }

    #[test]
    fn good_frame_resets_the_failure_run() {
        let mut playback =
            Playback::new(ScriptedSource::new(6, &[0, 1, 3, 4]), false).with_max_failures(3);

        for _ in 0..6 {
            assert!(playback.advance().is_ok());
        }
        assert!(matches!(playback.advance().unwrap(), PlaybackEvent::Finished));
        assert_eq!(playback.skipped(), 4);
    }

    #[test]
    fn failing_rewind_is_skipped_until_limit() {
        let mut source = ScriptedSource::new(1, &[]);
        source.rewind_fails = true;
        let mut playback = Playback::new(source, true).with_max_failures(2);

        assert!(matches!(playback.advance().unwrap(), PlaybackEvent::Frame(_)));
        assert!(matches!(playback.advance().unwrap(), PlaybackEvent::Skipped));
        assert!(playback.advance().is_err());
    }

    #[test]
    fn empty_looping_source_is_an_error() {
        let mut playback = Playback::new(ScriptedSource::new(0, &[]), true);
        assert!(playback.advance().is_err());
    }
}
