//! Interactive region drawing.
//!
//! `AnnotationSession` turns pointer gestures into regions: press to anchor,
//! drag to preview, release to append. Every appended region is written
//! through to the store before the next gesture starts.

use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};

use crate::region::{Point, Region, RegionCollection};
use crate::region_store::RegionStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerEvent {
    Down(Point),
    Move(Point),
    Up(Point),
}

impl FromStr for PointerEvent {
    type Err = anyhow::Error;

    /// Parses `down X Y`, `move X Y` or `up X Y`.
    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let kind = parts.next().ok_or_else(|| anyhow!("empty pointer event"))?;
        let mut coord = |axis: &str| -> Result<i32> {
            parts
                .next()
                .ok_or_else(|| anyhow!("pointer event '{}' is missing {}", line, axis))?
                .parse()
                .with_context(|| format!("pointer event '{}' has a bad {}", line, axis))
        };
        let point = Point::new(coord("x")?, coord("y")?);
        if parts.next().is_some() {
            bail!("pointer event '{}' has trailing fields", line);
        }
        match kind.to_ascii_lowercase().as_str() {
            "down" => Ok(PointerEvent::Down(point)),
            "move" => Ok(PointerEvent::Move(point)),
            "up" => Ok(PointerEvent::Up(point)),
            other => bail!("unknown pointer event kind '{}'", other),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Dragging { anchor: Point, current: Point },
}

pub struct AnnotationSession<S: RegionStore> {
    store: S,
    regions: RegionCollection,
    state: SessionState,
}

impl<S: RegionStore> AnnotationSession<S> {
    /// Start a session over whatever `store` already holds.
    pub fn open(mut store: S) -> Self {
        let regions = store.load();
        log::info!("annotation session opened with {} spaces", regions.len());
        Self {
            store,
            regions,
            state: SessionState::Idle,
        }
    }

    pub fn regions(&self) -> &RegionCollection {
        &self.regions
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rectangle under the pointer while dragging, for live feedback.
    pub fn preview(&self) -> Option<Region> {
        match self.state {
            SessionState::Dragging { anchor, current } => Region::from_corners(anchor, current).ok(),
            SessionState::Idle => None,
        }
    }

    /// Feed one pointer event.
    ///
    /// Returns the index of the region appended by a completed drag. A
    /// release without movement along both axes appends nothing. A failed
    /// save keeps the region in memory and returns the error.
    pub fn handle(&mut self, event: PointerEvent) -> Result<Option<usize>> {
        match (self.state, event) {
            (SessionState::Idle, PointerEvent::Down(anchor)) => {
                self.state = SessionState::Dragging {
                    anchor,
                    current: anchor,
                };
                Ok(None)
            }
            (SessionState::Dragging { anchor, .. }, PointerEvent::Down(restart)) => {
                log::debug!("press at {:?} while dragging from {:?}; restarting", restart, anchor);
                self.state = SessionState::Dragging {
                    anchor: restart,
                    current: restart,
                };
                Ok(None)
            }
            (SessionState::Dragging { anchor, .. }, PointerEvent::Move(current)) => {
                self.state = SessionState::Dragging { anchor, current };
                Ok(None)
            }
            (SessionState::Dragging { anchor, .. }, PointerEvent::Up(end)) => {
                self.state = SessionState::Idle;
                let region = match Region::from_corners(anchor, end) {
                    Ok(region) => region,
                    Err(e) => {
                        log::debug!("drag discarded: {:#}", e);
                        return Ok(None);
                    }
                };
                let index = self
                    .store
                    .append(&mut self.regions, region)
                    .with_context(|| format!("failed to persist space {}", region))?;
                log::info!("space {} added at {}", index, region);
                Ok(Some(index))
            }
            (SessionState::Idle, PointerEvent::Move(_) | PointerEvent::Up(_)) => Ok(None),
        }
    }

    /// Replay a whole gesture from `from` to `to`.
    pub fn drag(&mut self, from: Point, to: Point) -> Result<Option<usize>> {
        self.handle(PointerEvent::Down(from))?;
        self.handle(PointerEvent::Move(to))?;
        self.handle(PointerEvent::Up(to))
    }
}
