//! Deterministic synthetic parking lot, served for `stub://` paths.
//!
//! Two rows of bays on noisy asphalt. Cars are dark bodies with a bright
//! roof, parked and removed on a fixed schedule so tests can predict the
//! occupancy of every bay on every frame.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::frame::Frame;
use crate::region::{PixelRect, Region, RegionCollection};

pub const BAY_WIDTH: usize = 60;
pub const BAY_HEIGHT: usize = 110;
const BAY_PITCH: usize = 75;
const LOT_MARGIN: usize = 20;
/// Frames between schedule changes.
pub const SCHEDULE_PERIOD: u64 = 50;

const ASPHALT: u8 = 95;
const ASPHALT_NOISE: i16 = 12;
const LINE: [u8; 3] = [230, 230, 230];
const CAR_INSET: usize = 6;
const ROOF_INSET: usize = 8;
const ROOF: [u8; 3] = [220, 220, 225];
const BODIES: [[u8; 3]; 3] = [[30, 30, 40], [45, 20, 20], [20, 35, 25]];
const NOISE_SEED: u64 = 0x0070_6172_6b64;

/// Bay rectangles for a `width`x`height` synthetic lot, row by row.
pub fn bay_layout(width: usize, height: usize) -> RegionCollection {
    let per_row = width.saturating_sub(LOT_MARGIN) / BAY_PITCH;
    let mut rows = vec![LOT_MARGIN * 3];
    if height >= 2 * (BAY_HEIGHT + LOT_MARGIN * 3) {
        rows.push(height - BAY_HEIGHT - LOT_MARGIN * 3);
    }
    rows.into_iter()
        .filter(|&y| y + BAY_HEIGHT <= height)
        .flat_map(|y| {
            (0..per_row).map(move |col| Region {
                x: (LOT_MARGIN + col * BAY_PITCH) as i32,
                y: y as i32,
                width: BAY_WIDTH as u32,
                height: BAY_HEIGHT as u32,
            })
        })
        .collect()
}

/// Whether `bay` holds a car on 0-based frame `frame_index`.
pub fn bay_occupied(bay: usize, frame_index: u64) -> bool {
    (frame_index / SCHEDULE_PERIOD + bay as u64 * 3) % 5 < 2
}

pub(crate) struct SyntheticLot {
    width: usize,
    height: usize,
    bays: RegionCollection,
    background: Frame,
}

impl SyntheticLot {
    pub(crate) fn new(width: usize, height: usize) -> Self {
        let bays = bay_layout(width, height);
        let background = paint_background(width, height, &bays);
        Self {
            width,
            height,
            bays,
            background,
        }
    }

    pub(crate) fn render(&self, frame_index: u64) -> Frame {
        let mut frame = self.background.clone();
        for (bay, region) in self.bays.iter().enumerate() {
            if bay_occupied(bay, frame_index) {
                paint_car(&mut frame, region, BODIES[bay % BODIES.len()]);
            }
        }
        frame
    }

    pub(crate) fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}

fn paint_background(width: usize, height: usize, bays: &RegionCollection) -> Frame {
    let mut rng = StdRng::seed_from_u64(NOISE_SEED);
    let mut frame = Frame::filled(width, height, [ASPHALT; 3]);
    for y in 0..height {
        for x in 0..width {
            let v = (ASPHALT as i16 + rng.gen_range(-ASPHALT_NOISE..=ASPHALT_NOISE)) as u8;
            frame.set_pixel(x, y, [v, v, v]);
        }
    }
    // Bay separators sit in the middle of the gap between neighbours.
    let gap = (BAY_PITCH - BAY_WIDTH) / 2;
    for region in bays.iter() {
        let left = region.x as usize;
        let lines = [left.checked_sub(gap + 1), Some(left + BAY_WIDTH + gap)];
        for x in lines.into_iter().flatten().filter(|&x| x < width) {
            frame.fill_rect(
                PixelRect {
                    x,
                    y: region.y as usize,
                    width: 1,
                    height: BAY_HEIGHT,
                },
                LINE,
            );
        }
    }
    frame
}

fn paint_car(frame: &mut Frame, bay: &Region, body: [u8; 3]) {
    let body_rect = PixelRect {
        x: bay.x as usize + CAR_INSET,
        y: bay.y as usize + CAR_INSET,
        width: BAY_WIDTH - 2 * CAR_INSET,
        height: BAY_HEIGHT - 2 * CAR_INSET,
    };
    frame.fill_rect(body_rect, body);
    frame.fill_rect(
        PixelRect {
            x: body_rect.x + ROOF_INSET,
            y: body_rect.y + ROOF_INSET,
            width: body_rect.width - 2 * ROOF_INSET,
            height: body_rect.height - 2 * ROOF_INSET,
        },
        ROOF,
    );
}
