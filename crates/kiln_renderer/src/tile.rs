//! Tile-based work distribution.
//!
//! Divides the image into tiles that are rendered independently and in
//! parallel. A `TilePool` hands tiles out through a single atomic cursor,
//! so each tile is claimed by exactly one worker.

use crate::{RenderError, RenderResult};
use kiln_core::TileOrder;
use kiln_math::UVec2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

/// A rectangular region of the image.
///
/// The region is fixed at partition time; the progress fields are updated
/// by the worker that owns the tile and read by observers.
#[derive(Debug)]
pub struct Tile {
    /// Position of this tile in the render order
    index: usize,
    /// Top-left corner (inclusive)
    begin: UVec2,
    /// Bottom-right corner (exclusive)
    end: UVec2,
    completed_samples: AtomicU32,
    is_rendering: AtomicBool,
    is_complete: AtomicBool,
}

impl Tile {
    fn new(index: usize, begin: UVec2, end: UVec2) -> Self {
        Self {
            index,
            begin,
            end,
            completed_samples: AtomicU32::new(0),
            is_rendering: AtomicBool::new(false),
            is_complete: AtomicBool::new(false),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn begin(&self) -> UVec2 {
        self.begin
    }

    pub fn end(&self) -> UVec2 {
        self.end
    }

    pub fn width(&self) -> u32 {
        self.end.x - self.begin.x
    }

    pub fn height(&self) -> u32 {
        self.end.y - self.begin.y
    }

    /// Get the total number of pixels in this tile.
    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Iterate the tile's pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.begin.y..self.end.y).flat_map(move |y| (self.begin.x..self.end.x).map(move |x| (x, y)))
    }

    pub fn completed_samples(&self) -> u32 {
        self.completed_samples.load(Ordering::Acquire)
    }

    pub fn is_rendering(&self) -> bool {
        self.is_rendering.load(Ordering::Acquire)
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete.load(Ordering::Acquire)
    }

    pub(crate) fn finish_sample_pass(&self) {
        self.completed_samples.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn release(&self) {
        self.is_rendering.store(false, Ordering::Release);
    }

    pub(crate) fn complete(&self) {
        self.is_complete.store(true, Ordering::Release);
        self.is_rendering.store(false, Ordering::Release);
    }

    pub fn snapshot(&self) -> TileSnapshot {
        TileSnapshot {
            index: self.index,
            begin: self.begin,
            end: self.end,
            completed_samples: self.completed_samples(),
            is_rendering: self.is_rendering(),
            is_complete: self.is_complete(),
        }
    }

    fn distance_to_center_sq(&self, width: u32, height: u32) -> f32 {
        let center_x = width as f32 / 2.0;
        let center_y = height as f32 / 2.0;
        let tile_center_x = (self.begin.x + self.end.x) as f32 / 2.0;
        let tile_center_y = (self.begin.y + self.end.y) as f32 / 2.0;
        (tile_center_x - center_x).powi(2) + (tile_center_y - center_y).powi(2)
    }
}

/// Point-in-time copy of a tile's progress, for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSnapshot {
    pub index: usize,
    pub begin: UVec2,
    pub end: UVec2,
    pub completed_samples: u32,
    pub is_rendering: bool,
    pub is_complete: bool,
}

/// Number of tiles `partition` cuts for the given image and tile size.
pub fn tile_count(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Option<usize> {
    let columns = width.div_ceil(tile_width.max(1)) as usize;
    let rows = height.div_ceil(tile_height.max(1)) as usize;
    columns.checked_mul(rows)
}

/// Split an image into tiles and order them.
///
/// Tiles are cut row-major; the last row and column are clipped to the
/// image. `order` only permutes the list, and `shuffle_seed` is used by
/// `TileOrder::Random`. Tile indices follow the final order.
///
/// The tile list is reserved up front, so a frame too large to schedule
/// returns `RenderError::Allocation` instead of aborting the process.
pub fn partition(
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    order: TileOrder,
    shuffle_seed: u64,
) -> RenderResult<Vec<Tile>> {
    let tile_width = tile_width.max(1);
    let tile_height = tile_height.max(1);
    let pixels = width as usize * height as usize;

    let count = tile_count(width, height, tile_width, tile_height)
        .ok_or(RenderError::Allocation { pixels })?;
    let mut tiles = Vec::new();
    tiles
        .try_reserve_exact(count)
        .map_err(|_| RenderError::Allocation { pixels })?;

    // Generate grid of tiles
    for y in (0..height).step_by(tile_height as usize) {
        for x in (0..width).step_by(tile_width as usize) {
            let begin = UVec2::new(x, y);
            let end = UVec2::new(
                x.saturating_add(tile_width).min(width),
                y.saturating_add(tile_height).min(height),
            );
            tiles.push(Tile::new(tiles.len(), begin, end));
        }
    }

    // Unstable sorts keyed on the row-major index: no scratch allocation,
    // same result as a stable sort
    match order {
        TileOrder::Normal => {}
        TileOrder::Reversed => tiles.reverse(),
        // Closest to the center first, so the focus of the frame shows up early
        TileOrder::FromMiddle => tiles.sort_unstable_by(|a, b| {
            a.distance_to_center_sq(width, height)
                .total_cmp(&b.distance_to_center_sq(width, height))
                .then(a.index.cmp(&b.index))
        }),
        TileOrder::ToMiddle => tiles.sort_unstable_by(|a, b| {
            b.distance_to_center_sq(width, height)
                .total_cmp(&a.distance_to_center_sq(width, height))
                .then(a.index.cmp(&b.index))
        }),
        TileOrder::Random => tiles.shuffle(&mut StdRng::seed_from_u64(shuffle_seed)),
    }

    // Update indices after sorting
    for (i, tile) in tiles.iter_mut().enumerate() {
        tile.index = i;
    }

    Ok(tiles)
}

/// Shared queue of tiles for one frame.
#[derive(Debug)]
pub struct TilePool {
    tiles: Vec<Tile>,
    cursor: AtomicUsize,
}

impl TilePool {
    pub fn new(tiles: Vec<Tile>) -> Self {
        Self {
            tiles,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claim the next unclaimed tile, or `None` once every tile is taken.
    pub fn next_tile(&self) -> Option<&Tile> {
        let index = self.cursor.fetch_add(1, Ordering::AcqRel);
        let tile = self.tiles.get(index)?;
        tile.is_rendering.store(true, Ordering::Release);
        Some(tile)
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn snapshots(&self) -> Vec<TileSnapshot> {
        self.tiles.iter().map(Tile::snapshot).collect()
    }
}
