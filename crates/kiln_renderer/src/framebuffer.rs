//! Frame buffers shared by the render workers.
//!
//! Workers write only the pixels inside the tile they own, and tiles never
//! overlap, so every cell has a single writer during a frame. Cells are
//! atomics so the buffers can be shared by reference without locks and read
//! by a preview observer at any time.

use crate::{RenderError, RenderResult, Tile};
use kiln_core::Color;
use kiln_math::DVec3;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Reserve `len` default cells, reporting failure instead of aborting.
fn try_alloc<T: Default>(len: usize) -> RenderResult<Vec<T>> {
    let mut cells = Vec::new();
    cells
        .try_reserve_exact(len)
        .map_err(|_| RenderError::Allocation { pixels: len })?;
    cells.resize_with(len, T::default);
    Ok(cells)
}

/// Running sum of radiance samples, one double-precision RGB triple per pixel.
#[derive(Debug)]
pub struct AccumulationBuffer {
    width: u32,
    height: u32,
    /// f64 bit patterns
    cells: Vec<[AtomicU64; 3]>,
}

impl AccumulationBuffer {
    /// Allocate a zeroed buffer.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        Ok(Self {
            width,
            height,
            cells: try_alloc(width as usize * height as usize)?,
        })
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Add one sample to pixel (x, y) and return the new sum.
    ///
    /// Only the owner of the tile containing (x, y) may call this.
    pub fn add(&self, x: u32, y: u32, sample: Color) -> DVec3 {
        let cell = &self.cells[self.offset(x, y)];
        let sample = sample.as_dvec3().to_array();
        let mut sum = [0.0; 3];
        for channel in 0..3 {
            let total = f64::from_bits(cell[channel].load(Ordering::Relaxed)) + sample[channel];
            cell[channel].store(total.to_bits(), Ordering::Relaxed);
            sum[channel] = total;
        }
        DVec3::from_array(sum)
    }

    /// Current sum at pixel (x, y).
    pub fn get(&self, x: u32, y: u32) -> DVec3 {
        let cell = &self.cells[self.offset(x, y)];
        DVec3::new(
            f64::from_bits(cell[0].load(Ordering::Relaxed)),
            f64::from_bits(cell[1].load(Ordering::Relaxed)),
            f64::from_bits(cell[2].load(Ordering::Relaxed)),
        )
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// 8-bit preview of the running average, packed RGBA per pixel.
#[derive(Debug)]
pub struct DisplayBuffer {
    width: u32,
    height: u32,
    pixels: Vec<AtomicU32>,
}

impl DisplayBuffer {
    /// Allocate a buffer with every pixel opaque black.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        let pixels: Vec<AtomicU32> = try_alloc(width as usize * height as usize)?;
        let black = u32::from_le_bytes([0, 0, 0, 255]);
        for pixel in &pixels {
            pixel.store(black, Ordering::Relaxed);
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn set(&self, x: u32, y: u32, rgba: [u8; 4]) {
        let offset = y as usize * self.width as usize + x as usize;
        self.pixels[offset].store(u32::from_le_bytes(rgba), Ordering::Relaxed);
    }

    pub fn get(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = y as usize * self.width as usize + x as usize;
        self.pixels[offset].load(Ordering::Relaxed).to_le_bytes()
    }

    /// Copy out the whole preview, row-major.
    pub fn to_rgba(&self) -> Vec<[u8; 4]> {
        self.pixels
            .iter()
            .map(|p| p.load(Ordering::Relaxed).to_le_bytes())
            .collect()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f64) -> f64 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a linear color to 8-bit RGBA.
pub fn color_to_rgba(color: DVec3) -> [u8; 4] {
    // Apply gamma correction and convert to 0-255
    let r = (255.0 * linear_to_gamma(color.x).clamp(0.0, 1.0)) as u8;
    let g = (255.0 * linear_to_gamma(color.y).clamp(0.0, 1.0)) as u8;
    let b = (255.0 * linear_to_gamma(color.z).clamp(0.0, 1.0)) as u8;
    [r, g, b, 255]
}

/// A completed render.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Averaged linear radiance per pixel (sum / samples), row-major
    pub radiance: Vec<DVec3>,
    /// Display-ready pixels, row-major
    pub pixels: Vec<[u8; 4]>,
    /// Total camera samples traced
    pub samples: u64,
    /// Wall-clock render time
    pub duration: Duration,
}

impl Frame {
    /// Resolve the accumulation buffer into averaged radiance and display pixels.
    ///
    /// `tiles` supplies the per-pixel sample counts.
    pub(crate) fn resolve(
        accumulation: &AccumulationBuffer,
        tiles: &[Tile],
        duration: Duration,
    ) -> Self {
        let width = accumulation.width();
        let height = accumulation.height();

        let mut samples_per_pixel = vec![0u32; width as usize * height as usize];
        let mut samples = 0u64;
        for tile in tiles {
            let count = tile.completed_samples();
            samples += count as u64 * tile.pixel_count() as u64;
            for (x, y) in tile.pixels() {
                samples_per_pixel[y as usize * width as usize + x as usize] = count;
            }
        }

        let radiance: Vec<DVec3> = samples_per_pixel
            .par_iter()
            .enumerate()
            .map(|(i, &count)| {
                let x = (i % width as usize) as u32;
                let y = (i / width as usize) as u32;
                accumulation.get(x, y) / count.max(1) as f64
            })
            .collect();

        let pixels = radiance.par_iter().map(|&c| color_to_rgba(c)).collect();

        Self {
            width,
            height,
            radiance,
            pixels,
            samples,
            duration,
        }
    }

    /// Averaged radiance at pixel (x, y).
    pub fn radiance(&self, x: u32, y: u32) -> DVec3 {
        self.radiance[y as usize * self.width as usize + x as usize]
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// Pixels as a flat RGBA byte slice, e.g. for an image encoder.
    pub fn as_rgba_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
}
