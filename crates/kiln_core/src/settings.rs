//! Global render parameters supplied alongside the scene.

use serde::{Deserialize, Serialize};

/// Order in which tiles are handed out to render workers.
///
/// Reordering never changes the partition itself, only which part of the
/// image fills in first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileOrder {
    /// Row-major, top-left first
    Normal,
    /// Row-major, bottom-right first
    Reversed,
    /// Closest to the image center first
    #[default]
    FromMiddle,
    /// Farthest from the image center first
    ToMiddle,
    /// Shuffled
    Random,
}

/// Render quality and scheduling parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Samples per pixel
    pub samples: u32,
    /// Maximum path depth
    pub bounces: u32,
    /// Tile width in pixels
    pub tile_width: u32,
    /// Tile height in pixels
    pub tile_height: u32,
    pub tile_order: TileOrder,
    /// Worker thread count. `None` (or zero) uses every logical core.
    pub threads: Option<usize>,
    /// Jitter primary rays inside the pixel footprint
    pub antialiasing: bool,
    /// Fixed random seed for reproducible renders
    pub seed: Option<u64>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            samples: 25,
            bounces: 30,
            tile_width: 32,
            tile_height: 32,
            tile_order: TileOrder::default(),
            threads: None,
            antialiasing: true,
            seed: None,
        }
    }
}

impl RenderSettings {
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_quality(mut self, samples: u32, bounces: u32) -> Self {
        self.samples = samples;
        self.bounces = bounces;
        self
    }

    pub fn with_tiles(mut self, tile_width: u32, tile_height: u32, order: TileOrder) -> Self {
        self.tile_width = tile_width;
        self.tile_height = tile_height;
        self.tile_order = order;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_antialiasing(mut self, antialiasing: bool) -> Self {
        self.antialiasing = antialiasing;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Total pixel count of the output image.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Copy of these settings with every out-of-range value clamped to a
    /// usable minimum. Each correction is logged as a warning; none of them
    /// stop the render.
    pub fn sanitized(&self) -> Self {
        let mut settings = self.clone();
        clamp_min(&mut settings.width, "image width");
        clamp_min(&mut settings.height, "image height");
        clamp_min(&mut settings.samples, "sample count");
        clamp_min(&mut settings.bounces, "bounce count");
        clamp_min(&mut settings.tile_width, "tile width");
        clamp_min(&mut settings.tile_height, "tile height");
        if settings.threads == Some(0) {
            log::warn!("Thread count of 0 requested, using detected core count");
            settings.threads = None;
        }
        settings
    }
}

fn clamp_min(value: &mut u32, what: &str) {
    if *value == 0 {
        log::warn!("Invalid {} 0, setting to 1", what);
        *value = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_clamps_zeroes() {
        let settings = RenderSettings::default()
            .with_resolution(0, 10)
            .with_quality(0, 0)
            .with_tiles(0, 0, TileOrder::Normal)
            .with_threads(0)
            .sanitized();

        assert_eq!(settings.width, 1);
        assert_eq!(settings.height, 10);
        assert_eq!(settings.samples, 1);
        assert_eq!(settings.bounces, 1);
        assert_eq!(settings.tile_width, 1);
        assert_eq!(settings.tile_height, 1);
        assert_eq!(settings.threads, None);
    }

    #[test]
    fn test_sanitized_keeps_valid_values() {
        let settings = RenderSettings::default().with_threads(3).with_seed(9);
        assert_eq!(settings.sanitized(), settings);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{ "width": 320, "samples": 4, "tile_order": "random", "seed": 7 }"#;
        let settings: RenderSettings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.width, 320);
        assert_eq!(settings.height, 480);
        assert_eq!(settings.samples, 4);
        assert_eq!(settings.tile_order, TileOrder::Random);
        assert_eq!(settings.seed, Some(7));
        assert!(settings.antialiasing);
    }
}
