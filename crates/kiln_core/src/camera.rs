//! Pinhole camera for primary ray generation.

use kiln_math::{Ray, Vec2, Vec3};

/// A pinhole camera.
///
/// The camera is described by its position, the point it looks at, an up
/// vector and a vertical field of view. `initialize` caches the basis and
/// focal length for a given resolution; after that `get_ray` is a pure
/// function of the pixel coordinate and sub-pixel offset.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    // Camera positioning
    look_from: Vec3,
    look_at: Vec3,
    vup: Vec3,

    /// Vertical field of view in degrees
    vfov: f32,

    // Cached computed values (set by initialize())
    width: f32,
    height: f32,
    focal_length: f32,
    u: Vec3,
    v: Vec3,
    w: Vec3,
}

impl Camera {
    /// Camera at the origin looking down -Z with a 90 degree field of view.
    pub fn new() -> Self {
        let mut camera = Self {
            look_from: Vec3::ZERO,
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::Y,
            vfov: 90.0,
            width: 1.0,
            height: 1.0,
            focal_length: 0.5,
            u: Vec3::X,
            v: Vec3::Y,
            w: Vec3::Z,
        };
        camera.initialize(1, 1);
        camera
    }

    /// Set camera position.
    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self
    }

    /// Set the vertical field of view in degrees. Values outside (0, 180)
    /// are clamped into that range.
    pub fn with_fov(mut self, vfov: f32) -> Self {
        self.vfov = vfov.clamp(0.1, 179.0);
        self
    }

    pub fn position(&self) -> Vec3 {
        self.look_from
    }

    pub fn fov(&self) -> f32 {
        self.vfov
    }

    /// Focal length in pixel units, valid after `initialize`.
    pub fn focal_length(&self) -> f32 {
        self.focal_length
    }

    /// Cache the camera basis and focal length for an image resolution.
    ///
    /// A degenerate orientation (look-at equal to the position, or up
    /// parallel to the view direction) falls back to looking down -Z / +Y up.
    pub fn initialize(&mut self, image_width: u32, image_height: u32) {
        self.width = image_width.max(1) as f32;
        self.height = image_height.max(1) as f32;
        self.focal_length = 0.5 * self.height / (0.5 * self.vfov.to_radians()).tan();

        self.w = (self.look_from - self.look_at).try_normalize().unwrap_or(Vec3::Z);
        self.u = self
            .vup
            .cross(self.w)
            .try_normalize()
            .or_else(|| Vec3::Y.cross(self.w).try_normalize())
            .unwrap_or(Vec3::X);
        self.v = self.w.cross(self.u);
    }

    /// Generate a ray through pixel (x, y) at sub-pixel `offset` in [0, 1)².
    ///
    /// Pixel (0, 0) is the top-left corner of the image.
    pub fn get_ray(&self, x: u32, y: u32, offset: Vec2) -> Ray {
        let px = x as f32 + offset.x - 0.5 * self.width;
        let py = 0.5 * self.height - (y as f32 + offset.y);
        let direction = px * self.u + py * self.v - self.focal_length * self.w;
        Ray::new(self.look_from, direction)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}
