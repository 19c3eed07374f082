//! Glasses placement relative to the eye line.
//!
//! Sizes the glasses bitmap from the padded eye span and builds the affine
//! transform that lays it over the face: translate, then rotate by roll, then
//! skew and foreshorten by yaw, all pivoting on the eye midpoint.

use crate::types::Point2D;
use image::{imageops, imageops::FilterType, RgbaImage};
use serde::Serialize;

/// Faces turned further than this (either way) are not decorated.
pub const MAX_YAW_DEGREES: f32 = 20.0;

/// Resampled glasses larger than this many pixels are never produced.
pub const MAX_OVERLAY_PIXELS: u64 = 4096 * 4096;

/// Glasses overhang each eye by this fraction of the face width.
const SIDE_PADDING_FACE_RATIO: f32 = 1.0 / 5.0;
/// Glasses sit above the eye line by this fraction of the face width.
const TOP_PADDING_FACE_RATIO: f32 = 1.0 / 10.0;
/// Fraction of the bitmap width the glasses shift sideways, scaled by sin(yaw).
const YAW_SHIFT_WIDTH_RATIO: f32 = 1.0 / 5.0;

/// A 2×3 affine transform.
///
/// ```text
/// | sx  kx  tx |
/// | ky  sy  ty |
/// ```
///
/// `post_*` builders pre-multiply, so each new operation applies after the
/// ones already in the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Affine {
    pub sx: f32,
    pub kx: f32,
    pub tx: f32,
    pub ky: f32,
    pub sy: f32,
    pub ty: f32,
}

impl Affine {
    pub const fn identity() -> Self {
        Self { sx: 1.0, kx: 0.0, tx: 0.0, ky: 0.0, sy: 1.0, ty: 0.0 }
    }

    pub const fn translate(dx: f32, dy: f32) -> Self {
        Self { sx: 1.0, kx: 0.0, tx: dx, ky: 0.0, sy: 1.0, ty: dy }
    }

    /// Rotation by `degrees` (clockwise on a y-down surface) about `(px, py)`.
    pub fn rotation(degrees: f32, px: f32, py: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            sx: cos,
            kx: -sin,
            tx: sin * py + (1.0 - cos) * px,
            ky: sin,
            sy: cos,
            ty: -sin * px + (1.0 - cos) * py,
        }
    }

    pub fn skew(kx: f32, ky: f32, px: f32, py: f32) -> Self {
        Self { sx: 1.0, kx, tx: -kx * py, ky, sy: 1.0, ty: -ky * px }
    }

    pub fn scale(sx: f32, sy: f32, px: f32, py: f32) -> Self {
        Self { sx, kx: 0.0, tx: px - sx * px, ky: 0.0, sy, ty: py - sy * py }
    }

    /// `self × other`: the result applies `other` first, then `self`.
    pub fn concat(&self, other: &Affine) -> Affine {
        Affine {
            sx: self.sx * other.sx + self.kx * other.ky,
            kx: self.sx * other.kx + self.kx * other.sy,
            tx: self.sx * other.tx + self.kx * other.ty + self.tx,
            ky: self.ky * other.sx + self.sy * other.ky,
            sy: self.ky * other.kx + self.sy * other.sy,
            ty: self.ky * other.tx + self.sy * other.ty + self.ty,
        }
    }

    pub fn post_rotate(self, degrees: f32, px: f32, py: f32) -> Self {
        Affine::rotation(degrees, px, py).concat(&self)
    }

    pub fn post_skew(self, kx: f32, ky: f32, px: f32, py: f32) -> Self {
        Affine::skew(kx, ky, px, py).concat(&self)
    }

    pub fn post_scale(self, sx: f32, sy: f32, px: f32, py: f32) -> Self {
        Affine::scale(sx, sy, px, py).concat(&self)
    }

    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.sx * x + self.kx * y + self.tx,
            self.ky * x + self.sy * y + self.ty,
        )
    }

    /// Inverse transform, or `None` when the linear part is singular.
    pub fn invert(&self) -> Option<Affine> {
        let det = self.sx * self.sy - self.kx * self.ky;
        if det.abs() < 1e-12 || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;
        let sx = self.sy * inv_det;
        let kx = -self.kx * inv_det;
        let ky = -self.ky * inv_det;
        let sy = self.sx * inv_det;
        Some(Affine {
            sx,
            kx,
            tx: -(sx * self.tx + kx * self.ty),
            ky,
            sy,
            ty: -(ky * self.tx + sy * self.ty),
        })
    }

    pub fn is_finite(&self) -> bool {
        [self.sx, self.kx, self.tx, self.ky, self.sy, self.ty]
            .iter()
            .all(|v| v.is_finite())
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

/// Where and how large to draw the glasses for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlayGeometry {
    /// Padded eye span, before truncation to whole pixels.
    pub target_width: f32,
    pub target_height: f32,
    /// Pixel size the source bitmap is resampled to.
    pub scaled_size: (u32, u32),
    /// Pivot for rotation, skew and scale.
    pub center: Point2D,
    /// Maps resampled-bitmap coordinates onto the surface.
    pub transform: Affine,
}

impl OverlayGeometry {
    /// Pixel count of the resampled bitmap.
    pub fn pixel_count(&self) -> u64 {
        self.scaled_size.0 as u64 * self.scaled_size.1 as u64
    }

    /// Whether the resampled bitmap stays within [`MAX_OVERLAY_PIXELS`].
    pub fn fits_pixel_budget(&self) -> bool {
        self.pixel_count() <= MAX_OVERLAY_PIXELS
    }
}

/// Computes glasses geometry from eye positions and head angles. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayTransformCalculator;

impl OverlayTransformCalculator {
    /// Place a `source_size` bitmap across the eye line.
    ///
    /// `face_width` is in surface units; `roll` and `yaw` are degrees.
    /// Returns `None` when `|yaw|` exceeds [`MAX_YAW_DEGREES`].
    /// Inputs are expected to be finite with positive sizes.
    pub fn compute(
        &self,
        left_eye: Point2D,
        right_eye: Point2D,
        face_width: f32,
        roll: f32,
        yaw: f32,
        source_size: (u32, u32),
    ) -> Option<OverlayGeometry> {
        if yaw.abs() > MAX_YAW_DEGREES {
            return None;
        }

        let aspect_ratio = source_size.1 as f32 / source_size.0 as f32;
        let side_padding = face_width * SIDE_PADDING_FACE_RATIO;
        let top_padding = face_width * TOP_PADDING_FACE_RATIO;

        let dx = (right_eye.x - left_eye.x + 2.0 * side_padding).abs();
        let dy = (right_eye.y - left_eye.y).abs();
        let target_width = dy.hypot(dx);
        let target_height = target_width * aspect_ratio;

        // Bitmaps have whole-pixel sizes; never collapse to zero.
        let scaled_size = ((target_width as u32).max(1), (target_height as u32).max(1));
        let scaled_width = scaled_size.0 as f32;

        // Vertical pivot: the lower eye's y, raised by half the vertical eye gap.
        let center_x = right_eye.x - (right_eye.x - left_eye.x) / 2.0;
        let center_y = right_eye.y.max(left_eye.y) - (right_eye.y - left_eye.y).abs() / 2.0;

        let yaw_rad = yaw.to_radians();
        let half_yaw_shear = -(yaw / 2.0).to_radians().sin();
        let foreshorten = yaw_rad.cos();

        let transform = Affine::translate(
            center_x - scaled_width / 2.0 - scaled_width * YAW_SHIFT_WIDTH_RATIO * yaw_rad.sin(),
            center_y - top_padding * roll.to_radians().cos(),
        )
        .post_rotate(roll, center_x, center_y)
        .post_skew(half_yaw_shear, half_yaw_shear, center_x, center_y)
        .post_scale(foreshorten, foreshorten, center_x, center_y);

        Some(OverlayGeometry {
            target_width,
            target_height,
            scaled_size,
            center: Point2D::new(center_x, center_y),
            transform,
        })
    }
}

/// Geometry plus the bitmap resampled to `geometry.scaled_size`.
#[derive(Debug, Clone)]
pub struct OverlayPlacement {
    pub geometry: OverlayGeometry,
    pub bitmap: RgbaImage,
}

impl OverlayPlacement {
    /// Resample `source` with bilinear filtering to the geometry's pixel size.
    pub fn resample(geometry: OverlayGeometry, source: &RgbaImage) -> Self {
        let (width, height) = geometry.scaled_size;
        let bitmap = imageops::resize(source, width, height, FilterType::Triangle);
        Self { geometry, bitmap }
    }
}
