//! Affine bitmap compositing onto an RGBA frame.
//!
//! The center of each destination pixel inside the transformed bitmap's
//! bounding box is mapped back through the inverse transform, sampled
//! bilinearly and blended source-over onto the frame.

use crate::graphic::Surface;
use crate::placement::Affine;
use image::{Rgba, RgbaImage};

/// An in-memory frame the overlay is drawn onto.
pub struct RgbaSurface {
    frame: RgbaImage,
}

impl RgbaSurface {
    pub fn new(frame: RgbaImage) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    pub fn into_frame(self) -> RgbaImage {
        self.frame
    }
}

impl Surface for RgbaSurface {
    fn dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    fn draw_bitmap(&mut self, bitmap: &RgbaImage, transform: &Affine) {
        composite_affine(&mut self.frame, bitmap, transform);
    }
}

/// Destination pixel range covered by `bitmap` under `transform`, clipped to the frame.
fn covered_region(
    transform: &Affine,
    bitmap: (u32, u32),
    frame: (u32, u32),
) -> Option<(u32, u32, u32, u32)> {
    let (bw, bh) = (bitmap.0 as f32, bitmap.1 as f32);
    let corners = [(0.0, 0.0), (bw, 0.0), (0.0, bh), (bw, bh)].map(|(x, y)| transform.map_point(x, y));

    let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min).floor();
    let max_x = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max).ceil();
    let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min).floor();
    let max_y = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max).ceil();

    let x0 = min_x.max(0.0);
    let y0 = min_y.max(0.0);
    let x1 = max_x.min(frame.0 as f32);
    let y1 = max_y.min(frame.1 as f32);
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

/// Bilinear RGBA sample with premultiplied alpha. Outside the bitmap is transparent.
fn sample_bilinear(bitmap: &RgbaImage, sx: f32, sy: f32) -> [f32; 4] {
    let (w, h) = (bitmap.width() as i64, bitmap.height() as i64);
    let x0 = sx.floor() as i64;
    let y0 = sy.floor() as i64;
    let fx = sx - x0 as f32;
    let fy = sy - y0 as f32;

    let texel = |x: i64, y: i64| -> [f32; 4] {
        if x >= 0 && x < w && y >= 0 && y < h {
            let Rgba([r, g, b, a]) = *bitmap.get_pixel(x as u32, y as u32);
            let alpha = a as f32 / 255.0;
            [r as f32 * alpha, g as f32 * alpha, b as f32 * alpha, a as f32]
        } else {
            [0.0; 4]
        }
    };

    let taps = [
        (texel(x0, y0), (1.0 - fx) * (1.0 - fy)),
        (texel(x0 + 1, y0), fx * (1.0 - fy)),
        (texel(x0, y0 + 1), (1.0 - fx) * fy),
        (texel(x0 + 1, y0 + 1), fx * fy),
    ];

    let mut out = [0.0f32; 4];
    for (value, weight) in taps {
        if weight == 0.0 {
            continue;
        }
        for (o, v) in out.iter_mut().zip(value) {
            *o += v * weight;
        }
    }
    out
}

/// Draw `bitmap` onto `frame` through `transform` (bitmap space → frame space).
///
/// A singular or non-finite transform draws nothing.
pub fn composite_affine(frame: &mut RgbaImage, bitmap: &RgbaImage, transform: &Affine) {
    if !transform.is_finite() {
        return;
    }
    let Some(inverse) = transform.invert() else {
        return;
    };
    let Some((x0, y0, x1, y1)) = covered_region(transform, bitmap.dimensions(), frame.dimensions()) else {
        return;
    };

    for dy in y0..y1 {
        for dx in x0..x1 {
            // Pixel centers map to pixel centers.
            let (sx, sy) = inverse.map_point(dx as f32 + 0.5, dy as f32 + 0.5);
            let [pr, pg, pb, pa] = sample_bilinear(bitmap, sx - 0.5, sy - 0.5);
            if pa <= 0.0 {
                continue;
            }
            let src_alpha = (pa / 255.0).min(1.0);
            let keep = 1.0 - src_alpha;

            let dst = frame.get_pixel_mut(dx, dy);
            let Rgba([dr, dg, db, da]) = *dst;
            let blend = |premul: f32, under: u8| (premul + under as f32 * keep).round().clamp(0.0, 255.0) as u8;
            *dst = Rgba([
                blend(pr, dr),
                blend(pg, dg),
                blend(pb, db),
                (pa + da as f32 * keep).round().clamp(0.0, 255.0) as u8,
            ]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    #[test]
    fn test_translation_places_bitmap_exactly() {
        let mut frame = RgbaImage::from_pixel(300, 300, BLACK);
        let bitmap = RgbaImage::from_pixel(120, 60, RED);
        composite_affine(&mut frame, &bitmap, &Affine::translate(60.0, 180.0));

        assert_eq!(frame.get_pixel(60, 180), &RED);
        assert_eq!(frame.get_pixel(179, 239), &RED);
        assert_eq!(frame.get_pixel(59, 180), &BLACK);
        assert_eq!(frame.get_pixel(180, 180), &BLACK);
        assert_eq!(frame.get_pixel(60, 240), &BLACK);
    }

    #[test]
    fn test_transparent_pixels_leave_frame_untouched() {
        let mut frame = RgbaImage::from_pixel(20, 20, BLACK);
        let bitmap = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 0]));
        composite_affine(&mut frame, &bitmap, &Affine::translate(5.0, 5.0));
        assert!(frame.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn test_half_alpha_blends() {
        let mut frame = RgbaImage::from_pixel(4, 4, BLACK);
        let bitmap = RgbaImage::from_pixel(4, 4, Rgba([200, 100, 0, 128]));
        composite_affine(&mut frame, &bitmap, &Affine::identity());
        let Rgba([r, g, b, a]) = *frame.get_pixel(1, 1);
        assert!((r as i32 - 100).abs() <= 1, "r = {r}");
        assert!((g as i32 - 50).abs() <= 1, "g = {g}");
        assert_eq!(b, 0);
        assert_eq!(a, 255);
    }

    #[test]
    fn test_offscreen_and_clipped() {
        let mut frame = RgbaImage::from_pixel(50, 50, BLACK);
        let bitmap = RgbaImage::from_pixel(30, 30, RED);
        composite_affine(&mut frame, &bitmap, &Affine::translate(500.0, 500.0));
        assert!(frame.pixels().all(|p| *p == BLACK));

        composite_affine(&mut frame, &bitmap, &Affine::translate(40.0, -20.0));
        assert_eq!(frame.get_pixel(45, 5), &RED);
        assert_eq!(frame.get_pixel(45, 15), &BLACK);
    }

    #[test]
    fn test_upscale_samples_at_pixel_centers() {
        // Red and blue texels doubled horizontally: the two inner pixels mirror each other.
        let mut frame = RgbaImage::from_pixel(4, 1, BLACK);
        let mut bitmap = RgbaImage::new(2, 1);
        bitmap.put_pixel(0, 0, RED);
        bitmap.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
        composite_affine(&mut frame, &bitmap, &Affine::scale(2.0, 1.0, 0.0, 0.0));

        let Rgba([r1, _, b1, _]) = *frame.get_pixel(1, 0);
        let Rgba([r2, _, b2, _]) = *frame.get_pixel(2, 0);
        assert_eq!((r1, b1), (b2, r2));
        assert!(r1 > b1, "pixel 1 leans red: r={r1} b={b1}");
        assert!((r1 as i32 - 191).abs() <= 1, "r1 = {r1}");
    }

    #[test]
    fn test_singular_transform_draws_nothing() {
        let mut frame = RgbaImage::from_pixel(10, 10, BLACK);
        let bitmap = RgbaImage::from_pixel(10, 10, RED);
        composite_affine(&mut frame, &bitmap, &Affine::scale(0.0, 0.0, 0.0, 0.0));
        assert!(frame.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn test_rotated_bitmap_covers_pivot() {
        let mut frame = RgbaImage::from_pixel(100, 100, BLACK);
        let bitmap = RgbaImage::from_pixel(40, 10, RED);
        let t = Affine::translate(30.0, 45.0).post_rotate(90.0, 50.0, 50.0);
        composite_affine(&mut frame, &bitmap, &t);
        // A horizontal bar turned vertical through the pivot.
        assert_eq!(frame.get_pixel(50, 40), &RED);
        assert_eq!(frame.get_pixel(50, 60), &RED);
        assert_eq!(frame.get_pixel(70, 50), &BLACK);
    }

    #[test]
    fn test_surface_trait_draws_into_frame() {
        let mut surface = RgbaSurface::new(RgbaImage::from_pixel(10, 10, BLACK));
        assert_eq!(surface.dimensions(), (10, 10));
        surface.draw_bitmap(&RgbaImage::from_pixel(2, 2, RED), &Affine::translate(3.0, 3.0));
        assert_eq!(surface.frame().get_pixel(4, 4), &RED);
        assert_eq!(surface.into_frame().get_pixel(5, 5), &BLACK);
    }
}
