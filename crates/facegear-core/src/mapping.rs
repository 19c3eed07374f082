//! Detector-to-surface coordinate mapping.

use crate::types::{FaceObservation, Point2D};

/// Scales detector coordinates onto the rendering surface, mirroring
/// horizontally for a front-facing camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    pub width_scale: f32,
    pub height_scale: f32,
    pub mirrored: bool,
    pub surface_width: f32,
}

impl CoordinateMapper {
    /// Mapper for a detector running on `preview` frames shown on a `surface`.
    ///
    /// A zero-sized preview leaves the corresponding axis unscaled.
    pub fn new(preview: (u32, u32), surface: (u32, u32), front_facing: bool) -> Self {
        let ratio = |to: u32, from: u32| if from == 0 { 1.0 } else { to as f32 / from as f32 };
        Self {
            width_scale: ratio(surface.0, preview.0),
            height_scale: ratio(surface.1, preview.1),
            mirrored: front_facing,
            surface_width: surface.0 as f32,
        }
    }

    /// Pass-through mapper for observations already in surface space.
    pub fn identity() -> Self {
        Self {
            width_scale: 1.0,
            height_scale: 1.0,
            mirrored: false,
            surface_width: 0.0,
        }
    }

    pub fn scale_x(&self, horizontal: f32) -> f32 {
        horizontal * self.width_scale
    }

    pub fn scale_y(&self, vertical: f32) -> f32 {
        vertical * self.height_scale
    }

    pub fn translate_x(&self, x: f32) -> f32 {
        if self.mirrored {
            self.surface_width - self.scale_x(x)
        } else {
            self.scale_x(x)
        }
    }

    pub fn translate_y(&self, y: f32) -> f32 {
        self.scale_y(y)
    }

    pub fn map_point(&self, p: Point2D) -> Point2D {
        Point2D::new(self.translate_x(p.x), self.translate_y(p.y))
    }

    /// Map every present landmark and scale the face size. Angles are unchanged.
    pub fn map_observation(&self, obs: &FaceObservation) -> FaceObservation {
        let map = |p: Option<Point2D>| p.map(|p| self.map_point(p));
        FaceObservation {
            position: map(obs.position),
            width: self.scale_x(obs.width),
            height: self.scale_y(obs.height),
            left_eye: map(obs.left_eye),
            right_eye: map(obs.right_eye),
            nose_base: map(obs.nose_base),
            mouth_left: map(obs.mouth_left),
            mouth_bottom: map(obs.mouth_bottom),
            mouth_right: map(obs.mouth_right),
            left_ear: map(obs.left_ear),
            right_ear: map(obs.right_ear),
            euler_y: obs.euler_y,
            euler_z: obs.euler_z,
        }
    }
}

impl Default for CoordinateMapper {
    fn default() -> Self {
        Self::identity()
    }
}
