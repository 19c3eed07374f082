//! The face graphic: accepts detector updates and draws glasses on demand.

use crate::asset::GlassesAsset;
use crate::mapping::CoordinateMapper;
use crate::placement::{Affine, OverlayGeometry, OverlayPlacement, OverlayTransformCalculator, MAX_OVERLAY_PIXELS};
use crate::slot::ObservationSlot;
use crate::types::{FaceObservation, ObservationError};
use image::RgbaImage;

/// Something a placed bitmap can be composited onto.
pub trait Surface {
    fn dimensions(&self) -> (u32, u32);
    fn draw_bitmap(&mut self, bitmap: &RgbaImage, transform: &Affine);
}

/// An overlay element driven by detector updates.
pub trait Graphic {
    /// Publish a new observation. Callable from any thread.
    fn update(&self, observation: FaceObservation);
    /// Draw the latest observation onto `surface`.
    fn render(&self, surface: &mut dyn Surface) -> RenderOutcome;
}

/// What a render pass did.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Drawn(OverlayGeometry),
    /// Nothing has been published yet.
    NoObservation,
    /// The latest observation lacks a landmark or is degenerate.
    Incomplete(ObservationError),
    /// The head is turned too far to decorate.
    YawOutOfRange { yaw: f32 },
}

impl RenderOutcome {
    pub fn is_drawn(&self) -> bool {
        matches!(self, RenderOutcome::Drawn(_))
    }
}

/// Glasses overlay for a single tracked face.
pub struct FaceGraphic {
    slot: ObservationSlot,
    glasses: GlassesAsset,
    mapper: CoordinateMapper,
    calculator: OverlayTransformCalculator,
}

impl FaceGraphic {
    pub fn new(glasses: GlassesAsset) -> Self {
        Self {
            slot: ObservationSlot::new(),
            glasses,
            mapper: CoordinateMapper::identity(),
            calculator: OverlayTransformCalculator,
        }
    }

    /// Map detector coordinates through `mapper` before placement.
    pub fn with_mapper(mut self, mapper: CoordinateMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn slot(&self) -> &ObservationSlot {
        &self.slot
    }

    /// Compute this frame's placement without drawing it.
    pub fn place(&self, observation: &FaceObservation) -> Result<Option<OverlayPlacement>, ObservationError> {
        Ok(self.geometry(observation)?.map(|g| OverlayPlacement::resample(g, self.glasses.image())))
    }

    fn geometry(&self, observation: &FaceObservation) -> Result<Option<OverlayGeometry>, ObservationError> {
        let landmarks = self.mapper.map_observation(observation).landmarks()?;
        // The detector's left eye goes in the calculator's right-eye slot.
        let geometry = self.calculator.compute(
            landmarks.right_eye,
            landmarks.left_eye,
            landmarks.width,
            landmarks.roll,
            landmarks.yaw,
            self.glasses.size(),
        );
        match geometry {
            Some(g) if !g.fits_pixel_budget() => {
                tracing::warn!(
                    width = g.scaled_size.0,
                    height = g.scaled_size.1,
                    max_pixels = MAX_OVERLAY_PIXELS,
                    "glasses bitmap too large; skipping frame"
                );
                Err(ObservationError::Degenerate("glasses bitmap exceeds pixel budget"))
            }
            other => Ok(other),
        }
    }

    /// Draw a snapshot the caller already read from the slot.
    ///
    /// Lets a render loop pair the drawn observation with the generation it
    /// read alongside it (see [`ObservationSlot::snapshot`]).
    pub fn render_snapshot(
        &self,
        observation: Option<&FaceObservation>,
        surface: &mut dyn Surface,
    ) -> RenderOutcome {
        let Some(observation) = observation else {
            return RenderOutcome::NoObservation;
        };

        let placement = match self.place(observation) {
            Ok(Some(placement)) => placement,
            Ok(None) => {
                tracing::debug!(yaw = observation.euler_y, "yaw out of range; skipping glasses");
                return RenderOutcome::YawOutOfRange { yaw: observation.euler_y };
            }
            Err(err) => {
                tracing::debug!(error = %err, "incomplete observation; skipping frame");
                return RenderOutcome::Incomplete(err);
            }
        };

        let geometry = placement.geometry;
        tracing::debug!(
            width = geometry.scaled_size.0,
            height = geometry.scaled_size.1,
            center_x = geometry.center.x,
            center_y = geometry.center.y,
            roll = observation.euler_z,
            yaw = observation.euler_y,
            "drawing glasses"
        );
        surface.draw_bitmap(&placement.bitmap, &geometry.transform);
        RenderOutcome::Drawn(geometry)
    }
}

impl Graphic for FaceGraphic {
    fn update(&self, observation: FaceObservation) {
        self.slot.publish(observation);
    }

    fn render(&self, surface: &mut dyn Surface) -> RenderOutcome {
        // Read the slot once; the pass draws only this snapshot.
        let observation = self.slot.latest();
        self.render_snapshot(observation.as_deref(), surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::RgbaSurface;
    use crate::types::tests::complete_observation;
    use crate::types::{Landmark, Point2D};
    use image::Rgba;

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    /// Records draw calls instead of rasterizing.
    #[derive(Default)]
    struct RecordingSurface {
        draws: Vec<((u32, u32), Affine)>,
    }

    impl Surface for RecordingSurface {
        fn dimensions(&self) -> (u32, u32) {
            (640, 480)
        }

        fn draw_bitmap(&mut self, bitmap: &RgbaImage, transform: &Affine) {
            self.draws.push((bitmap.dimensions(), *transform));
        }
    }

    fn red_glasses() -> GlassesAsset {
        GlassesAsset::from_image(RgbaImage::from_pixel(200, 100, Rgba([255, 0, 0, 255]))).unwrap()
    }

    #[test]
    fn test_render_without_observation() {
        let graphic = FaceGraphic::new(red_glasses());
        let mut surface = RecordingSurface::default();
        assert_eq!(graphic.render(&mut surface), RenderOutcome::NoObservation);
        assert!(surface.draws.is_empty());
    }

    #[test]
    fn test_render_draws_fixture_placement() {
        let graphic = FaceGraphic::new(red_glasses());
        graphic.update(complete_observation());

        let mut surface = RecordingSurface::default();
        let outcome = graphic.render(&mut surface);
        let RenderOutcome::Drawn(geometry) = outcome else {
            panic!("expected a draw, got {outcome:?}");
        };
        assert_eq!(geometry.scaled_size, (120, 60));
        assert_eq!(surface.draws, vec![((120, 60), Affine::translate(60.0, 180.0))]);
    }

    #[test]
    fn test_missing_landmark_skips_draw() {
        let graphic = FaceGraphic::new(red_glasses());
        let mut obs = complete_observation();
        obs.mouth_bottom = None;
        graphic.update(obs);

        let mut surface = RecordingSurface::default();
        assert_eq!(
            graphic.render(&mut surface),
            RenderOutcome::Incomplete(ObservationError::MissingLandmark(Landmark::MouthBottom))
        );
        assert!(surface.draws.is_empty());
    }

    #[test]
    fn test_excessive_yaw_skips_draw() {
        let graphic = FaceGraphic::new(red_glasses());
        let mut obs = complete_observation();
        obs.euler_y = -32.0;
        graphic.update(obs);

        let mut surface = RecordingSurface::default();
        assert_eq!(graphic.render(&mut surface), RenderOutcome::YawOutOfRange { yaw: -32.0 });
        assert!(surface.draws.is_empty());
    }

    #[test]
    fn test_latest_update_wins() {
        let graphic = FaceGraphic::new(red_glasses());
        let mut first = complete_observation();
        first.euler_y = 40.0;
        graphic.update(first);
        graphic.update(complete_observation());

        let mut surface = RecordingSurface::default();
        assert!(graphic.render(&mut surface).is_drawn());
        assert_eq!(graphic.slot().generation(), 2);
    }

    #[test]
    fn test_mapper_applies_before_placement() {
        // Detector runs at half resolution; mapping doubles everything.
        let obs = CoordinateMapper::new((2, 2), (1, 1), false).map_observation(&complete_observation());
        let graphic = FaceGraphic::new(red_glasses())
            .with_mapper(CoordinateMapper::new((1, 1), (2, 2), false));
        graphic.update(obs);

        let mut surface = RecordingSurface::default();
        let RenderOutcome::Drawn(geometry) = graphic.render(&mut surface) else {
            panic!("expected a draw");
        };
        assert_eq!(geometry.center, Point2D::new(120.0, 200.0));
        assert_eq!(geometry.scaled_size, (120, 60));
    }

    #[test]
    fn test_render_composites_onto_frame() {
        let graphic = FaceGraphic::new(red_glasses());
        graphic.update(complete_observation());

        let mut surface = RgbaSurface::new(RgbaImage::from_pixel(300, 300, BLACK));
        assert!(graphic.render(&mut surface).is_drawn());

        let frame = surface.into_frame();
        let Rgba([r, g, b, _]) = *frame.get_pixel(120, 210);
        assert!(r >= 250 && g <= 5 && b <= 5, "center pixel = {r},{g},{b}");
        assert_eq!(frame.get_pixel(59, 210), &BLACK);
        assert_eq!(frame.get_pixel(120, 179), &BLACK);
    }

    #[test]
    fn test_huge_face_width_is_skipped_not_allocated() {
        let graphic = FaceGraphic::new(red_glasses());
        let mut obs = complete_observation();
        obs.width = 1.0e10;
        graphic.update(obs);

        let mut surface = RgbaSurface::new(RgbaImage::from_pixel(64, 64, BLACK));
        assert!(matches!(
            graphic.render(&mut surface),
            RenderOutcome::Incomplete(ObservationError::Degenerate(_))
        ));
        assert!(surface.frame().pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn test_render_snapshot_draws_what_was_read() {
        let graphic = FaceGraphic::new(red_glasses());
        graphic.update(complete_observation());
        let (generation, snapshot) = graphic.slot().snapshot();

        // A publish lands between the read and the draw.
        let mut turned = complete_observation();
        turned.euler_y = 40.0;
        graphic.update(turned);

        let mut surface = RecordingSurface::default();
        assert_eq!(generation, 1);
        assert!(graphic.render_snapshot(snapshot.as_deref(), &mut surface).is_drawn());
        assert_eq!(surface.draws.len(), 1);

        let (next, latest) = graphic.slot().snapshot();
        assert_eq!(next, 2);
        assert_eq!(
            graphic.render_snapshot(latest.as_deref(), &mut surface),
            RenderOutcome::YawOutOfRange { yaw: 40.0 }
        );
        assert_eq!(surface.draws.len(), 1);
    }

    #[test]
    fn test_render_snapshot_without_observation() {
        let graphic = FaceGraphic::new(red_glasses());
        let mut surface = RecordingSurface::default();
        assert_eq!(graphic.render_snapshot(None, &mut surface), RenderOutcome::NoObservation);
    }
}
