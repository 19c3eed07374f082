//! facegear-core — Glasses overlay placement for tracked faces.
//!
//! Consumes detector observations (eye landmarks, face width, head angles),
//! computes the affine placement of a glasses bitmap across the eye line and
//! composites it onto RGBA frames.

pub mod asset;
pub mod compositor;
pub mod graphic;
pub mod mapping;
pub mod placement;
pub mod slot;
pub mod types;

pub use asset::{AssetError, GlassesAsset};
pub use compositor::RgbaSurface;
pub use graphic::{FaceGraphic, Graphic, RenderOutcome, Surface};
pub use mapping::CoordinateMapper;
pub use placement::{
    Affine, OverlayGeometry, OverlayPlacement, OverlayTransformCalculator, MAX_OVERLAY_PIXELS,
    MAX_YAW_DEGREES,
};
pub use slot::ObservationSlot;
pub use types::{EyeMetrics, FaceObservation, Landmark, Landmarks, ObservationError, Point2D};
