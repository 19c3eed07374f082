use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Eye radius as a fraction of the inter-eye distance.
const EYE_RADIUS_PROPORTION: f32 = 0.45;
const IRIS_RADIUS_PROPORTION: f32 = EYE_RADIUS_PROPORTION / 2.0;

/// A point in surface (or detector) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2D) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    pub fn midpoint(&self, other: &Point2D) -> Point2D {
        Point2D::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// The nine named points a detector reports for a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landmark {
    Position,
    LeftEye,
    RightEye,
    NoseBase,
    MouthLeft,
    MouthBottom,
    MouthRight,
    LeftEar,
    RightEar,
}

impl fmt::Display for Landmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Landmark::Position => "position",
            Landmark::LeftEye => "left_eye",
            Landmark::RightEye => "right_eye",
            Landmark::NoseBase => "nose_base",
            Landmark::MouthLeft => "mouth_left",
            Landmark::MouthBottom => "mouth_bottom",
            Landmark::MouthRight => "mouth_right",
            Landmark::LeftEar => "left_ear",
            Landmark::RightEar => "right_ear",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObservationError {
    #[error("landmark missing from observation: {0}")]
    MissingLandmark(Landmark),
    #[error("degenerate observation: {0}")]
    Degenerate(&'static str),
}

/// One detector result, as published per analyzed camera frame.
///
/// Landmarks the detector could not locate are `None`. Angles are in degrees:
/// `euler_y` is yaw (left/right turn), `euler_z` is roll (in-plane tilt).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceObservation {
    #[serde(default)]
    pub position: Option<Point2D>,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub left_eye: Option<Point2D>,
    #[serde(default)]
    pub right_eye: Option<Point2D>,
    #[serde(default)]
    pub nose_base: Option<Point2D>,
    #[serde(default)]
    pub mouth_left: Option<Point2D>,
    #[serde(default)]
    pub mouth_bottom: Option<Point2D>,
    #[serde(default)]
    pub mouth_right: Option<Point2D>,
    #[serde(default)]
    pub left_ear: Option<Point2D>,
    #[serde(default)]
    pub right_ear: Option<Point2D>,
    #[serde(default)]
    pub euler_y: f32,
    #[serde(default)]
    pub euler_z: f32,
}

impl FaceObservation {
    /// Extract the complete landmark set, or report why this frame must be skipped.
    ///
    /// Every one of the nine points must be present even though only the eyes
    /// feed the placement; a partial face is never decorated.
    pub fn landmarks(&self) -> Result<Landmarks, ObservationError> {
        let require = |point: Option<Point2D>, which: Landmark| -> Result<Point2D, ObservationError> {
            let p = point.ok_or(ObservationError::MissingLandmark(which))?;
            if !p.is_finite() {
                return Err(ObservationError::Degenerate("non-finite landmark coordinate"));
            }
            Ok(p)
        };

        let landmarks = Landmarks {
            position: require(self.position, Landmark::Position)?,
            left_eye: require(self.left_eye, Landmark::LeftEye)?,
            right_eye: require(self.right_eye, Landmark::RightEye)?,
            nose_base: require(self.nose_base, Landmark::NoseBase)?,
            mouth_left: require(self.mouth_left, Landmark::MouthLeft)?,
            mouth_bottom: require(self.mouth_bottom, Landmark::MouthBottom)?,
            mouth_right: require(self.mouth_right, Landmark::MouthRight)?,
            left_ear: require(self.left_ear, Landmark::LeftEar)?,
            right_ear: require(self.right_ear, Landmark::RightEar)?,
            width: self.width,
            height: self.height,
            yaw: self.euler_y,
            roll: self.euler_z,
        };

        if !(self.width.is_finite() && self.height.is_finite()) {
            return Err(ObservationError::Degenerate("non-finite face size"));
        }
        if self.width <= 0.0 {
            return Err(ObservationError::Degenerate("face width must be positive"));
        }
        if !(self.euler_y.is_finite() && self.euler_z.is_finite()) {
            return Err(ObservationError::Degenerate("non-finite head angle"));
        }

        Ok(landmarks)
    }
}

/// A fully populated observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmarks {
    pub position: Point2D,
    pub left_eye: Point2D,
    pub right_eye: Point2D,
    pub nose_base: Point2D,
    pub mouth_left: Point2D,
    pub mouth_bottom: Point2D,
    pub mouth_right: Point2D,
    pub left_ear: Point2D,
    pub right_ear: Point2D,
    pub width: f32,
    pub height: f32,
    /// Degrees.
    pub yaw: f32,
    /// Degrees.
    pub roll: f32,
}

impl Landmarks {
    pub fn eye_metrics(&self) -> EyeMetrics {
        EyeMetrics::between(&self.left_eye, &self.right_eye)
    }
}

/// Eye and iris sizes derived from the inter-eye distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EyeMetrics {
    pub distance: f32,
    pub eye_radius: f32,
    pub iris_radius: f32,
}

impl EyeMetrics {
    pub fn between(left_eye: &Point2D, right_eye: &Point2D) -> Self {
        let distance = left_eye.distance(right_eye);
        Self {
            distance,
            eye_radius: EYE_RADIUS_PROPORTION * distance,
            iris_radius: IRIS_RADIUS_PROPORTION * distance,
        }
    }
}
