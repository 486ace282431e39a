//! Fusion of the two eyes' gaze rays into a single dot on the display.
//!
//! [`DotEstimator`] owns the display calibration and a small policy
//! ([`EstimatorConfig`]). Each call to [`DotEstimator::estimate`] is a pure
//! function of the sample and that fixed state, so the estimator can be shared
//! freely across threads once built.

use crate::{
    constants::{PARALLEL_EPSILON, SENTINEL_EYE_CENTER},
    display::DisplaySurface,
    geometry::{closest_approach, intersect_ray_plane, Ray, RayHit, RayMiss},
    Error, Result,
};
use nalgebra::{Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// How two valid plane hits are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FusionMode {
    /// Mean of the two ray/plane intersections
    #[default]
    Average,
    /// Vergence point of the two rays, projected along the cyclopean ray
    ClosestApproach,
}

impl std::str::FromStr for FusionMode {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "average" => Ok(Self::Average),
            "closest_approach" | "closest" | "vergence" => Ok(Self::ClosestApproach),
            other => Err(Error::ConfigError(format!(
                "Unknown fusion mode {other:?} (expected average or closest_approach)"
            ))),
        }
    }
}

/// What to do when only one eye's ray reaches the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Both rays must hit, otherwise the frame has no dot
    #[default]
    StrictDualRay,
    /// Use the single hit and mark the estimate as degraded
    SingleRayFallback,
}

/// Estimator policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Fusion strategy when both rays hit
    pub fusion: FusionMode,
    /// Single-hit behaviour
    pub fallback: FallbackPolicy,
    /// Rays with `|cos|` to the display normal at or below this are parallel
    pub parallel_epsilon: f64,
    /// Rays with `1 - |cos|` between them at or below this are parallel
    pub vergence_epsilon: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            fusion: FusionMode::Average,
            fallback: FallbackPolicy::StrictDualRay,
            parallel_epsilon: PARALLEL_EPSILON,
            vergence_epsilon: PARALLEL_EPSILON,
        }
    }
}

impl EstimatorConfig {
    /// Check tolerances are usable
    ///
    /// # Errors
    ///
    /// Returns an error if either epsilon is negative, non-finite or `>= 1`.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("parallel_epsilon", self.parallel_epsilon),
            ("vergence_epsilon", self.vergence_epsilon),
        ] {
            if !(value.is_finite() && (0.0..1.0).contains(&value)) {
                return Err(Error::ConfigError(format!(
                    "{name} must be in [0, 1), got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// One eye's gaze: eyeball centre and gaze direction, camera space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeRay {
    /// Eyeball centre
    pub eyeball_center: Point3<f64>,
    /// Gaze direction, pointing out of the eye
    pub gaze: Vector3<f64>,
}

impl EyeRay {
    /// Create an eye ray
    #[must_use]
    pub const fn new(eyeball_center: Point3<f64>, gaze: Vector3<f64>) -> Self {
        Self { eyeball_center, gaze }
    }

    /// Build from trackers that report a missing eye model as the centre
    /// `(0, 0, -1)`. Such centres, and non-finite ones, give `None`.
    #[must_use]
    pub fn from_sentinel(eyeball_center: [f64; 3], gaze: [f64; 3]) -> Option<Self> {
        if eyeball_center == SENTINEL_EYE_CENTER || !eyeball_center.iter().all(|v| v.is_finite()) {
            return None;
        }
        Some(Self::new(Point3::from(eyeball_center), Vector3::from(gaze)))
    }

    /// The eye's gaze as a ray
    #[must_use]
    pub const fn ray(&self) -> Ray {
        Ray::new(self.eyeball_center, self.gaze)
    }
}

/// Both eyes for one frame. `None` means no eye model this frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GazeSample {
    /// Left eye
    pub left: Option<EyeRay>,
    /// Right eye
    pub right: Option<EyeRay>,
}

impl GazeSample {
    /// Create a sample from two optional eyes
    #[must_use]
    pub const fn new(left: Option<EyeRay>, right: Option<EyeRay>) -> Self {
        Self { left, right }
    }

    /// Sample with no eye model for either eye
    #[must_use]
    pub const fn empty() -> Self {
        Self { left: None, right: None }
    }

    /// Build from the sentinel convention: `(gaze0, gaze1, centre0, centre1)`
    /// for the left and right eye.
    #[must_use]
    pub fn from_sentinel(gaze0: [f64; 3], gaze1: [f64; 3], center0: [f64; 3], center1: [f64; 3]) -> Self {
        Self::new(EyeRay::from_sentinel(center0, gaze0), EyeRay::from_sentinel(center1, gaze1))
    }

    /// True when both eyes carry a model
    #[must_use]
    pub const fn has_eye_model(&self) -> bool {
        self.left.is_some() && self.right.is_some()
    }
}

/// Why a frame produced no dot
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EstimateFailure {
    /// At least one eye had no fitted eye model
    #[error("no eye model available")]
    NoEyeModel,

    /// Rays (near) parallel to the display or to each other
    #[error("gaze rays are degenerate")]
    DegenerateRays,

    /// The display lies behind the eye along the gaze direction
    #[error("display is behind the gaze origin")]
    BehindOrigin,

    /// The fused point is off the display's active area
    #[error("gaze point is outside the display")]
    OutOfBounds,
}

impl EstimateFailure {
    /// All failure reasons, in a fixed order
    pub const ALL: [Self; 4] = [Self::NoEyeModel, Self::DegenerateRays, Self::BehindOrigin, Self::OutOfBounds];

    /// Stable reason code for logs and reports
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoEyeModel => "NO_EYE_MODEL",
            Self::DegenerateRays => "DEGENERATE_RAYS",
            Self::BehindOrigin => "BEHIND_ORIGIN",
            Self::OutOfBounds => "OUT_OF_BOUNDS",
        }
    }
}

impl From<RayMiss> for EstimateFailure {
    fn from(miss: RayMiss) -> Self {
        match miss {
            RayMiss::Parallel => Self::DegenerateRays,
            RayMiss::Behind => Self::BehindOrigin,
        }
    }
}

/// Which rays contributed to a dot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DotSource {
    /// Both eyes
    Both,
    /// Left eye only (single-ray fallback)
    LeftOnly,
    /// Right eye only (single-ray fallback)
    RightOnly,
}

/// A dot on the display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DotEstimate {
    /// Canvas pixel position
    pub point: Point2<f64>,
    /// Position on the panel in display-local units (`z == 0`)
    pub display_local: Point3<f64>,
    /// Contributing rays
    pub source: DotSource,
}

impl DotEstimate {
    /// True when only one eye was used
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.source != DotSource::Both
    }
}

/// Gaze-to-display estimator
#[derive(Debug, Clone)]
pub struct DotEstimator {
    surface: DisplaySurface,
    config: EstimatorConfig,
}

impl DotEstimator {
    /// Create an estimator for a display
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration tolerances are invalid.
    pub fn new(surface: DisplaySurface, config: EstimatorConfig) -> Result<Self> {
        config.validate()?;
        log::info!(
            "Dot estimator ready: fusion {:?}, fallback {:?}",
            config.fusion,
            config.fallback
        );
        Ok(Self { surface, config })
    }

    /// Display calibration in use
    #[must_use]
    pub const fn surface(&self) -> &DisplaySurface {
        &self.surface
    }

    /// Policy in use
    #[must_use]
    pub const fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Estimate the dot for one frame.
    ///
    /// # Errors
    ///
    /// Returns the [`EstimateFailure`] explaining why no dot can be drawn.
    pub fn estimate(&self, sample: &GazeSample) -> std::result::Result<DotEstimate, EstimateFailure> {
        let (Some(left), Some(right)) = (sample.left, sample.right) else {
            return Err(EstimateFailure::NoEyeModel);
        };

        let left_ray = self.surface.ray_to_display_local(&left.ray());
        let right_ray = self.surface.ray_to_display_local(&right.ray());
        let plane = self.surface.plane();
        let eps = self.config.parallel_epsilon;

        let left_hit = intersect_ray_plane(&left_ray, &plane, eps);
        let right_hit = intersect_ray_plane(&right_ray, &plane, eps);

        let (display_local, source) = match (left_hit, right_hit) {
            (Ok(l), Ok(r)) => (self.fuse(&left_ray, &right_ray, &l, &r)?, DotSource::Both),
            (Ok(l), Err(miss)) => (self.single(&l, miss)?, DotSource::LeftOnly),
            (Err(miss), Ok(r)) => (self.single(&r, miss)?, DotSource::RightOnly),
            (Err(a), Err(b)) => {
                return Err(if a == RayMiss::Behind || b == RayMiss::Behind {
                    EstimateFailure::BehindOrigin
                } else {
                    EstimateFailure::DegenerateRays
                });
            }
        };

        let point = self.surface.local_to_pixels(&display_local);
        if !self.surface.is_within_bounds(&point) {
            return Err(EstimateFailure::OutOfBounds);
        }

        Ok(DotEstimate {
            point,
            display_local,
            source,
        })
    }

    fn fuse(
        &self,
        left_ray: &Ray,
        right_ray: &Ray,
        left_hit: &RayHit,
        right_hit: &RayHit,
    ) -> std::result::Result<Point3<f64>, EstimateFailure> {
        match self.config.fusion {
            FusionMode::Average => Ok(nalgebra::center(&left_hit.point, &right_hit.point)),
            FusionMode::ClosestApproach => {
                let vergence = closest_approach(left_ray, right_ray, self.config.vergence_epsilon)
                    .ok_or(EstimateFailure::DegenerateRays)?;
                if !vergence.in_front() {
                    return Err(EstimateFailure::BehindOrigin);
                }

                let cyclops = nalgebra::center(&left_ray.origin, &right_ray.origin);
                let cyclopean_ray = Ray::new(cyclops, vergence.midpoint() - cyclops);
                let hit = intersect_ray_plane(&cyclopean_ray, &self.surface.plane(), self.config.parallel_epsilon)?;
                Ok(hit.point)
            }
        }
    }

    fn single(&self, hit: &RayHit, other: RayMiss) -> std::result::Result<Point3<f64>, EstimateFailure> {
        match self.config.fallback {
            FallbackPolicy::StrictDualRay => Err(other.into()),
            FallbackPolicy::SingleRayFallback => Ok(hit.point),
        }
    }
}
