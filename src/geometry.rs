//! Ray and plane primitives used by the dot estimator.
//!
//! All quantities are `f64` nalgebra types. Directions do not need to be unit
//! length; tolerance checks are done on normalised copies so that the same
//! epsilon works regardless of how the tracker scales its gaze vectors.

use nalgebra::{Point3, Vector3};

/// Half-line `origin + t * direction`, `t >= 0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Start of the ray (eyeball centre for gaze rays)
    pub origin: Point3<f64>,
    /// Direction of travel, not necessarily normalised
    pub direction: Vector3<f64>,
}

impl Ray {
    /// Create a new ray
    #[must_use]
    pub const fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Self {
        Self { origin, direction }
    }

    /// Point at parameter `t` along the ray
    #[must_use]
    pub fn at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction * t
    }

    /// Unit direction, or `None` for a zero or non-finite direction
    #[must_use]
    pub fn unit_direction(&self) -> Option<Vector3<f64>> {
        if !self.direction.iter().all(|v| v.is_finite()) {
            return None;
        }
        self.direction.try_normalize(crate::constants::EPSILON)
    }
}

/// Infinite plane through `point` with normal `normal`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Any point on the plane
    pub point: Point3<f64>,
    /// Plane normal, not necessarily normalised
    pub normal: Vector3<f64>,
}

impl Plane {
    /// Create a new plane
    #[must_use]
    pub const fn new(point: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self { point, normal }
    }

    /// The `z = 0` plane
    #[must_use]
    pub fn xy() -> Self {
        Self::new(Point3::origin(), Vector3::z())
    }

    /// Signed distance from `p` to the plane along the unit normal
    #[must_use]
    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        let n = self.normal.normalize();
        (p - self.point).dot(&n)
    }
}

/// Successful ray/plane intersection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Ray parameter of the hit, always `>= 0`
    pub t: f64,
    /// Hit position
    pub point: Point3<f64>,
}

/// Why a ray did not reach a plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RayMiss {
    /// Direction (anti)parallel to the plane, or unusable direction
    Parallel,
    /// The plane lies behind the ray origin
    Behind,
}

/// Intersect a ray with a plane.
///
/// `epsilon` bounds `|d̂·n̂|`, the cosine between the unit direction and the
/// unit normal. Anything at or below it counts as parallel.
///
/// # Errors
///
/// Returns [`RayMiss::Parallel`] for grazing or degenerate directions and
/// [`RayMiss::Behind`] when the hit would need `t < 0`.
pub fn intersect_ray_plane(ray: &Ray, plane: &Plane, epsilon: f64) -> Result<RayHit, RayMiss> {
    let direction = ray.unit_direction().ok_or(RayMiss::Parallel)?;
    let normal = plane.normal.try_normalize(crate::constants::EPSILON).ok_or(RayMiss::Parallel)?;

    let cos = direction.dot(&normal);
    if cos.abs() <= epsilon {
        return Err(RayMiss::Parallel);
    }

    // Solve in terms of the caller's direction so `t` keeps its scale
    let t = (plane.point - ray.origin).dot(&normal) / ray.direction.dot(&normal);
    if !t.is_finite() {
        return Err(RayMiss::Parallel);
    }
    if t < 0.0 {
        return Err(RayMiss::Behind);
    }

    Ok(RayHit { t, point: ray.at(t) })
}

/// Closest pair of points between the infinite lines carrying two rays
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestApproach {
    /// Parameter on the first ray
    pub t0: f64,
    /// Parameter on the second ray
    pub t1: f64,
    /// Point on the first ray
    pub p0: Point3<f64>,
    /// Point on the second ray
    pub p1: Point3<f64>,
}

impl ClosestApproach {
    /// Midpoint of the closest pair
    #[must_use]
    pub fn midpoint(&self) -> Point3<f64> {
        nalgebra::center(&self.p0, &self.p1)
    }

    /// Gap between the two lines at closest approach
    #[must_use]
    pub fn distance(&self) -> f64 {
        (self.p1 - self.p0).norm()
    }

    /// True when both parameters are non-negative, i.e. the rays converge
    #[must_use]
    pub fn in_front(&self) -> bool {
        self.t0 >= 0.0 && self.t1 >= 0.0
    }
}

/// Closest approach of two rays treated as lines.
///
/// Returns `None` when the directions are parallel: `1 - |d̂0·d̂1| <= epsilon`,
/// or either direction is unusable.
#[must_use]
pub fn closest_approach(ray0: &Ray, ray1: &Ray, epsilon: f64) -> Option<ClosestApproach> {
    let u0 = ray0.unit_direction()?;
    let u1 = ray1.unit_direction()?;
    if 1.0 - u0.dot(&u1).abs() <= epsilon {
        return None;
    }

    // Solve on unit directions, then rescale to each ray's own parameter
    let w = ray0.origin - ray1.origin;
    let b = u0.dot(&u1);
    let d = u0.dot(&w);
    let e = u1.dot(&w);
    let denom = 1.0 - b * b;

    let s0 = (b * e - d) / denom;
    let s1 = (e - b * d) / denom;
    let t0 = s0 / ray0.direction.norm();
    let t1 = s1 / ray1.direction.norm();

    Some(ClosestApproach {
        t0,
        t1,
        p0: ray0.origin + u0 * s0,
        p1: ray1.origin + u1 * s1,
    })
}

/// Nearest intersection of a ray with a sphere, `None` if it misses or the
/// sphere is entirely behind the origin
#[must_use]
pub fn intersect_ray_sphere(ray: &Ray, center: &Point3<f64>, radius: f64) -> Option<RayHit> {
    let a = ray.direction.norm_squared();
    if a <= crate::constants::EPSILON || !a.is_finite() {
        return None;
    }

    let oc = ray.origin - center;
    let half_b = oc.dot(&ray.direction);
    let c = oc.norm_squared() - radius * radius;
    let discriminant = half_b * half_b - a * c;
    if discriminant < 0.0 {
        return None;
    }

    let root = discriminant.sqrt();
    let near = (-half_b - root) / a;
    let far = (-half_b + root) / a;
    let t = if near >= 0.0 {
        near
    } else if far >= 0.0 {
        far
    } else {
        return None;
    };

    Some(RayHit { t, point: ray.at(t) })
}
