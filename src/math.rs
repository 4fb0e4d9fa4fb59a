//! Types, aliases and helper operations for doing math with `ultraviolet`.
use std::f64::consts::PI;
pub use ultraviolet as uv;

pub type Vec2 = uv::DVec2;
pub type Vec4 = uv::DVec4;
/// Homogeneous 4x4 matrix. Poses cache one of these for renderers and other consumers
/// that want the whole transformation in one piece.
pub type Mat4 = uv::DMat4;

/// An angle in either degrees or radians.
/// Default conversion from f64 is in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub enum Angle {
    Rad(f64),
    Deg(f64),
}

impl Angle {
    /// Get the angle as degrees.
    #[inline]
    pub fn deg(&self) -> f64 {
        match self {
            Angle::Rad(rad) => rad * 180.0 / PI,
            Angle::Deg(deg) => *deg,
        }
    }

    /// Get the angle as radians.
    #[inline]
    pub fn rad(&self) -> f64 {
        match self {
            Angle::Rad(rad) => *rad,
            Angle::Deg(deg) => deg * PI / 180.0,
        }
    }
}

impl Default for Angle {
    fn default() -> Self {
        Angle::Rad(0.0)
    }
}

impl From<f64> for Angle {
    #[inline]
    fn from(deg: f64) -> Self {
        Angle::Deg(deg)
    }
}

// Vec2 utils

#[inline]
pub fn left_normal(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// The z component of the 3D cross product of two vectors lying on the xy plane.
#[inline]
pub fn cross(v1: Vec2, v2: Vec2) -> f64 {
    v1.x * v2.y - v1.y * v2.x
}

/// Cross product `scalar·ẑ × v` of a vector along the z axis with a vector on the xy plane,
/// i.e. `v` rotated a quarter turn left and scaled.
#[inline]
pub fn cross_scalar(v: Vec2, scalar: f64) -> Vec2 {
    left_normal(v) * scalar
}

/// Project `v` onto `axis`. The axis doesn't need to be normalized.
///
/// With `positive_only` set, projections pointing against the axis are clamped to zero.
/// A zero-length axis projects everything to zero.
#[inline]
pub fn project(axis: Vec2, v: Vec2, positive_only: bool) -> Vec2 {
    let axis_len_sq = axis.mag_sq();
    if axis_len_sq == 0.0 {
        return Vec2::zero();
    }
    let mut resolute = v.dot(axis) / axis_len_sq;
    if positive_only && resolute < 0.0 {
        resolute = 0.0;
    }
    axis * resolute
}

/// Rotate a vector counterclockwise by an angle in radians.
#[inline]
pub fn rotate(v: Vec2, radians: f64) -> Vec2 {
    let (sin, cos) = radians.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}
