//! Poses (translation, rotation and scale) that shapes are attached to.
//!
//! Shapes never own their pose. They hold a [`PoseKey`][self::PoseKey]
//! into a [`PoseArena`][self::PoseArena] that owns every pose in the simulation.

use crate::math::{self as m, Angle, Mat4, Vec2, Vec4};

mod arena;
pub use arena::{PoseArena, PoseError, PoseKey};

/// Capability shared by every pose variant.
///
/// Points are mapped from local to global space by scaling, then rotating, then translating.
pub trait Transform {
    fn translation(&self) -> Vec2;
    /// Rotation in radians, counterclockwise.
    fn rotation(&self) -> f64;
    /// Per-axis scale.
    fn scale(&self) -> Vec2;
    /// The whole transformation as a homogeneous matrix.
    fn matrix(&self) -> Mat4;

    /// Map a point from local to global space.
    ///
    /// With `as_vector` set the input is treated as a free direction:
    /// it is only rotated, neither scaled nor translated.
    fn local_to_global(&self, point: Vec2, as_vector: bool) -> Vec2 {
        if as_vector {
            return m::rotate(point, self.rotation());
        }
        let scale = self.scale();
        let scaled = Vec2::new(point.x * scale.x, point.y * scale.y);
        m::rotate(scaled, self.rotation()) + self.translation()
    }

    /// Map a point from global to local space. Inverse of `local_to_global`.
    ///
    /// Zero scale on an axis collapses that axis to zero.
    fn global_to_local(&self, point: Vec2) -> Vec2 {
        let unrotated = m::rotate(point - self.translation(), -self.rotation());
        let scale = self.scale();
        Vec2::new(
            if scale.x != 0.0 { unrotated.x / scale.x } else { 0.0 },
            if scale.y != 0.0 { unrotated.y / scale.y } else { 0.0 },
        )
    }
}

//
// Static
//

/// A pose that only changes when explicitly set.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "PoseParams", into = "PoseParams")
)]
pub struct StaticPose {
    translation: Vec2,
    rotation: f64,
    scale: Vec2,
    matrix: Mat4,
}

impl StaticPose {
    pub fn new(translation: Vec2, rotation: Angle, scale: Vec2) -> Self {
        let mut pose = StaticPose {
            translation,
            rotation: rotation.rad(),
            scale,
            matrix: Mat4::identity(),
        };
        pose.update_matrix();
        pose
    }

    pub fn identity() -> Self {
        Self::new(Vec2::zero(), Angle::Rad(0.0), Vec2::new(1.0, 1.0))
    }

    /// A unit-scale, unrotated pose at the given position.
    pub fn at(translation: Vec2) -> Self {
        Self::new(translation, Angle::Rad(0.0), Vec2::new(1.0, 1.0))
    }

    #[inline]
    pub fn with_rotation(mut self, rotation: Angle) -> Self {
        self.set_rotation(rotation);
        self
    }

    #[inline]
    pub fn with_scale(mut self, scale: Vec2) -> Self {
        self.set_scale(scale);
        self
    }

    pub fn set_translation(&mut self, translation: Vec2) {
        self.translation = translation;
        self.update_matrix();
    }

    pub fn set_rotation(&mut self, rotation: Angle) {
        self.rotation = rotation.rad();
        self.update_matrix();
    }

    pub fn set_scale(&mut self, scale: Vec2) {
        self.scale = scale;
        self.update_matrix();
    }

    /// Compose a pose defined relative to `self` into the space `self` lives in.
    pub fn compose(&self, local: &StaticPose) -> StaticPose {
        StaticPose::new(
            self.local_to_global(local.translation, false),
            Angle::Rad(self.rotation + local.rotation),
            Vec2::new(self.scale.x * local.scale.x, self.scale.y * local.scale.y),
        )
    }

    fn update_matrix(&mut self) {
        let (sin, cos) = self.rotation.sin_cos();
        self.matrix = Mat4::new(
            Vec4::new(self.scale.x * cos, self.scale.x * sin, 0.0, 0.0),
            Vec4::new(-self.scale.y * sin, self.scale.y * cos, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0, 0.0),
            Vec4::new(self.translation.x, self.translation.y, 0.0, 1.0),
        );
    }
}

impl PartialEq for StaticPose {
    fn eq(&self, other: &Self) -> bool {
        // the matrix is derived from the other fields
        self.translation == other.translation
            && self.rotation == other.rotation
            && self.scale == other.scale
    }
}

impl Default for StaticPose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform for StaticPose {
    #[inline]
    fn translation(&self) -> Vec2 {
        self.translation
    }
    #[inline]
    fn rotation(&self) -> f64 {
        self.rotation
    }
    #[inline]
    fn scale(&self) -> Vec2 {
        self.scale
    }
    #[inline]
    fn matrix(&self) -> Mat4 {
        self.matrix
    }

    fn local_to_global(&self, point: Vec2, as_vector: bool) -> Vec2 {
        if as_vector {
            return m::rotate(point, self.rotation);
        }
        let global = self.matrix * Vec4::new(point.x, point.y, 0.0, 1.0);
        Vec2::new(global.x, global.y)
    }
}

/// Serialized form of a [`StaticPose`][self::StaticPose], without the cached matrix.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-types", serde(default))]
pub struct PoseParams {
    pub translation: [f64; 2],
    pub rotation: Angle,
    pub scale: [f64; 2],
}

impl Default for PoseParams {
    fn default() -> Self {
        PoseParams {
            translation: [0.0, 0.0],
            rotation: Angle::default(),
            scale: [1.0, 1.0],
        }
    }
}

impl From<PoseParams> for StaticPose {
    fn from(p: PoseParams) -> Self {
        StaticPose::new(
            Vec2::new(p.translation[0], p.translation[1]),
            p.rotation,
            Vec2::new(p.scale[0], p.scale[1]),
        )
    }
}

impl From<StaticPose> for PoseParams {
    fn from(p: StaticPose) -> Self {
        PoseParams {
            translation: [p.translation.x, p.translation.y],
            rotation: Angle::Rad(p.rotation),
            scale: [p.scale.x, p.scale.y],
        }
    }
}

//
// Hierarchical
//

/// A pose defined relative to a parent pose.
///
/// The global state is cached and recomputed by the owning [`PoseArena`][self::PoseArena]
/// whenever the local pose is set or the hierarchy is refreshed.
#[derive(Clone, Copy, Debug)]
pub struct HierarchicalPose {
    parent: PoseKey,
    local: StaticPose,
    global: StaticPose,
}

impl HierarchicalPose {
    #[inline]
    pub fn parent(&self) -> PoseKey {
        self.parent
    }

    #[inline]
    pub fn local(&self) -> &StaticPose {
        &self.local
    }
}

impl Transform for HierarchicalPose {
    #[inline]
    fn translation(&self) -> Vec2 {
        self.global.translation
    }
    #[inline]
    fn rotation(&self) -> f64 {
        self.global.rotation
    }
    #[inline]
    fn scale(&self) -> Vec2 {
        self.global.scale
    }
    #[inline]
    fn matrix(&self) -> Mat4 {
        self.global.matrix
    }
    fn local_to_global(&self, point: Vec2, as_vector: bool) -> Vec2 {
        self.global.local_to_global(point, as_vector)
    }
}

//
// Mechanical
//

/// A pose that moves with constant linear and angular velocity between updates.
#[derive(Clone, Copy, Debug, Default)]
pub struct MechanicalPose {
    current: StaticPose,
    velocity: Vec2,
    angular_velocity: f64,
}

impl MechanicalPose {
    pub fn new(current: StaticPose, velocity: Vec2, angular_velocity: f64) -> Self {
        MechanicalPose {
            current,
            velocity,
            angular_velocity,
        }
    }

    /// Integrate position and rotation over `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        let translation = self.current.translation + self.velocity * dt;
        let rotation = self.current.rotation + self.angular_velocity * dt;
        self.current.translation = translation;
        self.current.rotation = rotation;
        self.current.update_matrix();
    }

    #[inline]
    pub fn current(&self) -> &StaticPose {
        &self.current
    }

    pub fn set_current(&mut self, current: StaticPose) {
        self.current = current;
    }

    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    #[inline]
    pub fn angular_velocity(&self) -> f64 {
        self.angular_velocity
    }

    pub fn set_angular_velocity(&mut self, angular_velocity: f64) {
        self.angular_velocity = angular_velocity;
    }
}

impl Transform for MechanicalPose {
    #[inline]
    fn translation(&self) -> Vec2 {
        self.current.translation
    }
    #[inline]
    fn rotation(&self) -> f64 {
        self.current.rotation
    }
    #[inline]
    fn scale(&self) -> Vec2 {
        self.current.scale
    }
    #[inline]
    fn matrix(&self) -> Mat4 {
        self.current.matrix
    }
    fn local_to_global(&self, point: Vec2, as_vector: bool) -> Vec2 {
        self.current.local_to_global(point, as_vector)
    }
}

//
// The closed set of variants
//

/// Any pose stored in a [`PoseArena`][self::PoseArena].
#[derive(Clone, Copy, Debug)]
pub enum Pose {
    Static(StaticPose),
    Hierarchical(HierarchicalPose),
    Mechanical(MechanicalPose),
}

impl Pose {
    /// The global state of this pose as a plain static pose.
    pub fn snapshot(&self) -> StaticPose {
        match self {
            Pose::Static(p) => *p,
            Pose::Hierarchical(p) => p.global,
            Pose::Mechanical(p) => p.current,
        }
    }
}

impl From<StaticPose> for Pose {
    fn from(p: StaticPose) -> Self {
        Pose::Static(p)
    }
}

impl From<MechanicalPose> for Pose {
    fn from(p: MechanicalPose) -> Self {
        Pose::Mechanical(p)
    }
}

impl Transform for Pose {
    fn translation(&self) -> Vec2 {
        match self {
            Pose::Static(p) => p.translation(),
            Pose::Hierarchical(p) => p.translation(),
            Pose::Mechanical(p) => p.translation(),
        }
    }

    fn rotation(&self) -> f64 {
        match self {
            Pose::Static(p) => p.rotation(),
            Pose::Hierarchical(p) => p.rotation(),
            Pose::Mechanical(p) => p.rotation(),
        }
    }

    fn scale(&self) -> Vec2 {
        match self {
            Pose::Static(p) => p.scale(),
            Pose::Hierarchical(p) => p.scale(),
            Pose::Mechanical(p) => p.scale(),
        }
    }

    fn matrix(&self) -> Mat4 {
        match self {
            Pose::Static(p) => p.matrix(),
            Pose::Hierarchical(p) => p.matrix(),
            Pose::Mechanical(p) => p.matrix(),
        }
    }

    fn local_to_global(&self, point: Vec2, as_vector: bool) -> Vec2 {
        match self {
            Pose::Static(p) => p.local_to_global(point, as_vector),
            Pose::Hierarchical(p) => p.local_to_global(point, as_vector),
            Pose::Mechanical(p) => p.local_to_global(point, as_vector),
        }
    }
}
