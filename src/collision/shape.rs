//! Shapes that can be tested for collisions.
//!
//! Every shape except [`BoundaryLine`] refers to a pose in a [`PoseArena`]
//! and reads its position, rotation and scale from there on demand,
//! so most methods take the arena as a parameter.

use std::f64::consts::PI;

use super::shape_shape::{self as ss, BoxGeom, CircleGeom, CollisionInfo};
use crate::{
    math::Vec2,
    pose::{PoseArena, PoseKey, Transform},
};

/// Error when constructing a shape from invalid parameters.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum ShapeError {
    #[error("Boundary line normal (a, b) must not be zero")]
    DegenerateLine,
    #[error("Shape dimension must be finite and non-negative, got {0}")]
    InvalidDimension(f64),
}

fn check_dimension(value: f64) -> Result<f64, ShapeError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ShapeError::InvalidDimension(value))
    }
}

//
// Axis-aligned bounds
//

/// Axis-aligned bounding box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AABB {
    pub min: Vec2,
    pub max: Vec2,
}

impl AABB {
    /// A box that contains nothing and is the identity of [`union`][Self::union].
    pub fn empty() -> Self {
        AABB {
            min: Vec2::broadcast(f64::INFINITY),
            max: Vec2::broadcast(f64::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// The smallest box containing all the given points.
    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Self {
        points.into_iter().fold(Self::empty(), |acc, p| AABB {
            min: acc.min.min_by_component(p),
            max: acc.max.max_by_component(p),
        })
    }

    #[inline]
    pub fn union(&self, other: &AABB) -> AABB {
        AABB {
            min: self.min.min_by_component(other.min),
            max: self.max.max_by_component(other.max),
        }
    }

    /// Closed-interval overlap test. Touching boxes intersect.
    #[inline]
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }
}

//
// Line
//

/// An infinite static line `a·x + b·y + c = 0` that things can bounce off of.
///
/// Points with a negative signed distance are behind the line.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde-types", serde(try_from = "LineParams"))]
pub struct BoundaryLine {
    a: f64,
    b: f64,
    c: f64,
}

impl BoundaryLine {
    pub fn new(a: f64, b: f64, c: f64) -> Result<Self, ShapeError> {
        if (a == 0.0 && b == 0.0) || !(a.is_finite() && b.is_finite() && c.is_finite()) {
            return Err(ShapeError::DegenerateLine);
        }
        Ok(BoundaryLine { a, b, c })
    }

    /// The line passing through `point` whose front side faces `normal`.
    pub fn through(point: Vec2, normal: Vec2) -> Result<Self, ShapeError> {
        Self::new(normal.x, normal.y, -normal.dot(point))
    }

    #[inline]
    pub fn coefficients(&self) -> (f64, f64, f64) {
        (self.a, self.b, self.c)
    }

    /// Normal of the line, pointing toward its front side. Not normalized.
    #[inline]
    pub fn normal(&self) -> Vec2 {
        Vec2::new(self.a, self.b)
    }

    /// `a·x + b·y + c`. Scaled by the length of the normal.
    #[inline]
    pub fn signed_distance(&self, point: Vec2) -> f64 {
        self.a * point.x + self.b * point.y + self.c
    }
}

/// Unvalidated mirror of [`BoundaryLine`] for deserialization.
#[cfg(feature = "serde-types")]
#[derive(serde::Deserialize, serde::Serialize)]
struct LineParams {
    a: f64,
    b: f64,
    c: f64,
}

#[cfg(feature = "serde-types")]
impl TryFrom<LineParams> for BoundaryLine {
    type Error = ShapeError;

    fn try_from(p: LineParams) -> Result<Self, Self::Error> {
        BoundaryLine::new(p.a, p.b, p.c)
    }
}

//
// Circle
//

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingCircle {
    pose: PoseKey,
    radius: f64,
}

impl BoundingCircle {
    pub fn new(pose: PoseKey, radius: f64) -> Result<Self, ShapeError> {
        Ok(BoundingCircle {
            pose,
            radius: check_dimension(radius)?,
        })
    }

    #[inline]
    pub fn pose(&self) -> PoseKey {
        self.pose
    }

    #[inline]
    pub fn local_radius(&self) -> f64 {
        self.radius
    }

    /// Radius with the pose's scale applied.
    ///
    /// # Panics
    ///
    /// If the pose is scaled differently along x and y.
    pub fn radius(&self, poses: &PoseArena) -> f64 {
        let scale = poses.pose(self.pose).scale();
        assert!(
            scale.x == scale.y,
            "Circles cannot be scaled non-uniformly (got scale {:?})",
            scale
        );
        self.radius * scale.x.abs()
    }

    #[inline]
    pub fn center(&self, poses: &PoseArena) -> Vec2 {
        poses.pose(self.pose).translation()
    }

    pub fn area(&self, poses: &PoseArena) -> f64 {
        let r = self.radius(poses);
        PI * r * r
    }

    /// Moment of inertia per unit of mass about the center.
    pub fn area_moment_of_inertia(&self, poses: &PoseArena) -> f64 {
        let r = self.radius(poses);
        PI * r.powi(4) / 4.0
    }

    pub fn aabb(&self, poses: &PoseArena) -> AABB {
        let geom = self.geom(poses);
        let r = Vec2::broadcast(geom.radius);
        AABB {
            min: geom.center - r,
            max: geom.center + r,
        }
    }

    pub(crate) fn geom(&self, poses: &PoseArena) -> CircleGeom {
        CircleGeom {
            center: self.center(poses),
            radius: self.radius(poses),
        }
    }

    pub fn collides_circle(&self, other: &BoundingCircle, poses: &PoseArena) -> CollisionInfo {
        ss::circle_circle(&self.geom(poses), &other.geom(poses))
    }

    pub fn collides_box(&self, other: &BoundingBox, poses: &PoseArena) -> CollisionInfo {
        ss::box_circle(&other.geom(poses), &self.geom(poses)).flipped()
    }

    pub fn collides_line(&self, line: &BoundaryLine, poses: &PoseArena) -> CollisionInfo {
        ss::circle_line(&self.geom(poses), line)
    }
}

//
// Box
//

/// Corners of a box in its local space, counterclockwise from the bottom left.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Corner {
    BottomLeft,
    BottomRight,
    TopRight,
    TopLeft,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::BottomLeft,
        Corner::BottomRight,
        Corner::TopRight,
        Corner::TopLeft,
    ];

    /// Position on a box of unit size.
    fn unit_offset(self) -> Vec2 {
        match self {
            Corner::BottomLeft => Vec2::new(-0.5, -0.5),
            Corner::BottomRight => Vec2::new(0.5, -0.5),
            Corner::TopRight => Vec2::new(0.5, 0.5),
            Corner::TopLeft => Vec2::new(-0.5, 0.5),
        }
    }
}

/// Edges of a box in its local space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    /// From the bottom left corner to the bottom right corner.
    Width,
    /// From the bottom left corner to the top left corner.
    Height,
}

/// A rectangle whose orientation follows its pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pose: PoseKey,
    width: f64,
    height: f64,
}

impl BoundingBox {
    pub fn new(pose: PoseKey, width: f64, height: f64) -> Result<Self, ShapeError> {
        Ok(BoundingBox {
            pose,
            width: check_dimension(width)?,
            height: check_dimension(height)?,
        })
    }

    #[inline]
    pub fn pose(&self) -> PoseKey {
        self.pose
    }

    #[inline]
    pub fn local_size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    /// Width with the pose's x scale applied.
    pub fn width(&self, poses: &PoseArena) -> f64 {
        self.width * poses.pose(self.pose).scale().x.abs()
    }

    /// Height with the pose's y scale applied.
    pub fn height(&self, poses: &PoseArena) -> f64 {
        self.height * poses.pose(self.pose).scale().y.abs()
    }

    #[inline]
    pub fn center(&self, poses: &PoseArena) -> Vec2 {
        poses.pose(self.pose).translation()
    }

    pub fn area(&self, poses: &PoseArena) -> f64 {
        self.width(poses) * self.height(poses)
    }

    /// Moment of inertia per unit of mass about the center.
    pub fn area_moment_of_inertia(&self, poses: &PoseArena) -> f64 {
        let w = self.width(poses);
        let h = self.height(poses);
        (w * w + h * h) / 12.0
    }

    /// One corner in world space.
    pub fn corner(&self, corner: Corner, poses: &PoseArena) -> Vec2 {
        let local = corner.unit_offset() * Vec2::new(self.width, self.height);
        poses.pose(self.pose).local_to_global(local, false)
    }

    /// All corners in world space, in the order of [`Corner::ALL`].
    pub fn corners(&self, poses: &PoseArena) -> [Vec2; 4] {
        self.geom(poses).corners()
    }

    /// An edge of the box as a world space vector.
    pub fn axis(&self, axis: Axis, poses: &PoseArena) -> Vec2 {
        let origin = self.corner(Corner::BottomLeft, poses);
        match axis {
            Axis::Width => self.corner(Corner::BottomRight, poses) - origin,
            Axis::Height => self.corner(Corner::TopLeft, poses) - origin,
        }
    }

    pub fn aabb(&self, poses: &PoseArena) -> AABB {
        AABB::from_points(self.corners(poses))
    }

    pub(crate) fn geom(&self, poses: &PoseArena) -> BoxGeom {
        let pose = poses.pose(self.pose);
        let scale = pose.scale();
        BoxGeom {
            center: pose.translation(),
            rotation: pose.rotation(),
            hw: self.width * scale.x.abs() / 2.0,
            hh: self.height * scale.y.abs() / 2.0,
        }
    }

    /// Separating axis pre-test along this box's axes only.
    /// A positive answer in both directions means the boxes overlap.
    pub fn may_collide(&self, other: &BoundingBox, poses: &PoseArena) -> bool {
        ss::may_collide(&self.geom(poses), &other.geom(poses))
    }

    pub fn collides_box(&self, other: &BoundingBox, poses: &PoseArena) -> CollisionInfo {
        ss::box_box(&self.geom(poses), &other.geom(poses))
    }

    pub fn collides_circle(&self, other: &BoundingCircle, poses: &PoseArena) -> CollisionInfo {
        ss::box_circle(&self.geom(poses), &other.geom(poses))
    }

    pub fn collides_line(&self, line: &BoundaryLine, poses: &PoseArena) -> CollisionInfo {
        ss::box_line(&self.geom(poses), line)
    }

    /// Point-in-box test. The normal of the face nearest to the point
    /// by direction is reported whether or not the point is inside.
    pub fn collides_point(&self, point: Vec2, poses: &PoseArena) -> CollisionInfo {
        ss::box_point(&self.geom(poses), point)
    }
}

//
// Area
//

/// A rigid shape made up of any number of boxes and circles.
///
/// The member shapes usually have poses that are children of the area's pose
/// so that they move together with it.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundingArea {
    pose: PoseKey,
    boxes: Vec<BoundingBox>,
    circles: Vec<BoundingCircle>,
}

impl BoundingArea {
    pub fn new(pose: PoseKey) -> Self {
        BoundingArea {
            pose,
            boxes: Vec::new(),
            circles: Vec::new(),
        }
    }

    pub fn with_box(mut self, b: BoundingBox) -> Self {
        self.add_box(b);
        self
    }

    pub fn with_circle(mut self, c: BoundingCircle) -> Self {
        self.add_circle(c);
        self
    }

    pub fn add_box(&mut self, b: BoundingBox) {
        self.boxes.push(b);
    }

    pub fn add_circle(&mut self, c: BoundingCircle) {
        self.circles.push(c);
    }

    #[inline]
    pub fn pose(&self) -> PoseKey {
        self.pose
    }

    #[inline]
    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    #[inline]
    pub fn circles(&self) -> &[BoundingCircle] {
        &self.circles
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty() && self.circles.is_empty()
    }

    #[inline]
    pub fn center(&self, poses: &PoseArena) -> Vec2 {
        poses.pose(self.pose).translation()
    }

    /// Sum of the member areas. Overlapping members are counted twice.
    pub fn area(&self, poses: &PoseArena) -> f64 {
        let boxes: f64 = self.boxes.iter().map(|b| b.area(poses)).sum();
        let circles: f64 = self.circles.iter().map(|c| c.area(poses)).sum();
        boxes + circles
    }

    /// Moment of inertia per unit of mass about the area's center,
    /// combined from the members with the parallel axis theorem.
    pub fn area_moment_of_inertia(&self, poses: &PoseArena) -> f64 {
        let center = self.center(poses);
        let boxes = self.boxes.iter().map(|b| {
            b.area_moment_of_inertia(poses) + (b.center(poses) - center).mag_sq() * b.area(poses)
        });
        let circles = self.circles.iter().map(|c| {
            c.area_moment_of_inertia(poses) + (c.center(poses) - center).mag_sq() * c.area(poses)
        });
        boxes.chain(circles).sum()
    }

    /// Union of the members' bounds. Empty if the area has no members.
    pub fn aabb(&self, poses: &PoseArena) -> AABB {
        let boxes = self.boxes.iter().map(|b| b.aabb(poses));
        let circles = self.circles.iter().map(|c| c.aabb(poses));
        boxes
            .chain(circles)
            .fold(AABB::empty(), |acc, bounds| acc.union(&bounds))
    }

    /// Test member shapes pairwise and report the first contact found.
    ///
    /// Each box is tested against all of the other area's boxes and then its circles,
    /// then circles against circles and finally circles against boxes.
    /// Only one representative contact is ever reported.
    pub fn collides(&self, other: &BoundingArea, poses: &PoseArena) -> CollisionInfo {
        let boxes: Vec<BoxGeom> = self.boxes.iter().map(|b| b.geom(poses)).collect();
        let circles: Vec<CircleGeom> = self.circles.iter().map(|c| c.geom(poses)).collect();
        let other_boxes: Vec<BoxGeom> = other.boxes.iter().map(|b| b.geom(poses)).collect();
        let other_circles: Vec<CircleGeom> =
            other.circles.iter().map(|c| c.geom(poses)).collect();

        let from_boxes = boxes.iter().flat_map(|b| {
            let against_boxes = other_boxes.iter().map(move |ob| ss::box_box(b, ob));
            let against_circles = other_circles.iter().map(move |oc| ss::box_circle(b, oc));
            against_boxes.chain(against_circles)
        });
        let circle_circle = circles
            .iter()
            .flat_map(|c| other_circles.iter().map(move |oc| ss::circle_circle(c, oc)));
        let circle_box = circles.iter().flat_map(|c| {
            other_boxes
                .iter()
                .map(move |ob| ss::box_circle(ob, c).flipped())
        });

        from_boxes
            .chain(circle_circle)
            .chain(circle_box)
            .find(|info| info.collides)
            .unwrap_or_default()
    }

    /// Test each member against the line and report the first contact found.
    pub fn collides_line(&self, line: &BoundaryLine, poses: &PoseArena) -> CollisionInfo {
        let boxes = self
            .boxes
            .iter()
            .map(|b| ss::box_line(&b.geom(poses), line));
        let circles = self
            .circles
            .iter()
            .map(|c| ss::circle_line(&c.geom(poses), line));
        boxes
            .chain(circles)
            .find(|info| info.collides)
            .unwrap_or_default()
    }
}
