//! Exact intersection tests between pairs of shapes.
//!
//! Every test works on world-space snapshots of the shapes ([`BoxGeom`], [`CircleGeom`])
//! taken from their poses, so none of them need access to the pose arena.
//!
//! Unless noted otherwise, the reported normal points from the first shape toward the second.
//! Normals are not normalized; only their direction carries meaning.

use super::shape::BoundaryLine;
use crate::math::{self as m, Vec2};

/// Result of testing two shapes against each other.
///
/// `point` and `normal` are meaningless when `collides` is false.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionInfo {
    pub collides: bool,
    /// Representative point of contact in world space.
    pub point: Vec2,
    pub normal: Vec2,
}

impl CollisionInfo {
    #[inline]
    pub fn none() -> Self {
        CollisionInfo {
            collides: false,
            point: Vec2::zero(),
            normal: Vec2::zero(),
        }
    }

    #[inline]
    fn hit(point: Vec2, normal: Vec2) -> Self {
        CollisionInfo {
            collides: true,
            point,
            normal,
        }
    }

    /// The point and normal of the contact, if there was one.
    #[inline]
    pub fn contact(&self) -> Option<(Vec2, Vec2)> {
        if self.collides {
            Some((self.point, self.normal))
        } else {
            None
        }
    }

    /// Swap the roles of the two shapes that produced this result.
    #[inline]
    pub(crate) fn flipped(self) -> Self {
        CollisionInfo {
            normal: -self.normal,
            ..self
        }
    }
}

impl Default for CollisionInfo {
    fn default() -> Self {
        Self::none()
    }
}

//
// World-space snapshots
//

#[derive(Clone, Copy, Debug)]
pub(crate) struct CircleGeom {
    pub center: Vec2,
    pub radius: f64,
}

/// An oriented box in world space, with scale already applied to the half extents.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BoxGeom {
    pub center: Vec2,
    pub rotation: f64,
    pub hw: f64,
    pub hh: f64,
}

impl BoxGeom {
    /// World space to the box's unscaled, axis-aligned frame.
    #[inline]
    fn to_frame(&self, p: Vec2) -> Vec2 {
        m::rotate(p - self.center, -self.rotation)
    }

    #[inline]
    fn to_world(&self, p: Vec2) -> Vec2 {
        m::rotate(p, self.rotation) + self.center
    }

    #[inline]
    fn dir_to_world(&self, dir: Vec2) -> Vec2 {
        m::rotate(dir, self.rotation)
    }

    #[inline]
    fn x_axis(&self) -> Vec2 {
        self.dir_to_world(Vec2::unit_x())
    }

    #[inline]
    fn y_axis(&self) -> Vec2 {
        self.dir_to_world(Vec2::unit_y())
    }

    /// Corners in counterclockwise order starting from the local bottom left.
    pub fn corners(&self) -> [Vec2; 4] {
        [
            self.to_world(Vec2::new(-self.hw, -self.hh)),
            self.to_world(Vec2::new(self.hw, -self.hh)),
            self.to_world(Vec2::new(self.hw, self.hh)),
            self.to_world(Vec2::new(-self.hw, self.hh)),
        ]
    }
}

//
// CIRCLE <-> CIRCLE
//

pub(crate) fn circle_circle(c1: &CircleGeom, c2: &CircleGeom) -> CollisionInfo {
    let dist = c2.center - c1.center;
    let r_sum = c1.radius + c2.radius;
    if dist.mag_sq() > r_sum * r_sum {
        return CollisionInfo::none();
    }
    let point = if r_sum > 0.0 {
        c1.center + dist * (c1.radius / r_sum)
    } else {
        c1.center
    };
    CollisionInfo::hit(point, dist)
}

//
// CIRCLE <-> LINE
//

/// The normal is the line's normal.
pub(crate) fn circle_line(circle: &CircleGeom, line: &BoundaryLine) -> CollisionInfo {
    let dist = line.signed_distance(circle.center);
    let normal = line.normal();
    // signed_distance is scaled by the normal's length
    CollisionInfo {
        collides: dist <= circle.radius * normal.mag(),
        point: circle.center - normal.normalized() * circle.radius,
        normal,
    }
}

//
// BOX <-> LINE
//

/// The point is the average of every corner behind the line, regardless of depth.
/// The normal is the line's normal.
pub(crate) fn box_line(b: &BoxGeom, line: &BoundaryLine) -> CollisionInfo {
    let (sum, count) = b
        .corners()
        .iter()
        .filter(|corner| line.signed_distance(**corner) < 0.0)
        .fold((Vec2::zero(), 0usize), |(sum, count), corner| {
            (sum + *corner, count + 1)
        });

    if count == 0 {
        return CollisionInfo {
            normal: line.normal(),
            ..CollisionInfo::none()
        };
    }
    CollisionInfo::hit(sum / count as f64, line.normal())
}

//
// BOX <-> CIRCLE
//

pub(crate) fn box_circle(b: &BoxGeom, circle: &CircleGeom) -> CollisionInfo {
    let local = b.to_frame(circle.center);
    let r = circle.radius;
    let inside_x = local.x > -b.hw && local.x < b.hw;
    let inside_y = local.y > -b.hh && local.y < b.hh;

    if inside_x && inside_y {
        // circle center is inside the box
        return CollisionInfo::hit(circle.center, circle.center - b.center);
    }

    if inside_x {
        if local.y >= b.hh && local.y - b.hh < r {
            return CollisionInfo::hit(
                b.to_world(Vec2::new(local.x, b.hh)),
                b.dir_to_world(Vec2::unit_y()),
            );
        }
        if local.y <= -b.hh && -b.hh - local.y < r {
            return CollisionInfo::hit(
                b.to_world(Vec2::new(local.x, -b.hh)),
                b.dir_to_world(-Vec2::unit_y()),
            );
        }
        return CollisionInfo::none();
    }

    if inside_y {
        if local.x >= b.hw && local.x - b.hw < r {
            return CollisionInfo::hit(
                b.to_world(Vec2::new(b.hw, local.y)),
                b.dir_to_world(Vec2::unit_x()),
            );
        }
        if local.x <= -b.hw && -b.hw - local.x < r {
            return CollisionInfo::hit(
                b.to_world(Vec2::new(-b.hw, local.y)),
                b.dir_to_world(-Vec2::unit_x()),
            );
        }
        return CollisionInfo::none();
    }

    // outside both extents, only a corner can touch
    let r_sq = r * r;
    b.corners()
        .iter()
        .map(|corner| (*corner, circle.center - *corner))
        .find(|(_, to_center)| to_center.mag_sq() < r_sq)
        .map(|(corner, to_center)| CollisionInfo::hit(corner, to_center))
        .unwrap_or_else(CollisionInfo::none)
}

//
// BOX <-> POINT
//

/// Point-in-box test. Even when the point is outside,
/// the normal of the face whose wedge (bounded by the box diagonals) contains the point
/// is reported, pointing out of the box.
pub(crate) fn box_point(b: &BoxGeom, point: Vec2) -> CollisionInfo {
    let local = b.to_frame(point);
    let collides = local.x.abs() < b.hw && local.y.abs() < b.hh;

    // compare against the diagonals without dividing, so zero-size boxes work
    let above_rising = local.y * b.hw > local.x * b.hh;
    let above_falling = local.y * b.hw > -local.x * b.hh;
    let normal_local = match (above_rising, above_falling) {
        (true, true) => Vec2::unit_y(),
        (true, false) => -Vec2::unit_x(),
        (false, true) => Vec2::unit_x(),
        (false, false) => -Vec2::unit_y(),
    };

    CollisionInfo {
        collides,
        point,
        normal: b.dir_to_world(normal_local),
    }
}

//
// BOX <-> BOX
//

/// Separating axis pre-test using only the axes of `b1`.
/// Both directions need to pass for the boxes to overlap.
pub(crate) fn may_collide(b1: &BoxGeom, b2: &BoxGeom) -> bool {
    let corners = b2.corners();
    [(b1.x_axis(), b1.hw), (b1.y_axis(), b1.hh)]
        .iter()
        .all(|&(axis, half_extent)| {
            let mid = b1.center.dot(axis);
            let (t_min, t_max) = corners.iter().map(|c| c.dot(axis)).fold(
                (f64::INFINITY, f64::NEG_INFINITY),
                |(lo, hi), t| (lo.min(t), hi.max(t)),
            );
            !(t_min > mid + half_extent || t_max < mid - half_extent)
        })
}

/// The point is the average of every corner of either box found inside the other one.
/// The normal comes from the first such corner.
/// If the boxes overlap without any corner inside the other box
/// the point and normal fall back to the centers.
pub(crate) fn box_box(b1: &BoxGeom, b2: &BoxGeom) -> CollisionInfo {
    if !(may_collide(b1, b2) && may_collide(b2, b1)) {
        return CollisionInfo::none();
    }

    let own_corners_in_other = b1.corners().into_iter().map(|c| box_point(b2, c).flipped());
    let other_corners_in_own = b2.corners().into_iter().map(|c| box_point(b1, c));

    let mut sum = Vec2::zero();
    let mut count = 0usize;
    let mut normal = None;
    for pen in own_corners_in_other
        .chain(other_corners_in_own)
        .filter(|info| info.collides)
    {
        sum += pen.point;
        count += 1;
        normal.get_or_insert(pen.normal);
    }

    match normal {
        Some(normal) => CollisionInfo::hit(sum / count as f64, normal),
        None => CollisionInfo::hit(b2.center, b2.center - b1.center),
    }
}
