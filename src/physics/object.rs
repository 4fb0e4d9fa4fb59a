use super::Velocity;
use crate::{
    collision::{BoundaryLine, BoundingArea},
    math::{self as m, Vec2},
    pose::{MechanicalPose, PoseArena, PoseKey, Transform},
};

/// Error when creating or modifying a [`PhysicalObject`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum PhysicsError {
    #[error("Mass must be positive and finite, got {0}")]
    InvalidMass(f64),
    #[error("Pose {0:?} is not a mechanical pose")]
    NotMechanical(PoseKey),
    #[error("Bounding area is placed by pose {area:?} but the object moves with pose {object:?}")]
    AreaPoseMismatch { object: PoseKey, area: PoseKey },
}

const NOT_MECHANICAL: &str = "Physical object's pose was removed or is no longer mechanical";

/// A rigid body that bounces off boundaries and other rigid bodies.
///
/// Moves by way of a [`MechanicalPose`] whose velocities are changed by collision impulses.
/// The bounding area is used for contact geometry and the moment of inertia.
#[derive(Clone, Debug)]
pub struct PhysicalObject {
    pose: PoseKey,
    area: BoundingArea,
    mass: f64,
    // inverses are cached because they're needed on every contact
    inv_mass: f64,
    area_moment: f64,
    moment_of_inertia: f64,
    inv_moment_of_inertia: f64,
}

impl PhysicalObject {
    /// Create an object moved by the mechanical pose `pose`.
    ///
    /// The area must be placed by the same pose,
    /// since its moment of inertia is taken about that pose's center.
    /// The moment of inertia is computed from the area at the poses' current scale.
    pub fn new(
        pose: PoseKey,
        area: BoundingArea,
        mass: f64,
        poses: &PoseArena,
    ) -> Result<Self, PhysicsError> {
        if poses.mechanics(pose).is_none() {
            return Err(PhysicsError::NotMechanical(pose));
        }
        if area.pose() != pose {
            return Err(PhysicsError::AreaPoseMismatch {
                object: pose,
                area: area.pose(),
            });
        }
        let area_moment = area.area_moment_of_inertia(poses);
        let mut obj = PhysicalObject {
            pose,
            area,
            mass: 0.0,
            inv_mass: 0.0,
            area_moment,
            moment_of_inertia: 0.0,
            inv_moment_of_inertia: 0.0,
        };
        obj.set_mass(mass)?;
        Ok(obj)
    }

    #[inline]
    pub fn pose(&self) -> PoseKey {
        self.pose
    }

    #[inline]
    pub fn area(&self) -> &BoundingArea {
        &self.area
    }

    #[inline]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Change the mass, scaling the moment of inertia with it.
    pub fn set_mass(&mut self, mass: f64) -> Result<(), PhysicsError> {
        if !(mass.is_finite() && mass > 0.0) {
            return Err(PhysicsError::InvalidMass(mass));
        }
        self.mass = mass;
        self.inv_mass = 1.0 / mass;
        self.moment_of_inertia = self.area_moment * mass;
        // shapes with no area can't be spun by impulses
        self.inv_moment_of_inertia = if self.moment_of_inertia > 0.0 {
            1.0 / self.moment_of_inertia
        } else {
            0.0
        };
        Ok(())
    }

    #[inline]
    pub fn moment_of_inertia(&self) -> f64 {
        self.moment_of_inertia
    }

    fn mechanics<'p>(&self, poses: &'p PoseArena) -> &'p MechanicalPose {
        poses.mechanics(self.pose).expect(NOT_MECHANICAL)
    }

    #[inline]
    pub fn center(&self, poses: &PoseArena) -> Vec2 {
        self.mechanics(poses).translation()
    }

    pub fn velocity(&self, poses: &PoseArena) -> Velocity {
        Velocity::of(self.mechanics(poses))
    }

    /// Velocity of a point offset from the center.
    pub fn velocity_at(&self, offset: Vec2, poses: &PoseArena) -> Vec2 {
        self.velocity(poses).point_velocity(offset)
    }

    /// `½ m v² + ½ I ω²`
    pub fn kinetic_energy(&self, poses: &PoseArena) -> f64 {
        let vel = self.velocity(poses);
        0.5 * self.mass * vel.linear.mag_sq()
            + 0.5 * self.moment_of_inertia * vel.angular * vel.angular
    }

    /// Apply an impulse at a point offset from the center.
    ///
    /// The part of the impulse along the offset changes only the linear velocity
    /// and the part perpendicular to it changes only the angular velocity.
    pub fn apply_impulse(&self, impulse: Vec2, offset: Vec2, poses: &mut PoseArena) {
        let delta = if offset.mag_sq() == 0.0 {
            Velocity {
                linear: impulse * self.inv_mass,
                angular: 0.0,
            }
        } else {
            let radial = m::project(offset, impulse, false);
            let tangential = impulse - radial;
            Velocity {
                linear: radial * self.inv_mass,
                angular: m::cross(offset, tangential) * self.inv_moment_of_inertia,
            }
        };

        let mech = poses.mechanics_mut(self.pose).expect(NOT_MECHANICAL);
        let mut vel = Velocity::of(mech);
        vel += delta;
        vel.write_to(mech);
    }

    /// Test for a contact with another object and resolve it with an impulse on both.
    ///
    /// Returns whether the objects were in contact. Objects already moving apart
    /// along the contact normal are left alone but still count as in contact.
    pub fn resolve_against(&self, other: &PhysicalObject, poses: &mut PoseArena) -> bool {
        let Some((point, normal)) = self.area.collides(&other.area, poses).contact() else {
            return false;
        };
        if normal.mag_sq() == 0.0 {
            return true;
        }
        let normal = normal.normalized();

        let offset = point - self.center(poses);
        let other_offset = point - other.center(poses);
        let rel_vel = other.velocity_at(other_offset, poses) - self.velocity_at(offset, poses);
        let normal_vel = rel_vel.dot(normal);
        if normal_vel >= 0.0 {
            return true;
        }

        let offset_cross = m::cross(offset, normal);
        let other_cross = m::cross(other_offset, normal);
        let denominator = self.inv_mass
            + other.inv_mass
            + offset_cross * offset_cross * self.inv_moment_of_inertia
            + other_cross * other_cross * other.inv_moment_of_inertia;
        let impulse = normal * (2.0 * normal_vel / denominator);

        self.apply_impulse(impulse, offset, poses);
        other.apply_impulse(-impulse, other_offset, poses);
        true
    }

    /// Test for a contact with a static boundary and bounce off of it.
    ///
    /// Returns whether the object was in contact with the boundary.
    /// Only motion into the boundary is reflected.
    pub fn resolve_against_boundary(&self, line: &BoundaryLine, poses: &mut PoseArena) -> bool {
        let Some((point, normal)) = self.area.collides_line(line, poses).contact() else {
            return false;
        };
        let offset = point - self.center(poses);
        let into_line = -self.velocity_at(offset, poses);
        let impulse = m::project(normal, into_line, true) * (2.0 * self.mass);
        self.apply_impulse(impulse, offset, poses);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collision::{BoundingBox, BoundingCircle},
        pose::StaticPose,
    };
    use std::f64::consts::PI;

    const EPS: f64 = 1e-9;

    fn ball(poses: &mut PoseArena, at: Vec2, vel: Vec2, mass: f64) -> PhysicalObject {
        let pose = poses.insert(MechanicalPose::new(StaticPose::at(at), vel, 0.0));
        let area = BoundingArea::new(pose).with_circle(BoundingCircle::new(pose, 1.0).unwrap());
        PhysicalObject::new(pose, area, mass, poses).unwrap()
    }

    #[test]
    fn invalid_construction_is_rejected() {
        let mut poses = PoseArena::new();
        let fixed = poses.insert(StaticPose::identity());
        assert_eq!(
            PhysicalObject::new(fixed, BoundingArea::new(fixed), 1.0, &poses).unwrap_err(),
            PhysicsError::NotMechanical(fixed)
        );

        let moving = poses.insert(MechanicalPose::default());
        for bad_mass in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                PhysicalObject::new(moving, BoundingArea::new(moving), bad_mass, &poses),
                Err(PhysicsError::InvalidMass(_))
            ));
        }

        let elsewhere = poses.insert(MechanicalPose::default());
        assert_eq!(
            PhysicalObject::new(moving, BoundingArea::new(elsewhere), 1.0, &poses).unwrap_err(),
            PhysicsError::AreaPoseMismatch {
                object: moving,
                area: elsewhere
            }
        );
    }

    #[test]
    fn inertia_scales_with_mass() {
        let mut poses = PoseArena::new();
        let mut obj = ball(&mut poses, Vec2::zero(), Vec2::zero(), 2.0);
        assert!((obj.moment_of_inertia() - 2.0 * PI / 4.0).abs() < EPS);
        obj.set_mass(4.0).unwrap();
        assert!((obj.moment_of_inertia() - PI).abs() < EPS);
        assert_eq!(obj.set_mass(0.0), Err(PhysicsError::InvalidMass(0.0)));
        assert_eq!(obj.mass(), 4.0);
    }

    #[test]
    fn point_velocity_includes_rotation() {
        let mut poses = PoseArena::new();
        let obj = ball(&mut poses, Vec2::zero(), Vec2::new(1.0, 0.0), 1.0);
        poses
            .mechanics_mut(obj.pose())
            .unwrap()
            .set_angular_velocity(2.0);
        let v = obj.velocity_at(Vec2::new(0.0, 1.0), &poses);
        assert!((v - Vec2::new(-1.0, 0.0)).mag() < EPS);
    }

    #[test]
    fn impulse_splits_into_linear_and_angular() {
        let mut poses = PoseArena::new();
        let obj = ball(&mut poses, Vec2::zero(), Vec2::zero(), 1.0);

        // straight through the center
        obj.apply_impulse(Vec2::new(2.0, 0.0), Vec2::zero(), &mut poses);
        assert!((obj.velocity(&poses).linear - Vec2::new(2.0, 0.0)).mag() < EPS);

        // perpendicular to the offset only spins
        obj.apply_impulse(Vec2::new(0.0, 1.0), Vec2::new(1.0, 0.0), &mut poses);
        let vel = obj.velocity(&poses);
        assert!((vel.linear - Vec2::new(2.0, 0.0)).mag() < EPS);
        let expected_spin = 1.0 / obj.moment_of_inertia();
        assert!((vel.angular - expected_spin).abs() < EPS);

        // angular velocity accumulates
        obj.apply_impulse(Vec2::new(0.0, 1.0), Vec2::new(1.0, 0.0), &mut poses);
        assert!((obj.velocity(&poses).angular - 2.0 * expected_spin).abs() < EPS);
    }

    #[test]
    fn head_on_equal_masses_swap_velocities() {
        let mut poses = PoseArena::new();
        let left = ball(&mut poses, Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), 1.0);
        let right = ball(&mut poses, Vec2::new(1.9, 0.0), Vec2::new(-1.0, 0.0), 1.0);
        assert!(left.resolve_against(&right, &mut poses));
        assert!((left.velocity(&poses).linear - Vec2::new(-1.0, 0.0)).mag() < EPS);
        assert!((right.velocity(&poses).linear - Vec2::new(1.0, 0.0)).mag() < EPS);

        // now separating, a second pass changes nothing
        assert!(left.resolve_against(&right, &mut poses));
        assert!((left.velocity(&poses).linear - Vec2::new(-1.0, 0.0)).mag() < EPS);
    }

    #[test]
    fn momentum_is_conserved_for_unequal_masses() {
        let mut poses = PoseArena::new();
        let heavy = ball(&mut poses, Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.5), 3.0);
        let light = ball(&mut poses, Vec2::new(1.5, 0.8), Vec2::new(-2.0, 0.0), 1.0);
        let momentum = |poses: &PoseArena| {
            heavy.velocity(poses).linear * heavy.mass() + light.velocity(poses).linear * light.mass()
        };
        let before = momentum(&poses);
        assert!(heavy.resolve_against(&light, &mut poses));
        assert!((momentum(&poses) - before).mag() < 1e-9);
    }

    #[test]
    fn off_center_hit_spins_the_box() {
        let mut poses = PoseArena::new();
        let box_pose = poses.insert(MechanicalPose::default());
        let box_area =
            BoundingArea::new(box_pose).with_box(BoundingBox::new(box_pose, 2.0, 2.0).unwrap());
        let target = PhysicalObject::new(box_pose, box_area, 1.0, &poses).unwrap();

        let ball_pose = poses.insert(MechanicalPose::new(
            StaticPose::at(Vec2::new(1.4, 0.9)),
            Vec2::new(-1.0, 0.0),
            0.0,
        ));
        let ball_area = BoundingArea::new(ball_pose)
            .with_circle(BoundingCircle::new(ball_pose, 0.5).unwrap());
        let ball = PhysicalObject::new(ball_pose, ball_area, 1.0, &poses).unwrap();

        assert!(target.resolve_against(&ball, &mut poses));

        // contact at (1, 0.9) on the box's right face, normal +x.
        // the ball's offset is parallel to the normal so only the box adds an angular term:
        // 1/m + 1/m + (0.9)² / (2/3)
        let denominator = 1.0 + 1.0 + 0.81 * 1.5;
        let j = 2.0 / denominator;
        let offset = Vec2::new(1.0, 0.9);

        let box_vel = target.velocity(&poses);
        assert!((box_vel.linear - offset * (-j / offset.mag_sq())).mag() < EPS);
        assert!((box_vel.angular - 0.9 * j * 1.5).abs() < EPS);
        assert!((box_vel.angular - 0.839_813_374_8).abs() < 1e-9);

        let ball_vel = ball.velocity(&poses);
        assert!((ball_vel.linear - Vec2::new(j - 1.0, 0.0)).mag() < EPS);
        assert_eq!(ball_vel.angular, 0.0);

        // the linear/angular split of the box's impulse doesn't keep energy exactly
        let energy = target.kinetic_energy(&poses) + ball.kinetic_energy(&poses);
        assert!((energy - 0.413_408_655_1).abs() < 1e-9);
    }

    #[test]
    fn bounce_off_floor_reflects_normal_motion() {
        let mut poses = PoseArena::new();
        let obj = ball(&mut poses, Vec2::new(0.0, 0.9), Vec2::new(1.0, -3.0), 2.0);
        let floor = BoundaryLine::new(0.0, 1.0, 0.0).unwrap();
        let energy = obj.kinetic_energy(&poses);

        assert!(obj.resolve_against_boundary(&floor, &mut poses));
        let vel = obj.velocity(&poses);
        assert!((vel.linear - Vec2::new(1.0, 3.0)).mag() < EPS);
        assert!((obj.kinetic_energy(&poses) - energy).abs() < 1e-9);

        // moving away already, no impulse
        assert!(obj.resolve_against_boundary(&floor, &mut poses));
        assert!((obj.velocity(&poses).linear - Vec2::new(1.0, 3.0)).mag() < EPS);
    }

    #[test]
    fn box_bodies_get_box_inertia() {
        let mut poses = PoseArena::new();
        let pose = poses.insert(MechanicalPose::default());
        let area = BoundingArea::new(pose).with_box(BoundingBox::new(pose, 2.0, 4.0).unwrap());
        let obj = PhysicalObject::new(pose, area, 3.0, &poses).unwrap();
        assert!((obj.moment_of_inertia() - 3.0 * 20.0 / 12.0).abs() < EPS);
    }
}
