//! Impulse-based collision response for rigid bodies and static boundaries.

mod object;
pub use object::{PhysicalObject, PhysicsError};

use thunderdome as td;

use crate::{
    collision::BoundaryLine,
    math::{self as m, Vec2},
    pose::{MechanicalPose, PoseArena},
};

/// Velocity of an object.
///
// Equivalent to a Vec3 but with names for the translational and rotational part.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Velocity {
    /// Linear velocity in units per second.
    pub linear: Vec2,
    /// Angular velocity in radians per second.
    pub angular: f64,
}

impl Default for Velocity {
    fn default() -> Self {
        Velocity {
            linear: Vec2::zero(),
            angular: 0.0,
        }
    }
}

impl Velocity {
    /// Read the velocity a mechanical pose is moving with.
    #[inline]
    pub fn of(mech: &MechanicalPose) -> Self {
        Velocity {
            linear: mech.velocity(),
            angular: mech.angular_velocity(),
        }
    }

    /// Set a mechanical pose to move with this velocity.
    #[inline]
    pub fn write_to(&self, mech: &mut MechanicalPose) {
        mech.set_velocity(self.linear);
        mech.set_angular_velocity(self.angular);
    }

    /// Get the linear velocity of a point offset from the center of rotation.
    pub fn point_velocity(&self, offset: Vec2) -> Vec2 {
        self.linear + m::cross_scalar(offset, self.angular)
    }
}

impl std::ops::Add for Velocity {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            linear: self.linear + other.linear,
            angular: self.angular + other.angular,
        }
    }
}
impl std::ops::AddAssign for Velocity {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

/// Key type to look up a physical object stored in a [`PhysicsSystem`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PhysicalObjectKey(td::Index);

impl PhysicalObjectKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

/// Key type to look up a boundary stored in a [`PhysicsSystem`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundaryKey(td::Index);

impl BoundaryKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

/// Owner of every physical object and static boundary in a simulation.
///
/// Resolution walks objects in the order they were added
/// and gives each object at most one contact per update:
/// boundaries are tried first, then objects added after it.
/// Objects and boundaries added earlier therefore get priority.
#[derive(Default)]
pub struct PhysicsSystem {
    objects: td::Arena<PhysicalObject>,
    object_order: Vec<PhysicalObjectKey>,
    boundaries: td::Arena<BoundaryLine>,
    boundary_order: Vec<BoundaryKey>,
}

impl PhysicsSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, object: PhysicalObject) -> PhysicalObjectKey {
        let key = PhysicalObjectKey(self.objects.insert(object));
        self.object_order.push(key);
        log::debug!("Added physical object {:?}", key);
        key
    }

    /// Remove an object. Takes time linear in the number of objects.
    pub fn remove_object(&mut self, key: PhysicalObjectKey) -> Option<PhysicalObject> {
        let removed = self.objects.remove(key.0)?;
        self.object_order.retain(|k| *k != key);
        log::debug!("Removed physical object {:?}", key);
        Some(removed)
    }

    pub fn add_boundary(&mut self, boundary: BoundaryLine) -> BoundaryKey {
        let key = BoundaryKey(self.boundaries.insert(boundary));
        self.boundary_order.push(key);
        log::debug!("Added boundary {:?}", key);
        key
    }

    /// Remove a boundary. Takes time linear in the number of boundaries.
    pub fn remove_boundary(&mut self, key: BoundaryKey) -> Option<BoundaryLine> {
        let removed = self.boundaries.remove(key.0)?;
        self.boundary_order.retain(|k| *k != key);
        log::debug!("Removed boundary {:?}", key);
        Some(removed)
    }

    /// Remove every object and boundary.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.object_order.clear();
        self.boundaries.clear();
        self.boundary_order.clear();
    }

    #[inline]
    pub fn object(&self, key: PhysicalObjectKey) -> Option<&PhysicalObject> {
        self.objects.get(key.0)
    }

    #[inline]
    pub fn object_mut(&mut self, key: PhysicalObjectKey) -> Option<&mut PhysicalObject> {
        self.objects.get_mut(key.0)
    }

    #[inline]
    pub fn boundary(&self, key: BoundaryKey) -> Option<&BoundaryLine> {
        self.boundaries.get(key.0)
    }

    /// Iterate over objects in the order they were added.
    pub fn objects(&self) -> impl Iterator<Item = (PhysicalObjectKey, &PhysicalObject)> {
        self.object_order
            .iter()
            .filter_map(|key| self.objects.get(key.0).map(|obj| (*key, obj)))
    }

    /// Iterate over boundaries in the order they were added.
    pub fn boundaries(&self) -> impl Iterator<Item = (BoundaryKey, &BoundaryLine)> {
        self.boundary_order
            .iter()
            .filter_map(|key| self.boundaries.get(key.0).map(|line| (*key, line)))
    }

    #[inline]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn boundary_count(&self) -> usize {
        self.boundaries.len()
    }

    /// Resolve contacts at the current poses by changing object velocities.
    /// Returns the number of objects that were found in contact with something.
    pub fn update(&self, poses: &mut PoseArena) -> usize {
        let _span = crate::tracy_span!("resolve contacts", "update");

        let mut resolved = 0;
        for (idx, key) in self.object_order.iter().enumerate() {
            let Some(obj) = self.objects.get(key.0) else {
                continue;
            };

            let hit_boundary = self
                .boundaries()
                .any(|(_, line)| obj.resolve_against_boundary(line, poses));
            let hit = hit_boundary
                || self.object_order[idx + 1..]
                    .iter()
                    .filter_map(|other| self.objects.get(other.0))
                    .any(|other| obj.resolve_against(other, poses));
            if hit {
                resolved += 1;
            }
        }

        log::trace!(
            "Physics update: {} of {} objects in contact",
            resolved,
            self.object_order.len()
        );
        resolved
    }

    /// Move every mechanical pose forward by `dt` seconds, then resolve contacts.
    pub fn tick(&self, poses: &mut PoseArena, dt: f64) -> usize {
        poses.advance(dt);
        self.update(poses)
    }
}

impl Drop for PhysicsSystem {
    fn drop(&mut self) {
        if !self.objects.is_empty() || !self.boundaries.is_empty() {
            log::warn!(
                "PhysicsSystem dropped with {} objects and {} boundaries still registered",
                self.objects.len(),
                self.boundaries.len()
            );
            debug_assert!(
                std::thread::panicking(),
                "PhysicsSystem dropped without removing its objects and boundaries"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collision::{BoundingArea, BoundingCircle},
        pose::StaticPose,
    };

    fn ball(poses: &mut PoseArena, x: f64, vx: f64) -> PhysicalObject {
        let pose = poses.insert(MechanicalPose::new(
            StaticPose::at(Vec2::new(x, 0.0)),
            Vec2::new(vx, 0.0),
            0.0,
        ));
        let area = BoundingArea::new(pose).with_circle(BoundingCircle::new(pose, 1.0).unwrap());
        PhysicalObject::new(pose, area, 1.0, poses).unwrap()
    }

    fn speed_x(system: &PhysicsSystem, poses: &PoseArena, key: PhysicalObjectKey) -> f64 {
        system.object(key).unwrap().velocity(poses).linear.x
    }

    #[test]
    fn velocity_of_offset_point() {
        let vel = Velocity {
            linear: Vec2::new(1.0, 0.0),
            angular: 1.0,
        };
        assert_eq!(vel.point_velocity(Vec2::new(1.0, 0.0)), Vec2::new(1.0, 1.0));
        let sum = vel + Velocity::default();
        assert_eq!(sum, vel);
    }

    #[test]
    fn keys_stay_valid_across_removal() {
        let mut poses = PoseArena::new();
        let mut system = PhysicsSystem::new();
        let a = system.add_object(ball(&mut poses, 0.0, 0.0));
        let b = system.add_object(ball(&mut poses, 5.0, 0.0));
        let wall = system.add_boundary(BoundaryLine::new(1.0, 0.0, 10.0).unwrap());
        assert!(system.remove_object(a).is_some());
        assert!(system.remove_object(a).is_none());
        assert!(system.object(b).is_some());
        assert_eq!(system.objects().map(|(k, _)| k).collect::<Vec<_>>(), vec![b]);
        assert!(system.remove_boundary(wall).is_some());
        assert_eq!(system.boundary_count(), 0);
        system.clear();
    }

    #[test]
    fn boundaries_take_priority_over_objects() {
        let mut poses = PoseArena::new();
        let mut system = PhysicsSystem::new();
        // a ball touching the wall on its left and another ball on its right
        let wall_hugger = system.add_object(ball(&mut poses, 0.5, -1.0));
        let neighbor = system.add_object(ball(&mut poses, 2.0, -1.0));
        system.add_boundary(BoundaryLine::new(1.0, 0.0, 0.0).unwrap());

        assert_eq!(system.update(&mut poses), 1);
        // the first ball bounced off the wall and never looked at its neighbor
        assert!((speed_x(&system, &poses, wall_hugger) - 1.0).abs() < 1e-9);
        // the neighbor has no later objects to check and is out of the wall's reach
        assert!((speed_x(&system, &poses, neighbor) + 1.0).abs() < 1e-9);
        system.clear();
    }

    #[test]
    fn each_object_resolves_one_contact() {
        let mut poses = PoseArena::new();
        let mut system = PhysicsSystem::new();
        let a = system.add_object(ball(&mut poses, 0.0, 1.0));
        let b = system.add_object(ball(&mut poses, 1.9, -1.0));
        system.add_object(ball(&mut poses, 20.0, 0.0));

        assert_eq!(system.update(&mut poses), 1);
        assert!((speed_x(&system, &poses, a) + 1.0).abs() < 1e-9);
        assert!((speed_x(&system, &poses, b) - 1.0).abs() < 1e-9);
        system.clear();
    }

    #[test]
    fn tick_moves_then_resolves() {
        let mut poses = PoseArena::new();
        let mut system = PhysicsSystem::new();
        let a = system.add_object(ball(&mut poses, 0.0, 1.0));
        let b = system.add_object(ball(&mut poses, 3.0, -1.0));

        assert_eq!(system.tick(&mut poses, 0.25), 0);
        assert_eq!(system.tick(&mut poses, 0.25), 1);
        assert!((speed_x(&system, &poses, a) + 1.0).abs() < 1e-9);
        assert!((speed_x(&system, &poses, b) - 1.0).abs() < 1e-9);
        system.clear();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "without removing its objects")]
    fn dropping_with_objects_is_caught() {
        let mut poses = PoseArena::new();
        let mut system = PhysicsSystem::new();
        system.add_object(ball(&mut poses, 0.0, 0.0));
    }
}
