//! Collision detection between registered colliders.
//!
//! Every call to [`CollisionSystem::update`] runs the broad phase over all colliders,
//! tests the surviving pairs exactly and hands each confirmed contact to a
//! [`CollisionDispatcher`]. The system never changes any state by itself.

pub mod broadphase;
pub mod shape;
pub(crate) mod shape_shape;

use std::collections::BTreeMap;

pub use broadphase::{BroadPhase, BroadPhaseParams, BruteForce, HybridBoxIntersection};
pub use shape::{
    Axis, BoundaryLine, BoundingArea, BoundingBox, BoundingCircle, Corner, ShapeError, AABB,
};
pub use shape_shape::CollisionInfo;

use broadphase::IntervalBox;

use crate::{math::Vec2, pose::PoseArena};

/// Identifier of a collider registered in a [`CollisionSystem`].
///
/// Handles are assigned in increasing order and never reused by the same system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColliderHandle(pub(crate) u32);

impl ColliderHandle {
    #[inline]
    pub fn id(&self) -> u32 {
        self.0
    }
}

/// A shape registered for collision detection, with bitmasks deciding what it reacts to.
#[derive(Clone, Debug, PartialEq)]
pub struct Collider {
    pub area: BoundingArea,
    /// What this collider is.
    pub flags: u32,
    /// What this collider reacts to.
    pub filters: u32,
}

impl Collider {
    /// A collider that is everything and reacts to everything.
    pub fn new(area: BoundingArea) -> Self {
        Collider {
            area,
            flags: 0xFFFF_FFFF,
            filters: 0xFFFF_FFFF,
        }
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_filters(mut self, filters: u32) -> Self {
        self.filters = filters;
        self
    }

    /// Whether this collider reacts to `other`. Not symmetric.
    #[inline]
    pub fn collides_with(&self, other: &Collider) -> bool {
        self.filters & other.flags != 0
    }
}

/// A confirmed contact between two colliders.
///
/// `first` is the collider whose filters matched the other's flags,
/// and the normal points from `first` toward `second`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Collision {
    pub first: ColliderHandle,
    pub second: ColliderHandle,
    pub point: Vec2,
    pub normal: Vec2,
}

/// Receiver of the collisions found during an update.
///
/// Implemented for every `FnMut(Collision)`.
pub trait CollisionDispatcher {
    fn handle_collision(&mut self, collision: Collision);
}

impl<F: FnMut(Collision)> CollisionDispatcher for F {
    fn handle_collision(&mut self, collision: Collision) {
        self(collision)
    }
}

/// Registry of colliders and the pipeline that finds collisions between them.
pub struct CollisionSystem {
    colliders: BTreeMap<ColliderHandle, Collider>,
    next_handle: u32,
    broad_phase: HybridBoxIntersection,
}

impl Default for CollisionSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionSystem {
    pub fn new() -> Self {
        Self::with_params(BroadPhaseParams::default())
    }

    pub fn with_params(params: BroadPhaseParams) -> Self {
        Self {
            colliders: BTreeMap::new(),
            next_handle: 0,
            broad_phase: HybridBoxIntersection::new(params),
        }
    }

    #[inline]
    pub fn params(&self) -> &BroadPhaseParams {
        &self.broad_phase.params
    }

    /// Register a collider, returning the handle it will be reported with.
    ///
    /// # Panics
    ///
    /// If more than `u32::MAX` colliders have been registered over the system's lifetime.
    pub fn add_collider(&mut self, collider: Collider) -> ColliderHandle {
        let handle = ColliderHandle(self.next_handle);
        self.next_handle = self
            .next_handle
            .checked_add(1)
            .expect("Ran out of collider handles");
        self.colliders.insert(handle, collider);
        log::debug!("Added collider {:?}", handle);
        handle
    }

    pub fn remove_collider(&mut self, handle: ColliderHandle) -> Option<Collider> {
        let removed = self.colliders.remove(&handle);
        if removed.is_some() {
            log::debug!("Removed collider {:?}", handle);
        }
        removed
    }

    /// Remove every collider. Handles stay unique afterwards.
    pub fn clear(&mut self) {
        self.colliders.clear();
    }

    #[inline]
    pub fn get(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.colliders.get(&handle)
    }

    #[inline]
    pub fn get_mut(&mut self, handle: ColliderHandle) -> Option<&mut Collider> {
        self.colliders.get_mut(&handle)
    }

    /// Iterate over colliders in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (ColliderHandle, &Collider)> {
        self.colliders.iter().map(|(h, c)| (*h, c))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    /// Run only the broad phase, returning every pair of colliders whose
    /// quantized bounds overlap, smaller handle first.
    /// Colliders with no shapes are left out.
    pub fn candidate_pairs(&self, poses: &PoseArena) -> Vec<[ColliderHandle; 2]> {
        let boxes: Vec<IntervalBox<ColliderHandle>> = self
            .colliders
            .iter()
            .filter(|(_, coll)| !coll.area.is_empty())
            .map(|(handle, coll)| IntervalBox::from_aabb(*handle, &coll.area.aabb(poses)))
            .collect();
        self.broad_phase.pairs_within(&boxes)
    }

    /// Find all collisions between registered colliders at the current poses
    /// and pass each one to the dispatcher, once per colliding pair.
    /// Returns the number of collisions dispatched.
    ///
    /// A pair is only tested if at least one collider's filters match the other's flags.
    /// If both match, the collider with the smaller handle is reported first.
    pub fn update(&self, poses: &PoseArena, dispatcher: &mut impl CollisionDispatcher) -> usize {
        let _span = crate::tracy_span!("collision update", "update");

        let candidates = self.candidate_pairs(poses);

        let _narrow_span = crate::tracy_span!("narrow phase", "update");
        let mut dispatched = 0;
        for [a, b] in &candidates {
            let (Some(coll_a), Some(coll_b)) = (self.colliders.get(a), self.colliders.get(b))
            else {
                continue;
            };
            let (first, first_coll, second, second_coll) = if coll_a.collides_with(coll_b) {
                (*a, coll_a, *b, coll_b)
            } else if coll_b.collides_with(coll_a) {
                (*b, coll_b, *a, coll_a)
            } else {
                continue;
            };

            if let Some((point, normal)) = first_coll.area.collides(&second_coll.area, poses).contact()
            {
                dispatcher.handle_collision(Collision {
                    first,
                    second,
                    point,
                    normal,
                });
                dispatched += 1;
            }
        }

        log::trace!(
            "Collision update: {} candidate pairs, {} collisions",
            candidates.len(),
            dispatched
        );
        dispatched
    }
}

impl Drop for CollisionSystem {
    fn drop(&mut self) {
        if !self.colliders.is_empty() {
            log::warn!(
                "CollisionSystem dropped with {} colliders still registered",
                self.colliders.len()
            );
            debug_assert!(
                std::thread::panicking(),
                "CollisionSystem dropped without removing its colliders"
            );
        }
    }
}
