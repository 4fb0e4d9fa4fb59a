//! 2D collision detection and impulse-based collision response.
//!
//! Shapes ([`BoundingCircle`], [`BoundingBox`] and composites of them in a [`BoundingArea`])
//! read their placement from poses stored in a [`PoseArena`].
//! The [`CollisionSystem`] finds and reports overlaps between registered colliders,
//! and the [`PhysicsSystem`] bounces rigid bodies off of each other and off static boundaries.

/// Open a profiling span that lasts until the returned value is dropped.
/// Does nothing unless the `tracy` feature is enabled and a profiler is connected.
macro_rules! tracy_span {
    ($name:literal, $fn_name:literal) => {
        tracy_client::Client::running()
            .map(|client| client.span_alloc(Some($name), $fn_name, file!(), line!(), 0))
    };
}
pub(crate) use tracy_span;

pub mod math;
pub use math::{uv, Angle, Vec2};

pub mod pose;
pub use pose::{
    HierarchicalPose, MechanicalPose, Pose, PoseArena, PoseError, PoseKey, StaticPose, Transform,
};

pub mod collision;
pub use collision::{
    BoundaryLine, BoundingArea, BoundingBox, BoundingCircle, BroadPhaseParams, Collider,
    ColliderHandle, Collision, CollisionDispatcher, CollisionInfo, CollisionSystem, ShapeError,
    AABB,
};

pub mod physics;
pub use physics::{
    BoundaryKey, PhysicalObject, PhysicalObjectKey, PhysicsError, PhysicsSystem, Velocity,
};
