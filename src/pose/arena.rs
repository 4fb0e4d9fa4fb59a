use super::{HierarchicalPose, MechanicalPose, Pose, StaticPose};

use thunderdome as td;

/// Key type to look up a pose stored in a [`PoseArena`][super::PoseArena].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoseKey(pub(super) td::Index);

impl PoseKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

/// Error when inserting a pose that refers to another pose.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum PoseError {
    #[error("Parent pose {0:?} does not exist")]
    UnknownParent(PoseKey),
    #[error("Pose {0:?} is not a hierarchical pose")]
    NotHierarchical(PoseKey),
}

const MISSING_POSE: &str = "Pose was used after being removed from its arena";

/// Owner of every pose in a simulation.
///
/// Shapes, colliders and physical objects refer to poses through [`PoseKey`]s,
/// so a pose must stay in the arena for as long as anything refers to it.
/// Looking up a removed pose through a shape is a bug and panics.
#[derive(Default)]
pub struct PoseArena {
    poses: td::Arena<Pose>,
}

impl PoseArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Insert a static or mechanical pose.
    pub fn insert(&mut self, pose: impl Into<Pose>) -> PoseKey {
        PoseKey(self.poses.insert(pose.into()))
    }

    /// Insert a pose defined relative to an existing parent pose.
    /// Its global state is computed immediately.
    pub fn insert_child(&mut self, parent: PoseKey, local: StaticPose) -> Result<PoseKey, PoseError> {
        if !self.poses.contains(parent.0) {
            return Err(PoseError::UnknownParent(parent));
        }
        let global = self.resolve(parent).compose(&local);
        Ok(PoseKey(self.poses.insert(Pose::Hierarchical(
            HierarchicalPose {
                parent,
                local,
                global,
            },
        ))))
    }

    pub fn remove(&mut self, key: PoseKey) -> Option<Pose> {
        self.poses.remove(key.0)
    }

    #[inline]
    pub fn get(&self, key: PoseKey) -> Option<&Pose> {
        self.poses.get(key.0)
    }

    #[inline]
    pub fn get_mut(&mut self, key: PoseKey) -> Option<&mut Pose> {
        self.poses.get_mut(key.0)
    }

    /// Access a pose that is known to exist.
    ///
    /// # Panics
    ///
    /// If the pose was removed.
    #[inline]
    pub fn pose(&self, key: PoseKey) -> &Pose {
        self.poses.get(key.0).expect(MISSING_POSE)
    }

    /// Access a pose as a mechanical pose, if it is one.
    pub fn mechanics(&self, key: PoseKey) -> Option<&MechanicalPose> {
        match self.poses.get(key.0) {
            Some(Pose::Mechanical(mech)) => Some(mech),
            _ => None,
        }
    }

    pub fn mechanics_mut(&mut self, key: PoseKey) -> Option<&mut MechanicalPose> {
        match self.poses.get_mut(key.0) {
            Some(Pose::Mechanical(mech)) => Some(mech),
            _ => None,
        }
    }

    /// Replace the local part of a hierarchical pose and recompute its global state.
    pub fn set_local(&mut self, key: PoseKey, local: StaticPose) -> Result<(), PoseError> {
        let parent = match self.poses.get(key.0) {
            Some(Pose::Hierarchical(h)) => h.parent,
            _ => return Err(PoseError::NotHierarchical(key)),
        };
        let global = self.resolve(parent).compose(&local);
        if let Some(Pose::Hierarchical(h)) = self.poses.get_mut(key.0) {
            h.local = local;
            h.global = global;
        }
        Ok(())
    }

    /// Move every mechanical pose forward by `dt` seconds
    /// and bring hierarchical poses up to date with their parents.
    pub fn advance(&mut self, dt: f64) {
        for (_, pose) in self.poses.iter_mut() {
            if let Pose::Mechanical(mech) = pose {
                mech.advance(dt);
            }
        }
        self.refresh_hierarchy();
    }

    /// Recompute the global state of every hierarchical pose from its parent chain.
    pub fn refresh_hierarchy(&mut self) {
        let refreshed: Vec<(td::Index, StaticPose)> = self
            .poses
            .iter()
            .filter(|(_, pose)| matches!(pose, Pose::Hierarchical(_)))
            .map(|(idx, _)| (idx, self.resolve(PoseKey(idx))))
            .collect();
        for (idx, global) in refreshed {
            if let Some(Pose::Hierarchical(h)) = self.poses.get_mut(idx) {
                h.global = global;
            }
        }
    }

    /// Compute the global state of a pose by walking its parent chain,
    /// ignoring cached hierarchical state.
    fn resolve(&self, key: PoseKey) -> StaticPose {
        match self.pose(key) {
            Pose::Static(p) => *p,
            Pose::Mechanical(p) => *p.current(),
            Pose::Hierarchical(h) => self.resolve(h.parent).compose(&h.local),
        }
    }
}
