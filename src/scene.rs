// src/scene.rs - Host scene seams: transforms, hand actors, collision exemption
use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tracking::TrackedHand;

/// Millimetres (tracking space) to metres (scene space).
pub const MM_TO_METERS: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColliderId(pub u64);

/// Position, rotation and local scale of a scene node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub local_scale: Vector3<f64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            local_scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    pub fn new(
        position: Vector3<f64>,
        rotation: UnitQuaternion<f64>,
        local_scale: Vector3<f64>,
    ) -> Self {
        Self {
            position,
            rotation,
            local_scale,
        }
    }

    pub fn from_euler(position: [f64; 3], euler: [f64; 3], local_scale: [f64; 3]) -> Self {
        Self::new(
            Vector3::from(position),
            UnitQuaternion::from_euler_angles(euler[0], euler[1], euler[2]),
            Vector3::from(local_scale),
        )
    }

    /// Maps a point from this node's local space into its parent's space.
    pub fn transform_point(&self, local: &Vector3<f64>) -> Vector3<f64> {
        let scaled = self.local_scale.component_mul(local);
        self.position + self.rotation.transform_point(&Point3::from(scaled)).coords
    }
}

/// A hand model living in the host scene. Concrete variants (rendered mesh,
/// physics proxy, ...) are supplied by the host.
pub trait HandActor {
    fn set_tracked_hand(&mut self, hand: &TrackedHand);

    /// Runs once, right after creation.
    fn init_hand(&mut self, root: &Transform);

    /// Runs every tick the hand stays tracked.
    fn update_hand(&mut self, root: &Transform);

    fn local_scale(&self) -> Vector3<f64>;

    fn set_local_scale(&mut self, scale: Vector3<f64>);
}

/// Creates and removes hand actors in the host scene.
///
/// `instantiate` must leave the new actor exempt from collisions with the
/// immovable scenery; see [`exempt_from_static_scenery`]. `destroy` takes
/// the actor by value, so each one can be destroyed at most once.
pub trait ActorFactory {
    type Template;
    type Actor: HandActor;

    fn instantiate(
        &mut self,
        template: &Self::Template,
        position: &Vector3<f64>,
        rotation: &UnitQuaternion<f64>,
    ) -> Result<Self::Actor>;

    fn destroy(&mut self, actor: Self::Actor);

    /// Name used in logs and errors.
    fn template_name(&self, _template: &Self::Template) -> String {
        String::from("<template>")
    }
}

/// Collider queries and collision masking offered by the host physics.
pub trait CollisionWorld {
    fn colliders_in_subtree(&self, root: NodeId) -> Vec<ColliderId>;

    fn has_rigid_body(&self, collider: ColliderId) -> bool;

    fn ignore_collision(&mut self, a: ColliderId, b: ColliderId);
}

/// Makes every collider under `actor_root` ignore every collider under
/// `scenery_root` that has no rigid body. Returns the number of pairs masked.
pub fn exempt_from_static_scenery<W: CollisionWorld + ?Sized>(
    world: &mut W,
    scenery_root: NodeId,
    actor_root: NodeId,
) -> usize {
    let static_colliders: Vec<ColliderId> = world
        .colliders_in_subtree(scenery_root)
        .into_iter()
        .filter(|c| !world.has_rigid_body(*c))
        .collect();
    let hand_colliders = world.colliders_in_subtree(actor_root);

    let mut ignored = 0;
    for scenery in &static_colliders {
        for hand in &hand_colliders {
            world.ignore_collision(*scenery, *hand);
            ignored += 1;
        }
    }

    tracing::trace!(
        "masked {} collider pairs between scenery {:?} and actor {:?}",
        ignored,
        scenery_root,
        actor_root
    );
    ignored
}
