// src/headless.rs - In-memory host scene used by the CLI and tests
use std::collections::{BTreeMap, HashSet};

use nalgebra::{UnitQuaternion, Vector3};

use crate::controller::TemplateLibrary;
use crate::error::{HandSyncError, Result};
use crate::scene::{
    exempt_from_static_scenery, ActorFactory, ColliderId, CollisionWorld, HandActor, NodeId,
    Transform, MM_TO_METERS,
};
use crate::tracking::TrackedHand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Graphics,
    Physics,
}

/// Prototype for a hand actor: what it is called and how many colliders a
/// new instance carries.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTemplate {
    pub name: String,
    pub kind: ModelKind,
    pub collider_count: usize,
}

impl ModelTemplate {
    pub fn graphics(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ModelKind::Graphics,
            collider_count: 0,
        }
    }

    pub fn physics(name: &str, collider_count: usize) -> Self {
        Self {
            name: name.to_string(),
            kind: ModelKind::Physics,
            collider_count,
        }
    }
}

#[derive(Debug)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy)]
struct ColliderRecord {
    node: NodeId,
    rigid_body: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneStats {
    pub instantiated: usize,
    pub destroyed: usize,
    pub ignored_pairs: usize,
}

/// A hand actor living in a [`HeadlessScene`].
#[derive(Debug)]
pub struct HeadlessHand {
    node: NodeId,
    template: String,
    colliders: Vec<ColliderId>,
    hand: Option<TrackedHand>,
    position: Vector3<f64>,
    rotation: UnitQuaternion<f64>,
    local_scale: Vector3<f64>,
    initialized: bool,
    updates: u64,
}

impl HeadlessHand {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn colliders(&self) -> &[ColliderId] {
        &self.colliders
    }

    pub fn tracked_hand(&self) -> Option<&TrackedHand> {
        self.hand.as_ref()
    }

    pub fn position(&self) -> Vector3<f64> {
        self.position
    }

    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.rotation
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn update_count(&self) -> u64 {
        self.updates
    }

    fn follow_palm(&mut self, root: &Transform) {
        if let Some(hand) = &self.hand {
            self.position = root.transform_point(&(hand.palm_position * MM_TO_METERS));
            self.rotation = root.rotation;
        }
    }
}

impl HandActor for HeadlessHand {
    fn set_tracked_hand(&mut self, hand: &TrackedHand) {
        self.hand = Some(hand.clone());
    }

    fn init_hand(&mut self, root: &Transform) {
        self.initialized = true;
        self.follow_palm(root);
    }

    fn update_hand(&mut self, root: &Transform) {
        self.updates += 1;
        self.follow_palm(root);
    }

    fn local_scale(&self) -> Vector3<f64> {
        self.local_scale
    }

    fn set_local_scale(&mut self, scale: Vector3<f64>) {
        self.local_scale = scale;
    }
}

/// Minimal scene graph: named nodes, colliders with or without rigid
/// bodies, and a set of collider pairs that ignore each other.
pub struct HeadlessScene {
    nodes: BTreeMap<NodeId, Node>,
    colliders: BTreeMap<ColliderId, ColliderRecord>,
    ignored: HashSet<(ColliderId, ColliderId)>,
    templates: BTreeMap<String, ModelTemplate>,
    scenery_root: NodeId,
    next_id: u64,
    live_actors: usize,
    max_live_actors: Option<usize>,
    destroyed_nodes: Vec<NodeId>,
    stats: SceneStats,
}

impl HeadlessScene {
    pub fn new() -> Self {
        let mut scene = Self {
            nodes: BTreeMap::new(),
            colliders: BTreeMap::new(),
            ignored: HashSet::new(),
            templates: BTreeMap::new(),
            scenery_root: NodeId(0),
            next_id: 0,
            live_actors: 0,
            max_live_actors: None,
            destroyed_nodes: Vec::new(),
            stats: SceneStats::default(),
        };
        scene.scenery_root = scene.insert_node("scenery", None);
        scene
    }

    /// Registers the four templates named by the default configuration.
    pub fn with_default_templates(mut self) -> Self {
        self.register_template(ModelTemplate::graphics("graphics_left"));
        self.register_template(ModelTemplate::graphics("graphics_right"));
        self.register_template(ModelTemplate::physics("physics_left", 6));
        self.register_template(ModelTemplate::physics("physics_right", 6));
        self
    }

    pub fn register_template(&mut self, template: ModelTemplate) {
        self.templates.insert(template.name.clone(), template);
    }

    /// Makes `instantiate` fail once this many actors are alive.
    pub fn set_max_live_actors(&mut self, limit: Option<usize>) {
        self.max_live_actors = limit;
    }

    pub fn scenery_root(&self) -> NodeId {
        self.scenery_root
    }

    pub fn add_node(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.insert_node(name, Some(parent))
    }

    pub fn add_collider(&mut self, node: NodeId, rigid_body: bool) -> ColliderId {
        let id = ColliderId(self.allocate_id());
        self.colliders.insert(id, ColliderRecord { node, rigid_body });
        id
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn node_name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(&node).map(|n| n.name.as_str())
    }

    pub fn contains_collider(&self, collider: ColliderId) -> bool {
        self.colliders.contains_key(&collider)
    }

    pub fn is_ignored(&self, a: ColliderId, b: ColliderId) -> bool {
        self.ignored.contains(&ordered(a, b))
    }

    pub fn live_actors(&self) -> usize {
        self.live_actors
    }

    /// Root nodes of destroyed actors, in destruction order.
    pub fn destroyed_nodes(&self) -> &[NodeId] {
        &self.destroyed_nodes
    }

    pub fn stats(&self) -> SceneStats {
        SceneStats {
            ignored_pairs: self.ignored.len(),
            ..self.stats
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert_node(&mut self, name: &str, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.allocate_id());
        self.nodes.insert(
            id,
            Node {
                name: name.to_string(),
                parent,
                children: Vec::new(),
            },
        );
        if let Some(node) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            node.children.push(id);
        }
        id
    }

    fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                out.push(id);
                stack.extend(node.children.iter().copied());
            }
        }
        out
    }

    fn remove_subtree(&mut self, root: NodeId) {
        let doomed: HashSet<NodeId> = self.subtree(root).into_iter().collect();

        if let Some(parent) = self.nodes.get(&root).and_then(|n| n.parent) {
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.children.retain(|c| *c != root);
            }
        }
        self.nodes.retain(|id, _| !doomed.contains(id));

        let gone: HashSet<ColliderId> = self
            .colliders
            .iter()
            .filter(|(_, c)| doomed.contains(&c.node))
            .map(|(id, _)| *id)
            .collect();
        self.colliders.retain(|id, _| !gone.contains(id));
        self.ignored
            .retain(|(a, b)| !gone.contains(a) && !gone.contains(b));
    }
}

impl Default for HeadlessScene {
    fn default() -> Self {
        Self::new()
    }
}

fn ordered(a: ColliderId, b: ColliderId) -> (ColliderId, ColliderId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl CollisionWorld for HeadlessScene {
    fn colliders_in_subtree(&self, root: NodeId) -> Vec<ColliderId> {
        let nodes: HashSet<NodeId> = self.subtree(root).into_iter().collect();
        self.colliders
            .iter()
            .filter(|(_, c)| nodes.contains(&c.node))
            .map(|(id, _)| *id)
            .collect()
    }

    fn has_rigid_body(&self, collider: ColliderId) -> bool {
        self.colliders.get(&collider).map(|c| c.rigid_body).unwrap_or(false)
    }

    fn ignore_collision(&mut self, a: ColliderId, b: ColliderId) {
        self.ignored.insert(ordered(a, b));
    }
}

impl TemplateLibrary for HeadlessScene {
    type Template = ModelTemplate;

    fn template(&self, name: &str) -> Option<ModelTemplate> {
        self.templates.get(name).cloned()
    }
}

impl ActorFactory for HeadlessScene {
    type Template = ModelTemplate;
    type Actor = HeadlessHand;

    fn instantiate(
        &mut self,
        template: &ModelTemplate,
        position: &Vector3<f64>,
        rotation: &UnitQuaternion<f64>,
    ) -> Result<HeadlessHand> {
        if let Some(limit) = self.max_live_actors {
            if self.live_actors >= limit {
                return Err(HandSyncError::Instantiate {
                    template: template.name.clone(),
                    reason: format!("scene already holds {} hand actors", limit),
                });
            }
        }

        let node = self.insert_node(&template.name, None);
        let rigid_body = template.kind == ModelKind::Physics;
        let colliders: Vec<ColliderId> = (0..template.collider_count)
            .map(|i| {
                let bone = self.add_node(node, &format!("{}_bone{}", template.name, i));
                self.add_collider(bone, rigid_body)
            })
            .collect();

        let scenery_root = self.scenery_root;
        exempt_from_static_scenery(self, scenery_root, node);

        self.live_actors += 1;
        self.stats.instantiated += 1;

        Ok(HeadlessHand {
            node,
            template: template.name.clone(),
            colliders,
            hand: None,
            position: *position,
            rotation: *rotation,
            local_scale: Vector3::new(1.0, 1.0, 1.0),
            initialized: false,
            updates: 0,
        })
    }

    fn destroy(&mut self, actor: HeadlessHand) {
        self.remove_subtree(actor.node);
        self.destroyed_nodes.push(actor.node);
        self.live_actors = self.live_actors.saturating_sub(1);
        self.stats.destroyed += 1;
    }

    fn template_name(&self, template: &ModelTemplate) -> String {
        template.name.clone()
    }
}
