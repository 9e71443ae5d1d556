// src/controller.rs - Keeps hand actors in step with the tracked hands
use std::collections::{HashMap, HashSet};

use nalgebra::Vector3;
use serde::Serialize;

use crate::config::TemplateConfig;
use crate::error::{HandSyncError, Result};
use crate::scene::{ActorFactory, HandActor, Transform};
use crate::source::FrameSource;
use crate::tracking::{Frame, Handedness};

/// Reference distance from thumb base to pinky base in mm. A hand this wide
/// is drawn at the root's scale.
pub const MODEL_PALM_DIAMETER: f64 = 85.0;

/// Left and right prototypes for one actor set. An absent side is ignored.
#[derive(Debug, Clone)]
pub struct HandTemplates<T> {
    pub left: Option<T>,
    pub right: Option<T>,
}

impl<T> HandTemplates<T> {
    pub fn new(left: Option<T>, right: Option<T>) -> Self {
        Self { left, right }
    }

    pub fn none() -> Self {
        Self::new(None, None)
    }

    pub fn for_hand(&self, handedness: Handedness) -> Option<&T> {
        match handedness {
            Handedness::Left => self.left.as_ref(),
            Handedness::Right => self.right.as_ref(),
        }
    }
}

impl<T> Default for HandTemplates<T> {
    fn default() -> Self {
        Self::none()
    }
}

/// Resolves template names from configuration into host templates.
pub trait TemplateLibrary {
    type Template;

    fn template(&self, name: &str) -> Option<Self::Template>;

    fn resolve(
        &self,
        left: Option<&str>,
        right: Option<&str>,
    ) -> Result<HandTemplates<Self::Template>> {
        let lookup = |name: Option<&str>| -> Result<Option<Self::Template>> {
            match name {
                Some(name) => self
                    .template(name)
                    .map(Some)
                    .ok_or_else(|| HandSyncError::UnknownTemplate(name.to_string())),
                None => Ok(None),
            }
        };
        Ok(HandTemplates::new(lookup(left)?, lookup(right)?))
    }
}

/// Resolves the graphics and physics template pairs named in `config`.
pub fn resolve_templates<L: TemplateLibrary>(
    library: &L,
    config: &TemplateConfig,
) -> Result<(HandTemplates<L::Template>, HandTemplates<L::Template>)> {
    let graphics =
        library.resolve(config.graphics_left.as_deref(), config.graphics_right.as_deref())?;
    let physics =
        library.resolve(config.physics_left.as_deref(), config.physics_right.as_deref())?;
    Ok((graphics, physics))
}

/// Live actors keyed by tracking id.
#[derive(Debug)]
pub struct ActorMapping<A> {
    actors: HashMap<i32, A>,
}

impl<A> ActorMapping<A> {
    pub fn new() -> Self {
        Self {
            actors: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn contains(&self, id: i32) -> bool {
        self.actors.contains_key(&id)
    }

    pub fn get(&self, id: i32) -> Option<&A> {
        self.actors.get(&id)
    }

    pub fn get_mut(&mut self, id: i32) -> Option<&mut A> {
        self.actors.get_mut(&id)
    }

    /// Tracking ids, sorted.
    pub fn ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self.actors.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &A)> {
        self.actors.iter().map(|(id, actor)| (*id, actor))
    }
}

impl<A> Default for ActorMapping<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// What one reconciliation pass did, by tracking id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileSummary {
    pub created: Vec<i32>,
    pub updated: Vec<i32>,
    pub destroyed: Vec<i32>,
    /// Hands whose handedness has no template for this actor set.
    pub skipped: Vec<i32>,
}

impl ReconcileSummary {
    pub fn is_quiet(&self) -> bool {
        self.created.is_empty() && self.destroyed.is_empty()
    }
}

/// Brings `mapping` in line with `frame`.
///
/// Every hand whose side has a template ends up with exactly one actor,
/// created on first sight and rescaled and updated on every call. Actors
/// whose id is missing from the frame are destroyed. Hands without a
/// template are left alone, which also means they never retire an actor.
///
/// If two hands in the frame share an id, the later one wins.
///
/// If the factory fails, nothing is registered for that id and the pass
/// carries on: the other hands are still handled and stale actors are still
/// destroyed. The first factory error is then returned.
pub fn reconcile<F: ActorFactory>(
    factory: &mut F,
    mapping: &mut ActorMapping<F::Actor>,
    frame: &Frame,
    templates: &HandTemplates<F::Template>,
    root: &Transform,
) -> Result<ReconcileSummary> {
    let mut summary = ReconcileSummary::default();
    let mut first_error: Option<HandSyncError> = None;
    let mut ids_to_check: HashSet<i32> = mapping.actors.keys().copied().collect();

    for hand in frame.hands() {
        let Some(template) = templates.for_hand(hand.handedness) else {
            summary.skipped.push(hand.id);
            continue;
        };

        ids_to_check.remove(&hand.id);

        if !mapping.actors.contains_key(&hand.id) {
            let mut actor = match factory.instantiate(template, &root.position, &root.rotation) {
                Ok(actor) => actor,
                Err(e) => {
                    tracing::warn!(
                        "could not create {:?} hand {} from '{}': {}",
                        hand.handedness,
                        hand.id,
                        factory.template_name(template),
                        e
                    );
                    first_error.get_or_insert(e);
                    continue;
                }
            };
            actor.set_tracked_hand(hand);
            actor.init_hand(root);
            mapping.actors.insert(hand.id, actor);
            summary.created.push(hand.id);
            tracing::debug!("created {:?} hand actor for id {}", hand.handedness, hand.id);
        } else {
            summary.updated.push(hand.id);
        }

        let Some(actor) = mapping.actors.get_mut(&hand.id) else {
            continue;
        };
        actor.set_tracked_hand(hand);

        let palm_diameter = hand.palm_diameter();
        if palm_diameter <= f64::EPSILON {
            tracing::warn!(
                "hand {} has a degenerate palm; model collapses to zero scale",
                hand.id
            );
        }
        actor.set_local_scale(hand_scale(palm_diameter, &root.local_scale));

        actor.update_hand(root);
    }

    // Destroy all hands with defunct ids
    let mut defunct: Vec<i32> = ids_to_check.into_iter().collect();
    defunct.sort_unstable();
    for id in defunct {
        if let Some(actor) = mapping.actors.remove(&id) {
            factory.destroy(actor);
            summary.destroyed.push(id);
            tracing::debug!("destroyed hand actor for id {}", id);
        }
    }

    tracing::trace!(
        "frame {}: {} created, {} updated, {} destroyed, {} skipped",
        frame.id,
        summary.created.len(),
        summary.updated.len(),
        summary.destroyed.len(),
        summary.skipped.len()
    );
    match first_error {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}

/// Which actor set a tick reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TickKind {
    Graphics,
    Physics,
}

/// Result of one controller tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub kind: TickKind,
    pub frame_id: i64,
    pub timestamp: f64,
    pub summary: ReconcileSummary,
    pub live_actors: usize,
}

/// Owns the frame source, the factory, and the graphics and physics actor
/// sets. The host calls `update` every render tick and `fixed_update` every
/// physics tick, and moves the source on with `advance` once per step of
/// its clock. Both ticks read the source's current frame without consuming
/// it.
pub struct HandController<S, F: ActorFactory> {
    source: S,
    factory: F,
    root: Transform,
    graphics_templates: HandTemplates<F::Template>,
    physics_templates: HandTemplates<F::Template>,
    graphics_hands: ActorMapping<F::Actor>,
    physics_hands: ActorMapping<F::Actor>,
}

impl<S: FrameSource, F: ActorFactory> HandController<S, F> {
    pub fn new(source: S, factory: F, root: Transform) -> Self {
        Self {
            source,
            factory,
            root,
            graphics_templates: HandTemplates::none(),
            physics_templates: HandTemplates::none(),
            graphics_hands: ActorMapping::new(),
            physics_hands: ActorMapping::new(),
        }
    }

    pub fn with_graphics_templates(mut self, templates: HandTemplates<F::Template>) -> Self {
        self.graphics_templates = templates;
        self
    }

    pub fn with_physics_templates(mut self, templates: HandTemplates<F::Template>) -> Self {
        self.physics_templates = templates;
        self
    }

    /// Render tick: reconciles the graphics actors.
    pub fn update(&mut self) -> Result<TickReport> {
        let frame = self.source.current_frame();
        let summary = reconcile(
            &mut self.factory,
            &mut self.graphics_hands,
            &frame,
            &self.graphics_templates,
            &self.root,
        )?;
        Ok(TickReport {
            kind: TickKind::Graphics,
            frame_id: frame.id,
            timestamp: frame.timestamp,
            summary,
            live_actors: self.graphics_hands.len(),
        })
    }

    /// Physics tick: reconciles the physics actors.
    pub fn fixed_update(&mut self) -> Result<TickReport> {
        let frame = self.source.current_frame();
        let summary = reconcile(
            &mut self.factory,
            &mut self.physics_hands,
            &frame,
            &self.physics_templates,
            &self.root,
        )?;
        Ok(TickReport {
            kind: TickKind::Physics,
            frame_id: frame.id,
            timestamp: frame.timestamp,
            summary,
            live_actors: self.physics_hands.len(),
        })
    }

    /// Destroys every live actor in both sets.
    pub fn clear(&mut self) {
        for mapping in [&mut self.graphics_hands, &mut self.physics_hands] {
            for (_, actor) in mapping.actors.drain() {
                self.factory.destroy(actor);
            }
        }
    }

    /// Moves the frame source on to its next sample.
    pub fn advance(&mut self) {
        self.source.advance();
    }

    pub fn root(&self) -> &Transform {
        &self.root
    }

    pub fn set_root(&mut self, root: Transform) {
        self.root = root;
    }

    pub fn graphics_hands(&self) -> &ActorMapping<F::Actor> {
        &self.graphics_hands
    }

    pub fn physics_hands(&self) -> &ActorMapping<F::Actor> {
        &self.physics_hands
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }
}

/// Uniform scale a hand of the given palm width gets relative to the root.
pub fn hand_scale(palm_diameter_mm: f64, root_scale: &Vector3<f64>) -> Vector3<f64> {
    *root_scale * (palm_diameter_mm / MODEL_PALM_DIAMETER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{FingerJoint, FingerType, TrackedHand};
    use nalgebra::UnitQuaternion;

    #[derive(Debug)]
    struct StubActor {
        serial: u32,
        hand_id: Option<i32>,
        scale: Vector3<f64>,
        inits: u32,
        updates: u32,
    }

    impl HandActor for StubActor {
        fn set_tracked_hand(&mut self, hand: &TrackedHand) {
            self.hand_id = Some(hand.id);
        }

        fn init_hand(&mut self, _root: &Transform) {
            self.inits += 1;
        }

        fn update_hand(&mut self, _root: &Transform) {
            self.updates += 1;
        }

        fn local_scale(&self) -> Vector3<f64> {
            self.scale
        }

        fn set_local_scale(&mut self, scale: Vector3<f64>) {
            self.scale = scale;
        }
    }

    #[derive(Default)]
    struct StubFactory {
        next_serial: u32,
        destroyed: Vec<u32>,
        fail: bool,
    }

    impl ActorFactory for StubFactory {
        type Template = &'static str;
        type Actor = StubActor;

        fn instantiate(
            &mut self,
            template: &&'static str,
            _position: &Vector3<f64>,
            _rotation: &UnitQuaternion<f64>,
        ) -> Result<StubActor> {
            if self.fail {
                return Err(HandSyncError::Instantiate {
                    template: template.to_string(),
                    reason: "out of actors".into(),
                });
            }
            self.next_serial += 1;
            Ok(StubActor {
                serial: self.next_serial,
                hand_id: None,
                scale: Vector3::zeros(),
                inits: 0,
                updates: 0,
            })
        }

        fn destroy(&mut self, actor: StubActor) {
            self.destroyed.push(actor.serial);
        }
    }

    fn hand(id: i32, handedness: Handedness, width: f64) -> TrackedHand {
        TrackedHand::new(id, handedness).with_joint(
            FingerType::Pinky,
            FingerJoint::Mcp,
            Vector3::new(width, 0.0, 0.0),
        )
    }

    fn both() -> HandTemplates<&'static str> {
        HandTemplates::new(Some("left"), Some("right"))
    }

    #[test]
    fn creates_initializes_and_updates_new_hands() {
        let mut factory = StubFactory::default();
        let mut mapping = ActorMapping::new();
        let frame = Frame::new(0, 0.0, vec![hand(1, Handedness::Left, 85.0)]);

        let summary =
            reconcile(&mut factory, &mut mapping, &frame, &both(), &Transform::default()).unwrap();

        assert_eq!(summary.created, vec![1]);
        let actor = mapping.get(1).unwrap();
        assert_eq!(actor.hand_id, Some(1));
        assert_eq!(actor.inits, 1);
        assert_eq!(actor.updates, 1);
    }

    #[test]
    fn duplicate_ids_in_one_frame_share_one_actor() {
        let mut factory = StubFactory::default();
        let mut mapping = ActorMapping::new();
        let frame = Frame::new(
            0,
            0.0,
            vec![hand(4, Handedness::Left, 85.0), hand(4, Handedness::Left, 170.0)],
        );

        let summary =
            reconcile(&mut factory, &mut mapping, &frame, &both(), &Transform::default()).unwrap();

        assert_eq!(summary.created, vec![4]);
        assert_eq!(summary.updated, vec![4]);
        assert_eq!(mapping.len(), 1);
        // later entry wins
        assert_eq!(mapping.get(4).unwrap().scale, Vector3::new(2.0, 2.0, 2.0));
        assert_eq!(mapping.get(4).unwrap().inits, 1);
    }

    #[test]
    fn factory_failure_leaves_no_partial_entry() {
        let mut factory = StubFactory::default();
        let mut mapping = ActorMapping::new();
        reconcile(
            &mut factory,
            &mut mapping,
            &Frame::new(0, 0.0, vec![hand(1, Handedness::Left, 85.0)]),
            &both(),
            &Transform::default(),
        )
        .unwrap();

        factory.fail = true;
        let frame = Frame::new(
            1,
            0.0,
            vec![hand(1, Handedness::Left, 85.0), hand(2, Handedness::Right, 85.0)],
        );
        let err =
            reconcile(&mut factory, &mut mapping, &frame, &both(), &Transform::default())
                .unwrap_err();

        assert!(matches!(err, HandSyncError::Instantiate { .. }));
        assert_eq!(mapping.ids(), vec![1]);
        assert_eq!(mapping.get(1).unwrap().updates, 2);
        assert!(factory.destroyed.is_empty());
    }

    #[test]
    fn factory_failure_still_destroys_stale_actors() {
        let mut factory = StubFactory::default();
        let mut mapping = ActorMapping::new();
        let root = Transform::default();
        let first = Frame::new(0, 0.0, vec![hand(1, Handedness::Left, 85.0)]);
        reconcile(&mut factory, &mut mapping, &first, &both(), &root).unwrap();
        let serial = mapping.get(1).unwrap().serial;

        factory.fail = true;
        let second = Frame::new(1, 0.0, vec![hand(2, Handedness::Right, 85.0)]);
        let err = reconcile(&mut factory, &mut mapping, &second, &both(), &root).unwrap_err();

        assert!(matches!(
            err,
            HandSyncError::Instantiate { ref template, .. } if template == "right"
        ));
        assert!(mapping.is_empty());
        assert_eq!(factory.destroyed, vec![serial]);

        factory.fail = false;
        let summary = reconcile(&mut factory, &mut mapping, &second, &both(), &root).unwrap();
        assert_eq!(summary.created, vec![2]);
        assert!(summary.destroyed.is_empty());
        assert_eq!(factory.destroyed, vec![serial]);
    }

    #[test]
    fn scale_follows_root_scale_per_component() {
        let mut factory = StubFactory::default();
        let mut mapping = ActorMapping::new();
        let root = Transform {
            local_scale: Vector3::new(1.0, 2.0, 4.0),
            ..Transform::default()
        };
        let frame = Frame::new(0, 0.0, vec![hand(1, Handedness::Right, 42.5)]);

        reconcile(&mut factory, &mut mapping, &frame, &both(), &root).unwrap();

        let scale = mapping.get(1).unwrap().local_scale();
        assert!((scale - Vector3::new(0.5, 1.0, 2.0)).norm() < 1e-12);
        assert_eq!(scale, hand_scale(42.5, &root.local_scale));

        // whatever the actor was left at, the next pass rescales it
        mapping.get_mut(1).unwrap().set_local_scale(Vector3::zeros());
        reconcile(&mut factory, &mut mapping, &frame, &both(), &root).unwrap();
        assert_eq!(mapping.get(1).unwrap().local_scale(), scale);
    }

    #[test]
    fn template_library_reports_unknown_names() {
        struct Names;
        impl TemplateLibrary for Names {
            type Template = String;
            fn template(&self, name: &str) -> Option<String> {
                (name == "known").then(|| name.to_string())
            }
        }

        let resolved = Names.resolve(Some("known"), None).unwrap();
        assert_eq!(resolved.left.as_deref(), Some("known"));
        assert!(resolved.right.is_none());

        match Names.resolve(None, Some("ghost")) {
            Err(HandSyncError::UnknownTemplate(name)) => assert_eq!(name, "ghost"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }
}
