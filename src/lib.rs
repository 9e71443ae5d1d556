//! Keeps a host scene's hand-model actors in sync with a hand-tracking
//! stream.
//!
//! Each render or physics tick reads the current [`Frame`] of a
//! [`FrameSource`] and runs [`reconcile`] against one [`ActorMapping`]: new
//! hand ids get an actor from the matching [`HandTemplates`] entry, tracked
//! hands are rebound and rescaled by palm width, and ids that left the frame
//! are destroyed.

pub mod config;
pub mod controller;
pub mod data;
pub mod error;
pub mod headless;
pub mod scene;
pub mod source;
pub mod tracking;

pub use controller::{
    reconcile, resolve_templates, ActorMapping, HandController, HandTemplates, ReconcileSummary,
    TemplateLibrary, TickKind, TickReport, MODEL_PALM_DIAMETER,
};
pub use error::{HandSyncError, Result};
pub use scene::{ActorFactory, CollisionWorld, HandActor, Transform};
pub use source::{FrameSource, RecordedFrames, SimulatedFrameSource};
pub use tracking::{FingerJoint, FingerType, Frame, Handedness, TrackedHand};
