// src/tracking.rs - Tracked hand geometry and per-instant frames
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{HandSyncError, Result};

/// Number of points in the wrist + 4-per-finger hand landmark layout.
pub const HAND_LANDMARK_COUNT: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FingerType {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl FingerType {
    pub const ALL: [FingerType; 5] = [
        FingerType::Thumb,
        FingerType::Index,
        FingerType::Middle,
        FingerType::Ring,
        FingerType::Pinky,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Joints along a finger, from the knuckle outwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FingerJoint {
    Mcp,
    Pip,
    Dip,
    Tip,
}

impl FingerJoint {
    pub const ALL: [FingerJoint; 4] = [
        FingerJoint::Mcp,
        FingerJoint::Pip,
        FingerJoint::Dip,
        FingerJoint::Tip,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// One observation of a physical hand. Positions are in millimetres in the
/// tracking device's coordinate frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedHand {
    pub id: i32,
    pub handedness: Handedness,
    pub palm_position: Vector3<f64>,
    /// `joints[finger][joint]`, indexed by `FingerType` then `FingerJoint`.
    pub joints: [[Vector3<f64>; 4]; 5],
}

impl TrackedHand {
    pub fn new(id: i32, handedness: Handedness) -> Self {
        Self {
            id,
            handedness,
            palm_position: Vector3::zeros(),
            joints: [[Vector3::zeros(); 4]; 5],
        }
    }

    /// Builds a hand from the 21-point landmark layout: wrist at 0, then four
    /// points per finger starting with the thumb. The thumb's first point is
    /// its carpometacarpal base, which stands in for the MCP joint the way a
    /// zero-length thumb metacarpal does.
    pub fn from_landmarks(
        id: i32,
        handedness: Handedness,
        landmarks: &[Vector3<f64>],
    ) -> Result<Self> {
        if landmarks.len() < HAND_LANDMARK_COUNT {
            return Err(HandSyncError::Landmarks {
                id,
                found: landmarks.len(),
                expected: HAND_LANDMARK_COUNT,
            });
        }

        let mut hand = Self::new(id, handedness);
        for finger in FingerType::ALL {
            let base = 1 + finger.index() * 4;
            for joint in FingerJoint::ALL {
                hand.joints[finger.index()][joint.index()] = landmarks[base + joint.index()];
            }
        }

        // Palm centre from the four non-thumb knuckles
        const INDEX_MCP: usize = 5;
        const MIDDLE_MCP: usize = 9;
        const RING_MCP: usize = 13;
        const PINKY_MCP: usize = 17;
        hand.palm_position = (landmarks[INDEX_MCP]
            + landmarks[MIDDLE_MCP]
            + landmarks[RING_MCP]
            + landmarks[PINKY_MCP])
            / 4.0;

        Ok(hand)
    }

    pub fn with_joint(
        mut self,
        finger: FingerType,
        joint: FingerJoint,
        position: Vector3<f64>,
    ) -> Self {
        self.joints[finger.index()][joint.index()] = position;
        self
    }

    pub fn with_palm_position(mut self, position: Vector3<f64>) -> Self {
        self.palm_position = position;
        self
    }

    pub fn joint_position(&self, finger: FingerType, joint: FingerJoint) -> Vector3<f64> {
        self.joints[finger.index()][joint.index()]
    }

    pub fn is_left(&self) -> bool {
        self.handedness == Handedness::Left
    }

    pub fn is_right(&self) -> bool {
        self.handedness == Handedness::Right
    }

    /// Distance from thumb base to pinky base, in millimetres.
    pub fn palm_diameter(&self) -> f64 {
        let thumb_base = self.joint_position(FingerType::Thumb, FingerJoint::Mcp);
        let pinky_base = self.joint_position(FingerType::Pinky, FingerJoint::Mcp);
        (thumb_base - pinky_base).norm()
    }
}

/// All hands observed at one instant, in device order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub id: i64,
    pub timestamp: f64,
    #[serde(default)]
    pub hands: Vec<TrackedHand>,
}

impl Frame {
    pub fn new(id: i64, timestamp: f64, hands: Vec<TrackedHand>) -> Self {
        Self { id, timestamp, hands }
    }

    pub fn empty(id: i64, timestamp: f64) -> Self {
        Self::new(id, timestamp, Vec::new())
    }

    pub fn hands(&self) -> &[TrackedHand] {
        &self.hands
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }

    pub fn hand(&self, id: i32) -> Option<&TrackedHand> {
        self.hands.iter().find(|h| h.id == id)
    }
}
