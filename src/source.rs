// src/source.rs - Frame sources: synthetic stream and recorded replay
use std::fs;
use std::path::{Path, PathBuf};

use nalgebra::Vector3;

use crate::error::{HandSyncError, Result};
use crate::tracking::{FingerJoint, FingerType, Frame, Handedness, TrackedHand};

/// Hands out the latest tracked-hand frame. An empty frame means no hands
/// are in view; it is not an error.
///
/// Reading a frame never consumes it: every `current_frame` call between two
/// `advance` calls returns the same sample, so render and physics ticks of
/// one host step see the same instant.
pub trait FrameSource {
    fn current_frame(&self) -> Frame;

    /// Moves on to the next sample. Called by the host clock.
    fn advance(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn current_frame(&self) -> Frame {
        (**self).current_frame()
    }

    fn advance(&mut self) {
        (**self).advance()
    }
}

/// Deterministic synthetic hand stream. The left hand stays in view; the
/// right hand enters and leaves every `right_hand_period` frames and gets a
/// fresh id each time it comes back.
pub struct SimulatedFrameSource {
    sim_time: f64,
    dt: f64,
    frame_counter: i64,
    right_hand_period: i64,
    left_id: i32,
    right_id: Option<i32>,
    next_id: i32,
    palm_diameter_mm: f64,
}

impl SimulatedFrameSource {
    pub fn new(right_hand_period: u32) -> Self {
        let mut source = Self {
            sim_time: 0.0,
            dt: 1.0 / 60.0,
            frame_counter: 0,
            right_hand_period: i64::from(right_hand_period.max(1)),
            left_id: 1,
            right_id: None,
            next_id: 2,
            palm_diameter_mm: 85.0,
        };
        source.assign_right_id();
        source
    }

    pub fn with_timestep(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    pub fn with_palm_diameter(mut self, palm_diameter_mm: f64) -> Self {
        self.palm_diameter_mm = palm_diameter_mm;
        self
    }

    fn right_hand_visible(&self) -> bool {
        (self.frame_counter / self.right_hand_period) % 2 == 0
    }

    fn assign_right_id(&mut self) {
        if self.right_hand_visible() {
            if self.right_id.is_none() {
                self.right_id = Some(self.next_id);
                self.next_id += 1;
            }
        } else {
            self.right_id = None;
        }
    }

    fn synthesize_hand(&self, id: i32, handedness: Handedness) -> TrackedHand {
        let t = self.sim_time;
        let (side, phase) = match handedness {
            Handedness::Left => (-1.0, 0.0),
            Handedness::Right => (1.0, 1.5),
        };

        let palm = Vector3::new(
            side * 120.0 + 20.0 * (t * 0.5 + phase).cos(),
            200.0 + 30.0 * (t + phase).sin(),
            10.0 * (t * 0.3).sin(),
        );
        let width = self.palm_diameter_mm * (1.0 + 0.1 * (t * 0.7 + phase).sin());

        let mut hand = TrackedHand::new(id, handedness).with_palm_position(palm);
        for (f, finger) in FingerType::ALL.iter().enumerate() {
            // Thumb sits on the outside edge, pinky on the inside
            let across = side * (-width / 2.0 + f as f64 * width / 4.0);
            for (j, joint) in FingerJoint::ALL.iter().enumerate() {
                let position = palm + Vector3::new(across, 0.0, -(j as f64) * 20.0);
                hand = hand.with_joint(*finger, *joint, position);
            }
        }
        hand
    }
}

impl Default for SimulatedFrameSource {
    fn default() -> Self {
        Self::new(120)
    }
}

impl FrameSource for SimulatedFrameSource {
    fn current_frame(&self) -> Frame {
        let mut hands = vec![self.synthesize_hand(self.left_id, Handedness::Left)];
        if let Some(id) = self.right_id {
            hands.push(self.synthesize_hand(id, Handedness::Right));
        }
        Frame::new(self.frame_counter, self.sim_time, hands)
    }

    fn advance(&mut self) {
        self.frame_counter += 1;
        self.sim_time += self.dt;
        self.assign_right_id();
    }
}

/// Replays frames loaded from a JSON array. Once past the end it keeps
/// returning empty frames so every hand eventually leaves the scene.
pub struct RecordedFrames {
    path: Option<PathBuf>,
    frames: Vec<Frame>,
    cursor: usize,
}

impl RecordedFrames {
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self {
            path: None,
            frames,
            cursor: 0,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let contents = fs::read_to_string(&path).map_err(|source| HandSyncError::Io {
            path: path.clone(),
            source,
        })?;
        let frames: Vec<Frame> =
            serde_json::from_str(&contents).map_err(|source| HandSyncError::Parse {
                path: path.clone(),
                source,
            })?;

        tracing::debug!("loaded {} recorded frames from {}", frames.len(), path.display());
        let mut recording = Self::from_frames(frames);
        recording.path = Some(path);
        Ok(recording)
    }

    pub fn save(path: impl AsRef<Path>, frames: &[Frame]) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(frames).map_err(|source| HandSyncError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| HandSyncError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn total_frames(&self) -> usize {
        self.frames.len()
    }

    /// Recorded frames not yet played, counting the current one.
    pub fn remaining(&self) -> usize {
        self.frames.len().saturating_sub(self.cursor)
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.frames.len()
    }
}

impl FrameSource for RecordedFrames {
    fn current_frame(&self) -> Frame {
        if let Some(frame) = self.frames.get(self.cursor) {
            return frame.clone();
        }
        let (last_id, last_timestamp) = self
            .frames
            .last()
            .map_or((-1, 0.0), |frame| (frame.id, frame.timestamp));
        let past_end = (self.cursor - self.frames.len()) as i64;
        Frame::empty(last_id + 1 + past_end, last_timestamp)
    }

    fn advance(&mut self) {
        self.cursor = self.cursor.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn simulated_left_hand_keeps_its_id() {
        let mut source = SimulatedFrameSource::new(3);
        for _ in 0..10 {
            let frame = source.current_frame();
            let left: Vec<_> = frame.hands().iter().filter(|h| h.is_left()).collect();
            assert_eq!(left.len(), 1);
            assert_eq!(left[0].id, 1);
            source.advance();
        }
    }

    #[test]
    fn simulated_right_hand_gets_new_id_on_reentry() {
        let mut source = SimulatedFrameSource::new(2);
        let mut right_ids = Vec::new();
        for _ in 0..8 {
            let frame = source.current_frame();
            right_ids.push(frame.hands().iter().find(|h| h.is_right()).map(|h| h.id));
            source.advance();
        }
        assert_eq!(
            right_ids,
            vec![Some(2), Some(2), None, None, Some(3), Some(3), None, None]
        );
    }

    #[test]
    fn simulated_frame_holds_until_advanced() {
        let mut source = SimulatedFrameSource::new(1).with_timestep(0.5);
        let first = source.current_frame();
        assert_eq!(source.current_frame(), first);
        assert_eq!(source.current_frame(), first);

        source.advance();
        let second = source.current_frame();
        assert_eq!(second.id, 1);
        assert_eq!(second.timestamp, 0.5);
        assert_eq!(second.hands().len(), 1);

        source.advance();
        assert_eq!(source.current_frame().timestamp, 1.0);
    }

    #[test]
    fn simulated_palm_width_tracks_reference() {
        let mut source = SimulatedFrameSource::new(10).with_palm_diameter(85.0);
        for _ in 0..50 {
            for hand in source.current_frame().hands() {
                let d = hand.palm_diameter();
                assert!(d > 85.0 * 0.89 && d < 85.0 * 1.11, "palm diameter {}", d);
            }
            source.advance();
        }
    }

    #[test]
    fn recorded_frames_replay_then_go_empty() {
        let frames = vec![
            Frame::new(10, 0.5, vec![TrackedHand::new(1, Handedness::Left)]),
            Frame::new(11, 0.6, vec![TrackedHand::new(1, Handedness::Left)]),
        ];
        let mut source = RecordedFrames::from_frames(frames);
        assert_eq!(source.total_frames(), 2);
        assert_eq!(source.remaining(), 2);
        assert_eq!(source.current_frame().id, 10);
        assert_eq!(source.current_frame().id, 10);

        source.advance();
        assert_eq!(source.current_frame().id, 11);
        assert_eq!(source.remaining(), 1);
        assert!(!source.is_finished());

        source.advance();
        assert!(source.is_finished());
        assert_eq!(source.remaining(), 0);
        let tail = source.current_frame();
        assert!(tail.is_empty());
        assert_eq!(tail.id, 12);
        assert_eq!(tail.timestamp, 0.6);
        assert_eq!(source.current_frame(), tail);

        source.advance();
        assert_eq!(source.current_frame().id, 13);
    }

    #[test]
    fn recorded_frames_load_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frames.json");
        let frames = vec![Frame::new(
            0,
            0.0,
            vec![TrackedHand::new(5, Handedness::Right).with_joint(
                FingerType::Pinky,
                FingerJoint::Mcp,
                Vector3::new(85.0, 0.0, 0.0),
            )],
        )];
        RecordedFrames::save(&path, &frames).unwrap();

        let source = RecordedFrames::load(&path).unwrap();
        assert_eq!(source.path(), Some(path.as_path()));
        assert_eq!(source.current_frame(), frames[0]);
    }

    #[test]
    fn recorded_frames_report_bad_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(RecordedFrames::load(&path), Err(HandSyncError::Parse { .. })));
        assert!(matches!(
            RecordedFrames::load(dir.path().join("missing.json")),
            Err(HandSyncError::Io { .. })
        ));
    }
}
