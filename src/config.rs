// src/config.rs - Controller settings, loadable from JSON
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HandSyncError, Result};
use crate::scene::Transform;

/// Template names for the four hand models. Unset disables that side for
/// that actor set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub graphics_left: Option<String>,
    pub graphics_right: Option<String>,
    pub physics_left: Option<String>,
    pub physics_right: Option<String>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            graphics_left: Some("graphics_left".to_string()),
            graphics_right: Some("graphics_right".to_string()),
            physics_left: Some("physics_left".to_string()),
            physics_right: Some("physics_right".to_string()),
        }
    }
}

/// Pose of the controller node; hands are placed relative to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootConfig {
    pub position: [f64; 3],
    /// Roll, pitch, yaw in radians.
    pub rotation: [f64; 3],
    pub scale: [f64; 3],
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0],
            scale: [1.0, 1.0, 1.0],
        }
    }
}

impl RootConfig {
    pub fn transform(&self) -> Transform {
        Transform::from_euler(self.position, self.rotation, self.scale)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Render ticks to run.
    pub ticks: u32,
    pub physics_steps_per_tick: u32,
    /// Frames the simulated right hand stays in (and out of) view.
    pub right_hand_period: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ticks: 600,
            physics_steps_per_tick: 2,
            right_hand_period: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub templates: TemplateConfig,
    pub root: RootConfig,
    pub simulation: SimulationConfig,
    pub output_directory: PathBuf,
    pub export_csv: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            templates: TemplateConfig::default(),
            root: RootConfig::default(),
            simulation: SimulationConfig::default(),
            output_directory: directories::UserDirs::new()
                .and_then(|dirs| dirs.document_dir().map(|p| p.join("HandSync")))
                .unwrap_or_else(|| PathBuf::from("./output")),
            export_csv: false,
        }
    }
}

impl ControllerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| HandSyncError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&contents).map_err(|source| HandSyncError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("loaded controller config from {}", path.display());
        Ok(config)
    }
}
