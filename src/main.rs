// src/main.rs
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use hand_sync::config::ControllerConfig;
use hand_sync::controller::resolve_templates;
use hand_sync::data::SessionRecorder;
use hand_sync::headless::HeadlessScene;
use hand_sync::{FrameSource, HandController, RecordedFrames, SimulatedFrameSource};

/// Drive the hand controller against a headless scene.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON controller configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render ticks to run (overrides the config)
    #[arg(short, long)]
    ticks: Option<u32>,

    /// Replay frames from a JSON recording instead of the simulated stream
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// Write the per-tick log as CSV
    #[arg(short, long)]
    export: bool,

    /// Output directory for the CSV log (overrides the config)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ControllerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ControllerConfig::default(),
    };
    if let Some(ticks) = args.ticks {
        config.simulation.ticks = ticks;
    }
    if let Some(output) = args.output {
        config.output_directory = output;
    }
    config.export_csv |= args.export;

    let source: Box<dyn FrameSource> = match &args.replay {
        Some(path) => {
            let recording = RecordedFrames::load(path)
                .with_context(|| format!("loading recording {}", path.display()))?;
            tracing::info!("replaying {} frames from {}", recording.total_frames(), path.display());
            Box::new(recording)
        }
        None => Box::new(SimulatedFrameSource::new(config.simulation.right_hand_period)),
    };

    let scene = build_scene();
    let (graphics, physics) =
        resolve_templates(&scene, &config.templates).context("resolving hand model templates")?;
    let mut controller = HandController::new(source, scene, config.root.transform())
        .with_graphics_templates(graphics)
        .with_physics_templates(physics);

    let mut recorder = SessionRecorder::new(&config.output_directory, None);
    for _ in 0..config.simulation.ticks {
        for _ in 0..config.simulation.physics_steps_per_tick {
            let report = controller.fixed_update().context("physics tick failed")?;
            recorder.record(&report);
        }
        let report = controller.update().context("render tick failed")?;
        if !report.summary.is_quiet() {
            tracing::info!(
                "frame {}: created {:?}, destroyed {:?}",
                report.frame_id,
                report.summary.created,
                report.summary.destroyed
            );
        }
        recorder.record(&report);

        // physics and render ticks above all saw the same frame
        controller.advance();
    }

    let totals = recorder.totals();
    let stats = controller.factory().stats();
    tracing::info!(
        "{} render ticks, {} physics ticks: {} actors created, {} destroyed, peak {} live",
        totals.graphics_ticks,
        totals.physics_ticks,
        totals.created,
        totals.destroyed,
        totals.peak_live_actors
    );
    tracing::info!(
        "scene: {} instantiated, {} destroyed, {} collider pairs masked",
        stats.instantiated,
        stats.destroyed,
        stats.ignored_pairs
    );

    if config.export_csv {
        let path = recorder.export_csv()?;
        println!("Session log written to {}", path.display());
    }

    controller.clear();
    Ok(())
}

/// Headless scene with a static floor and walls plus one dynamic prop.
fn build_scene() -> HeadlessScene {
    let mut scene = HeadlessScene::new().with_default_templates();
    let root = scene.scenery_root();
    for name in ["floor", "wall_left", "wall_right"] {
        let node = scene.add_node(root, name);
        scene.add_collider(node, false);
    }
    let prop = scene.add_node(root, "ball");
    scene.add_collider(prop, true);
    scene
}
