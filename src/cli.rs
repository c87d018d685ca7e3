use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::bus::EventBus;
use crate::clock::ManualClock;
use crate::config::{load_json, BehaviorConfig, StateMapConfig, VisualsConfig};
use crate::geometry::{FsShaderLoader, GeometryRegistry};
use crate::gl::headless::HeadlessCanvas;
use crate::interaction::{DomEvent, ElementSpec, InteractionCoordinator, SceneGraph, CARD_CLASS};
use crate::navigation::{HomeMaster, NavigationAction};
use crate::pool::{PoolOptions, VisualizerPool};
use crate::value::UniformValue;

/// Id of the full-page visualizer that follows the section's background geometry.
const BACKGROUND_ID: &str = "background";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ConfigPaths {
    /// Geometry and parameter definitions
    #[arg(long, default_value = "static/config/visuals.json")]
    visuals: PathBuf,

    /// Interaction blueprints
    #[arg(long, default_value = "static/config/behavior.json")]
    behavior: PathBuf,

    /// Section state map
    #[arg(long, default_value = "static/config/states.json")]
    states: PathBuf,

    /// Directory that `shaderFile` paths are relative to
    #[arg(long, default_value = "static")]
    shader_root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate every configuration document
    Check {
        #[command(flatten)]
        paths: ConfigPaths,
    },
    /// Run a headless session and print the final state as JSON
    Simulate {
        #[command(flatten)]
        paths: ConfigPaths,

        /// Frames to run
        #[arg(long, default_value_t = 120)]
        frames: u32,

        /// Frames per second
        #[arg(long, default_value_t = 60.0)]
        fps: f64,

        /// Navigation action, e.g. "navigateTo('tech')". Repeatable.
        #[arg(long = "action")]
        actions: Vec<String>,

        /// Frames between consecutive actions
        #[arg(long, default_value_t = 30)]
        every: u32,

        /// DOM id of a card to hover on the first frame
        #[arg(long)]
        hover: Option<String>,
    },
    /// Build the wasm bundle into static/pkg and serve static/
    Serve {
        #[arg(long, default_value_t = 8000)]
        port: u16,

        /// Serve the existing bundle without running wasm-pack
        #[arg(long)]
        skip_build: bool,

        /// Expose the server through ngrok when it is installed
        #[arg(long)]
        tunnel: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { paths } => check(&paths),
        Commands::Simulate {
            paths,
            frames,
            fps,
            actions,
            every,
            hover,
        } => {
            let actions = actions
                .into_iter()
                .map(NavigationAction::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map_err(anyhow::Error::msg)?;
            let report = simulate(&paths, frames, fps, &actions, every.max(1), hover.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Serve { port, skip_build, tunnel } => serve(port, skip_build, tunnel),
    }
}

struct Loaded {
    visuals: VisualsConfig,
    behavior: BehaviorConfig,
    states: StateMapConfig,
}

fn load(paths: &ConfigPaths) -> Result<Loaded> {
    Ok(Loaded {
        visuals: load_json(&paths.visuals)?,
        behavior: load_json(&paths.behavior)?,
        states: load_json(&paths.states)?,
    })
}

fn check(paths: &ConfigPaths) -> Result<()> {
    let loaded = load(paths)?;
    let bus = EventBus::new();
    let clock = Rc::new(ManualClock::new(0.0));

    let registry = GeometryRegistry::initialize(&loaded.visuals, &FsShaderLoader::new(&paths.shader_root), &bus)?;
    println!("{} geometries", registry.len());
    for name in registry.geometry_names() {
        let missing = registry
            .get_shader(name)
            .map(|shader| shader.missing_contract_uniforms())
            .unwrap_or_default();
        if missing.is_empty() {
            println!("  {name}: ok");
        } else {
            println!("  {name}: missing {}", missing.join(", "));
        }
    }

    let coordinator = InteractionCoordinator::new(bus.clone(), clock.clone(), &loaded.behavior);
    let valid = coordinator.blueprint_names().count();
    println!(
        "{} of {} blueprints valid",
        valid,
        loaded.behavior.interaction_blueprints.len()
    );

    let master = HomeMaster::new(loaded.states, bus, clock)?;
    println!("{} states, order {:?}", master.states().len(), master.state_order());
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VisualizerReport {
    geometry: String,
    active: bool,
    parameters: BTreeMap<String, UniformValue>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulationReport {
    frames: u32,
    current_state: String,
    state_history: Vec<String>,
    theme: String,
    background_geometry: String,
    visualizers: BTreeMap<String, VisualizerReport>,
}

fn simulate(
    paths: &ConfigPaths,
    frames: u32,
    fps: f64,
    actions: &[NavigationAction],
    every: u32,
    hover: Option<&str>,
) -> Result<SimulationReport> {
    if fps <= 0.0 {
        bail!("fps must be positive");
    }
    let loaded = load(paths)?;
    let bus = EventBus::new();
    let clock = Rc::new(ManualClock::new(0.0));

    let registry = Rc::new(GeometryRegistry::initialize(
        &loaded.visuals,
        &FsShaderLoader::new(&paths.shader_root),
        &bus,
    )?);
    let geometries: Vec<String> = registry.geometry_names().into_iter().map(str::to_string).collect();
    if geometries.is_empty() {
        bail!("no geometries configured");
    }

    let options = PoolOptions {
        background_visualizer: Some(BACKGROUND_ID.to_string()),
        ..PoolOptions::default()
    };
    let mut pool = VisualizerPool::new(registry, bus.clone(), options);
    let mut graph = SceneGraph::new();

    let background_geometry = geometries
        .iter()
        .find(|name| *name == "hypercube")
        .unwrap_or(&geometries[0])
        .clone();
    pool.create_visualizer(HeadlessCanvas::new(BACKGROUND_ID, 1280, 720), &background_geometry, BTreeMap::new())?;

    // One card per id named in any state, each hosting a canvas.
    let cards: BTreeSet<&String> = loaded.states.states.values().flat_map(|s| &s.active_cards).collect();
    for (index, card) in cards.into_iter().enumerate() {
        let canvas_id = format!("{card}-canvas");
        let element = graph.add(graph.root(), ElementSpec::new().id(card.as_str()).class(CARD_CLASS));
        graph.add(element, ElementSpec::new().class("card-visualizer").visualizer(canvas_id.as_str()));
        let geometry = &geometries[index % geometries.len()];
        pool.create_visualizer(HeadlessCanvas::new(canvas_id, 320, 240), geometry, BTreeMap::new())?;
    }

    let mut coordinator = InteractionCoordinator::new(bus.clone(), clock.clone(), &loaded.behavior);
    coordinator.bind(&mut graph);
    let mut master = HomeMaster::new(loaded.states, bus, clock.clone())?;

    let frame_ms = 1000.0 / fps;
    pool.start(0.0);
    let mut pending_actions = actions.iter();
    for frame in 0..frames {
        let now = f64::from(frame) * frame_ms;
        clock.set(now);

        if frame == 0 {
            if let Some(card) = hover {
                let element = graph
                    .find_by_dom_id(card)
                    .with_context(|| format!("no card with id {card}"))?;
                coordinator.dispatch(&mut graph, element, DomEvent::MouseEnter);
            }
        }
        if frame > 0 && frame % every == 0 {
            if let Some(action) = pending_actions.next() {
                let accepted = master.execute(action);
                log::info!("Frame {}: {} -> {}", frame, action, accepted);
            }
        }

        master.poll();
        coordinator.poll(&mut graph);
        pool.tick(now);
    }

    let visualizers = pool
        .visualizer_ids()
        .filter_map(|id| pool.get_visualizer(id))
        .map(|v| {
            (
                v.id().to_string(),
                VisualizerReport {
                    geometry: v.geometry().to_string(),
                    active: v.is_active(),
                    parameters: v.parameters().clone(),
                },
            )
        })
        .collect();

    Ok(SimulationReport {
        frames,
        current_state: master.current_state().to_string(),
        state_history: master.state_history().into_iter().map(str::to_string).collect(),
        theme: master.current_theme().to_string(),
        background_geometry: master.background_geometry().to_string(),
        visualizers,
    })
}

fn serve(port: u16, skip_build: bool, tunnel: bool) -> Result<()> {
    if !skip_build {
        println!("Building WASM pkg …");
        match Command::new("wasm-pack")
            .args(["build", "--release", "--target", "web", "--out-dir", "static/pkg"])
            .status()
        {
            Ok(status) if status.success() => {}
            Ok(_) => bail!("wasm-pack finished with errors"),
            Err(_) => {
                eprintln!("wasm-pack not found in PATH. Skipping wasm build; the site may serve stale artifacts.")
            }
        }
    }

    let site = Path::new("static");
    if !site.is_dir() {
        bail!("static/ not found; run from the crate root");
    }

    println!("Launching local server at http://127.0.0.1:{port} …");
    let mut server = Command::new("python3")
        .args(["-m", "http.server", &port.to_string(), "--directory"])
        .arg(site)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("failed to start http server")?;

    if tunnel {
        match Command::new("ngrok")
            .args(["http", &port.to_string()])
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
        {
            Ok(_) => println!("ngrok tunnel starting …"),
            Err(_) => eprintln!("ngrok not found. Install it to expose the site over the internet."),
        }
    }

    let status = server.wait().context("http server did not run")?;
    if !status.success() {
        bail!("http server exited with {status}");
    }
    Ok(())
}
