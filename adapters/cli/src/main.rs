#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays scripted input against a tile RPG map.
//!
//! The adapter loads a JSON map document, feeds touches, action presses and
//! ticks to the coordinator, and prints every scene request, world event and
//! chain report as a line of text. Animations are acknowledged after a
//! configurable number of ticks.

mod config;
mod presenter;
mod script;
mod session;

use std::{io, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tile_rpg_layout::JsonLayoutProvider;
use tile_rpg_world::World;

use crate::{
    config::EngineConfig,
    script::{read_script, ScriptStep},
    session::Session,
};

/// Command-line arguments for the tile RPG runner.
#[derive(Debug, Parser)]
#[command(name = "tile-rpg", version, about = "Plays scripted input against a tile RPG map")]
struct Args {
    /// Identifier of the map document to load.
    map: String,
    /// Directory containing `<map>.json` documents.
    #[arg(long, value_name = "DIR", default_value = "maps")]
    maps: PathBuf,
    /// TOML file with engine timing settings.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// File with one script step per line, run before the inline steps.
    #[arg(long, value_name = "FILE")]
    script: Option<PathBuf>,
    /// Script steps such as `touch:2,3`, `action` or `tick:5`.
    #[arg(value_name = "STEP")]
    steps: Vec<String>,
}

/// Entry point for the tile RPG command-line interface.
fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = EngineConfig::load(args.config.as_deref())?;
    let provider = JsonLayoutProvider::new(&args.maps);
    let world = World::load(&provider, &args.map)
        .with_context(|| format!("failed to load map `{}`", args.map))?;

    let mut steps = match &args.script {
        Some(path) => read_script(path)?,
        None => Vec::new(),
    };
    for step in &args.steps {
        steps.push(
            step.parse::<ScriptStep>()
                .with_context(|| format!("invalid step argument `{step}`"))?,
        );
    }

    info!("running {} script steps on map `{}`", steps.len(), args.map);
    let stdout = io::stdout();
    Session::new(world, config, stdout.lock()).run(&steps)
}
