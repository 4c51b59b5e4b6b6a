mod action;
mod cli;
mod dialogue;
mod menu;
mod session;

use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;

use action::ActionDispatcher;
use dialogue::EngineConfig;
use menu::Registry;
use session::SessionData;

fn load_registry(path: &str) -> Result<Registry> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    Registry::from_json(&raw).with_context(|| format!("invalid question tree in {path}"))
}

fn main() -> Result<()> {
    // Initialize logging. Control verbosity with RUST_LOG env var:
    //   RUST_LOG=info   careline session.json   # transitions + host commands
    //   RUST_LOG=debug  careline session.json   # + dispatch details and patches
    //   RUST_LOG=trace  careline session.json   # + every rendered bot message
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.get(1).is_some_and(|a| a == "-h" || a == "--help") {
        println!(
            "Usage: careline [session.json|-] [questions.json|-] [typing_delay_ms]\n\
             \n\
             Example:\n  careline demos/session.json - 300\n\
             \n\
             Use '-' to keep the default for a positional argument.\n\
             Logging: set RUST_LOG=debug or RUST_LOG=trace for verbose output"
        );
        return Ok(());
    }

    let session_path = args.get(1).filter(|a| a.as_str() != "-");
    let registry_path = args.get(2).filter(|a| a.as_str() != "-");

    let session = match session_path {
        Some(path) => SessionData::load(path)?,
        None => SessionData::default(),
    };
    let registry = match registry_path {
        Some(path) => load_registry(path)?,
        None => menu::hospital::patient_assistant().context("built-in question tree is invalid")?,
    };

    let defaults = EngineConfig::default();
    let config = EngineConfig {
        typing_delay: args
            .get(3)
            .and_then(|s| s.parse().ok())
            .map_or(defaults.typing_delay, Duration::from_millis),
        ..defaults
    };

    println!("Session  : {}", session_path.map_or("(empty)", |s| s.as_str()));
    println!("Questions: {}", registry_path.map_or("(built-in)", |s| s.as_str()));
    println!("Typing   : {} ms", config.typing_delay.as_millis());

    info!(
        "Loaded {} questions ({} reachable), {} appointments, {} bills",
        registry.len(),
        registry.reachable().len(),
        session.appointments.len(),
        session.bills.len()
    );

    let dispatcher = ActionDispatcher::patient_assistant();

    cli::run(&registry, &dispatcher, session_path.map(String::as_str), session, config)
}
