//! Splat Studio - splat scene viewer driven by a scripted chat assistant.
//!
//! Scenes are picked by keyword routing or from the gallery and shown through a
//! render backend. Loading a second scene restarts the process; the queued scene
//! and the conversation survive the restart through a per-session state file.

mod app;
mod assets;
mod config;
mod continuity;
mod conversation;
mod render;
mod scene;
mod session;
mod studio;
mod ui;
mod viewport;

use anyhow::Context;
use clap::Parser;
use config::{Args, StudioConfig, SESSION_ENV};
use scene::{serialization::load_catalog_from_file, SceneCatalog};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let config = StudioConfig::load(&args)?;
    let catalog = match &config.catalog {
        Some(path) => load_catalog_from_file(path)
            .with_context(|| format!("failed to load catalog {}", path.display()))?,
        None => SceneCatalog::builtin().context("built-in catalog is invalid")?,
    };
    let session_id =
        config::resolve_session_id(args.session.as_deref(), std::env::var(SESSION_ENV).ok())?;

    log::info!("🚀 Splat Studio ({} scenes)", catalog.scenes().len());
    log::info!("   Type /help for commands, /quit or ESC to exit");

    let exit = app::run(app::Launch {
        config,
        catalog,
        session_id: session_id.clone(),
        headless: args.headless,
    })?;

    if exit == app::Exit::Restart {
        app::relaunch(&session_id)
            .with_context(|| format!("failed to relaunch session '{}'", session_id))?;
    }

    log::info!("👋 Goodbye!");
    Ok(())
}
