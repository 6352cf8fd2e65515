//! Screen-reading match assistant for Street Fighter 6.
//!
//! Samples fixed screen regions once a second, classifies what they show
//! against reference templates, and answers with audio cues: who the
//! opponent is on the versus screen, when someone's health turns critical,
//! and where the cursor sits in the training menu. Built for blind players;
//! every state change that matters is spoken, nothing is drawn.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::models::settings::AppSettings;
use crate::services::assets::{self, AssetLibrary};
use crate::services::audio::Speaker;
use crate::services::monitor::Monitor;
use crate::services::screen_capture::ScreenGrabber;
use crate::services::training_menu::MenuNavigator;
use crate::services::vs_screen::VsScreenResolver;
use crate::services::wizard;

pub fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let resource_root = assets::resource_root()?;
    let settings = AppSettings::load(&resource_root.join(config::SETTINGS_FILE));
    let library = AssetLibrary::load_from(&resource_root)?;

    let grabber = match settings.monitor_index {
        Some(index) => ScreenGrabber::with_monitor(index)?,
        None => ScreenGrabber::new()?,
    };
    let speaker = Speaker::new(library.media_root.clone())?;

    let recalibrate = Arc::new(AtomicBool::new(false));
    spawn_command_listener(Arc::clone(&recalibrate));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build the async runtime")?;

    runtime.block_on(async {
        let player_name_path = library.player_name_path();
        let player_name = match library.player_name {
            Some(template) => template,
            None => {
                info!("no stored player name, running the capture wizard");
                wizard::capture_player_name(
                    &grabber,
                    &library.controls,
                    &speaker,
                    &player_name_path,
                )
                .await?
            }
        };

        let resolver = VsScreenResolver::new(
            library.controls,
            library.ranks,
            library.divisions,
            library.mr_brackets,
            library.characters,
            player_name,
        );
        let navigator = if settings.enable_training_menu {
            library.menu.map(|bundle| {
                MenuNavigator::new(
                    bundle.layout,
                    bundle.menu_reference,
                    bundle.submenu_reference,
                    bundle.option_images,
                )
            })
        } else {
            None
        };

        let mut monitor = Monitor::new(
            Box::new(grabber),
            Box::new(speaker),
            resolver,
            navigator,
            settings,
            recalibrate,
            player_name_path,
        );
        tokio::select! {
            _ = monitor.run() => {}
            _ = tokio::signal::ctrl_c() => info!("shutting down"),
        }
        Ok::<(), anyhow::Error>(())
    })?;
    Ok(())
}

/// Listens for commands on stdin from a plain thread. "recapture" queues a
/// rebuild of the player name template for the next monitoring pass.
fn spawn_command_listener(recalibrate: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "recapture" => {
                    info!("recapture command received");
                    recalibrate.store(true, Ordering::Relaxed);
                }
                "" => {}
                other => warn!(command = other, "unknown command"),
            }
        }
    });
}
