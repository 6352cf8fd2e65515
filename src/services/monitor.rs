//! The top-level monitoring loop tying the detectors together.
//!
//! One pass per second: handle a pending recapture request, run the health
//! checks, look for the versus screen, then check the training menu. A mode
//! flag keeps the passes from stepping on each other; health and versus
//! checks stop while the training menu is open, and menu checks stop during
//! a match.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{CHECK_INTERVAL, COOLDOWN_PERIOD, HEALTH_ALERT_CUE};
use crate::models::settings::AppSettings;
use crate::services::audio::CueSink;
use crate::services::health_tracker::{self, HealthEvent, HealthTracker};
use crate::services::screen_capture::FrameSource;
use crate::services::training_menu::{MenuEvent, MenuNavigator};
use crate::services::vs_screen::{VsOutcome, VsScreenResolver};
use crate::services::wizard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    /// A versus screen or a running match has the screen.
    VsScreen,
    TrainingMenu,
}

pub struct Monitor {
    frames: Box<dyn FrameSource>,
    speaker: Box<dyn CueSink>,
    resolver: VsScreenResolver,
    health: HealthTracker,
    navigator: Option<MenuNavigator>,
    settings: AppSettings,
    mode: Mode,
    /// When the last opponent announcement finished; None until the first.
    last_announcement: Option<Instant>,
    /// Set by the command listener when the player asks for a recapture.
    recalibrate: Arc<AtomicBool>,
    player_name_path: PathBuf,
}

impl Monitor {
    pub fn new(
        frames: Box<dyn FrameSource>,
        speaker: Box<dyn CueSink>,
        resolver: VsScreenResolver,
        navigator: Option<MenuNavigator>,
        settings: AppSettings,
        recalibrate: Arc<AtomicBool>,
        player_name_path: PathBuf,
    ) -> Self {
        Self {
            frames,
            speaker,
            resolver,
            health: HealthTracker::new(),
            navigator,
            settings,
            mode: Mode::Idle,
            last_announcement: None,
            recalibrate,
            player_name_path,
        }
    }

    pub async fn run(&mut self) {
        info!(
            health = self.settings.enable_health_monitoring,
            menu = self.navigator.is_some(),
            "monitoring started"
        );
        loop {
            self.tick().await;
            sleep(CHECK_INTERVAL).await;
        }
    }

    async fn tick(&mut self) {
        let now = Instant::now();

        if self.recalibrate.swap(false, Ordering::Relaxed) {
            info!("name recapture requested");
            match wizard::capture_player_name(
                self.frames.as_ref(),
                self.resolver.controls(),
                self.speaker.as_ref(),
                &self.player_name_path,
            )
            .await
            {
                Ok(template) => self.resolver.set_player_name(template),
                Err(e) => warn!(error = %e, "recapture failed, keeping the old template"),
            }
        }

        if self.settings.enable_health_monitoring
            && matches!(self.mode, Mode::Idle | Mode::VsScreen)
        {
            self.health_pass(now).await;
        }

        if matches!(self.mode, Mode::Idle | Mode::VsScreen) {
            self.vs_pass(now).await;
        }

        if matches!(self.mode, Mode::Idle | Mode::TrainingMenu) {
            self.menu_pass().await;
        }
    }

    async fn health_pass(&mut self, now: Instant) {
        if self.health.match_check_due(now) {
            match health_tracker::sample_match_start(self.frames.as_ref()) {
                Ok(color) => {
                    if let Some(HealthEvent::MatchStarted) =
                        self.health.observe_match_check(now, color)
                    {
                        info!("match started");
                        self.mode = Mode::VsScreen;
                    }
                }
                Err(e) => warn!(error = %e, "match start probe failed"),
            }
        }

        if self.health.health_check_due(now) {
            match health_tracker::sample_health_reading(self.frames.as_ref()).await {
                Ok(reading) => {
                    for event in self.health.observe_health(now, reading) {
                        match event {
                            HealthEvent::CriticalHealth(side) => {
                                info!(side = side.label(), "critical health");
                                self.speaker.play_panned(HEALTH_ALERT_CUE, side);
                            }
                            HealthEvent::AlertRearmed(side) => {
                                debug!(side = side.label(), "health alert rearmed");
                            }
                            HealthEvent::EndPending => debug!("both bars gone, confirming end"),
                            HealthEvent::EndAborted => debug!("bars back, end aborted"),
                            HealthEvent::MatchEnded => {
                                info!("match ended");
                                self.mode = Mode::Idle;
                            }
                            HealthEvent::MatchStarted => {}
                        }
                    }
                }
                Err(e) => warn!(error = %e, "health read failed"),
            }
        }
    }

    async fn vs_pass(&mut self, now: Instant) {
        let in_cooldown = self
            .last_announcement
            .map_or(false, |last| now.duration_since(last) < COOLDOWN_PERIOD);
        match self.resolver.resolve(self.frames.as_ref(), in_cooldown).await {
            VsOutcome::NotShowing => {
                if self.mode == Mode::VsScreen {
                    debug!("versus screen gone, back to idle");
                    self.mode = Mode::Idle;
                }
            }
            VsOutcome::CoolingDown | VsOutcome::Abandoned => {
                self.mode = Mode::VsScreen;
            }
            VsOutcome::Resolved(announcement) => {
                self.mode = Mode::VsScreen;
                let cues = announcement.cues();
                info!(
                    opponent = announcement.opponent.label(),
                    cues = ?cues,
                    "announcing opponent"
                );
                self.speaker.play_sequence(&cues);
                // The cooldown starts when the announcement finishes.
                self.last_announcement = Some(Instant::now());
                self.health.reset();
            }
        }
    }

    async fn menu_pass(&mut self) {
        let Some(navigator) = self.navigator.as_mut() else {
            return;
        };
        match navigator.tick(self.frames.as_ref()).await {
            Ok(tick) => {
                for event in &tick.events {
                    match event {
                        MenuEvent::TabChanged { cue, .. }
                        | MenuEvent::SubTabAnnounced { cue, .. }
                        | MenuEvent::SubTabChanged { cue, .. }
                        | MenuEvent::ItemLocked { cue, .. }
                        | MenuEvent::OptionChanged { cue } => self.speaker.play(cue, true),
                        MenuEvent::Opened
                        | MenuEvent::Closed
                        | MenuEvent::SubmenuEntered
                        | MenuEvent::SubmenuLeft
                        | MenuEvent::ItemReleased { .. } => {}
                    }
                }
                if tick.open {
                    self.mode = Mode::TrainingMenu;
                } else if self.mode == Mode::TrainingMenu {
                    self.mode = Mode::Idle;
                }
            }
            Err(e) => warn!(error = %e, "menu check failed"),
        }
    }
}
