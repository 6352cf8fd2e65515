//! Match lifecycle and critical health tracking.
//!
//! The tracker itself is a pure state machine: callers sample the screen,
//! classify the health bar patches, and feed readings in together with the
//! current time. Events come back out for the caller to log and voice.
//!
//! A match starts on a single red read of the left bar. During a match the
//! bars are sampled on a fast interval; a critical (yellow) reading must
//! survive the confirmation filter before it can fire the one-shot panned
//! alert, and the alert re-arms when the side's base color returns. The
//! match ends once both bars have stayed absent for the debounce window.

use std::time::Instant;

use tracing::debug;

use crate::config::{
    HEALTH_CHECK_INTERVAL, HEALTH_CONFIRMATION, HEALTH_REGIONS, MATCH_CHECK_INTERVAL,
    MATCH_END_CONFIRMATION_DELAY,
};
use crate::error::CaptureError;
use crate::models::labels::HealthColor;
use crate::models::region::Side;
use crate::services::classifier;
use crate::services::confirm::{self, Confirmation};
use crate::services::screen_capture::FrameSource;

/// Classified state of one health bar at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideReading {
    pub color: Option<HealthColor>,
    /// A yellow reading that survived the confirmation filter.
    pub critical_confirmed: bool,
}

impl SideReading {
    pub fn absent() -> Self {
        Self {
            color: None,
            critical_confirmed: false,
        }
    }

    pub fn of(color: HealthColor) -> Self {
        Self {
            color: Some(color),
            critical_confirmed: false,
        }
    }

    pub fn critical() -> Self {
        Self {
            color: Some(HealthColor::Yellow),
            critical_confirmed: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReading {
    pub left: SideReading,
    pub right: SideReading,
}

impl HealthReading {
    fn side(&self, side: Side) -> SideReading {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEvent {
    MatchStarted,
    /// Confirmed critical health on a side whose alert is armed.
    CriticalHealth(Side),
    /// The side's base color returned, so the next critical alerts again.
    AlertRearmed(Side),
    /// Both bars vanished; the end debounce window opened.
    EndPending,
    /// A bar came back before the debounce window closed.
    EndAborted,
    MatchEnded,
}

pub struct HealthTracker {
    active: bool,
    last_match_check: Option<Instant>,
    last_health_check: Option<Instant>,
    alert_played: [bool; 2],
    end_pending_since: Option<Instant>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            active: false,
            last_match_check: None,
            last_health_check: None,
            alert_played: [false; 2],
            end_pending_since: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Should the caller look for a match start this tick?
    pub fn match_check_due(&self, now: Instant) -> bool {
        if self.active {
            return false;
        }
        match self.last_match_check {
            Some(at) => now.duration_since(at) >= MATCH_CHECK_INTERVAL,
            None => true,
        }
    }

    /// Should the caller sample the health bars this tick?
    pub fn health_check_due(&self, now: Instant) -> bool {
        if !self.active {
            return false;
        }
        match self.last_health_check {
            Some(at) => now.duration_since(at) >= HEALTH_CHECK_INTERVAL,
            None => true,
        }
    }

    /// Feed a match-start probe of the left bar. A red read activates
    /// tracking immediately, with no confirmation pass.
    pub fn observe_match_check(
        &mut self,
        now: Instant,
        left_color: Option<HealthColor>,
    ) -> Option<HealthEvent> {
        self.last_match_check = Some(now);
        if !self.active && left_color == Some(HealthColor::Red) {
            self.active = true;
            self.last_health_check = Some(now);
            return Some(HealthEvent::MatchStarted);
        }
        None
    }

    /// Feed one health sample of both bars during an active match.
    pub fn observe_health(&mut self, now: Instant, reading: HealthReading) -> Vec<HealthEvent> {
        self.last_health_check = Some(now);
        let mut events = Vec::new();

        for side in Side::BOTH {
            let side_reading = reading.side(side);
            let armed = !self.alert_played[side.index()];
            if side_reading.critical_confirmed && armed {
                self.alert_played[side.index()] = true;
                events.push(HealthEvent::CriticalHealth(side));
            } else if side_reading.color == Some(HealthColor::base_for(side)) && !armed {
                self.alert_played[side.index()] = false;
                events.push(HealthEvent::AlertRearmed(side));
            }
        }

        // The left bar decides its own presence; the right bar counts as
        // present on its own base or critical color, and also whenever the
        // left bar reads yellow.
        let left_present = matches!(
            reading.left.color,
            Some(HealthColor::Red | HealthColor::Yellow)
        );
        let right_present = matches!(
            reading.right.color,
            Some(HealthColor::Blue | HealthColor::Yellow)
        ) || reading.left.color == Some(HealthColor::Yellow);

        if left_present || right_present {
            if self.end_pending_since.take().is_some() {
                events.push(HealthEvent::EndAborted);
            }
        } else if let Some(since) = self.end_pending_since {
            if now.duration_since(since) >= MATCH_END_CONFIRMATION_DELAY {
                self.active = false;
                self.alert_played = [false; 2];
                self.end_pending_since = None;
                events.push(HealthEvent::MatchEnded);
            }
        } else {
            self.end_pending_since = Some(now);
            events.push(HealthEvent::EndPending);
        }

        events
    }

    /// Drop back to the dormant state, e.g. after a versus announcement
    /// supersedes whatever match was being tracked.
    pub fn reset(&mut self) {
        self.active = false;
        self.alert_played = [false; 2];
        self.end_pending_since = None;
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Probe the left health bar for a match start.
pub fn sample_match_start(frames: &dyn FrameSource) -> Result<Option<HealthColor>, CaptureError> {
    let image = frames.capture(&HEALTH_REGIONS[Side::Left.index()])?;
    Ok(classifier::health_color(&image))
}

/// Sample both health bars, running the confirmation filter on any critical
/// reading before it is allowed to count.
pub async fn sample_health_reading(
    frames: &dyn FrameSource,
) -> Result<HealthReading, CaptureError> {
    let mut readings = [SideReading::absent(); 2];
    for side in Side::BOTH {
        let region = &HEALTH_REGIONS[side.index()];
        let image = frames.capture(region)?;
        let color = classifier::health_color(&image);
        let mut critical_confirmed = false;
        if color == Some(HealthColor::Yellow) {
            let confirmation =
                confirm::require_stable(HEALTH_CONFIRMATION, &Some(HealthColor::Yellow), || {
                    let image = frames.capture(region)?;
                    Ok(classifier::health_color(&image))
                })
                .await?;
            match confirmation {
                Confirmation::Confirmed => critical_confirmed = true,
                Confirmation::Disputed { attempt, observed } => {
                    debug!(
                        side = side.label(),
                        attempt,
                        observed = observed.map(|c| c.label()).unwrap_or("none"),
                        "critical reading did not hold"
                    );
                }
            }
        }
        readings[side.index()] = SideReading {
            color,
            critical_confirmed,
        };
    }
    Ok(HealthReading {
        left: readings[Side::Left.index()],
        right: readings[Side::Right.index()],
    })
}
