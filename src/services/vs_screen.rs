//! Versus screen detection and opponent announcement resolution.
//!
//! The loading screen before a ranked match shows both players' control
//! badges, fighter names, rank badges, and characters at fixed positions.
//! Detection starts from the left control badge, waits out the blink the
//! screen does while loading, then works out which side is the opponent by
//! comparing both name plates against the stored player name template. The
//! side that looks less like the player's own name is the opponent.

use image::GrayImage;
use tracing::{debug, info, warn};

use crate::config::{
    CHARACTERS_SUBDIR, CHARACTER_REGIONS, CONTROL_COLOR_REGIONS, CONTROL_IMAGE_FALLBACK_THRESHOLD,
    CONTROL_REGIONS, CONTROL_SIMILARITY_THRESHOLD, CUE_EXTENSION, DIVISION_REGIONS,
    MIN_CHARACTER_THRESHOLD, MIN_DIVISION_THRESHOLD, MIN_MR_THRESHOLD, MIN_RANK_THRESHOLD,
    MR_REGIONS, NAME_REGIONS, RANK_REGIONS, UNKNOWN_RANK_CUE, VS_SCREEN_WAIT_TIME,
};
use crate::error::CaptureError;
use crate::models::labels::{ControlScheme, Division, MrBracket, Rank};
use crate::models::region::Side;
use crate::services::classifier::{self, CompareMode, TemplateSet};
use crate::services::screen_capture::FrameSource;

/// What one pass over the versus screen concluded.
#[derive(Debug, PartialEq)]
pub enum VsOutcome {
    /// The left control badge is not on screen.
    NotShowing,
    /// The screen is showing but a recent announcement suppresses this one.
    CoolingDown,
    /// Resolution started but could not finish; nothing was announced.
    Abandoned,
    Resolved(Announcement),
}

/// Everything the versus announcement says, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub opponent: Side,
    pub control: ControlScheme,
    pub character: Option<String>,
    pub rank: RankCue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankCue {
    /// No rank template cleared the floor.
    Unknown,
    MasterRating(MrBracket),
    RankDivision(Rank, Division),
    RankOnly(Rank),
}

impl RankCue {
    fn cue_file(&self) -> String {
        match self {
            RankCue::Unknown => UNKNOWN_RANK_CUE.to_string(),
            RankCue::MasterRating(bracket) => format!("{}{CUE_EXTENSION}", bracket.label()),
            RankCue::RankDivision(rank, division) => {
                format!("{}{}{CUE_EXTENSION}", rank.label(), division.label())
            }
            RankCue::RankOnly(rank) => format!("{}{CUE_EXTENSION}", rank.label()),
        }
    }
}

impl Announcement {
    /// Cue files in speaking order: control scheme, character if identified,
    /// then rank.
    pub fn cues(&self) -> Vec<String> {
        let mut cues = vec![format!("{}{CUE_EXTENSION}", self.control.label())];
        if let Some(name) = &self.character {
            cues.push(format!("{CHARACTERS_SUBDIR}/{name}{CUE_EXTENSION}"));
        }
        cues.push(self.rank.cue_file());
        cues
    }
}

pub struct VsScreenResolver {
    controls: TemplateSet<ControlScheme>,
    ranks: TemplateSet<Rank>,
    divisions: TemplateSet<Division>,
    mr_brackets: TemplateSet<MrBracket>,
    /// Per-side character template sets; either may be empty.
    characters: [TemplateSet<String>; 2],
    /// Binarized capture of the player's own name plate.
    player_name: GrayImage,
}

impl VsScreenResolver {
    pub fn new(
        controls: TemplateSet<ControlScheme>,
        ranks: TemplateSet<Rank>,
        divisions: TemplateSet<Division>,
        mr_brackets: TemplateSet<MrBracket>,
        characters: [TemplateSet<String>; 2],
        player_name: GrayImage,
    ) -> Self {
        Self {
            controls,
            ranks,
            divisions,
            mr_brackets,
            characters,
            player_name,
        }
    }

    pub fn controls(&self) -> &TemplateSet<ControlScheme> {
        &self.controls
    }

    /// Swap in a freshly captured name template after recalibration.
    pub fn set_player_name(&mut self, template: GrayImage) {
        self.player_name = template;
    }

    /// Run one full detection pass. `in_cooldown` suppresses the resolution
    /// work while still reporting that the screen is up.
    pub async fn resolve(&self, frames: &dyn FrameSource, in_cooldown: bool) -> VsOutcome {
        let left_gate = match self.control_gate(frames, Side::Left) {
            Ok(score) => score,
            Err(e) => {
                warn!(error = %e, "left control capture failed");
                return VsOutcome::NotShowing;
            }
        };
        if left_gate < CONTROL_SIMILARITY_THRESHOLD {
            return VsOutcome::NotShowing;
        }
        let right_detected = match self.control_gate(frames, Side::Right) {
            Ok(score) => score >= CONTROL_SIMILARITY_THRESHOLD,
            Err(e) => {
                warn!(error = %e, "right control capture failed");
                false
            }
        };
        info!(left_score = left_gate, right_detected, "versus screen detected");
        if in_cooldown {
            info!("within announcement cooldown, skipping");
            return VsOutcome::CoolingDown;
        }

        // The screen blinks while loading; make sure it is really up.
        tokio::time::sleep(VS_SCREEN_WAIT_TIME).await;
        match self.control_gate(frames, Side::Left) {
            Ok(score) if score >= CONTROL_SIMILARITY_THRESHOLD => {}
            Ok(_) => {
                debug!("versus screen vanished during the blink wait");
                return VsOutcome::Abandoned;
            }
            Err(e) => {
                warn!(error = %e, "left control re-check failed");
                return VsOutcome::Abandoned;
            }
        }

        let left_control = self
            .detect_control(frames, Side::Left)
            .unwrap_or(ControlScheme::Classic);
        let right_control = if right_detected {
            self.detect_control(frames, Side::Right)
        } else {
            None
        };

        let left_name = match frames.capture(&NAME_REGIONS[Side::Left.index()]) {
            Ok(image) => image,
            Err(e) => {
                warn!(error = %e, "left name capture failed");
                return VsOutcome::Abandoned;
            }
        };
        let right_name = match frames.capture(&NAME_REGIONS[Side::Right.index()]) {
            Ok(image) => image,
            Err(e) => {
                warn!(error = %e, "right name capture failed");
                return VsOutcome::Abandoned;
            }
        };
        let left_score =
            classifier::name_similarity(&self.player_name, &classifier::to_gray(&left_name));
        let right_score =
            classifier::name_similarity(&self.player_name, &classifier::to_gray(&right_name));
        // The player's own plate scores higher, so the opponent is the other
        // side. Ties go to the left.
        let opponent = if left_score > right_score {
            Side::Right
        } else {
            Side::Left
        };
        info!(
            left_score,
            right_score,
            opponent = opponent.label(),
            "opponent side resolved by name similarity"
        );

        let control = match opponent {
            Side::Right => right_control.unwrap_or(left_control),
            Side::Left => left_control,
        };
        let character = self.detect_character(frames, opponent);
        let rank = match self.detect_rank(frames, opponent) {
            Ok(rank) => rank,
            Err(e) => {
                warn!(error = %e, "rank capture failed");
                return VsOutcome::Abandoned;
            }
        };

        VsOutcome::Resolved(Announcement {
            opponent,
            control,
            character,
            rank,
        })
    }

    /// Best control template similarity for a side's badge region.
    fn control_gate(&self, frames: &dyn FrameSource, side: Side) -> Result<f64, CaptureError> {
        let image = frames.capture(&CONTROL_REGIONS[side.index()])?;
        let probe = classifier::to_gray(&image);
        Ok(self
            .controls
            .best_match(&probe, CompareMode::Plain)
            .map(|(_, score)| score)
            .unwrap_or(0.0))
    }

    /// Identify a side's control scheme by badge color, falling back to
    /// image comparison when the color sample is inconclusive.
    fn detect_control(&self, frames: &dyn FrameSource, side: Side) -> Option<ControlScheme> {
        match frames.capture(&CONTROL_COLOR_REGIONS[side.index()]) {
            Ok(image) => {
                if let Some(scheme) = classifier::control_color(&image) {
                    debug!(
                        side = side.label(),
                        scheme = scheme.label(),
                        "control identified by color"
                    );
                    return Some(scheme);
                }
            }
            Err(e) => warn!(side = side.label(), error = %e, "control color capture failed"),
        }
        match frames.capture(&CONTROL_REGIONS[side.index()]) {
            Ok(image) => {
                let probe = classifier::to_gray(&image);
                match self.controls.best_match(&probe, CompareMode::Binarized) {
                    Some((&scheme, score)) if score >= CONTROL_IMAGE_FALLBACK_THRESHOLD => {
                        debug!(
                            side = side.label(),
                            scheme = scheme.label(),
                            score,
                            "control identified by image"
                        );
                        Some(scheme)
                    }
                    _ => None,
                }
            }
            Err(e) => {
                warn!(side = side.label(), error = %e, "control badge capture failed");
                None
            }
        }
    }

    fn detect_character(&self, frames: &dyn FrameSource, side: Side) -> Option<String> {
        let set = &self.characters[side.index()];
        if set.is_empty() {
            return None;
        }
        match frames.capture(&CHARACTER_REGIONS[side.index()]) {
            Ok(image) => {
                let probe = classifier::to_gray(&image);
                match set.best_match(&probe, CompareMode::Plain) {
                    Some((name, score)) if score >= MIN_CHARACTER_THRESHOLD => {
                        info!(character = name.as_str(), score, "opponent character identified");
                        Some(name.clone())
                    }
                    Some((name, score)) => {
                        debug!(best = name.as_str(), score, "character below floor, skipping cue");
                        None
                    }
                    None => None,
                }
            }
            Err(e) => {
                warn!(error = %e, "character capture failed");
                None
            }
        }
    }

    /// Rank resolution with the Master Rating and division refinements.
    /// Only the main badge capture can abandon the pass; refinement capture
    /// problems degrade to the base rank.
    fn detect_rank(&self, frames: &dyn FrameSource, side: Side) -> Result<RankCue, CaptureError> {
        let image = frames.capture(&RANK_REGIONS[side.index()])?;
        let probe = classifier::to_gray(&image);
        let Some((&rank, score)) = self.ranks.best_match(&probe, CompareMode::Binarized) else {
            return Ok(RankCue::Unknown);
        };
        if score < MIN_RANK_THRESHOLD {
            info!(best = rank.label(), score, "rank below floor, announcing unknown");
            return Ok(RankCue::Unknown);
        }
        info!(rank = rank.label(), score, "opponent rank identified");
        if rank.shows_master_rating() {
            Ok(self.refine_master_rating(frames, side))
        } else if rank.has_divisions() {
            Ok(self.refine_division(frames, side, rank))
        } else {
            Ok(RankCue::RankOnly(rank))
        }
    }

    fn refine_master_rating(&self, frames: &dyn FrameSource, side: Side) -> RankCue {
        match frames.capture(&MR_REGIONS[side.index()]) {
            Ok(image) => {
                let probe = classifier::to_gray(&image);
                if let Some((&bracket, score)) =
                    self.mr_brackets.best_match(&probe, CompareMode::Binarized)
                {
                    if score >= MIN_MR_THRESHOLD {
                        info!(bracket = bracket.label(), score, "master rating identified");
                        return RankCue::MasterRating(bracket);
                    }
                    debug!(best = bracket.label(), score, "master rating below floor");
                }
            }
            Err(e) => warn!(error = %e, "master rating capture failed"),
        }
        RankCue::RankOnly(Rank::Master)
    }

    fn refine_division(&self, frames: &dyn FrameSource, side: Side, rank: Rank) -> RankCue {
        match frames.capture(&DIVISION_REGIONS[side.index()]) {
            Ok(image) => {
                let probe = classifier::to_gray(&image);
                if let Some((&division, score)) =
                    self.divisions.best_match(&probe, CompareMode::Plain)
                {
                    if score >= MIN_DIVISION_THRESHOLD {
                        info!(division = division.label(), score, "division identified");
                        return RankCue::RankDivision(rank, division);
                    }
                    debug!(best = division.label(), score, "division below floor");
                }
            }
            Err(e) => warn!(error = %e, "division capture failed"),
        }
        RankCue::RankOnly(rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::screen_capture::ScriptedFrames;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn gray(level: u8) -> GrayImage {
        GrayImage::from_pixel(8, 8, Luma([level]))
    }

    fn rgb(level: u8) -> RgbImage {
        RgbImage::from_pixel(8, 8, Rgb([level, level, level]))
    }

    /// Left columns at one level, the rest at another, so templates stay
    /// distinguishable after binarization.
    fn gray_split(split_at: u32, left: u8, right: u8) -> GrayImage {
        GrayImage::from_fn(8, 8, |x, _| {
            Luma([if x < split_at { left } else { right }])
        })
    }

    fn rgb_split(split_at: u32, left: u8, right: u8) -> RgbImage {
        RgbImage::from_fn(8, 8, |x, _| {
            let level = if x < split_at { left } else { right };
            Rgb([level, level, level])
        })
    }

    fn color_patch(rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(3, 3, Rgb(rgb))
    }

    const MODERN_COLOR: [u8; 3] = [120, 40, 20];
    const CLASSIC_COLOR: [u8; 3] = [70, 6, 120];

    /// Classic badge template is white, Modern is mid-gray; a white capture
    /// passes the 0.98 gate, a black capture fails it.
    fn resolver() -> VsScreenResolver {
        let mut controls = TemplateSet::new();
        controls.push(ControlScheme::Classic, gray(255));
        controls.push(ControlScheme::Modern, gray(128));

        let mut ranks = TemplateSet::new();
        ranks.push(Rank::Gold, gray_split(4, 255, 30));
        ranks.push(Rank::Master, gray(240));
        ranks.push(Rank::Legend, gray(30));

        let mut divisions = TemplateSet::new();
        divisions.push(Division::Two, gray(50));
        divisions.push(Division::Five, gray(90));

        let mut mr_brackets = TemplateSet::new();
        mr_brackets.push(MrBracket::Mr1200, gray(200));

        let mut left_characters = TemplateSet::new();
        left_characters.push("Ken".to_string(), gray(255));

        VsScreenResolver::new(
            controls,
            ranks,
            divisions,
            mr_brackets,
            [left_characters, TemplateSet::new()],
            GrayImage::from_pixel(8, 4, Luma([255])),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_left_badge_means_not_showing() {
        let frames = ScriptedFrames::new();
        frames.push(CONTROL_REGIONS[0], rgb(0));
        let outcome = resolver().resolve(&frames, false).await;
        assert_eq!(outcome, VsOutcome::NotShowing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_suppresses_resolution() {
        let frames = ScriptedFrames::new();
        frames.push(CONTROL_REGIONS[0], rgb(255));
        frames.push(CONTROL_REGIONS[1], rgb(0));
        let outcome = resolver().resolve(&frames, true).await;
        assert_eq!(outcome, VsOutcome::CoolingDown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blink_vanish_abandons() {
        let frames = ScriptedFrames::new();
        frames.push(CONTROL_REGIONS[0], rgb(255));
        frames.push(CONTROL_REGIONS[0], rgb(0));
        frames.push(CONTROL_REGIONS[1], rgb(0));
        let outcome = resolver().resolve(&frames, false).await;
        assert_eq!(outcome, VsOutcome::Abandoned);
    }

    #[tokio::test(start_paused = true)]
    async fn test_name_capture_failure_abandons() {
        let frames = ScriptedFrames::new();
        frames.push(CONTROL_REGIONS[0], rgb(255));
        frames.push(CONTROL_REGIONS[1], rgb(0));
        frames.push(CONTROL_COLOR_REGIONS[0], color_patch(MODERN_COLOR));
        frames.push_failure(NAME_REGIONS[0]);
        let outcome = resolver().resolve(&frames, false).await;
        assert_eq!(outcome, VsOutcome::Abandoned);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_resolution_with_division() {
        let frames = ScriptedFrames::new();
        frames.push(CONTROL_REGIONS[0], rgb(255));
        frames.push(CONTROL_REGIONS[1], rgb(0));
        frames.push(CONTROL_COLOR_REGIONS[0], color_patch(MODERN_COLOR));
        // Left name plate looks nothing like the stored template, right one
        // matches it, so the opponent is on the left.
        frames.push(NAME_REGIONS[0], rgb(0));
        frames.push(NAME_REGIONS[1], rgb(220));
        frames.push(CHARACTER_REGIONS[0], rgb(255));
        frames.push(RANK_REGIONS[0], rgb_split(4, 200, 100));
        frames.push(DIVISION_REGIONS[0], rgb(50));

        let outcome = resolver().resolve(&frames, false).await;
        let VsOutcome::Resolved(announcement) = outcome else {
            panic!("expected resolution, got {outcome:?}");
        };
        assert_eq!(announcement.opponent, Side::Left);
        assert_eq!(announcement.control, ControlScheme::Modern);
        assert_eq!(announcement.character.as_deref(), Some("Ken"));
        assert_eq!(
            announcement.rank,
            RankCue::RankDivision(Rank::Gold, Division::Two)
        );
        assert_eq!(
            announcement.cues(),
            vec![
                "Modern.ogg".to_string(),
                "characters/Ken.ogg".to_string(),
                "GoldTwo.ogg".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_opponent_on_right_uses_right_control() {
        let frames = ScriptedFrames::new();
        frames.push(CONTROL_REGIONS[0], rgb(255));
        frames.push(CONTROL_REGIONS[1], rgb(255));
        frames.push(CONTROL_COLOR_REGIONS[0], color_patch(MODERN_COLOR));
        frames.push(CONTROL_COLOR_REGIONS[1], color_patch(CLASSIC_COLOR));
        // Left plate matches the player template: opponent is on the right.
        frames.push(NAME_REGIONS[0], rgb(220));
        frames.push(NAME_REGIONS[1], rgb(0));
        frames.push(CHARACTER_REGIONS[1], rgb(30));
        frames.push(RANK_REGIONS[1], rgb(30));

        let outcome = resolver().resolve(&frames, false).await;
        let VsOutcome::Resolved(announcement) = outcome else {
            panic!("expected resolution, got {outcome:?}");
        };
        assert_eq!(announcement.opponent, Side::Right);
        assert_eq!(announcement.control, ControlScheme::Classic);
        // The right side has no character templates.
        assert_eq!(announcement.character, None);
        assert_eq!(announcement.rank, RankCue::RankOnly(Rank::Legend));
    }

    #[tokio::test(start_paused = true)]
    async fn test_control_falls_back_to_image_comparison() {
        let frames = ScriptedFrames::new();
        frames.push(CONTROL_REGIONS[0], rgb(255));
        frames.push(CONTROL_REGIONS[1], rgb(0));
        // A dull patch outside both color bands forces the image fallback,
        // which re-reads the badge region.
        frames.push(CONTROL_COLOR_REGIONS[0], color_patch([20, 20, 20]));
        frames.push(NAME_REGIONS[0], rgb(0));
        frames.push(NAME_REGIONS[1], rgb(220));
        frames.push(CHARACTER_REGIONS[0], rgb(0));
        frames.push(RANK_REGIONS[0], rgb(30));

        let outcome = resolver().resolve(&frames, false).await;
        let VsOutcome::Resolved(announcement) = outcome else {
            panic!("expected resolution, got {outcome:?}");
        };
        assert_eq!(announcement.control, ControlScheme::Classic);
        assert_eq!(announcement.rank, RankCue::RankOnly(Rank::Legend));
    }

    #[tokio::test(start_paused = true)]
    async fn test_name_tie_goes_left() {
        let frames = ScriptedFrames::new();
        frames.push(CONTROL_REGIONS[0], rgb(255));
        frames.push(CONTROL_REGIONS[1], rgb(0));
        frames.push(CONTROL_COLOR_REGIONS[0], color_patch(MODERN_COLOR));
        frames.push(NAME_REGIONS[0], rgb(0));
        frames.push(NAME_REGIONS[1], rgb(0));
        frames.push(CHARACTER_REGIONS[0], rgb(0));
        frames.push(RANK_REGIONS[0], rgb(240));
        frames.push(MR_REGIONS[0], rgb(200));

        let outcome = resolver().resolve(&frames, false).await;
        let VsOutcome::Resolved(announcement) = outcome else {
            panic!("expected resolution, got {outcome:?}");
        };
        assert_eq!(announcement.opponent, Side::Left);
    }

    #[tokio::test(start_paused = true)]
    async fn test_master_rank_reads_rating_not_division() {
        let frames = ScriptedFrames::new();
        frames.push(CONTROL_REGIONS[0], rgb(255));
        frames.push(CONTROL_REGIONS[1], rgb(0));
        frames.push(CONTROL_COLOR_REGIONS[0], color_patch(CLASSIC_COLOR));
        frames.push(NAME_REGIONS[0], rgb(0));
        frames.push(NAME_REGIONS[1], rgb(220));
        // Below the character floor: no character cue.
        frames.push(CHARACTER_REGIONS[0], rgb(0));
        frames.push(RANK_REGIONS[0], rgb(240));
        frames.push(MR_REGIONS[0], rgb(200));

        let outcome = resolver().resolve(&frames, false).await;
        let VsOutcome::Resolved(announcement) = outcome else {
            panic!("expected resolution, got {outcome:?}");
        };
        assert_eq!(announcement.rank, RankCue::MasterRating(MrBracket::Mr1200));
        assert_eq!(announcement.character, None);
        assert_eq!(
            announcement.cues(),
            vec!["Classic.ogg".to_string(), "1200.ogg".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_master_rating_below_floor_degrades_to_base_rank() {
        let frames = ScriptedFrames::new();
        frames.push(CONTROL_REGIONS[0], rgb(255));
        frames.push(CONTROL_REGIONS[1], rgb(0));
        frames.push(CONTROL_COLOR_REGIONS[0], color_patch(CLASSIC_COLOR));
        frames.push(NAME_REGIONS[0], rgb(0));
        frames.push(NAME_REGIONS[1], rgb(220));
        frames.push(CHARACTER_REGIONS[0], rgb(0));
        frames.push(RANK_REGIONS[0], rgb(240));
        // Binarizes to black while the bracket template binarizes white.
        frames.push(MR_REGIONS[0], rgb(100));

        let outcome = resolver().resolve(&frames, false).await;
        let VsOutcome::Resolved(announcement) = outcome else {
            panic!("expected resolution, got {outcome:?}");
        };
        assert_eq!(announcement.rank, RankCue::RankOnly(Rank::Master));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_rank_announces_unknown() {
        let frames = ScriptedFrames::new();
        frames.push(CONTROL_REGIONS[0], rgb(255));
        frames.push(CONTROL_REGIONS[1], rgb(0));
        frames.push(CONTROL_COLOR_REGIONS[0], color_patch(MODERN_COLOR));
        frames.push(NAME_REGIONS[0], rgb(0));
        frames.push(NAME_REGIONS[1], rgb(220));
        frames.push(CHARACTER_REGIONS[0], rgb(0));
        // A narrow bright strip: no template clears the floor after
        // binarization.
        frames.push(RANK_REGIONS[0], rgb_split(2, 200, 100));

        let outcome = resolver().resolve(&frames, false).await;
        let VsOutcome::Resolved(announcement) = outcome else {
            panic!("expected resolution, got {outcome:?}");
        };
        assert_eq!(announcement.rank, RankCue::Unknown);
        assert_eq!(announcement.cues().last().map(String::as_str), Some("Unknown.ogg"));
    }
}
