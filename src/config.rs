//! Fixed detection geometry, color bands, thresholds, and timing.
//!
//! Every pixel coordinate in this file is tied to the reference 1920x1080
//! game layout. Regions come in `[left, right]` pairs indexed by
//! [`Side::index`](crate::models::region::Side::index).

use std::time::Duration;

use crate::models::region::Region;

// ---------------------------------------------------------------------------
// Timing

/// Pause between main loop ticks.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(1);
/// Wait before re-verifying the versus screen, it blinks in briefly on load.
pub const VS_SCREEN_WAIT_TIME: Duration = Duration::from_millis(500);
/// Suppress repeat announcements for this long after one completes.
pub const COOLDOWN_PERIOD: Duration = Duration::from_secs(15);
/// How often to look for a match start while no match is active.
pub const MATCH_CHECK_INTERVAL: Duration = Duration::from_secs(2);
/// How often to sample health bars during an active match.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_millis(300);
/// Both bars must stay absent this long before the match counts as over.
pub const MATCH_END_CONFIRMATION_DELAY: Duration = Duration::from_secs(2);

/// Re-sampling schedule used to confirm a transient observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmPolicy {
    /// Total checks counting the initial observation.
    pub checks: u32,
    /// Pause before each follow-up sample.
    pub delay: Duration,
}

/// Critical health must survive two quick follow-up reads.
pub const HEALTH_CONFIRMATION: ConfirmPolicy = ConfirmPolicy {
    checks: 3,
    delay: Duration::from_millis(100),
};

/// Menu opening must survive two slower follow-up reads.
pub const MENU_CONFIRMATION: ConfirmPolicy = ConfirmPolicy {
    checks: 3,
    delay: Duration::from_millis(500),
};

// ---------------------------------------------------------------------------
// Similarity thresholds

/// Control badge similarity gate for versus screen detection.
pub const CONTROL_SIMILARITY_THRESHOLD: f64 = 0.98;
/// Floor for the image fallback when color sampling cannot identify a scheme.
pub const CONTROL_IMAGE_FALLBACK_THRESHOLD: f64 = 0.85;
pub const MIN_RANK_THRESHOLD: f64 = 0.80;
pub const MIN_DIVISION_THRESHOLD: f64 = 0.83;
pub const MIN_MR_THRESHOLD: f64 = 0.93;
pub const MIN_CHARACTER_THRESHOLD: f64 = 0.60;

/// Binarization cut for rank, MR, and control template comparison.
pub const TEMPLATE_BINARY_CUT: u8 = 150;
/// Binarization cut for fighter name comparison and the saved name template.
pub const NAME_BINARY_CUT: u8 = 190;

// ---------------------------------------------------------------------------
// Versus screen regions

pub const CONTROL_REGIONS: [Region; 2] = [
    Region::new(834, 56, 35, 31),
    Region::new(834, 1830, 35, 31),
];

/// Tiny patches inside the control badge used for color sampling.
pub const CONTROL_COLOR_REGIONS: [Region; 2] =
    [Region::new(850, 61, 3, 3), Region::new(849, 1834, 3, 3)];

pub const RANK_REGIONS: [Region; 2] = [
    Region::new(928, 65, 108, 44),
    Region::new(928, 1740, 108, 44),
];

pub const NAME_REGIONS: [Region; 2] = [
    Region::new(912, 334, 82, 26),
    Region::new(912, 1354, 82, 26),
];

pub const DIVISION_REGIONS: [Region; 2] = [
    Region::new(978, 82, 76, 14),
    Region::new(978, 1757, 76, 14),
];

pub const MR_REGIONS: [Region; 2] = [
    Region::new(993, 38, 14, 23),
    Region::new(993, 1713, 14, 23),
];

pub const CHARACTER_REGIONS: [Region; 2] = [
    Region::new(260, 178, 230, 260),
    Region::new(260, 1512, 230, 260),
];

// ---------------------------------------------------------------------------
// Health bar regions and color bands

pub const HEALTH_REGIONS: [Region; 2] = [
    Region::new(73, 820, 24, 15),
    Region::new(73, 1076, 24, 15),
];

/// Inclusive RGB channel bands for color classification.
#[derive(Debug, Clone, Copy)]
pub struct ColorBand {
    pub r: (u8, u8),
    pub g: (u8, u8),
    pub b: (u8, u8),
}

impl ColorBand {
    pub const fn contains(&self, r: u8, g: u8, b: u8) -> bool {
        r >= self.r.0
            && r <= self.r.1
            && g >= self.g.0
            && g <= self.g.1
            && b >= self.b.0
            && b <= self.b.1
    }
}

pub const HEALTH_RED_BAND: ColorBand = ColorBand {
    r: (215, 220),
    g: (26, 30),
    b: (93, 97),
};

pub const HEALTH_YELLOW_BAND: ColorBand = ColorBand {
    r: (250, 253),
    g: (246, 250),
    b: (105, 110),
};

pub const HEALTH_BLUE_BAND: ColorBand = ColorBand {
    r: (12, 15),
    g: (105, 110),
    b: (184, 188),
};

/// Health sampling looks at the innermost window of the captured patch.
pub const HEALTH_SAMPLE_WINDOW: u32 = 7;
/// Fraction of window pixels that must sit inside one band.
pub const HEALTH_BAND_FRACTION: f64 = 0.8;

pub const MODERN_BAND: ColorBand = ColorBand {
    r: (90, 165),
    g: (25, 70),
    b: (0, 35),
};

pub const CLASSIC_BAND: ColorBand = ColorBand {
    r: (45, 95),
    g: (0, 12),
    b: (100, 140),
};

pub const CONTROL_SAMPLE_WINDOW: u32 = 3;
/// Minimum matching pixels inside the 3x3 window to accept a scheme.
pub const CONTROL_BAND_MIN_PIXELS: u32 = 3;

/// Highlighted menu text is yellow; used to measure option value widths.
pub const OPTION_YELLOW_BAND: ColorBand = ColorBand {
    r: (200, 255),
    g: (200, 255),
    b: (50, 120),
};

// ---------------------------------------------------------------------------
// Training menu fixed geometry

/// Marker that is lit on the top-level menu and dark inside the submenu.
pub const SUBMENU_INDICATOR_REGION: Region = Region::new(35, 877, 13, 14);
pub const SUBMENU_INDICATOR_BINARY_CUT: u8 = 100;
pub const SUBMENU_INDICATOR_LIT_CUT: u8 = 7;

// ---------------------------------------------------------------------------
// Resource layout

pub const MEDIA_DIR: &str = "media";
pub const MENU_SUBDIR: &str = "menu";
pub const CHARACTERS_SUBDIR: &str = "characters";
pub const PLAYER_NAME_FILE: &str = "MyName.png";
pub const SETTINGS_FILE: &str = "settings.json";
pub const MENU_LAYOUT_FILE: &str = "training_menu_config.json";

/// Extension for versus and health cue files. Menu cues take theirs from the
/// layout file instead.
pub const CUE_EXTENSION: &str = ".ogg";
pub const HEALTH_ALERT_CUE: &str = "CA_health.ogg";
pub const UNKNOWN_RANK_CUE: &str = "Unknown.ogg";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_pairs_are_side_indexed() {
        assert!(CONTROL_REGIONS[0].left < CONTROL_REGIONS[1].left);
        assert!(HEALTH_REGIONS[0].left < HEALTH_REGIONS[1].left);
        assert!(RANK_REGIONS[0].left < RANK_REGIONS[1].left);
        assert!(NAME_REGIONS[0].left < NAME_REGIONS[1].left);
    }

    #[test]
    fn test_color_band_contains_is_inclusive() {
        assert!(HEALTH_RED_BAND.contains(215, 26, 93));
        assert!(HEALTH_RED_BAND.contains(220, 30, 97));
        assert!(!HEALTH_RED_BAND.contains(221, 28, 95));
        assert!(!HEALTH_RED_BAND.contains(217, 25, 95));
    }

    #[test]
    fn test_health_bands_are_disjoint() {
        // A pixel cannot classify as two colors at once.
        for band in [HEALTH_YELLOW_BAND, HEALTH_BLUE_BAND] {
            assert!(!band.contains(217, 28, 95));
        }
        for band in [HEALTH_RED_BAND, HEALTH_BLUE_BAND] {
            assert!(!band.contains(251, 248, 107));
        }
    }

    #[test]
    fn test_confirmation_policies() {
        assert_eq!(HEALTH_CONFIRMATION.checks, 3);
        assert_eq!(HEALTH_CONFIRMATION.delay, Duration::from_millis(100));
        assert_eq!(MENU_CONFIRMATION.delay, Duration::from_millis(500));
    }
}
