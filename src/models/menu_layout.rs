//! Typed training-menu layout, loaded from `training_menu_config.json`.
//!
//! The layout describes where tab strips, item rows, and option values sit
//! on screen, plus how each option value is recognized. It is validated once
//! at load time so detection code can assume cross-references hold.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::AssetError;
use crate::models::region::Region;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuLayout {
    pub tab_detection: TabStrip,
    pub submenu_detection: SubmenuStrip,
    pub detection_settings: DetectionSettings,
    pub tabs: HashMap<String, TabSpec>,
    #[serde(default)]
    pub submenu_tabs: HashMap<String, TabSpec>,
    pub item_detection: ItemDetection,
    pub option_definitions: HashMap<String, OptionDef>,
    pub audio: AudioNaming,
}

/// Top-level tab strip geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabStrip {
    pub region: Region,
    pub num_tabs: u32,
    /// Path to the open-menu reference image, relative to the resource root.
    pub reference_image: String,
}

/// Submenu tab strip geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmenuStrip {
    pub tab_region: Region,
    pub num_tabs: u32,
    pub reference_image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// Grayscale cut used to binarize strips and item patches.
    pub binary_threshold: u8,
    /// Value cut for the lit-pixel test on binarized patches.
    pub white_pixel_threshold: u8,
    pub menu_match_threshold: f64,
    pub submenu_match_threshold: f64,
    /// Maximum width difference for a yellow-width option to count as a hit.
    pub yellow_width_tolerance: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabSpec {
    /// 1-based position in the tab strip.
    pub tab_number: u32,
    /// 1-based row of the first item in the position table.
    #[serde(default = "default_start_position")]
    pub start_position: u32,
    #[serde(default)]
    pub has_sub_tabs: bool,
    /// Selecting this tab drops the game into the recording submenu.
    #[serde(default)]
    pub opens_submenu: bool,
    #[serde(default)]
    pub sub_tab_detection: Option<SubTabDetection>,
    /// Item lists per sub-tab. `null` entries hold a row that carries no
    /// announceable item.
    #[serde(default)]
    pub sub_tabs: Option<HashMap<String, Vec<Option<String>>>>,
    #[serde(default)]
    pub items: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub item_options: HashMap<String, ItemOptionSpec>,
    /// Column override for every item row of this tab.
    #[serde(default)]
    pub check_column: Option<u32>,
    /// Column overrides for individual items, keyed by item name.
    #[serde(default)]
    pub item_check_columns: HashMap<String, u32>,
}

fn default_start_position() -> u32 {
    1
}

impl TabSpec {
    /// Item rows shown while this tab is active, or `None` when the view has
    /// no items to scan (for example a sub-tabbed view with no sub-tab
    /// detected yet).
    pub fn items_for(&self, sub_tab: Option<&str>, in_submenu: bool) -> Option<&[Option<String>]> {
        if self.has_sub_tabs && !in_submenu {
            let sub = sub_tab?;
            self.sub_tabs.as_ref()?.get(sub).map(|v| v.as_slice())
        } else {
            self.items.as_deref()
        }
    }

    /// Column where this item's highlight is probed.
    pub fn check_column_for(&self, item: &str, default: u32) -> u32 {
        self.item_check_columns
            .get(item)
            .copied()
            .or(self.check_column)
            .unwrap_or(default)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTabDetection {
    pub positions: Vec<SubTabPosition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTabPosition {
    pub name: String,
    pub top: u32,
    pub left: u32,
    pub width: u32,
    pub height: u32,
}

impl SubTabPosition {
    pub fn region(&self) -> Region {
        Region::new(self.top, self.left, self.width, self.height)
    }
}

/// How a selected item's current value is recognized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOptionSpec {
    pub detection_method: DetectionMethod,
    /// Option keys into [`MenuLayout::option_definitions`].
    pub options: Vec<String>,
    /// Option reported when nothing measurable is on screen. Falls back to
    /// the first listed option.
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub comparison_threshold: Option<f64>,
    #[serde(default)]
    pub binary_threshold: Option<u8>,
    /// Fixed value region replacing the computed row-relative one.
    #[serde(default)]
    pub value_region: Option<Region>,
}

impl ItemOptionSpec {
    pub fn default_option(&self) -> &str {
        self.default.as_deref().unwrap_or(&self.options[0])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Measure the pixel width of the highlighted yellow value text.
    YellowWidth,
    /// Compare the value region against per-option reference images.
    ImageComparison,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDetection {
    /// Screen rows (y coordinates) of the item list, top to bottom.
    pub positions: Vec<u32>,
    pub check_region: CheckRegion,
    pub value_region: ValueRegion,
}

/// Column geometry of the item highlight probe; the row comes from the
/// position table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRegion {
    pub left: u32,
    pub width: u32,
    pub height: u32,
}

/// Row-relative geometry of the option value area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRegion {
    pub top_offset: i32,
    pub left: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDef {
    /// Expected yellow text width for width-based detection.
    #[serde(default)]
    pub width: Option<u32>,
    /// Reference image file under the menu media folder.
    #[serde(default)]
    pub image: Option<String>,
    /// Spoken name for this value. The cue file is derived from it the same
    /// way as from tab and item names.
    pub audio: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioNaming {
    /// Cue file extension including the leading dot.
    pub extension: String,
}

impl MenuLayout {
    pub fn from_json(raw: &str) -> Result<Self, AssetError> {
        let layout: MenuLayout =
            serde_json::from_str(raw).map_err(|e| AssetError::LayoutInvalid(e.to_string()))?;
        layout.validate()?;
        Ok(layout)
    }

    /// Strip geometry for the given menu level.
    pub fn strip(&self, in_submenu: bool) -> (Region, u32) {
        if in_submenu {
            (
                self.submenu_detection.tab_region,
                self.submenu_detection.num_tabs,
            )
        } else {
            (self.tab_detection.region, self.tab_detection.num_tabs)
        }
    }

    pub fn tabs_at(&self, in_submenu: bool) -> &HashMap<String, TabSpec> {
        if in_submenu {
            &self.submenu_tabs
        } else {
            &self.tabs
        }
    }

    /// Tab name for a 1-based strip position, if one is configured there.
    pub fn tab_name_at(&self, in_submenu: bool, number: u32) -> Option<&str> {
        self.tabs_at(in_submenu)
            .iter()
            .find(|(_, spec)| spec.tab_number == number)
            .map(|(name, _)| name.as_str())
    }

    pub fn tab_spec(&self, in_submenu: bool, name: &str) -> Option<&TabSpec> {
        self.tabs_at(in_submenu).get(name)
    }

    /// The top-level tab whose selection opens the submenu.
    pub fn submenu_owner(&self) -> Option<&str> {
        self.tabs
            .iter()
            .find(|(_, spec)| spec.opens_submenu)
            .map(|(name, _)| name.as_str())
    }

    /// Cue file for a tab, sub-tab, or item display name.
    pub fn cue_file(&self, display: &str) -> String {
        let stem: String = display
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        format!("{stem}{}", self.audio.extension)
    }

    pub fn validate(&self) -> Result<(), AssetError> {
        if !self.audio.extension.starts_with('.') {
            return Err(AssetError::LayoutInvalid(format!(
                "audio extension {:?} must include the leading dot",
                self.audio.extension
            )));
        }
        Self::validate_strip("tabs", &self.tabs, self.tab_detection.num_tabs)?;
        Self::validate_strip(
            "submenu_tabs",
            &self.submenu_tabs,
            self.submenu_detection.num_tabs,
        )?;
        for (tab_name, spec) in self.tabs.iter().chain(self.submenu_tabs.iter()) {
            self.validate_tab(tab_name, spec)?;
        }
        Ok(())
    }

    fn validate_strip(
        kind: &str,
        tabs: &HashMap<String, TabSpec>,
        num_tabs: u32,
    ) -> Result<(), AssetError> {
        let mut seen: HashMap<u32, &str> = HashMap::new();
        for (name, spec) in tabs {
            if spec.tab_number < 1 || spec.tab_number > num_tabs {
                return Err(AssetError::LayoutInvalid(format!(
                    "{kind} entry {name:?} has tab_number {} outside 1..={num_tabs}",
                    spec.tab_number
                )));
            }
            if let Some(other) = seen.insert(spec.tab_number, name) {
                return Err(AssetError::LayoutInvalid(format!(
                    "{kind} entries {other:?} and {name:?} share tab_number {}",
                    spec.tab_number
                )));
            }
        }
        Ok(())
    }

    fn validate_tab(&self, tab_name: &str, spec: &TabSpec) -> Result<(), AssetError> {
        let mut known_items: Vec<&str> = Vec::new();
        if let Some(items) = &spec.items {
            known_items.extend(items.iter().flatten().map(String::as_str));
        }
        if let Some(sub_tabs) = &spec.sub_tabs {
            for items in sub_tabs.values() {
                known_items.extend(items.iter().flatten().map(String::as_str));
            }
        }

        if spec.has_sub_tabs {
            let positions = spec
                .sub_tab_detection
                .as_ref()
                .ok_or_else(|| {
                    AssetError::LayoutInvalid(format!(
                        "tab {tab_name:?} has sub-tabs but no sub_tab_detection"
                    ))
                })?
                .positions
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>();
            let sub_tabs = spec.sub_tabs.as_ref().ok_or_else(|| {
                AssetError::LayoutInvalid(format!(
                    "tab {tab_name:?} has sub-tabs but no sub_tabs item lists"
                ))
            })?;
            for name in sub_tabs.keys() {
                if !positions.contains(&name.as_str()) {
                    return Err(AssetError::LayoutInvalid(format!(
                        "tab {tab_name:?} lists sub-tab {name:?} with no detection position"
                    )));
                }
            }
        }

        for (item_name, options) in &spec.item_options {
            if !known_items.contains(&item_name.as_str()) {
                return Err(AssetError::LayoutInvalid(format!(
                    "tab {tab_name:?} configures options for unknown item {item_name:?}"
                )));
            }
            self.validate_item_options(tab_name, item_name, options)?;
        }
        for item_name in spec.item_check_columns.keys() {
            if !known_items.contains(&item_name.as_str()) {
                return Err(AssetError::LayoutInvalid(format!(
                    "tab {tab_name:?} overrides check column for unknown item {item_name:?}"
                )));
            }
        }
        Ok(())
    }

    fn validate_item_options(
        &self,
        tab_name: &str,
        item_name: &str,
        spec: &ItemOptionSpec,
    ) -> Result<(), AssetError> {
        if spec.options.is_empty() {
            return Err(AssetError::LayoutInvalid(format!(
                "item {item_name:?} in tab {tab_name:?} lists no options"
            )));
        }
        for key in &spec.options {
            if !self.option_definitions.contains_key(key) {
                return Err(AssetError::LayoutInvalid(format!(
                    "item {item_name:?} in tab {tab_name:?} references undefined option {key:?}"
                )));
            }
        }
        if let Some(default) = &spec.default {
            if !spec.options.contains(default) {
                return Err(AssetError::LayoutInvalid(format!(
                    "item {item_name:?} in tab {tab_name:?} defaults to {default:?} which is not listed"
                )));
            }
        }
        match spec.detection_method {
            DetectionMethod::YellowWidth => {
                let default = spec.default_option();
                for key in &spec.options {
                    if key == default {
                        continue;
                    }
                    let def = &self.option_definitions[key];
                    if def.width.is_none() {
                        return Err(AssetError::LayoutInvalid(format!(
                            "option {key:?} used by width detection on {item_name:?} has no width"
                        )));
                    }
                }
            }
            DetectionMethod::ImageComparison => {
                let any_image = spec
                    .options
                    .iter()
                    .any(|key| self.option_definitions[key].image.is_some());
                if !any_image {
                    return Err(AssetError::LayoutInvalid(format!(
                        "image detection on {item_name:?} has no option with a reference image"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> String {
        r#"{
            "tab_detection": {
                "region": {"top": 104, "left": 447, "width": 1026, "height": 30},
                "num_tabs": 7,
                "reference_image": "media/menu/menu_reference.png"
            },
            "submenu_detection": {
                "tab_region": {"top": 104, "left": 447, "width": 878, "height": 30},
                "num_tabs": 6,
                "reference_image": "media/menu/submenu_reference.png"
            },
            "detection_settings": {
                "binary_threshold": 170,
                "white_pixel_threshold": 200,
                "menu_match_threshold": 0.9,
                "submenu_match_threshold": 0.9,
                "yellow_width_tolerance": 5
            },
            "tabs": {
                "Dummy Settings": {
                    "tab_number": 1,
                    "start_position": 1,
                    "items": ["Dummy Recovery", null, "Guard Action"],
                    "item_options": {
                        "Dummy Recovery": {
                            "detection_method": "yellow_width",
                            "options": ["Off", "On"],
                            "default": "Off"
                        }
                    }
                },
                "Drive System": {
                    "tab_number": 2,
                    "start_position": 1,
                    "has_sub_tabs": true,
                    "sub_tab_detection": {
                        "positions": [
                            {"name": "Burnout", "top": 140, "left": 500, "width": 30, "height": 20}
                        ]
                    },
                    "sub_tabs": {
                        "Burnout": ["Burnout Recovery"]
                    }
                },
                "Reversal Settings": {
                    "tab_number": 3,
                    "opens_submenu": true,
                    "items": ["Reversal Action"]
                }
            },
            "submenu_tabs": {
                "Record": {
                    "tab_number": 1,
                    "check_column": 738,
                    "items": ["Recording Slot"]
                }
            },
            "item_detection": {
                "positions": [196, 232, 268, 304, 340],
                "check_region": {"left": 449, "width": 20, "height": 24},
                "value_region": {"top_offset": 2, "left": 1136, "width": 220, "height": 26}
            },
            "option_definitions": {
                "Off": {"width": 34, "audio": "Off"},
                "On": {"width": 26, "audio": "On"}
            },
            "audio": {"extension": ".ogg"}
        }"#
        .to_string()
    }

    #[test]
    fn test_sample_layout_parses_and_validates() {
        let layout = MenuLayout::from_json(&sample_json()).unwrap();
        assert_eq!(layout.tab_detection.num_tabs, 7);
        assert_eq!(layout.tabs.len(), 3);
        assert_eq!(layout.submenu_tabs.len(), 1);
        assert_eq!(layout.tab_name_at(false, 1), Some("Dummy Settings"));
        assert_eq!(layout.tab_name_at(true, 1), Some("Record"));
        assert_eq!(layout.tab_name_at(false, 7), None);
        assert_eq!(layout.submenu_owner(), Some("Reversal Settings"));
    }

    #[test]
    fn test_unknown_detection_method_rejected() {
        let raw = sample_json().replace("yellow_width", "contour_match");
        let err = MenuLayout::from_json(&raw).unwrap_err();
        assert!(err.to_string().contains("contour_match"));
    }

    #[test]
    fn test_duplicate_tab_number_rejected() {
        let raw = sample_json().replace("\"tab_number\": 3", "\"tab_number\": 1");
        let err = MenuLayout::from_json(&raw).unwrap_err();
        assert!(err.to_string().contains("share tab_number"));
    }

    #[test]
    fn test_tab_number_out_of_range_rejected() {
        let raw = sample_json().replace("\"tab_number\": 3", "\"tab_number\": 9");
        let err = MenuLayout::from_json(&raw).unwrap_err();
        assert!(err.to_string().contains("outside"));
    }

    #[test]
    fn test_undefined_option_rejected() {
        let raw = sample_json().replace("[\"Off\", \"On\"]", "[\"Off\", \"Random\"]");
        let err = MenuLayout::from_json(&raw).unwrap_err();
        assert!(err.to_string().contains("undefined option"));
    }

    #[test]
    fn test_option_config_for_unknown_item_rejected() {
        // Renames the item list entry only, leaving the option config keyed
        // to a name no item carries.
        let raw = sample_json().replacen("\"Dummy Recovery\"", "\"Phantom Item\"", 1);
        let err = MenuLayout::from_json(&raw).unwrap_err();
        assert!(err.to_string().contains("unknown item"));
    }

    #[test]
    fn test_items_for_resolves_sub_tabs() {
        let layout = MenuLayout::from_json(&sample_json()).unwrap();
        let drive = layout.tab_spec(false, "Drive System").unwrap();
        assert!(drive.items_for(None, false).is_none());
        let items = drive.items_for(Some("Burnout"), false).unwrap();
        assert_eq!(items[0].as_deref(), Some("Burnout Recovery"));

        let dummy = layout.tab_spec(false, "Dummy Settings").unwrap();
        let items = dummy.items_for(None, false).unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[1].is_none());
    }

    #[test]
    fn test_check_column_precedence() {
        let layout = MenuLayout::from_json(&sample_json()).unwrap();
        let record = layout.tab_spec(true, "Record").unwrap();
        assert_eq!(record.check_column_for("Recording Slot", 449), 738);
        let dummy = layout.tab_spec(false, "Dummy Settings").unwrap();
        assert_eq!(dummy.check_column_for("Dummy Recovery", 449), 449);
    }

    #[test]
    fn test_cue_file_transform() {
        let layout = MenuLayout::from_json(&sample_json()).unwrap();
        assert_eq!(layout.cue_file("Dummy Recovery"), "dummy_recovery.ogg");
        assert_eq!(layout.cue_file("Counter-Hit"), "counter_hit.ogg");
        assert_eq!(layout.cue_file("Guard"), "guard.ogg");
    }

    #[test]
    fn test_extension_requires_dot() {
        let raw = sample_json().replace("\".ogg\"", "\"ogg\"");
        let err = MenuLayout::from_json(&raw).unwrap_err();
        assert!(err.to_string().contains("leading dot"));
    }
}
