//! Training menu navigation feedback.
//!
//! The trainer menu is read entirely from the tab strip and a table of fixed
//! item rows described by the layout file. Each tick works out whether the
//! menu is open, which tab and sub-tab the cursor is on, which item row is
//! highlighted, and, once an item is locked, what value it currently shows.
//! State transitions come back as [`MenuEvent`]s so the caller decides what
//! to speak.

use std::collections::HashMap;

use image::{GrayImage, RgbImage};
use tracing::{debug, info};

use crate::config::{
    MENU_CONFIRMATION, MENU_SUBDIR, SUBMENU_INDICATOR_BINARY_CUT, SUBMENU_INDICATOR_LIT_CUT,
    SUBMENU_INDICATOR_REGION,
};
use crate::error::CaptureError;
use crate::models::menu_layout::{MenuLayout, SubTabDetection, TabSpec};
use crate::models::region::Region;
use crate::services::classifier;
use crate::services::confirm::{self, Confirmation};
use crate::services::option_detection;
use crate::services::screen_capture::FrameSource;

#[derive(Debug, Clone, PartialEq)]
pub enum MenuEvent {
    Opened,
    Closed,
    SubmenuEntered,
    SubmenuLeft,
    TabChanged { name: String, cue: String },
    /// First sub-tab sighting after landing on a tab that has them.
    SubTabAnnounced { name: String, cue: String },
    SubTabChanged { name: String, cue: String },
    ItemLocked { name: String, cue: String },
    ItemReleased { name: String },
    OptionChanged { cue: String },
}

#[derive(Debug, PartialEq)]
pub struct MenuTick {
    pub open: bool,
    pub events: Vec<MenuEvent>,
}

#[derive(Debug, Default)]
struct MenuState {
    open: bool,
    in_submenu: bool,
    active_tab: Option<String>,
    active_sub_tab: Option<String>,
    sub_tab_announced: bool,
    /// Selected item name and its screen row.
    locked_item: Option<(String, u32)>,
    /// Audio label of the last spoken option value, for repeat suppression.
    last_announced_option: Option<String>,
}

pub struct MenuNavigator {
    layout: MenuLayout,
    menu_reference: GrayImage,
    submenu_reference: GrayImage,
    /// Option reference images keyed by option key.
    option_images: HashMap<String, RgbImage>,
    state: MenuState,
}

/// Binarized similarity between a captured strip and its reference.
fn strip_similarity(probe: &RgbImage, reference: &GrayImage, cut: u8) -> f64 {
    classifier::binarized_similarity(&classifier::to_gray(probe), reference, cut)
}

/// Whether a small captured patch holds any lit pixel after binarization.
fn patch_is_lit(image: &RgbImage, binary_cut: u8, value_cut: u8) -> bool {
    let binary = classifier::binarize(&classifier::to_gray(image), binary_cut);
    classifier::has_lit_pixels(&binary, value_cut)
}

/// 1-based index of the first strip segment whose center window holds a lit
/// pixel. The window covers the middle 40% of each segment so neighboring
/// highlights do not bleed in.
fn lit_segment(strip: &GrayImage, num_tabs: u32, binary_cut: u8, value_cut: u8) -> Option<u32> {
    if num_tabs == 0 {
        return None;
    }
    let binary = classifier::binarize(strip, binary_cut);
    let segment_width = binary.width() as f64 / num_tabs as f64;
    for segment in 0..num_tabs {
        let start = (segment as f64 * segment_width + 0.3 * segment_width) as u32;
        let end = (segment as f64 * segment_width + 0.7 * segment_width) as u32;
        let lit = (start..end.min(binary.width()))
            .any(|x| (0..binary.height()).any(|y| binary.get_pixel(x, y)[0] > value_cut));
        if lit {
            return Some(segment + 1);
        }
    }
    None
}

impl MenuNavigator {
    pub fn new(
        layout: MenuLayout,
        menu_reference: GrayImage,
        submenu_reference: GrayImage,
        option_images: HashMap<String, RgbImage>,
    ) -> Self {
        Self {
            layout,
            menu_reference,
            submenu_reference,
            option_images,
            state: MenuState::default(),
        }
    }

    /// One full pass over the menu. Capture failures abort the tick and
    /// leave announcements for the next one.
    pub async fn tick(&mut self, frames: &dyn FrameSource) -> Result<MenuTick, CaptureError> {
        let mut events = Vec::new();

        // Submenu transitions come first so the open check below reads
        // whichever strip should currently be on screen.
        if self.state.open && self.submenu_check_applies() {
            let in_submenu = self.submenu_status(frames)?;
            if in_submenu != self.state.in_submenu {
                self.state.in_submenu = in_submenu;
                self.state.active_sub_tab = None;
                self.state.sub_tab_announced = false;
                self.state.locked_item = None;
                self.state.last_announced_option = None;
                if in_submenu {
                    debug!("submenu entered");
                    self.state.active_tab = None;
                    events.push(MenuEvent::SubmenuEntered);
                } else {
                    debug!("submenu left");
                    self.state.active_tab = self.layout.submenu_owner().map(str::to_string);
                    events.push(MenuEvent::SubmenuLeft);
                }
            }
        }

        if !self.strip_matches(frames)? {
            if self.state.open {
                info!("training menu closed");
                self.reset();
                events.push(MenuEvent::Closed);
            }
            return Ok(MenuTick {
                open: false,
                events,
            });
        }
        if !self.state.open {
            let confirmation =
                confirm::require_stable(MENU_CONFIRMATION, &true, || self.strip_matches(frames))
                    .await?;
            match confirmation {
                Confirmation::Confirmed => {
                    info!("training menu opened");
                    self.state.open = true;
                    events.push(MenuEvent::Opened);
                }
                Confirmation::Disputed { attempt, .. } => {
                    debug!(attempt, "menu sighting did not survive confirmation");
                    return Ok(MenuTick {
                        open: false,
                        events,
                    });
                }
            }
        }

        // No lit tab means the strip is gone even though the open check
        // passed; treat it as a close.
        let Some(tab_name) = self.active_tab_name(frames)? else {
            info!("training menu closed");
            self.reset();
            events.push(MenuEvent::Closed);
            return Ok(MenuTick {
                open: false,
                events,
            });
        };

        if self.state.active_tab.as_deref() != Some(tab_name.as_str()) {
            let first_sighting = self.state.active_tab.is_none();
            self.state.active_tab = Some(tab_name.clone());
            self.state.active_sub_tab = None;
            self.state.sub_tab_announced = false;
            self.state.locked_item = None;
            self.state.last_announced_option = None;
            if first_sighting {
                // The tab under the cursor when the menu opens is not
                // announced; only navigation is.
                debug!(tab = tab_name.as_str(), "active tab detected");
            } else {
                info!(tab = tab_name.as_str(), "tab changed");
                events.push(MenuEvent::TabChanged {
                    cue: self.menu_cue(&tab_name),
                    name: tab_name.clone(),
                });
            }
        }

        let Some(tab) = self.layout.tab_spec(self.state.in_submenu, &tab_name) else {
            return Ok(MenuTick { open: true, events });
        };

        if tab.has_sub_tabs {
            let current = match &tab.sub_tab_detection {
                Some(detection) => self.active_sub_tab_name(frames, detection)?,
                None => None,
            };
            if current != self.state.active_sub_tab {
                self.state.locked_item = None;
                self.state.last_announced_option = None;
                if let Some(name) = &current {
                    let cue = self.menu_cue(name);
                    if self.state.sub_tab_announced {
                        info!(sub_tab = name.as_str(), "sub-tab changed");
                        events.push(MenuEvent::SubTabChanged {
                            name: name.clone(),
                            cue,
                        });
                    } else {
                        info!(sub_tab = name.as_str(), "sub-tab detected");
                        self.state.sub_tab_announced = true;
                        events.push(MenuEvent::SubTabAnnounced {
                            name: name.clone(),
                            cue,
                        });
                    }
                }
                self.state.active_sub_tab = current;
            }
        }

        if let Some((name, row)) = self.state.locked_item.clone() {
            if self.item_row_lit(frames, tab, &name, row)? {
                if let Some(spec) = tab.item_options.get(&name) {
                    let key = option_detection::detect_option(
                        frames,
                        &self.layout,
                        &self.option_images,
                        spec,
                        row,
                    )?;
                    if let Some(def) = self.layout.option_definitions.get(&key) {
                        if self.state.last_announced_option.as_deref() != Some(def.audio.as_str()) {
                            info!(
                                item = name.as_str(),
                                option = def.audio.as_str(),
                                "option value changed"
                            );
                            events.push(MenuEvent::OptionChanged {
                                cue: self.menu_cue(&def.audio),
                            });
                            self.state.last_announced_option = Some(def.audio.clone());
                        }
                    }
                }
            } else {
                debug!(item = name.as_str(), "item released");
                self.state.locked_item = None;
                self.state.last_announced_option = None;
                events.push(MenuEvent::ItemReleased { name });
            }
        } else if let Some((name, row)) = self.scan_items(frames, tab)? {
            info!(item = name.as_str(), "item selected");
            let cue = self.menu_cue(&name);
            self.state.locked_item = Some((name.clone(), row));
            events.push(MenuEvent::ItemLocked { name, cue });
        }

        Ok(MenuTick { open: true, events })
    }

    fn reset(&mut self) {
        self.state = MenuState::default();
    }

    fn menu_cue(&self, display: &str) -> String {
        format!("{MENU_SUBDIR}/{}", self.layout.cue_file(display))
    }

    fn submenu_check_applies(&self) -> bool {
        if self.state.in_submenu {
            return true;
        }
        self.state
            .active_tab
            .as_deref()
            .and_then(|name| self.layout.tab_spec(false, name))
            .map_or(false, |tab| tab.opens_submenu)
    }

    /// The submenu hides a marker the top-level menu shows. A dark marker
    /// alone is not trusted; the submenu strip has to match its reference
    /// too, so a closed menu does not read as a submenu.
    fn submenu_status(&self, frames: &dyn FrameSource) -> Result<bool, CaptureError> {
        let indicator = frames.capture(&SUBMENU_INDICATOR_REGION)?;
        let binary = classifier::binarize(
            &classifier::to_gray(&indicator),
            SUBMENU_INDICATOR_BINARY_CUT,
        );
        if classifier::has_lit_pixels(&binary, SUBMENU_INDICATOR_LIT_CUT) {
            return Ok(false);
        }
        let (region, _) = self.layout.strip(true);
        let strip = frames.capture(&region)?;
        let score = strip_similarity(
            &strip,
            &self.submenu_reference,
            self.layout.detection_settings.binary_threshold,
        );
        Ok(score >= self.layout.detection_settings.submenu_match_threshold)
    }

    fn strip_matches(&self, frames: &dyn FrameSource) -> Result<bool, CaptureError> {
        let (region, _) = self.layout.strip(self.state.in_submenu);
        let (reference, threshold) = if self.state.in_submenu {
            (
                &self.submenu_reference,
                self.layout.detection_settings.submenu_match_threshold,
            )
        } else {
            (
                &self.menu_reference,
                self.layout.detection_settings.menu_match_threshold,
            )
        };
        let strip = frames.capture(&region)?;
        let score = strip_similarity(
            &strip,
            reference,
            self.layout.detection_settings.binary_threshold,
        );
        Ok(score >= threshold)
    }

    fn active_tab_name(&self, frames: &dyn FrameSource) -> Result<Option<String>, CaptureError> {
        let (region, num_tabs) = self.layout.strip(self.state.in_submenu);
        let strip = frames.capture(&region)?;
        let settings = &self.layout.detection_settings;
        let segment = lit_segment(
            &classifier::to_gray(&strip),
            num_tabs,
            settings.binary_threshold,
            settings.white_pixel_threshold,
        );
        Ok(segment.and_then(|number| {
            self.layout
                .tab_name_at(self.state.in_submenu, number)
                .map(str::to_string)
        }))
    }

    fn active_sub_tab_name(
        &self,
        frames: &dyn FrameSource,
        detection: &SubTabDetection,
    ) -> Result<Option<String>, CaptureError> {
        let settings = &self.layout.detection_settings;
        for position in &detection.positions {
            let image = frames.capture(&position.region())?;
            if patch_is_lit(
                &image,
                settings.binary_threshold,
                settings.white_pixel_threshold,
            ) {
                return Ok(Some(position.name.clone()));
            }
        }
        Ok(None)
    }

    /// Walk the tab's item list top to bottom and report the first row whose
    /// highlight probe is lit. Null entries occupy a row but are skipped.
    fn scan_items(
        &self,
        frames: &dyn FrameSource,
        tab: &TabSpec,
    ) -> Result<Option<(String, u32)>, CaptureError> {
        let Some(items) = tab.items_for(self.state.active_sub_tab.as_deref(), self.state.in_submenu)
        else {
            return Ok(None);
        };
        let positions = &self.layout.item_detection.positions;
        let start = (tab.start_position as usize).max(1);
        for (index, entry) in items.iter().enumerate() {
            let position_index = start + index - 1;
            if position_index >= positions.len() {
                break;
            }
            let Some(name) = entry else { continue };
            let row = positions[position_index];
            if self.item_row_lit(frames, tab, name, row)? {
                return Ok(Some((name.clone(), row)));
            }
        }
        Ok(None)
    }

    fn item_row_lit(
        &self,
        frames: &dyn FrameSource,
        tab: &TabSpec,
        name: &str,
        row: u32,
    ) -> Result<bool, CaptureError> {
        let check = &self.layout.item_detection.check_region;
        let column = tab.check_column_for(name, check.left);
        let region = Region::new(row, column, check.width, check.height);
        let image = frames.capture(&region)?;
        let settings = &self.layout.detection_settings;
        Ok(patch_is_lit(
            &image,
            settings.binary_threshold,
            settings.white_pixel_threshold,
        ))
    }
}
