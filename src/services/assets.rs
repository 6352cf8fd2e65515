//! Locates and loads everything the detectors need at startup.
//!
//! The resource root is the executable's directory. Label template sets
//! (controls, ranks, divisions, master rating) are required and fail the
//! startup when incomplete. Character templates, the stored player name,
//! and the menu layout bundle are all optional; what is missing simply
//! disables the matching feature.
//!
//! Layout on disk:
//!   templates/{controls,ranks,divisions,mr}/<label>.png
//!   media/...                      audio cues
//!   media/characters/{left,right}/<name>.png   character templates
//!   media/menu/<image>.png         option reference images
//!   MyName.png                     player name template (wizard output)
//!   training_menu_config.json      menu layout

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};
use tracing::{debug, info, warn};

use crate::config::{
    CHARACTERS_SUBDIR, MEDIA_DIR, MENU_LAYOUT_FILE, MENU_SUBDIR, PLAYER_NAME_FILE,
};
use crate::error::AssetError;
use crate::models::labels::{ControlScheme, Division, MrBracket, Rank};
use crate::models::menu_layout::MenuLayout;
use crate::models::region::Side;
use crate::services::classifier::TemplateSet;

const TEMPLATES_DIR: &str = "templates";
const CONTROLS_SUBDIR: &str = "controls";
const RANKS_SUBDIR: &str = "ranks";
const DIVISIONS_SUBDIR: &str = "divisions";
const MR_SUBDIR: &str = "mr";

#[derive(Debug)]
pub struct AssetLibrary {
    pub resource_root: PathBuf,
    pub media_root: PathBuf,
    pub controls: TemplateSet<ControlScheme>,
    pub ranks: TemplateSet<Rank>,
    pub divisions: TemplateSet<Division>,
    pub mr_brackets: TemplateSet<MrBracket>,
    /// Per-side character templates; empty sets disable character cues.
    pub characters: [TemplateSet<String>; 2],
    /// Stored player name plate; None until the wizard has run.
    pub player_name: Option<GrayImage>,
    /// Menu layout bundle; None disables menu navigation.
    pub menu: Option<MenuAssets>,
}

#[derive(Debug)]
pub struct MenuAssets {
    pub layout: MenuLayout,
    pub menu_reference: GrayImage,
    pub submenu_reference: GrayImage,
    /// Option reference images keyed by option key.
    pub option_images: HashMap<String, RgbImage>,
}

/// The directory holding templates, media, and config: next to the
/// executable, with the working directory as fallback.
pub fn resource_root() -> Result<PathBuf, AssetError> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            return Ok(dir.to_path_buf());
        }
    }
    std::env::current_dir().map_err(|e| AssetError::ResourceDir(e.to_string()))
}

impl AssetLibrary {
    pub fn load() -> Result<Self, AssetError> {
        let root = resource_root()?;
        Self::load_from(&root)
    }

    pub fn load_from(resource_root: &Path) -> Result<Self, AssetError> {
        info!(root = %resource_root.display(), "loading assets");
        let media_root = resource_root.join(MEDIA_DIR);
        let templates = resource_root.join(TEMPLATES_DIR);

        let controls = labeled_set(&templates.join(CONTROLS_SUBDIR), &ControlScheme::ALL, |c| {
            c.label()
        })?;
        let ranks = labeled_set(&templates.join(RANKS_SUBDIR), &Rank::ALL, |r| r.label())?;
        let divisions = labeled_set(&templates.join(DIVISIONS_SUBDIR), &Division::ALL, |d| {
            d.template_stem()
        })?;
        let mr_brackets = labeled_set(&templates.join(MR_SUBDIR), &MrBracket::ALL, |m| m.label())?;

        let characters_root = media_root.join(CHARACTERS_SUBDIR);
        let characters = [
            character_set(&characters_root.join(Side::Left.label())),
            character_set(&characters_root.join(Side::Right.label())),
        ];

        let player_name_path = resource_root.join(PLAYER_NAME_FILE);
        let player_name = if player_name_path.exists() {
            match load_gray(&player_name_path) {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!(error = %e, "stored player name unreadable, the wizard will rebuild it");
                    None
                }
            }
        } else {
            None
        };

        let menu = load_menu(resource_root, &media_root);

        Ok(Self {
            resource_root: resource_root.to_path_buf(),
            media_root,
            controls,
            ranks,
            divisions,
            mr_brackets,
            characters,
            player_name,
            menu,
        })
    }

    pub fn player_name_path(&self) -> PathBuf {
        self.resource_root.join(PLAYER_NAME_FILE)
    }
}

fn load_gray(path: &Path) -> Result<GrayImage, AssetError> {
    if !path.exists() {
        return Err(AssetError::MissingImage(path.to_path_buf()));
    }
    let image = image::open(path).map_err(|e| AssetError::ImageDecode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(image.to_luma8())
}

fn load_rgb(path: &Path) -> Result<RgbImage, AssetError> {
    if !path.exists() {
        return Err(AssetError::MissingImage(path.to_path_buf()));
    }
    let image = image::open(path).map_err(|e| AssetError::ImageDecode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(image.to_rgb8())
}

/// Load one template per label from `dir`, named `<stem>.png`. Every label
/// must be present.
fn labeled_set<T: Copy>(
    dir: &Path,
    labels: &[T],
    stem: impl Fn(&T) -> &'static str,
) -> Result<TemplateSet<T>, AssetError> {
    let mut set = TemplateSet::new();
    for label in labels {
        let path = dir.join(format!("{}.png", stem(label)));
        set.push(*label, load_gray(&path)?);
    }
    debug!(dir = %dir.display(), count = set.len(), "templates loaded");
    Ok(set)
}

/// Scan a directory of character templates named `<Character>.png`.
/// Unreadable files are skipped so one bad template does not take the
/// feature down.
fn character_set(dir: &Path) -> TemplateSet<String> {
    let mut set = TemplateSet::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        debug!(dir = %dir.display(), "no character template directory");
        return set;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("png") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match load_gray(&path) {
            Ok(image) => set.push(name.to_string(), image),
            Err(e) => warn!(error = %e, "skipping unreadable character template"),
        }
    }
    info!(dir = %dir.display(), count = set.len(), "character templates loaded");
    set
}

/// Menu navigation needs the layout file, both strip references, and any
/// option images the layout names. Anything unusable downgrades to running
/// without menu support.
fn load_menu(resource_root: &Path, media_root: &Path) -> Option<MenuAssets> {
    let layout_path = resource_root.join(MENU_LAYOUT_FILE);
    let raw = match std::fs::read_to_string(&layout_path) {
        Ok(raw) => raw,
        Err(e) => {
            info!(path = %layout_path.display(), error = %e, "menu navigation disabled");
            return None;
        }
    };
    let layout = match MenuLayout::from_json(&raw) {
        Ok(layout) => layout,
        Err(e) => {
            warn!(error = %e, "menu layout rejected, menu navigation disabled");
            return None;
        }
    };

    let menu_reference = match load_gray(&resource_root.join(&layout.tab_detection.reference_image))
    {
        Ok(image) => image,
        Err(e) => {
            warn!(error = %e, "menu strip reference unusable, menu navigation disabled");
            return None;
        }
    };
    let submenu_reference =
        match load_gray(&resource_root.join(&layout.submenu_detection.reference_image)) {
            Ok(image) => image,
            Err(e) => {
                warn!(error = %e, "submenu strip reference unusable, menu navigation disabled");
                return None;
            }
        };

    let mut option_images = HashMap::new();
    let menu_media = media_root.join(MENU_SUBDIR);
    for (key, def) in &layout.option_definitions {
        let Some(image_name) = &def.image else { continue };
        match load_rgb(&menu_media.join(image_name)) {
            Ok(image) => {
                option_images.insert(key.clone(), image);
            }
            Err(e) => warn!(option = key.as_str(), error = %e, "skipping unreadable option image"),
        }
    }

    info!(
        tabs = layout.tabs.len(),
        option_images = option_images.len(),
        "menu layout loaded"
    );
    Some(MenuAssets {
        layout,
        menu_reference,
        submenu_reference,
        option_images,
    })
}
