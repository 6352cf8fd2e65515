pub mod labels;
pub mod menu_layout;
pub mod region;
pub mod settings;
