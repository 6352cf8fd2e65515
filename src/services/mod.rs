pub mod assets;
pub mod audio;
pub mod classifier;
pub mod confirm;
pub mod health_tracker;
pub mod monitor;
pub mod option_detection;
pub mod screen_capture;
pub mod training_menu;
pub mod vs_screen;
pub mod wizard;
