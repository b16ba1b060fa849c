pub mod app;
pub mod audio;
pub mod config;
pub mod display;
pub mod geometry;
pub mod layout;
pub mod library;
pub mod model;
pub mod playback;
pub mod render;
pub mod session;
pub mod ui;
