pub mod app;
pub use app::{AppContext, StartScreen, run};

pub mod config;
pub mod model;
pub mod project;
pub mod utils;

// Platform abstraction layer
pub mod platform;

// Monitoring and control core
pub mod process;

pub mod ui {
    pub mod input;
    pub mod menu;
    pub mod render;
    pub mod terminal;
}

pub mod integrations {
    pub mod docker;
}
