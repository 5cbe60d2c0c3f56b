pub mod config;
pub mod menu;
pub mod projection;
pub mod render;
pub mod theme;
