pub mod config;
pub mod display;
