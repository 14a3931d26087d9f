//! Playtime Monitor - automatic playtime tracking by watching running executables.

pub mod config;
pub mod display;
pub mod monitor;
pub mod settings;
pub mod storage;
