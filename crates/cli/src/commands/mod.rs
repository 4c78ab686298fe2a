//! Subcommand implementations

pub mod browse;
pub mod config;
pub mod doctor;
pub mod post;
pub mod wiring;
