//! Core module - Configuration, settings, and host events

pub mod config;
pub mod events;
pub mod settings;
