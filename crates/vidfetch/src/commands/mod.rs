//! Module for all (longer) commands

pub mod channel;
pub mod completions;
pub mod cookies;
pub mod deps;
pub mod download;
pub mod progress;
