//! Library of "vidfetch", contains all the logic needed for the binary
//!
//! Everything that touches media is delegated to `yt-dlp` and `ffmpeg`, this library only
//! assembles their arguments, sequences the calls and keeps track of the results.

#![allow(clippy::needless_return)]
#![allow(special_module_name)] // because of module "main", dont have a better name for that
#![warn(clippy::implicit_return)]

#[macro_use]
extern crate log;

pub mod data;
pub mod error;
pub mod main;
pub mod spawn;
pub mod traits;
pub mod utils;
pub use error::Error;

pub use chrono;
