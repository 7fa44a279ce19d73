//! Module for traits the binary implements to configure the library

pub mod download_options;
