//! Module for all the main functionality of vidfetch

pub mod batch;
pub mod channel;
pub mod convert;
pub mod cookies;
pub mod deps;
pub mod download;
pub mod export;
pub mod rate_limit;
pub mod report;
pub mod retry;
