//! Module for all data structures that get (de)serialized or passed between modules

pub mod channel;
pub mod job_state;
pub mod video_info;
