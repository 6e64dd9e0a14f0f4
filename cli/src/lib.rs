//! CLI utilities for pcmix.
//!
//! This crate provides configuration profiles, job loading and output
//! helpers shared by the pcmix binary.

pub mod config;
pub mod job;
pub mod output;

pub use config::{Config, Profile, load_config};
pub use job::{Fade, Job, JobError, JobSource};
pub use output::{Output, OutputFormat, pcm_writer};
