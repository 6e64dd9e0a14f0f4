//! CLI commands module.

mod config;
mod mix;
mod stream;
mod util;

pub use config::ConfigCommand;
pub use mix::MixCommand;
pub use stream::StreamCommand;

pub(crate) use util::*;
