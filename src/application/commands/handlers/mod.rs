//! Command Handlers 实现

mod playback_handlers;

pub use playback_handlers::*;
