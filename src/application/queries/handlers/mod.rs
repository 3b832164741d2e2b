//! Query Handlers 实现

mod stats_handlers;

pub use stats_handlers::*;
