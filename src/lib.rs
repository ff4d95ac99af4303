//! DocAmy - local persistent state store and Tavus conversation client
//!
//! The core is `state::AppStore`: a write-through store holding preferences,
//! API settings and a bounded conversation/message history in a pluggable
//! `persistence` substrate.

pub mod commands;
pub mod config;
pub mod persistence;
pub mod session;
pub mod state;
pub mod tavus;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber (`RUST_LOG`, default `info`), logging to stderr
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
