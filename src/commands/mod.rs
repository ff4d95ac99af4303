//! Commands module
//!
//! Operations exposed by the `docamy` binary. Each returns a serializable value
//! (printed as JSON) or an error message.

pub mod remote;
pub mod storage;
pub mod webhook;

pub use remote::*;
pub use storage::*;
pub use webhook::*;

use crate::config::{open_store, Settings, SharedStore};

/// Shared state for one command invocation
pub struct AppContext {
    pub settings: Settings,
    pub store: SharedStore,
}

impl AppContext {
    /// Open the configured store and initialize it
    pub fn open(settings: Settings) -> Result<Self, String> {
        let store = open_store(&settings).map_err(|e| e.to_string())?;
        store.init();
        Ok(Self { settings, store })
    }
}
