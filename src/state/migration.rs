//! Schema migrations
//!
//! Each step transforms the raw stored document from one version to the next.
//! Steps run in sequence starting at the stored version until no step applies;
//! the result is then merged onto defaults and re-tagged with `SCHEMA_VERSION`.

use serde_json::Value;
use tracing::info;

use super::types::SCHEMA_VERSION;

/// Version assumed for documents without `config.version`
pub const UNVERSIONED: &str = "0.0.0";

pub struct MigrationStep {
    pub from: &'static str,
    pub to: &'static str,
    pub apply: fn(&mut Value),
}

/// Known steps, oldest first
pub const MIGRATIONS: &[MigrationStep] = &[MigrationStep {
    from: UNVERSIONED,
    to: SCHEMA_VERSION,
    apply: unversioned_to_v1,
}];

/// Documents written before versioning already have the 1.0.0 layout
fn unversioned_to_v1(_doc: &mut Value) {}

/// Version recorded in a raw document
pub fn stored_version(doc: &Value) -> &str {
    doc.get("config")
        .and_then(|c| c.get("version"))
        .and_then(Value::as_str)
        .unwrap_or(UNVERSIONED)
}

/// Run every applicable step on `doc`; returns the version reached.
///
/// A version with no outgoing step (unknown or newer than this build) stops the
/// chain; the caller still merges and re-tags the document.
pub fn upgrade(doc: &mut Value) -> String {
    let mut version = stored_version(doc).to_string();
    while version != SCHEMA_VERSION {
        let Some(step) = MIGRATIONS.iter().find(|s| s.from == version) else {
            break;
        };
        info!("Migrating app state from v{} to v{}", step.from, step.to);
        (step.apply)(doc);
        version = step.to.to_string();
    }
    version
}
