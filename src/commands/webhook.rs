//! Webhook payload command

use std::path::Path;

use crate::tavus::{log_webhook_event, WebhookEvent};

/// Parse a webhook payload saved to `path` and log it
pub fn handle_webhook(path: &Path) -> Result<WebhookEvent, String> {
    let body = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let event = WebhookEvent::parse(&body)
        .map_err(|e| format!("Invalid webhook payload in {}: {}", path.display(), e))?;
    log_webhook_event(&event);
    Ok(event)
}
