use tracing::{debug, info};

use crate::{Capabilities, ClientMessage, ServiceWorkerError, WorkerConfig};

/// What a control message did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    SkipWaiting,
    Ignored,
}

/// React to a message posted by a page.
///
/// Only `{"action": "<skip_waiting_action>"}` has an effect.
pub async fn handle_message(
    message: ClientMessage,
    config: &WorkerConfig,
    caps: &Capabilities,
) -> Result<MessageOutcome, ServiceWorkerError> {
    if message.action() != Some(config.skip_waiting_action.as_str()) {
        debug!(source = ?message.source, "Ignoring message");
        return Ok(MessageOutcome::Ignored);
    }

    info!("Skipping waiting phase");
    caps.clients.skip_waiting().await?;
    Ok(MessageOutcome::SkipWaiting)
}
