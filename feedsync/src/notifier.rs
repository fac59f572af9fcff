use async_trait::async_trait;

use feedsync_core::contract::{CapabilityError, ProgressEvent, ProgressNotifier};

/// Progress notifier that writes structured events to the log. Stands in for
/// the admin UI's live progress stream, which is not this binary's concern.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl ProgressNotifier for LogNotifier {
    async fn send(&self, shop: &str, event: ProgressEvent) -> Result<(), CapabilityError> {
        let payload = serde_json::to_string(&event)?;
        tracing::info!(shop, event = event.kind(), payload = %payload, "[NOTIFY] Progress");
        Ok(())
    }
}
