//! Downstream notification of scheduled removals.
//!
//! Dataset owners get told which prefixes are about to be moved out, so a
//! surprised owner has a window to intervene. Delivery is best effort;
//! implementations swallow their own failures, a lost notification never
//! blocks a batch.

use async_trait::async_trait;

#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish_scheduled_removal(&self, project_id: &str, bucket: &str, prefixes: &[String]);
}

/// Publisher that only writes to the log. The default until a deployment
/// wires in a real channel.
pub struct LogNotifier;

#[async_trait]
impl NotificationPublisher for LogNotifier {
    async fn publish_scheduled_removal(&self, project_id: &str, bucket: &str, prefixes: &[String]) {
        tracing::info!(
            project_id,
            bucket,
            prefix_count = prefixes.len(),
            "scheduled removal of prefixes"
        );
    }
}
