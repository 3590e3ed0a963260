use async_trait::async_trait;

use crate::events::AuditEvent;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publish transport error: {0}")]
    Transport(String),
    #[error("publish timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// `Publish(ctx, event) -> (id, error)` from `spec.md` §6. Transport is
/// best-effort: callers (the [`crate::Recorder`]) never let a publish
/// failure fail the enclosing reconcile or admission request.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, event: &AuditEvent) -> Result<String, PublishError>;
}

/// A publisher that drops events on the floor, for local development and
/// tests that don't care about the audit stream.
pub struct NullPublisher;

#[async_trait]
impl Publisher for NullPublisher {
    async fn publish(&self, event: &AuditEvent) -> Result<String, PublishError> {
        Ok(event.common.id.clone())
    }
}

/// A publisher that records every event it receives, for assertions in
/// reconciler tests.
#[derive(Default)]
pub struct RecordingPublisher {
    pub events: tokio::sync::Mutex<Vec<AuditEvent>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, event: &AuditEvent) -> Result<String, PublishError> {
        self.events.lock().await.push(event.clone());
        Ok(event.common.id.clone())
    }
}
