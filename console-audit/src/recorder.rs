use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use owo_colors::OwoColorize;

use crate::events::{
    AuditEvent, CommonEvent, ConsoleAttachSpec, ConsoleAuthoriseSpec, ConsoleRequestSpec,
    ConsoleStartSpec, ConsoleTerminateSpec, EventSpec,
};
use crate::publisher::Publisher;

const API_VERSION: &str = "audit.console.example.io/v1";

/// `YYYYMMDDHHMMSS-<context>-<namespace>-<console>` (`spec.md` §4.10, §6).
/// Deterministic in `creation_time` (the Console's immutable creation
/// timestamp), not wall-clock time, so publishing the same event twice
/// produces the same id (`spec.md` §8).
pub fn deterministic_id(
    creation_time: DateTime<Utc>,
    context: &str,
    namespace: &str,
    console: &str,
) -> String {
    format!(
        "{}-{}-{}-{}",
        creation_time.format("%Y%m%d%H%M%S"),
        context,
        namespace,
        console
    )
}

/// Produces structured lifecycle events and forwards them to a
/// [`Publisher`]. Publish failures are counted and logged, never
/// propagated (`spec.md` §4.10).
pub struct Recorder {
    publisher: Arc<dyn Publisher>,
}

impl Recorder {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }

    fn common(&self, creation_time: DateTime<Utc>, context: &str, namespace: &str, console: &str, event: &str) -> CommonEvent {
        CommonEvent {
            api_version: API_VERSION.to_string(),
            kind: "ConsoleEvent".to_string(),
            event: event.to_string(),
            observed_at: Utc::now(),
            id: deterministic_id(creation_time, context, namespace, console),
            annotations: BTreeMap::new(),
        }
    }

    async fn emit(&self, event: AuditEvent) {
        let name = event.spec.name();
        match self.publisher.publish(&event).await {
            Ok(_id) => {
                counter!("events_published_total", "event" => name).increment(1);
            }
            Err(err) => {
                counter!("events_published_errors_total", "event" => name).increment(1);
                eprintln!(
                    "{}",
                    format!("⚠️ failed to publish {name} audit event: {err}").yellow()
                );
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn console_request(
        &self,
        creation_time: DateTime<Utc>,
        namespace: &str,
        console: &str,
        reason: &str,
        username: &str,
        console_template: &str,
        required_authorisations: u32,
        labels: BTreeMap<String, String>,
    ) {
        let common = self.common(creation_time, "request", namespace, console, "ConsoleRequest");
        let spec = ConsoleRequestSpec {
            reason: reason.to_string(),
            username: username.to_string(),
            context: "request".to_string(),
            namespace: namespace.to_string(),
            console_template: console_template.to_string(),
            console: console.to_string(),
            required_authorisations,
            timestamp: Utc::now(),
            labels,
        };
        self.emit(AuditEvent {
            common,
            spec: EventSpec::ConsoleRequest(spec),
        })
        .await;
    }

    pub async fn console_authorise(
        &self,
        creation_time: DateTime<Utc>,
        namespace: &str,
        console: &str,
        username: &str,
    ) {
        let common = self.common(creation_time, "authorise", namespace, console, "ConsoleAuthorise");
        self.emit(AuditEvent {
            common,
            spec: EventSpec::ConsoleAuthorise(ConsoleAuthoriseSpec {
                username: username.to_string(),
            }),
        })
        .await;
    }

    pub async fn console_start(&self, creation_time: DateTime<Utc>, namespace: &str, console: &str, job: &str) {
        let common = self.common(creation_time, "start", namespace, console, "ConsoleStart");
        self.emit(AuditEvent {
            common,
            spec: EventSpec::ConsoleStart(ConsoleStartSpec { job: job.to_string() }),
        })
        .await;
    }

    pub async fn console_attach(
        &self,
        creation_time: DateTime<Utc>,
        namespace: &str,
        console: &str,
        username: &str,
        pod: &str,
        container: &str,
    ) {
        let common = self.common(creation_time, "attach", namespace, console, "ConsoleAttach");
        self.emit(AuditEvent {
            common,
            spec: EventSpec::ConsoleAttach(ConsoleAttachSpec {
                username: username.to_string(),
                pod: pod.to_string(),
                container: container.to_string(),
            }),
        })
        .await;
    }

    pub async fn console_terminate(
        &self,
        creation_time: DateTime<Utc>,
        namespace: &str,
        console: &str,
        timed_out: bool,
        container_statuses: BTreeMap<String, String>,
    ) {
        let common = self.common(creation_time, "terminate", namespace, console, "ConsoleTerminate");
        self.emit(AuditEvent {
            common,
            spec: EventSpec::ConsoleTerminate(ConsoleTerminateSpec {
                timed_out,
                container_statuses,
            }),
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::RecordingPublisher;

    fn t() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-07-27T12:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn id_is_deterministic_in_creation_time_not_wall_clock() {
        let a = deterministic_id(t(), "request", "default", "my-console");
        let b = deterministic_id(t(), "request", "default", "my-console");
        assert_eq!(a, b);
        assert_eq!(a, "20260727120000-request-default-my-console");
    }

    #[tokio::test]
    async fn publishing_twice_is_idempotent_by_id() {
        let publisher = Arc::new(RecordingPublisher::default());
        let recorder = Recorder::new(publisher.clone());
        recorder
            .console_start(t(), "default", "my-console", "my-console-job")
            .await;
        recorder
            .console_start(t(), "default", "my-console", "my-console-job")
            .await;
        let events = publisher.events.lock().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].common.id, events[1].common.id);
    }
}
