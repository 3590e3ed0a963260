//! Produces structured lifecycle events (request/authorise/start/attach/
//! terminate) with deterministic identifiers, forwarding them to an
//! external publisher. See `spec.md` §4.10.

mod events;
mod publisher;
mod recorder;

pub use events::{
    AuditEvent, CommonEvent, ConsoleAttachSpec, ConsoleAuthoriseSpec, ConsoleRequestSpec,
    ConsoleStartSpec, ConsoleTerminateSpec, EventSpec,
};
pub use publisher::{NullPublisher, PublishError, Publisher, RecordingPublisher};
pub use recorder::{deterministic_id, Recorder};
