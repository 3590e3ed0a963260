use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Preamble shared by every audit event shape (`spec.md` §4.10).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommonEvent {
    pub api_version: String,
    pub kind: String,
    pub event: String,
    pub observed_at: DateTime<Utc>,
    pub id: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleRequestSpec {
    pub reason: String,
    pub username: String,
    pub context: String,
    pub namespace: String,
    pub console_template: String,
    pub console: String,
    pub required_authorisations: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleAuthoriseSpec {
    pub username: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleStartSpec {
    pub job: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleAttachSpec {
    pub username: String,
    pub pod: String,
    pub container: String,
}

/// The richer `ConsoleTerminate` variant (`container_statuses` present), as
/// recommended by `spec.md` §9's resolution of the source's disagreement
/// between event shapes.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleTerminateSpec {
    pub timed_out: bool,
    #[serde(default)]
    pub container_statuses: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum EventSpec {
    ConsoleRequest(ConsoleRequestSpec),
    ConsoleAuthorise(ConsoleAuthoriseSpec),
    ConsoleStart(ConsoleStartSpec),
    ConsoleAttach(ConsoleAttachSpec),
    ConsoleTerminate(ConsoleTerminateSpec),
}

impl EventSpec {
    pub fn name(&self) -> &'static str {
        match self {
            EventSpec::ConsoleRequest(_) => "ConsoleRequest",
            EventSpec::ConsoleAuthorise(_) => "ConsoleAuthorise",
            EventSpec::ConsoleStart(_) => "ConsoleStart",
            EventSpec::ConsoleAttach(_) => "ConsoleAttach",
            EventSpec::ConsoleTerminate(_) => "ConsoleTerminate",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AuditEvent {
    #[serde(flatten)]
    pub common: CommonEvent,
    pub spec: EventSpec,
}
