use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Ceilings enforced at admission. See `spec.md` §3 and §8.
pub const MAX_TIMEOUT_SECONDS: u32 = 604_800;
pub const DEFAULT_TTL_BEFORE_RUNNING_SECONDS: u32 = 3_600;
pub const MAX_TTL_BEFORE_RUNNING_SECONDS: u32 = 86_400;
pub const DEFAULT_TTL_AFTER_FINISHED_SECONDS: u32 = 86_400;
pub const MAX_TTL_AFTER_FINISHED_SECONDS: u32 = 604_800;

/// A request for an ephemeral interactive session.
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "console.example.io",
    version = "v1",
    kind = "Console",
    plural = "consoles",
    derive = "PartialEq",
    status = "ConsoleStatus",
    namespaced
)]
#[kube(derive = "Default")]
#[kube(printcolumn = "{\"jsonPath\": \".status.phase\", \"name\": \"PHASE\", \"type\": \"string\" }")]
#[kube(printcolumn = "{\"jsonPath\": \".spec.user\", \"name\": \"USER\", \"type\": \"string\" }")]
#[kube(printcolumn = "{\"jsonPath\": \".metadata.creationTimestamp\", \"name\": \"AGE\", \"type\": \"date\" }")]
#[serde(rename_all = "camelCase")]
pub struct ConsoleSpec {
    /// Stamped by the authenticator webhook. Never trust a submitter-supplied value.
    #[serde(default)]
    pub user: String,
    pub reason: String,
    /// Immutable after creation.
    pub console_template_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Disables TTY/STDIN on the first container when `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_interactive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds_before_running: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds_after_finished: Option<u32>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum ConsolePhase {
    PendingAuthorisation,
    Pending,
    Running,
    Stopped,
    Destroyed,
}

impl std::fmt::Display for ConsolePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConsolePhase::PendingAuthorisation => "PendingAuthorisation",
            ConsolePhase::Pending => "Pending",
            ConsolePhase::Running => "Running",
            ConsolePhase::Stopped => "Stopped",
            ConsolePhase::Destroyed => "Destroyed",
        };
        write!(f, "{s}")
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleStatus {
    /// Absent means the Console is still in the `Creating` phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<ConsolePhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_time: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<Time>,
    /// Name of the authorisation rule that governed admission of this Console.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorisation_rule: Option<String>,
    /// Set once the `ConsoleRequest` audit event has been emitted, so the
    /// authenticator webhook's emission is never duplicated by the reconciler.
    #[serde(default)]
    pub request_event_emitted: bool,
    #[serde(default)]
    pub start_event_emitted: bool,
    #[serde(default)]
    pub terminate_event_emitted: bool,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, rename = "lastUpdated", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Time>,
}

pub mod condition_types {
    pub const READY: &str = "Ready";
    pub const AUTHORISED: &str = "Authorised";
    pub const FAILED: &str = "Failed";
}
