use k8s_openapi::api::core::v1::PodTemplateSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::subject::Subject;

/// A single authorisation rule: `(name, matchCommandElements[], authorisationsRequired, subjects[])`.
/// See `spec.md` §3 and §4.3.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorisationRule {
    pub name: String,
    /// Non-empty. Each element is a literal, `*` (any single element), or
    /// `**` (any suffix, valid only as the last element).
    pub match_command_elements: Vec<String>,
    #[serde(default)]
    pub authorisations_required: u32,
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

/// A named, validated blueprint for a Console.
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "console.example.io",
    version = "v1",
    kind = "ConsoleTemplate",
    plural = "consoletemplates",
    derive = "PartialEq",
    namespaced
)]
#[kube(derive = "Default")]
#[serde(rename_all = "camelCase")]
pub struct ConsoleTemplateSpec {
    /// Preserves unknown metadata verbatim (it is a native Kubernetes type).
    pub template: PodTemplateSpec,
    #[serde(default)]
    pub default_command: Option<Vec<String>>,
    pub default_timeout_seconds: u32,
    pub max_timeout_seconds: u32,
    #[serde(default)]
    pub default_ttl_seconds_before_running: Option<u32>,
    #[serde(default)]
    pub default_ttl_seconds_after_finished: Option<u32>,
    /// Subjects always permitted to attach, in addition to the Console's owner.
    #[serde(default)]
    pub additional_attach_subjects: Vec<Subject>,
    /// Evaluated in order against the effective command; see `spec.md` §4.3.
    #[serde(default)]
    pub authorisation_rules: Vec<AuthorisationRule>,
    /// Required if `authorisation_rules` is non-empty.
    #[serde(default)]
    pub default_authorisation_rule: Option<AuthorisationRule>,
}
