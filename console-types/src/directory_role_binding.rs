use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::subject::Subject;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleRef {
    #[serde(default, rename = "apiGroup")]
    pub api_group: String,
    pub kind: String,
    pub name: String,
}

/// Declares a RoleBinding whose group subjects should be expanded through
/// a directory. At most one managed child RoleBinding per DRB, sharing its
/// namespace and name, owned by the DRB.
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "console.example.io",
    version = "v1",
    kind = "DirectoryRoleBinding",
    plural = "directoryrolebindings",
    shortname = "drb",
    derive = "PartialEq",
    status = "DirectoryRoleBindingStatus",
    namespaced
)]
#[kube(derive = "Default")]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRoleBindingSpec {
    pub role_ref: RoleRef,
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

/// No attributes beyond the managed child RoleBinding (`spec.md` §3); the
/// conditions list exists purely to surface External-Fatal configuration
/// errors (e.g. an immutable `roleRef` mismatch) per `spec.md` §7.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRoleBindingStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, rename = "lastUpdated", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Time>,
}
