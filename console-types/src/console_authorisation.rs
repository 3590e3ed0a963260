use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::subject::Subject;

/// Accumulates approvals for one Console. Created lazily alongside the
/// Console it authorises, same name and namespace, owned by it.
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "console.example.io",
    version = "v1",
    kind = "ConsoleAuthorisation",
    plural = "consoleauthorisations",
    derive = "PartialEq",
    namespaced
)]
#[kube(derive = "Default")]
#[serde(rename_all = "camelCase")]
pub struct ConsoleAuthorisationSpec {
    /// Immutable: the Console this authorisation applies to.
    pub console_ref: String,
    /// Ordered set of approving subjects. Admission-enforced: grows by
    /// exactly one subject per update (see `spec.md` §4.4).
    #[serde(default)]
    pub authorisations: Vec<Subject>,
}
