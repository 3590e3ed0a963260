use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A principal reference: `User`, `Group`, `ServiceAccount`, or a
/// directory-resolvable kind such as `GoogleGroup`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    #[serde(default, rename = "apiGroup", skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl Subject {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            api_group: None,
            kind: kind.into(),
            name: name.into(),
            namespace: None,
        }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self {
            api_group: Some("rbac.authorization.k8s.io".to_string()),
            kind: "User".to_string(),
            name: name.into(),
            namespace: None,
        }
    }

    /// Identity used for set difference: `(kind, name, namespace)`.
    pub fn identity(&self) -> (&str, &str, Option<&str>) {
        (self.kind.as_str(), self.name.as_str(), self.namespace.as_deref())
    }
}

/// Known subject kinds the Directory Resolver can expand. Anything else
/// passes through a [`Subject`] list unchanged.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, JsonSchema)]
pub enum DirectoryKind {
    GoogleGroup,
}

impl DirectoryKind {
    pub fn matches(kind: &str) -> Option<Self> {
        match kind {
            "GoogleGroup" => Some(Self::GoogleGroup),
            _ => None,
        }
    }
}

/// Deduplicate subjects by identity, preserving first-seen order.
pub fn dedup_preserve_order(subjects: Vec<Subject>) -> Vec<Subject> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(subjects.len());
    for subject in subjects {
        let key = (
            subject.kind.clone(),
            subject.name.clone(),
            subject.namespace.clone(),
        );
        if seen.insert(key) {
            out.push(subject);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_seen_order() {
        let a = Subject::user("lawrence@ex.com");
        let b = Subject::user("chris@ex.com");
        let a2 = Subject::user("lawrence@ex.com");
        let out = dedup_preserve_order(vec![a.clone(), b.clone(), a2]);
        assert_eq!(out, vec![a, b]);
    }
}
