use std::{collections::HashMap, sync::Arc};

use console_types::{dedup_preserve_order, DirectoryKind, Subject};

use crate::{DirectoryError, DirectoryResolver};

/// Dispatches `MembersOf` calls to the resolver registered for a given
/// subject kind. Subject kinds with no registered resolver pass through
/// unchanged (`spec.md` §4.8 step 2).
#[derive(Clone, Default)]
pub struct Registry {
    resolvers: HashMap<DirectoryKind, Arc<dyn DirectoryResolver>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, kind: DirectoryKind, resolver: Arc<dyn DirectoryResolver>) -> Self {
        self.resolvers.insert(kind, resolver);
        self
    }

    /// Expands a DRB's subject list: resolver-registered kinds are
    /// expanded to `User` subjects via `MembersOf`; other kinds pass
    /// through unchanged. Duplicates are removed, preserving first-seen
    /// order (`spec.md` §4.8 step 2, §8 invariant 3).
    pub async fn expand(&self, subjects: &[Subject]) -> Result<Vec<Subject>, DirectoryError> {
        let mut expanded = Vec::new();
        for subject in subjects {
            match DirectoryKind::matches(&subject.kind).and_then(|kind| self.resolvers.get(&kind)) {
                Some(resolver) => {
                    for user in resolver.members_of(&subject.name).await? {
                        expanded.push(Subject::user(user));
                    }
                }
                None => expanded.push(subject.clone()),
            }
        }
        Ok(dedup_preserve_order(expanded))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as StdHashMap;

    use super::*;
    use crate::fake::StaticResolver;

    #[tokio::test]
    async fn expands_google_groups_and_dedupes() {
        let groups = StdHashMap::from([
            ("all@ex.com".to_string(), vec!["lawrence".to_string()]),
            (
                "platform@ex.com".to_string(),
                vec!["lawrence".to_string(), "chris".to_string()],
            ),
        ]);
        let registry = Registry::new().register(
            DirectoryKind::GoogleGroup,
            Arc::new(StaticResolver::new(groups)),
        );
        let subjects = vec![
            Subject::new("GoogleGroup", "all@ex.com"),
            Subject::new("GoogleGroup", "platform@ex.com"),
            Subject::user("manuel@ex.com"),
        ];
        let expanded = registry.expand(&subjects).await.unwrap();
        let names: Vec<_> = expanded.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["lawrence", "chris", "manuel@ex.com"]);
    }
}
