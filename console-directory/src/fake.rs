use std::collections::HashMap;

use async_trait::async_trait;

use crate::{DirectoryError, DirectoryResolver};

/// A resolver backed by a fixed in-memory map, used in tests and local
/// development in place of a real directory adapter.
#[derive(Default, Clone)]
pub struct StaticResolver {
    groups: HashMap<String, Vec<String>>,
}

impl StaticResolver {
    pub fn new(groups: HashMap<String, Vec<String>>) -> Self {
        Self { groups }
    }
}

#[async_trait]
impl DirectoryResolver for StaticResolver {
    async fn members_of(&self, group_name: &str) -> Result<Vec<String>, DirectoryError> {
        self.groups.get(group_name).cloned().ok_or_else(|| DirectoryError::Lookup {
            group: group_name.to_string(),
            message: "unknown group".to_string(),
        })
    }
}
