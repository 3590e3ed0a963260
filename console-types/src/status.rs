use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

use crate::console::{Console, ConsoleStatus};
use crate::directory_role_binding::{DirectoryRoleBinding, DirectoryRoleBindingStatus};

/// Implemented by every CRD kind that carries a status subresource, so a
/// single `patch_status` helper (see `console-common`) can work across all
/// of them.
pub trait Object<S: Status> {
    fn mut_status(&mut self) -> &mut S;
}

pub trait Status {
    fn set_last_updated(&mut self, last_updated: Time);
}

impl Object<ConsoleStatus> for Console {
    fn mut_status(&mut self) -> &mut ConsoleStatus {
        self.status.get_or_insert_with(Default::default)
    }
}

impl Status for ConsoleStatus {
    fn set_last_updated(&mut self, last_updated: Time) {
        self.last_updated = Some(last_updated);
    }
}

impl Object<DirectoryRoleBindingStatus> for DirectoryRoleBinding {
    fn mut_status(&mut self) -> &mut DirectoryRoleBindingStatus {
        self.status.get_or_insert_with(Default::default)
    }
}

impl Status for DirectoryRoleBindingStatus {
    fn set_last_updated(&mut self, last_updated: Time) {
        self.last_updated = Some(last_updated);
    }
}
