pub mod console;
pub mod console_authorisation;
pub mod console_template;
pub mod directory_role_binding;
pub mod status;
pub mod subject;

pub use console::{
    condition_types, Console, ConsolePhase, ConsoleSpec, ConsoleStatus,
    DEFAULT_TTL_AFTER_FINISHED_SECONDS, DEFAULT_TTL_BEFORE_RUNNING_SECONDS, MAX_TIMEOUT_SECONDS,
    MAX_TTL_AFTER_FINISHED_SECONDS, MAX_TTL_BEFORE_RUNNING_SECONDS,
};
pub use console_authorisation::{ConsoleAuthorisation, ConsoleAuthorisationSpec};
pub use console_template::{AuthorisationRule, ConsoleTemplate, ConsoleTemplateSpec};
pub use directory_role_binding::{
    DirectoryRoleBinding, DirectoryRoleBindingSpec, DirectoryRoleBindingStatus, RoleRef,
};
pub use subject::{dedup_preserve_order, DirectoryKind, Subject};

/// Labels a pod as belonging to a Console (`spec.md` §6).
pub const CONSOLE_NAME_LABEL: &str = "console.example.io/console-name";

/// Activates priority injection for a namespace (`spec.md` §6).
pub const PRIORITY_INJECTOR_LABEL: &str = "console.example.io/priority-injector";

/// Labels the managed child `RoleBinding` with the owning DRB's name.
pub const DIRECTORY_ROLE_BINDING_LABEL: &str = "console.example.io/directory-role-binding";
