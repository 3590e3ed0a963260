use std::time::Duration;

mod error;

pub use error::*;

pub use console_common::colors;
pub use console_common::patch::{patch_status, MANAGER_NAME};

/// The default interval for requeuing a managed resource that has nothing
/// pending (e.g. a Console sitting in `Running`).
pub(crate) const PROBE_INTERVAL: Duration = Duration::from_secs(30);

pub use console_common::hash_spec;
