mod error;

pub use error::*;

pub use console_common::colors;
