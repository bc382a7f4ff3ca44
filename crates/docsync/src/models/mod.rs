//! Data models

mod document;
mod lock;
mod project;

pub use document::*;
pub use lock::*;
pub use project::*;
