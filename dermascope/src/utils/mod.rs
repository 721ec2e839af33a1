//! Utility modules: error types and logging setup.

pub mod error;
pub mod logging;

pub use error::{DermascopeError, Result};
