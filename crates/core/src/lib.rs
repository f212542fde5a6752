//! # Polygon Core
//!
//! Core types, traits, and error handling for polygon.
//!
//! This crate provides the foundational building blocks used by the parser,
//! the configuration store and the generators:
//!
//! - **Types**: SQL type classification and host-language (Go) types
//! - **Naming**: singular/plural forms and snake/camel/pascal case
//! - **Traits**: `Validatable`
//! - **Errors**: Unified error handling with `EngineError` and `EngineResult`
//! - **FS**: atomic write-then-rename file output
//!

pub mod error;
pub mod fs;
pub mod naming;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{EngineError, EngineResult, ResultExt};
pub use traits::Validatable;
pub use types::{DEFAULT_DIALECT, GoType, SqlType};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
