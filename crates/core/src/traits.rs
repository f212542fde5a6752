//! Core traits for polygon
//!
//! This module defines the behaviours shared across the engine's crates.

use crate::error::EngineResult;

// ============================================================================
// Validatable Trait
// ============================================================================

/// Trait for types that can be validated
///
/// Types implementing this trait can check their internal consistency
/// and return validation errors if the state is invalid.
///
/// # Example
///
/// ```rust,ignore
/// use polygon_core::{EngineError, EngineResult, Validatable};
///
/// struct Addition {
///     name: String,
///     type_name: String,
/// }
///
/// impl Validatable for Addition {
///     fn validate(&self) -> EngineResult<()> {
///         if self.type_name.is_empty() {
///             return Err(EngineError::config(format!("addition '{}' has no type", self.name)));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Validatable {
    /// Validate the current state of the object
    ///
    /// Returns `Ok(())` if valid, or an `EngineError` describing the problem.
    fn validate(&self) -> EngineResult<()>;

    /// Check if the object is valid without returning error details
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Get all validation errors (for types that can have multiple errors)
    fn validation_errors(&self) -> Vec<String> {
        match self.validate() {
            Ok(()) => vec![],
            Err(e) => vec![e.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineError;

    struct NonEmpty(&'static str);

    impl Validatable for NonEmpty {
        fn validate(&self) -> EngineResult<()> {
            if self.0.is_empty() {
                return Err(EngineError::config("value is empty"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_default_methods() {
        assert!(NonEmpty("users").is_valid());
        assert!(NonEmpty("users").validation_errors().is_empty());

        let errors = NonEmpty("").validation_errors();
        assert_eq!(errors, vec!["Invalid configuration: value is empty".to_string()]);
    }
}
