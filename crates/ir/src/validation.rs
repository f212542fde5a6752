//! Validation results
//!
//! Table-level configuration checks collect every problem they find
//! before the pipeline decides whether a connection can be generated.

use polygon_core::{EngineError, EngineResult};

// ============================================================================
// ValidationResult
// ============================================================================

/// Result of a validation operation
#[derive(Debug)]
pub struct ValidationResult {
    /// Whether the validation passed
    pub valid: bool,

    /// Errors, each naming the offending identifier
    pub errors: Vec<EngineError>,

    /// Non-fatal issues
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Create a successful validation result
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Create a failed validation result with an error
    pub fn error(error: EngineError) -> Self {
        let mut result = Self::ok();
        result.add_error(error);
        result
    }

    /// Add an error to the result
    pub fn add_error(&mut self, error: EngineError) {
        self.valid = false;
        self.errors.push(error);
    }

    /// Add a warning to the result
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Merge another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Convert to EngineResult, failing with the first error
    pub fn to_result(self) -> EngineResult<()> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::ok()
    }
}

// ============================================================================
// Tests
// ============================================================================
