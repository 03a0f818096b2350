//! # Error Types
//!
//! Domain-specific error types for studio-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  studio-core errors (this file)                                        │
//! │  ├── ValidationError   - One field failed one rule                     │
//! │  ├── ValidationErrors  - Field-keyed report for a whole input          │
//! │  └── CoreError         - Report or exhausted SKU allocation            │
//! │                                                                         │
//! │  studio-db errors (separate crate)                                     │
//! │  └── DbError           - NotFound, Conflict, Validation, storage       │
//! │                                                                         │
//! │  Flow: ValidationError → ValidationErrors → DbError → API layer        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Every `-N` suffix up to the cap was already taken.
    #[error("Could not allocate a unique SKU for '{base}' after {attempts} attempts")]
    AllocationExhausted { base: String, attempts: u32 },

    /// Input failed field validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

// =============================================================================
// Validation Error
// =============================================================================

/// A single field failing a single rule.
///
/// Every variant carries the field name so the API layer can attach the
/// message to the right form input.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A major-unit money string could not be converted to cents.
    #[error("{field} is not a valid money amount: {reason}")]
    InvalidMoney { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate SKU or email).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// A referenced row does not exist.
    #[error("{field} references unknown id '{id}'")]
    UnknownReference { field: String, id: String },

    /// Field cannot change after the row was created.
    #[error("{field} cannot be changed once assigned")]
    Immutable { field: String },
}

impl ValidationError {
    /// Name of the field this error belongs to.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::InvalidMoney { field, .. }
            | ValidationError::NotAllowed { field, .. }
            | ValidationError::Duplicate { field, .. }
            | ValidationError::UnknownReference { field, .. }
            | ValidationError::Immutable { field } => field,
        }
    }

    fn field_mut(&mut self) -> &mut String {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::InvalidMoney { field, .. }
            | ValidationError::NotAllowed { field, .. }
            | ValidationError::Duplicate { field, .. }
            | ValidationError::UnknownReference { field, .. }
            | ValidationError::Immutable { field } => field,
        }
    }
}

// =============================================================================
// Validation Report
// =============================================================================

/// Every field error found in one input, in the order they were detected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// Creates an empty report.
    pub fn new() -> Self {
        ValidationErrors(Vec::new())
    }

    /// Adds an error to the report.
    pub fn push(&mut self, err: ValidationError) {
        self.0.push(err);
    }

    /// Records the error of a failed check, ignoring successes.
    pub fn check(&mut self, result: Result<(), ValidationError>) {
        if let Err(err) = result {
            self.0.push(err);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    /// Returns the first error recorded against `field`.
    pub fn get(&self, field: &str) -> Option<&ValidationError> {
        self.0.iter().find(|e| e.field() == field)
    }

    /// Whether any error was recorded against `field`.
    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Re-keys every error under `prefix`, e.g. `variants[1].option_label`.
    ///
    /// Used when one write carries nested rows.
    pub fn prefixed(mut self, prefix: &str) -> Self {
        for err in &mut self.0 {
            let field = err.field_mut();
            *field = format!("{prefix}.{field}");
        }
        self
    }

    /// Moves every error of `other` into this report.
    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    /// `Ok(())` when nothing was recorded, otherwise the report itself.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(err: ValidationError) -> Self {
        ValidationErrors(vec![err])
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
