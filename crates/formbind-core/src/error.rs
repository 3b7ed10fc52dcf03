//! Core error types for formbind.
//!
//! [`FormError`] covers the fatal side of the taxonomy: configuration
//! mistakes made by a form author, failures of the data source that feeds a
//! form, and loading problems with settings. Per-field validation failures
//! are *not* represented here; they travel as data on the fields themselves.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Represents a structured validation failure.
///
/// Record-level validators return this type to describe one or more problems
/// with a whole record. It can carry a single message or a set of per-field
/// messages.
///
/// # Examples
///
/// ```
/// use formbind_core::error::ValidationError;
///
/// let err = ValidationError::new("Passwords do not match.", "mismatch");
/// assert_eq!(err.to_string(), "Passwords do not match.");
///
/// let mut field_errors = std::collections::HashMap::new();
/// field_errors.insert(
///     "email".to_string(),
///     vec![ValidationError::new("Already taken.", "unique")],
/// );
/// let err = ValidationError::with_field_errors(field_errors);
/// assert_eq!(err.to_string(), "email: Already taken.");
/// ```
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The primary error message.
    pub message: String,
    /// A short code identifying the failure (e.g. "required", "mismatch").
    pub code: String,
    /// Additional parameters providing context for the message.
    pub params: HashMap<String, String>,
    /// Per-field errors, keyed by attribute name.
    pub field_errors: HashMap<String, Vec<Self>>,
}

impl ValidationError {
    /// Creates a new `ValidationError` with a message and code.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            params: HashMap::new(),
            field_errors: HashMap::new(),
        }
    }

    /// Creates a `ValidationError` containing per-field errors.
    pub fn with_field_errors(field_errors: HashMap<String, Vec<Self>>) -> Self {
        Self {
            message: String::new(),
            code: String::new(),
            params: HashMap::new(),
            field_errors,
        }
    }

    /// Returns every message carried by this error, with field errors
    /// prefixed by their field name. Field names are visited in sorted order.
    pub fn messages(&self) -> Vec<String> {
        let mut out = Vec::new();
        if !self.message.is_empty() {
            out.push(self.message.clone());
        }
        let mut names: Vec<&String> = self.field_errors.keys().collect();
        names.sort();
        for name in names {
            for error in &self.field_errors[name] {
                for message in error.messages() {
                    out.push(format!("{name}: {message}"));
                }
            }
        }
        out
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages().join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// The primary error type for formbind.
///
/// Only conditions that abort a validation attempt (or prevent a form from
/// being built at all) are represented here.
#[derive(Error, Debug)]
pub enum FormError {
    // ── Configuration ────────────────────────────────────────────────

    /// A setting is missing or could not be loaded.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A field or form was declared incorrectly by its author.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    // ── Request body ─────────────────────────────────────────────────

    /// The submitted body could not be decoded.
    #[error("Bad request: {0}")]
    BadRequest(String),

    // ── Validation ───────────────────────────────────────────────────

    /// A whole form failed validation and the caller asked for a `Result`.
    #[error("Validation error: {0}")]
    Validation(ValidationError),

    // ── Serialization ────────────────────────────────────────────────

    /// A value could not be converted to or from its display form.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // ── Security ─────────────────────────────────────────────────────

    /// A potentially unsafe operation was attempted (e.g. mutating an
    /// immutable query dictionary).
    #[error("Suspicious operation: {0}")]
    SuspiciousOperation(String),
}

impl FormError {
    /// Returns `true` for errors caused by a form author's declaration.
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationError(_) | Self::ImproperlyConfigured(_)
        )
    }
}

/// A convenience type alias for `Result<T, FormError>`.
pub type FormResult<T> = Result<T, FormError>;
