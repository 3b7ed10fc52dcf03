//! # formbind-core
//!
//! Core types, settings, and error types shared by the formbind crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`value`] - The dynamic [`Value`] model for raw, typed, and display data
//! - [`files`] - Uploaded file representation
//! - [`utils`] - Utility types (`MultiValueDict`)
//! - [`settings`] - Settings and global configuration
//! - [`settings_loader`] - Loading settings from TOML, JSON, and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod files;
pub mod logging;
pub mod settings;
pub mod settings_loader;
pub mod utils;
pub mod value;

// Re-export the most commonly used types at the crate root.
pub use error::{FormError, FormResult, ValidationError};
pub use files::UploadedFile;
pub use settings::{Settings, SETTINGS};
pub use value::{EnumMember, RecordValue, Value};
