//! # formbind
//!
//! Schema-driven form fields with nested data binding and validation.
//!
//! This is the meta-crate that re-exports the sub-crates for convenient
//! access. Depend on `formbind` for everything, or on individual crates
//! for finer-grained control.

/// Errors, settings, logging and the dynamic value model.
pub use formbind_core as core;

/// Request and form-data decoding.
#[cfg(feature = "http")]
pub use formbind_http as http;

/// Fields, schemas, validation and the form manager.
#[cfg(feature = "forms")]
pub use formbind_forms as forms;

/// Commonly used items across the workspace.
pub mod prelude {
    pub use formbind_core::{FormError, FormResult, Settings, Value};

    #[cfg(feature = "forms")]
    pub use formbind_forms::prelude::*;

    #[cfg(feature = "http")]
    pub use formbind_http::{HttpRequest, QueryDict};
}

/// Loads settings from a TOML file (environment overrides applied),
/// installs them globally and sets up logging.
///
/// Meant for application start-up; returns `anyhow` errors with the file
/// path attached.
///
/// # Examples
///
/// ```no_run
/// fn main() -> anyhow::Result<()> {
///     formbind::init_from_file("formbind.toml")?;
///     Ok(())
/// }
/// ```
pub fn init_from_file(
    path: impl AsRef<std::path::Path>,
) -> anyhow::Result<&'static formbind_core::Settings> {
    use anyhow::Context;

    let path = path.as_ref();
    anyhow::ensure!(!formbind_core::SETTINGS.is_configured(), "settings are already configured");
    let settings = formbind_core::settings_loader::from_toml_file_with_env(path)
        .with_context(|| format!("loading settings from {}", path.display()))?;
    formbind_core::logging::setup_logging(&settings);
    formbind_core::SETTINGS.configure(settings);
    Ok(formbind_core::SETTINGS.get())
}
