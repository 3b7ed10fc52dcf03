//! Settings for formbind.
//!
//! [`Settings`] holds the knobs that influence form processing and logging.
//! [`SETTINGS`] is a lazily-initialized global that applications configure
//! once at startup; library code reads it through [`current`], which falls
//! back to the defaults when nothing has been configured.

use std::collections::HashMap;
use std::sync::OnceLock;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// The complete set of formbind settings.
///
/// # Examples
///
/// ```
/// use formbind_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.validate_on_write);
/// assert_eq!(settings.write_methods, vec!["POST", "PUT", "PATCH"]);
/// assert_eq!(settings.choice_preview_limit, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled. Controls the log format.
    pub debug: bool,

    // ── Forms ────────────────────────────────────────────────────────

    /// Default for new form managers: only validate on write requests.
    pub validate_on_write: bool,
    /// Request methods that count as writes (compared case-insensitively).
    pub write_methods: Vec<String>,
    /// How many declared tokens a choice error message quotes.
    pub choice_preview_limit: usize,
    /// Whether rendering an empty list field shows one blank item.
    pub list_placeholder: bool,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log level / filter directive (e.g. "info", "formbind_forms=debug").
    pub log_level: String,

    // ── Escape hatch ─────────────────────────────────────────────────

    /// Custom settings that don't fit into the above categories.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            validate_on_write: true,
            write_methods: vec!["POST".to_string(), "PUT".to_string(), "PATCH".to_string()],
            choice_preview_limit: 10,
            list_placeholder: true,
            log_level: "info".to_string(),
            extra: HashMap::new(),
        }
    }
}

impl Settings {
    /// Returns `true` if `method` is one of the configured write methods.
    pub fn is_write_method(&self, method: &str) -> bool {
        self.write_methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method))
    }
}

/// A lazily-initialized, globally-accessible settings container.
///
/// Call [`configure`](LazySettings::configure) once at startup to set the
/// settings, then use [`get`](LazySettings::get) to access them.
///
/// # Panics
///
/// [`get`](LazySettings::get) panics if settings have not been configured.
/// [`configure`](LazySettings::configure) panics if called more than once.
pub struct LazySettings {
    inner: OnceLock<Settings>,
}

impl Default for LazySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl LazySettings {
    /// Creates a new, unconfigured `LazySettings`.
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Configures the global settings. Must be called exactly once.
    ///
    /// # Panics
    ///
    /// Panics if settings have already been configured.
    pub fn configure(&self, settings: Settings) {
        self.inner
            .set(settings)
            .expect("Settings have already been configured");
    }

    /// Returns a reference to the configured settings.
    ///
    /// # Panics
    ///
    /// Panics if settings have not been configured.
    pub fn get(&self) -> &Settings {
        self.inner
            .get()
            .expect("Settings have not been configured. Call SETTINGS.configure() first.")
    }

    /// Returns the configured settings, if any.
    pub fn try_get(&self) -> Option<&Settings> {
        self.inner.get()
    }

    /// Returns `true` if settings have been configured.
    pub fn is_configured(&self) -> bool {
        self.inner.get().is_some()
    }
}

/// The global settings instance.
pub static SETTINGS: LazySettings = LazySettings::new();

static DEFAULT_SETTINGS: Lazy<Settings> = Lazy::new(Settings::default);

/// Returns the configured settings, or the defaults when [`SETTINGS`] has not
/// been configured yet.
pub fn current() -> &'static Settings {
    SETTINGS.try_get().unwrap_or(&DEFAULT_SETTINGS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert!(s.debug);
        assert!(s.validate_on_write);
        assert_eq!(s.choice_preview_limit, 10);
        assert!(s.list_placeholder);
        assert_eq!(s.log_level, "info");
        assert!(s.extra.is_empty());
    }

    #[test]
    fn test_is_write_method_is_case_insensitive() {
        let s = Settings::default();
        assert!(s.is_write_method("post"));
        assert!(s.is_write_method("PATCH"));
        assert!(s.is_write_method("Put"));
        assert!(!s.is_write_method("GET"));
        assert!(!s.is_write_method("DELETE"));
    }

    #[test]
    fn test_lazy_settings_configure_and_get() {
        let lazy = LazySettings::new();
        assert!(!lazy.is_configured());
        assert!(lazy.try_get().is_none());

        let settings = Settings {
            choice_preview_limit: 3,
            ..Settings::default()
        };
        lazy.configure(settings);

        assert!(lazy.is_configured());
        assert_eq!(lazy.get().choice_preview_limit, 3);
    }

    #[test]
    #[should_panic(expected = "Settings have not been configured")]
    fn test_lazy_settings_get_before_configure_panics() {
        let lazy = LazySettings::new();
        let _ = lazy.get();
    }

    #[test]
    #[should_panic(expected = "Settings have already been configured")]
    fn test_lazy_settings_double_configure_panics() {
        let lazy = LazySettings::new();
        lazy.configure(Settings::default());
        lazy.configure(Settings::default());
    }

    #[test]
    fn test_current_falls_back_to_defaults() {
        let s = current();
        assert!(!s.write_methods.is_empty());
    }

    #[test]
    fn test_settings_serialization_round_trip() {
        let s = Settings::default();
        let json = serde_json::to_string(&s).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.write_methods, s.write_methods);
        assert_eq!(back.validate_on_write, s.validate_on_write);
    }
}
