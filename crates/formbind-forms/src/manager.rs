//! The form manager.
//!
//! A [`FormManager`] owns the top-level fields of one form, reads a
//! submission from a [`FormDataSource`] and reconciles the field results
//! into either one validated value or a map of errors keyed by field
//! name. A manager is built per validation attempt and clears its fields
//! when dropped.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use formbind_forms::manager::FormManager;
//! use formbind_forms::schema::{Attribute, RecordSchema, TypeSpec};
//! use formbind_forms::source::InMemorySource;
//!
//! let schema = RecordSchema::new("Login")
//!     .attribute(Attribute::new("email", TypeSpec::Email))
//!     .attribute(Attribute::new("password", TypeSpec::Str))
//!     .build();
//! let source = InMemorySource::post([("email", "ada@example.com"), ("password", "secret")]);
//!
//! let mut form = FormManager::from_schema(&schema)
//!     .unwrap()
//!     .with_source(Arc::new(source));
//! assert!(form.validate().unwrap());
//! assert!(form.errors().is_empty());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use formbind_core::{FormError, FormResult, ValidationError, Value};
use tracing::Instrument;

use crate::fields::{Field, FieldSpec};
use crate::generate::generate_fields_from_schema;
use crate::schema::RecordSchema;
use crate::source::{CachedSource, FormDataSource};
use crate::validation::{format_errors, validate_dict, validate_record, Validated};

/// Error key for whole-record failures.
pub const FORM_ERROR_KEY: &str = "form";

/// What the aggregated values are validated against.
#[derive(Debug, Clone)]
pub enum FormModel {
    /// A record schema; a valid form yields a [`Value::Record`].
    Record(Arc<RecordSchema>),
    /// A plain mapping; a valid form yields a [`Value::Map`].
    Dict,
}

impl FormModel {
    fn validate(&self, values: &BTreeMap<String, Value>) -> Validated {
        match self {
            Self::Record(schema) => validate_record(schema, values).map(Value::Record),
            Self::Dict => validate_dict(values),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Record(schema) => &schema.name,
            Self::Dict => "Form",
        }
    }
}

/// The state of a manager after a validation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// No submission has been processed.
    Pending,
    Valid(Value),
    Invalid(HashMap<String, Vec<String>>),
}

impl ValidationOutcome {
    /// Converts the outcome into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::Validation`] carrying the error map when the
    /// form was invalid, and [`FormError::ImproperlyConfigured`] when it
    /// was never validated.
    pub fn into_result(self) -> FormResult<Value> {
        match self {
            Self::Valid(value) => Ok(value),
            Self::Invalid(errors) => {
                let field_errors = errors
                    .into_iter()
                    .map(|(name, messages)| {
                        let errors = messages
                            .into_iter()
                            .map(|m| ValidationError::new(m, "invalid"))
                            .collect();
                        (name, errors)
                    })
                    .collect();
                Err(FormError::Validation(ValidationError::with_field_errors(field_errors)))
            }
            Self::Pending => Err(FormError::ImproperlyConfigured(
                "Form has not been validated".to_string(),
            )),
        }
    }
}

/// Owns the fields of a form and drives validation.
pub struct FormManager {
    model: FormModel,
    fields: Vec<Field>,
    source: Option<Arc<dyn FormDataSource>>,
    validate_on_write: bool,
    errors: HashMap<String, Vec<String>>,
    value: Option<Value>,
    raw_data: Option<BTreeMap<String, Value>>,
    data: Option<BTreeMap<String, Value>>,
}

impl FormManager {
    /// Builds a manager from explicit fields; a valid form yields a
    /// mapping keyed by field alias.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::ImproperlyConfigured`] if a field spec is
    /// inconsistent.
    pub fn from_fields(fields: Vec<FieldSpec>) -> FormResult<Self> {
        Self::new(FormModel::Dict, fields)
    }

    /// Builds a manager with one field per attribute of `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::ImproperlyConfigured`] if an attribute has no
    /// usable field.
    pub fn from_schema(schema: &Arc<RecordSchema>) -> FormResult<Self> {
        let specs = generate_fields_from_schema(schema)?;
        Self::new(FormModel::Record(Arc::clone(schema)), specs.to_vec())
    }

    /// Builds a manager for `model` from `specs`.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::ImproperlyConfigured`] if a field spec is
    /// inconsistent.
    pub fn new(model: FormModel, specs: Vec<FieldSpec>) -> FormResult<Self> {
        let fields = specs.into_iter().map(Field::build).collect::<FormResult<Vec<_>>>()?;
        Ok(Self {
            model,
            fields,
            source: None,
            validate_on_write: formbind_core::settings::current().validate_on_write,
            errors: HashMap::new(),
            value: None,
            raw_data: None,
            data: None,
        })
    }

    /// Binds the source submissions are read from.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn FormDataSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// When set, only write methods are validated; other requests report
    /// an invalid form without touching the fields.
    #[must_use]
    pub fn validate_on_write(mut self, enabled: bool) -> Self {
        self.validate_on_write = enabled;
        self
    }

    /// Validates the bound submission on a dedicated current-thread
    /// runtime.
    ///
    /// Must not be called from within an async context; use
    /// [`validate_async`](Self::validate_async) there.
    ///
    /// # Errors
    ///
    /// See [`validate_async`](Self::validate_async).
    pub fn validate(&mut self) -> FormResult<bool> {
        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        runtime.block_on(self.validate_async())
    }

    /// Validates the bound submission. Returns `true` when the form is
    /// valid.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::ImproperlyConfigured`] when no source is bound,
    /// and propagates failures of the source itself. Invalid input is not
    /// an error; it is reported through [`errors`](Self::errors).
    pub async fn validate_async(&mut self) -> FormResult<bool> {
        let source = self.source.clone().ok_or_else(|| {
            FormError::ImproperlyConfigured("Form data source is required".to_string())
        })?;
        let method = source.method().to_string();
        if self.validate_on_write && !formbind_core::settings::current().is_write_method(&method) {
            tracing::debug!(method = %method, "skipping validation for read request");
            return Ok(false);
        }

        let span = formbind_core::logging::validation_span(self.model.name());
        let cached = CachedSource::new(source);
        self.process_form(&cached).instrument(span).await?;
        Ok(self.errors.is_empty())
    }

    /// Processes every top-level field against `source` and reconciles
    /// the results.
    ///
    /// Field errors are keyed by field name. When every field succeeded
    /// the values, keyed by alias, are validated as a whole; a failure
    /// there is reported under [`FORM_ERROR_KEY`].
    ///
    /// # Errors
    ///
    /// Propagates failures of the source.
    pub async fn process_form(&mut self, source: &dyn FormDataSource) -> FormResult<()> {
        self.errors.clear();
        self.value = None;

        let mut values = BTreeMap::new();
        let mut raw_data = BTreeMap::new();
        let mut errors: HashMap<String, Vec<String>> = HashMap::new();
        for field in &mut self.fields {
            let result = field.process_form_data(source).await?;
            if let Some(value) = result.value {
                values.insert(field.alias().to_string(), value);
            }
            if !result.errors.is_empty() {
                errors
                    .entry(field.name().to_string())
                    .or_default()
                    .extend(format_errors(&result.errors));
            }
            raw_data.insert(field.alias().to_string(), result.raw_data);
        }
        self.raw_data = Some(raw_data);

        if !errors.is_empty() {
            tracing::info!(
                form = %self.model.name(),
                fields = errors.len(),
                "form has field errors"
            );
            self.errors = errors;
            return Ok(());
        }

        match self.model.validate(&values) {
            Ok(value) => {
                tracing::debug!(form = %self.model.name(), "form is valid");
                self.value = Some(value);
            }
            Err(details) => {
                tracing::info!(form = %self.model.name(), "form failed whole-record validation");
                self.errors.insert(FORM_ERROR_KEY.to_string(), format_errors(&details));
            }
        }
        Ok(())
    }

    /// Pre-fills the fields without validating.
    ///
    /// Each field takes the attribute of `obj` named after it when `obj`
    /// has one, otherwise `data[name]`, otherwise nothing. Errors are
    /// suppressed.
    ///
    /// # Errors
    ///
    /// Propagates configuration errors from rebuilding list items.
    pub fn populate_form(
        &mut self,
        obj: Option<&Value>,
        data: Option<BTreeMap<String, Value>>,
    ) -> FormResult<()> {
        for field in &mut self.fields {
            let value = obj
                .and_then(|o| o.get(field.name()))
                .or_else(|| data.as_ref().and_then(|d| d.get(field.name())))
                .cloned()
                .unwrap_or(Value::Null);
            field.process(&value, true)?;
        }
        self.data = data;
        Ok(())
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn get_field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name() == name)
    }

    /// The top-level fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }

    /// The validated value, set only after a successful validation.
    pub const fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Reads one attribute of the validated value.
    pub fn value_of(&self, name: &str) -> Option<&Value> {
        self.value.as_ref().and_then(|v| v.get(name))
    }

    pub const fn errors(&self) -> &HashMap<String, Vec<String>> {
        &self.errors
    }

    /// What was submitted, keyed by field alias.
    pub const fn raw_data(&self) -> Option<&BTreeMap<String, Value>> {
        self.raw_data.as_ref()
    }

    /// The mapping last passed to [`populate_form`](Self::populate_form).
    pub const fn data(&self) -> Option<&BTreeMap<String, Value>> {
        self.data.as_ref()
    }

    pub const fn model(&self) -> &FormModel {
        &self.model
    }

    /// The record schema, when the form was built from one.
    pub const fn model_schema(&self) -> Option<&Arc<RecordSchema>> {
        match &self.model {
            FormModel::Record(schema) => Some(schema),
            FormModel::Dict => None,
        }
    }

    /// The current state as a [`ValidationOutcome`].
    pub fn outcome(&self) -> ValidationOutcome {
        match (&self.value, self.errors.is_empty()) {
            (Some(value), _) => ValidationOutcome::Valid(value.clone()),
            (None, false) => ValidationOutcome::Invalid(self.errors.clone()),
            (None, true) => ValidationOutcome::Pending,
        }
    }

    /// Clears the transient state of every field.
    pub fn clear(&mut self) {
        self.fields.iter_mut().for_each(Field::clear);
    }
}

impl Drop for FormManager {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for FormManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormManager")
            .field("model", &self.model.name())
            .field("fields", &self.fields.iter().map(Field::name).collect::<Vec<_>>())
            .field("validate_on_write", &self.validate_on_write)
            .field("errors", &self.errors)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldKind;
    use crate::schema::{Attribute, Constraints, EnumDef, TypeSpec};
    use crate::source::InMemorySource;

    fn user() -> Arc<RecordSchema> {
        RecordSchema::new("User")
            .attribute(Attribute::new("name", TypeSpec::Str))
            .attribute(
                Attribute::new("age", TypeSpec::Int).constraints(Constraints::new().le(100.0)),
            )
            .build()
    }

    fn bound(schema: &Arc<RecordSchema>, source: InMemorySource) -> FormManager {
        FormManager::from_schema(schema).unwrap().with_source(Arc::new(source))
    }

    #[tokio::test]
    async fn test_valid_submission() {
        let mut form = bound(&user(), InMemorySource::post([("name", "Ada"), ("age", "36")]));
        assert!(form.validate_async().await.unwrap());
        assert_eq!(form.value_of("age"), Some(&Value::Int(36)));
        assert_eq!(form.raw_data().unwrap()["name"], Value::from("Ada"));
        assert!(matches!(form.outcome(), ValidationOutcome::Valid(Value::Record(_))));
    }

    #[tokio::test]
    async fn test_field_errors_keyed_by_name() {
        let mut form = bound(&user(), InMemorySource::post([("name", "Ada"), ("age", "101")]));
        assert!(!form.validate_async().await.unwrap());
        assert!(form.value().is_none());
        assert_eq!(form.errors()["age"], ["Input should be less than or equal to 100"]);
        assert!(matches!(form.outcome().into_result(), Err(FormError::Validation(_))));
    }

    #[tokio::test]
    async fn test_read_requests_are_not_validated() {
        let mut form = bound(&user(), InMemorySource::get());
        assert!(!form.validate_async().await.unwrap());
        assert!(form.errors().is_empty());
        assert!(form.raw_data().is_none());
        assert_eq!(form.outcome(), ValidationOutcome::Pending);
    }

    #[tokio::test]
    async fn test_validate_on_write_disabled() {
        let mut form = bound(&user(), InMemorySource::get()).validate_on_write(false);
        assert!(!form.validate_async().await.unwrap());
        assert_eq!(form.errors()["name"], ["Field required"]);
    }

    #[tokio::test]
    async fn test_missing_source() {
        let mut form = FormManager::from_schema(&user()).unwrap();
        let err = form.validate_async().await.unwrap_err();
        assert!(err.to_string().contains("Form data source is required"));
    }

    #[tokio::test]
    async fn test_record_validator_reports_under_form() {
        let schema = RecordSchema::new("Signup")
            .attribute(Attribute::new("password", TypeSpec::Str))
            .attribute(Attribute::new("confirm", TypeSpec::Str))
            .validate_with("match", |r| {
                if r.get("password") == r.get("confirm") {
                    Ok(())
                } else {
                    Err(ValidationError::new("passwords do not match", "mismatch"))
                }
            })
            .build();
        let mut form = bound(&schema, InMemorySource::post([("password", "a"), ("confirm", "b")]));
        assert!(!form.validate_async().await.unwrap());
        assert_eq!(form.errors()[FORM_ERROR_KEY], ["Value error, passwords do not match"]);
        assert!(form.value().is_none());
    }

    #[test]
    fn test_from_fields_yields_mapping() {
        let mut form = FormManager::from_fields(vec![
            FieldSpec::new(FieldKind::Text).name("q"),
            FieldSpec::new(FieldKind::Integer).name("page").default(1),
        ])
        .unwrap()
        .with_source(Arc::new(InMemorySource::post([("q", "rust")])));
        assert!(form.validate().unwrap());
        assert_eq!(
            form.value(),
            Some(&Value::map([("page", Value::Int(1)), ("q", Value::from("rust"))]))
        );
        assert!(form.model_schema().is_none());
    }

    #[test]
    fn test_unsubmitted_enum_keeps_member_default() {
        let color = EnumDef::new("Color").member("RED", "red").member("BLUE", "blue").build();
        let red = color.get("RED").unwrap();
        let mut form = FormManager::from_fields(vec![
            FieldSpec::enumeration(color).name("color").default(red.clone()),
        ])
        .unwrap()
        .with_source(Arc::new(InMemorySource::post([])));
        assert!(form.validate().unwrap());
        assert_eq!(form.value(), Some(&Value::map([("color", Value::Enum(red.clone()))])));
        assert_eq!(form.value_of("color"), Some(&Value::Enum(red)));
    }

    #[test]
    fn test_populate_form_precedence() {
        let mut form = FormManager::from_schema(&user()).unwrap();
        let obj = Value::map([("name", "From object")]);
        let data = BTreeMap::from([
            ("name".to_string(), Value::from("From data")),
            ("age".to_string(), Value::from("41")),
        ]);
        form.populate_form(Some(&obj), Some(data)).unwrap();

        assert_eq!(form.get_field("name").unwrap().value(), Some(&Value::from("From object")));
        assert_eq!(form.get_field("age").unwrap().value(), Some(&Value::Int(41)));
        assert!(form.data().unwrap().contains_key("age"));
        assert!(form.value().is_none());
        assert!(form.errors().is_empty());
    }

    #[test]
    fn test_clear_resets_fields() {
        let mut form = FormManager::from_schema(&user()).unwrap();
        form.populate_form(None, Some(BTreeMap::from([("age".to_string(), Value::Int(3))])))
            .unwrap();
        assert!(form.contains("age"));
        form.clear();
        assert!(form.get_field("age").unwrap().value().is_none());
        assert_eq!(form.fields().count(), 2);
    }
}
