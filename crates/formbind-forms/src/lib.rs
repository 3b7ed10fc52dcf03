//! # formbind-forms
//!
//! Schema-driven form fields for formbind. Binds flat, dotted form
//! submissions (`owner.name`, `tags.0`, `addresses.1.city`) to a tree of
//! typed fields and reconciles the results into one validated value or a
//! map of errors.
//!
//! ## Modules
//!
//! - [`keys`] - Composing and parsing flat field keys
//! - [`schema`] - Declared types, constraints, enums and record schemas
//! - [`validation`] - Coercion, constraint checks and display serialization
//! - [`source`] - Where submitted form data comes from
//! - [`fields`] - The field tree: leaves, choices, objects and lists
//! - [`registry`] - Mapping declared types to field kinds
//! - [`generate`] - Field generation from record schemas
//! - [`widgets`] - HTML rendering
//! - [`manager`] - The form manager

pub mod fields;
pub mod generate;
pub mod keys;
pub mod manager;
pub mod registry;
pub mod schema;
pub mod source;
pub mod validation;
pub mod widgets;

pub use fields::{Field, FieldKind, FieldResult, FieldSpec};
pub use manager::{FormManager, FormModel, ValidationOutcome};
pub use schema::{Attribute, Constraints, EnumDef, RecordSchema, TypeSpec};
pub use source::{FlatFormData, FormDataSource, InMemorySource};

/// Commonly used items.
pub mod prelude {
    pub use crate::fields::{Field, FieldKind, FieldSpec};
    pub use crate::manager::{FormManager, ValidationOutcome};
    pub use crate::registry::register_form_type;
    pub use crate::schema::{Attribute, Constraints, EnumDef, RecordSchema, TypeSpec, TypeTag};
    pub use crate::source::{FormDataSource, InMemorySource};
    pub use formbind_core::{FormError, FormResult, Value};
}
