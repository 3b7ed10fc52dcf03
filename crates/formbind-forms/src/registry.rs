//! Mapping from declared types to field kinds.
//!
//! Used when fields are generated from a record schema: each attribute's
//! [`TypeSpec`] is resolved to a [`FieldKind`] through a [`FieldRegistry`].
//! The global registry starts with the built-in mappings and can be
//! extended with [`register_form_type`], typically for
//! [`TypeSpec::Named`] custom types.

use std::collections::HashMap;
use std::sync::RwLock;

use formbind_core::{FormError, FormResult};
use once_cell::sync::Lazy;

use crate::fields::{EnumSpec, FieldKind, FieldSpec, FileSpec, ObjectSpec};
use crate::schema::{TypeSpec, TypeTag};

/// Builds a field kind for a declared type.
pub type FieldFactory = fn(&TypeSpec) -> FormResult<FieldKind>;

/// A table of [`FieldFactory`]s keyed by [`TypeTag`].
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    factories: HashMap<TypeTag, FieldFactory>,
}

impl FieldRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in mappings.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(TypeTag::Str, |_| Ok(FieldKind::Text));
        registry.register(TypeTag::Int, |_| Ok(FieldKind::Integer));
        registry.register(TypeTag::Float, |_| Ok(FieldKind::Float));
        registry.register(TypeTag::Decimal, |_| Ok(FieldKind::Decimal));
        registry.register(TypeTag::Bool, |_| Ok(FieldKind::Boolean));
        registry.register(TypeTag::Date, |_| Ok(FieldKind::Date));
        registry.register(TypeTag::DateTime, |_| Ok(FieldKind::DateTime));
        registry.register(TypeTag::Time, |_| Ok(FieldKind::Time));
        registry.register(TypeTag::Email, |_| Ok(FieldKind::Email));
        registry.register(TypeTag::Url, |_| Ok(FieldKind::Url));
        registry.register(TypeTag::Uuid, |_| Ok(FieldKind::Text));
        registry.register(TypeTag::File, |_| Ok(FieldKind::File(FileSpec::default())));
        registry.register(TypeTag::Enum, |ty| {
            Ok(FieldKind::Enum(EnumSpec {
                enum_def: ty.enum_def().cloned(),
                multiple: None,
            }))
        });
        registry.register(TypeTag::List, list_kind);
        registry.register(TypeTag::Record, |ty| {
            Ok(FieldKind::Object(ObjectSpec {
                fields: Vec::new(),
                schema: ty.record_schema().cloned(),
            }))
        });
        registry.register(TypeTag::Dict, |_| Ok(FieldKind::Object(ObjectSpec::default())));
        registry
    }

    /// Maps `tag` to `factory`, replacing any previous mapping.
    pub fn register(&mut self, tag: TypeTag, factory: FieldFactory) {
        self.factories.insert(tag, factory);
    }

    /// Finds the factory for `ty`.
    ///
    /// `Optional` is looked through. A named type resolves by its own tag
    /// first and falls back to its base type.
    pub fn lookup(&self, ty: &TypeSpec) -> Option<FieldFactory> {
        match ty {
            TypeSpec::Optional(inner) => self.lookup(inner),
            TypeSpec::Named { name, base } => self
                .factories
                .get(&TypeTag::Named(name.clone()))
                .copied()
                .or_else(|| self.lookup(base)),
            other => self.factories.get(&other.tag()).copied(),
        }
    }

    /// Resolves `ty` to a field kind.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::ImproperlyConfigured`] for unsupported types.
    pub fn resolve(&self, ty: &TypeSpec) -> FormResult<FieldKind> {
        let factory = self.lookup(ty).ok_or_else(|| unsupported(ty))?;
        factory(ty)
    }
}

fn unsupported(ty: &TypeSpec) -> FormError {
    FormError::ImproperlyConfigured(format!("Type Annotation is not supported. {ty}"))
}

fn list_kind(ty: &TypeSpec) -> FormResult<FieldKind> {
    let item = ty.item_type().ok_or_else(|| unsupported(ty))?;
    let base = FieldSpec::new(resolve_field_kind(item)?).annotation(item.clone());
    Ok(FieldKind::List(Box::new(base)))
}

static REGISTRY: Lazy<RwLock<FieldRegistry>> =
    Lazy::new(|| RwLock::new(FieldRegistry::with_defaults()));

/// Registers a field factory in the global registry.
///
/// # Examples
///
/// ```
/// use formbind_forms::fields::FieldKind;
/// use formbind_forms::registry::{register_form_type, resolve_field_kind};
/// use formbind_forms::schema::{TypeSpec, TypeTag};
///
/// register_form_type(TypeTag::Named("Phone".into()), |_| Ok(FieldKind::Phone));
/// let kind = resolve_field_kind(&TypeSpec::named("Phone", TypeSpec::Str)).unwrap();
/// assert!(matches!(kind, FieldKind::Phone));
/// ```
pub fn register_form_type(tag: TypeTag, factory: FieldFactory) {
    match REGISTRY.write() {
        Ok(mut registry) => registry.register(tag, factory),
        Err(poisoned) => poisoned.into_inner().register(tag, factory),
    }
}

/// Resolves `ty` through the global registry.
///
/// # Errors
///
/// Returns [`FormError::ImproperlyConfigured`] for unsupported types.
pub fn resolve_field_kind(ty: &TypeSpec) -> FormResult<FieldKind> {
    // The lock is released before the factory runs; list factories
    // resolve their item type recursively.
    let factory = match REGISTRY.read() {
        Ok(registry) => registry.lookup(ty),
        Err(poisoned) => poisoned.into_inner().lookup(ty),
    };
    let factory = factory.ok_or_else(|| unsupported(ty))?;
    factory(ty)
}
