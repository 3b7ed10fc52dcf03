//! Field generation from record schemas.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use formbind_core::FormResult;
use once_cell::sync::Lazy;

use crate::fields::FieldSpec;
use crate::registry::resolve_field_kind;
use crate::schema::{Attribute, RecordSchema};

type CacheEntry = (Arc<RecordSchema>, Arc<Vec<FieldSpec>>);

// Keyed by schema address. The entry keeps the schema alive, so an
// address cannot be reused by a different schema.
static GENERATED: Lazy<RwLock<HashMap<usize, CacheEntry>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Returns one field spec per attribute of `schema`, in declaration order.
///
/// An attribute that pins its own field keeps that field's kind; every
/// other attribute gets the kind registered for its type. Either way the
/// spec takes the attribute's name, key, type and default. The result is
/// computed once per schema.
///
/// # Errors
///
/// Returns [`FormError::ImproperlyConfigured`](formbind_core::FormError::ImproperlyConfigured)
/// if an attribute's type has no registered field kind.
pub fn generate_fields_from_schema(schema: &Arc<RecordSchema>) -> FormResult<Arc<Vec<FieldSpec>>> {
    let key = Arc::as_ptr(schema) as usize;
    let cached = match GENERATED.read() {
        Ok(cache) => cache.get(&key).map(|(_, specs)| Arc::clone(specs)),
        Err(poisoned) => poisoned.into_inner().get(&key).map(|(_, specs)| Arc::clone(specs)),
    };
    if let Some(specs) = cached {
        return Ok(specs);
    }

    let specs = Arc::new(
        schema
            .attributes()
            .iter()
            .map(field_for_attribute)
            .collect::<FormResult<Vec<_>>>()?,
    );
    tracing::debug!(schema = %schema.name, fields = specs.len(), "generated form fields");

    let entry = (Arc::clone(schema), Arc::clone(&specs));
    match GENERATED.write() {
        Ok(mut cache) => cache.insert(key, entry),
        Err(poisoned) => poisoned.into_inner().insert(key, entry),
    };
    Ok(specs)
}

fn field_for_attribute(attribute: &Attribute) -> FormResult<FieldSpec> {
    let mut spec = match &attribute.field {
        Some(pinned) => pinned.clone(),
        None => FieldSpec::new(resolve_field_kind(&attribute.annotation)?),
    };
    spec.name = Some(attribute.name.clone());
    spec.alias = Some(attribute.key().to_string());
    spec.annotation = Some(attribute.annotation.clone());
    if spec.default.is_none() {
        spec.default.clone_from(&attribute.default);
    }
    spec.constraints = spec.constraints.or(&attribute.constraints);
    if spec.label.is_none() {
        spec.label.clone_from(&attribute.title);
    }
    if spec.help_text.is_none() {
        spec.help_text.clone_from(&attribute.description);
    }
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use formbind_core::Value;

    use super::*;
    use crate::fields::FieldKind;
    use crate::schema::{Constraints, TypeSpec};

    fn user() -> Arc<RecordSchema> {
        RecordSchema::new("User")
            .attribute(Attribute::new("name", TypeSpec::Str).title("Full name"))
            .attribute(
                Attribute::new("age", TypeSpec::Int)
                    .default(18)
                    .constraints(Constraints::new().ge(0.0)),
            )
            .attribute(Attribute::new("from_", TypeSpec::DateTime).alias("from"))
            .attribute(Attribute::new("tags", TypeSpec::list(TypeSpec::Str)))
            .build()
    }

    #[test]
    fn test_one_spec_per_attribute() {
        let specs = generate_fields_from_schema(&user()).unwrap();
        let names: Vec<_> = specs.iter().filter_map(|s| s.name.as_deref()).collect();
        assert_eq!(names, ["name", "age", "from_", "tags"]);

        assert!(matches!(specs[0].kind, FieldKind::Text));
        assert_eq!(specs[0].label.as_deref(), Some("Full name"));
        assert_eq!(specs[1].default, Some(Value::Int(18)));
        assert_eq!(specs[1].constraints.ge, Some(0.0));
        assert_eq!(specs[2].alias.as_deref(), Some("from"));
        assert!(matches!(specs[3].kind, FieldKind::List(_)));
        assert_eq!(specs[3].annotation, Some(TypeSpec::list(TypeSpec::Str)));
    }

    #[test]
    fn test_generated_once_per_schema() {
        let schema = user();
        let first = generate_fields_from_schema(&schema).unwrap();
        let second = generate_fields_from_schema(&schema).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_pinned_field_keeps_kind() {
        let schema = RecordSchema::new("Profile")
            .attribute(
                Attribute::new("bio", TypeSpec::Str)
                    .description("About you")
                    .field(FieldSpec::new(FieldKind::text_area()).name("ignored")),
            )
            .build();
        let specs = generate_fields_from_schema(&schema).unwrap();
        assert!(matches!(specs[0].kind, FieldKind::TextArea { .. }));
        assert_eq!(specs[0].name.as_deref(), Some("bio"));
        assert_eq!(specs[0].help_text.as_deref(), Some("About you"));
    }

    #[test]
    fn test_unsupported_attribute() {
        let schema = RecordSchema::new("Loose")
            .attribute(Attribute::new("anything", TypeSpec::Any))
            .build();
        assert!(generate_fields_from_schema(&schema).is_err());
    }
}
