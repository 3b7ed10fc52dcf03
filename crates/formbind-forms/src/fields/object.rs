//! Object fields.
//!
//! An object field groups child fields under its own key: a child named
//! `city` of an object aliased `address` reads `address.city`. Children
//! come from explicit specs or are generated from a record schema. The
//! object's value is the record (or mapping) assembled from its children,
//! validated as a whole once every child succeeded.

use std::collections::BTreeMap;

use formbind_core::{FormResult, Value};

use super::{child_alias, Field, FieldNode, FieldResult, ObjectSpec};
use crate::generate::generate_fields_from_schema;
use crate::schema::Constraints;
use crate::source::FormDataSource;
use crate::validation::validate_value;

/// Builds the children of an object aliased `alias`.
pub(super) fn build_children(object: &ObjectSpec, alias: &str) -> FormResult<Vec<Field>> {
    let generated;
    let specs = match &object.schema {
        Some(schema) => {
            generated = generate_fields_from_schema(schema)?;
            generated.as_slice()
        }
        None => object.fields.as_slice(),
    };
    specs
        .iter()
        .map(|spec| {
            let mut spec = spec.clone();
            spec.alias = Some(child_alias(alias, &spec));
            spec.id = None;
            Field::build(spec)
        })
        .collect()
}

impl Field {
    /// Processes each child with the entry of `raw` named after it.
    pub(super) fn process_object(&mut self, raw: &Value, suppress_errors: bool) -> FormResult<()> {
        let FieldNode::Object { children } = &mut self.node else {
            return Ok(());
        };
        for child in children {
            let value = raw.get(&child.name).cloned().unwrap_or(Value::Null);
            child.process(&value, suppress_errors)?;
        }
        Ok(())
    }

    pub(super) async fn object_form_data(
        &mut self,
        source: &dyn FormDataSource,
    ) -> FormResult<FieldResult> {
        let mut values = BTreeMap::new();
        let mut raw = BTreeMap::new();
        let mut errors = Vec::new();

        if let FieldNode::Object { children } = &mut self.node {
            for child in children.iter_mut() {
                let result = child.process_form_data(source).await?;
                values.insert(child.name.clone(), result.value.unwrap_or(Value::Null));
                raw.insert(child.name.clone(), result.raw_data);
                errors.extend(result.errors.into_iter().map(|e| e.at(child.name.clone())));
            }
        }

        let raw_data = Value::Map(raw);
        self.state.raw_data = Some(raw_data.clone());

        if !errors.is_empty() {
            let result = self.finish(Err(errors), raw_data);
            return Ok(FieldResult {
                value: Some(Value::Map(values)),
                ..result
            });
        }

        let outcome =
            validate_value(&self.annotation, &Constraints::default(), &Value::Map(values));
        Ok(self.finish(outcome, raw_data))
    }
}
