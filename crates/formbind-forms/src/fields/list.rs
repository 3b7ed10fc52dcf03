//! List fields.
//!
//! A list field repeats a template field. Items are keyed
//! `<list id>.<index>`; submitted indices need not be contiguous, and
//! items are built in ascending index order from whatever indices the
//! submission contains.

use std::borrow::Cow;
use std::collections::BTreeMap;

use formbind_core::{FormError, FormResult, Value};

use super::{Field, FieldNode, FieldResult};
use crate::keys;
use crate::source::FormDataSource;
use crate::validation::{validate_value, ErrorDetail, ErrorKind};

impl Field {
    /// The template items are built from.
    pub fn base(&self) -> Option<&Self> {
        match &self.node {
            FieldNode::List { base, .. } => Some(base),
            _ => None,
        }
    }

    /// The current items of a list field.
    pub fn items(&self) -> &[Self] {
        match &self.node {
            FieldNode::List { items, .. } => items,
            _ => &[],
        }
    }

    /// Appends an item at the next index.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::ImproperlyConfigured`] if this is not a list
    /// field.
    pub fn add_item(&mut self) -> FormResult<&mut Self> {
        let index = match &self.node {
            FieldNode::List { items, .. } => items.len(),
            _ => return Err(self.not_a_list()),
        };
        self.push_item(index)
    }

    /// Items to render: the current items, or a single blank item when
    /// the list is empty and placeholders are enabled. Never changes the
    /// field's state.
    pub fn display_items(&self) -> FormResult<Cow<'_, [Self]>> {
        let FieldNode::List { base, items } = &self.node else {
            return Ok(Cow::Borrowed(&[]));
        };
        if !items.is_empty() || !formbind_core::settings::current().list_placeholder {
            return Ok(Cow::Borrowed(items));
        }
        let key = keys::compose(&self.id, 0);
        let placeholder = base.rebuild(|spec| spec.alias(key))?;
        Ok(Cow::Owned(vec![placeholder]))
    }

    fn push_item(&mut self, index: usize) -> FormResult<&mut Self> {
        let key = keys::compose(&self.id, index);
        let error = self.not_a_list();
        let FieldNode::List { base, items } = &mut self.node else {
            return Err(error);
        };
        let item = base.rebuild(|spec| spec.alias(key))?;
        let position = items.len();
        items.push(item);
        Ok(&mut items[position])
    }

    fn not_a_list(&self) -> FormError {
        FormError::ImproperlyConfigured(format!("Field '{}' is not a list", self.name))
    }

    /// Replaces the items with one item per element of `raw`. Anything
    /// but a list leaves the field empty.
    pub(super) fn process_list(&mut self, raw: &Value, suppress_errors: bool) -> FormResult<()> {
        if let FieldNode::List { items, .. } = &mut self.node {
            items.clear();
        }
        if let Value::List(elements) = raw {
            for element in elements {
                self.add_item()?.process(element, suppress_errors)?;
            }
        }
        Ok(())
    }

    pub(super) async fn list_form_data(
        &mut self,
        source: &dyn FormDataSource,
    ) -> FormResult<FieldResult> {
        let flat = source.flat_form_data().await?;
        let indices = keys::extract_indices(flat.keys(), &self.id);
        tracing::debug!(field = %self.name, indices = ?indices, "discovered list items");

        if let FieldNode::List { items, .. } = &mut self.node {
            items.clear();
        }

        let mut values = Vec::with_capacity(indices.len());
        let mut raw = BTreeMap::new();
        let mut errors = Vec::new();
        for index in indices {
            let item = self.push_item(index)?;
            let result = item.process_form_data(source).await?;
            values.push(result.value.unwrap_or(Value::Null));
            raw.insert(index.to_string(), result.raw_data);
            errors.extend(result.errors);
        }

        let raw_data = Value::Map(raw);
        self.state.raw_data = Some(raw_data.clone());

        let submitted = if values.is_empty() {
            match &self.spec.default {
                Some(default) if default.is_truthy() => Some(default.clone()),
                _ => {
                    errors.push(ErrorDetail::new(ErrorKind::TypeError, "Input must be a list"));
                    None
                }
            }
        } else {
            Some(Value::List(values))
        };

        let outcome = match submitted {
            Some(list) if errors.is_empty() => {
                validate_value(&self.annotation, &self.constraints, &list)
            }
            _ => Err(errors),
        };
        Ok(self.finish(outcome, raw_data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldKind, FieldSpec};
    use crate::schema::{Constraints, TypeSpec};
    use crate::source::InMemorySource;

    fn xys() -> Field {
        Field::build(FieldSpec::list(FieldSpec::new(FieldKind::Text)).name("xys")).unwrap()
    }

    #[test]
    fn test_annotation_from_base() {
        let field = xys();
        assert_eq!(field.annotation(), &TypeSpec::list(TypeSpec::Str));
        assert_eq!(field.base().unwrap().name(), "xys");
    }

    #[test]
    fn test_add_item_uses_next_index() {
        let mut field = xys();
        assert_eq!(field.add_item().unwrap().alias(), "xys.0");
        assert_eq!(field.add_item().unwrap().alias(), "xys.1");
        assert_eq!(field.items().len(), 2);
        assert!(Field::build(FieldSpec::new(FieldKind::Text).name("t"))
            .unwrap()
            .add_item()
            .is_err());
    }

    #[test]
    fn test_process_sequence() {
        let mut field = xys();
        field.process(&Value::strings(["a", "b", "c"]), false).unwrap();
        assert_eq!(field.items().len(), 3);
        assert_eq!(field.items()[2].value(), Some(&Value::from("c")));

        field.process(&"not a list".into(), false).unwrap();
        assert!(field.items().is_empty());
    }

    #[test]
    fn test_display_items_placeholder() {
        let field = xys();
        let items = field.display_items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].alias(), "xys.0");
        assert!(field.items().is_empty());
    }

    #[tokio::test]
    async fn test_form_data_reconstructs_values() {
        let mut field = xys();
        let source = InMemorySource::post([("xys.0", "value1"), ("xys.1", "value2")]);
        let result = field.process_form_data(&source).await.unwrap();
        assert!(result.errors.is_empty());
        assert_eq!(result.value, Some(Value::strings(["value1", "value2"])));
        assert_eq!(
            result.raw_data,
            Value::map([("0", "value1"), ("1", "value2")])
        );
    }

    #[tokio::test]
    async fn test_form_data_honors_gaps() {
        let mut field = xys();
        let source = InMemorySource::post([("xys.3", "c"), ("xys.0", "a"), ("other", "x")]);
        let result = field.process_form_data(&source).await.unwrap();
        assert_eq!(result.value, Some(Value::strings(["a", "c"])));
        let aliases: Vec<&str> = field.items().iter().map(Field::alias).collect();
        assert_eq!(aliases, ["xys.0", "xys.3"]);
    }

    #[tokio::test]
    async fn test_form_data_empty_without_default() {
        let mut field = xys();
        let result = field.process_form_data(&InMemorySource::post([])).await.unwrap();
        assert!(result.value.is_none());
        assert_eq!(field.errors(), ["Input must be a list"]);
    }

    #[tokio::test]
    async fn test_form_data_empty_with_default() {
        let mut field = Field::build(
            FieldSpec::list(FieldSpec::new(FieldKind::Integer))
                .name("ns")
                .default(vec![Value::Int(1), Value::Int(2)]),
        )
        .unwrap();
        let result = field.process_form_data(&InMemorySource::post([])).await.unwrap();
        assert_eq!(result.value, Some(Value::List(vec![Value::Int(1), Value::Int(2)])));
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_form_data_empty_with_falsy_default() {
        for default in [Value::List(vec![]), Value::Null] {
            let mut field = Field::build(
                FieldSpec::list(FieldSpec::new(FieldKind::Integer))
                    .name("ns")
                    .default(default),
            )
            .unwrap();
            let result = field.process_form_data(&InMemorySource::post([])).await.unwrap();
            assert!(result.value.is_none());
            assert_eq!(field.errors(), ["Input must be a list"]);
        }
    }

    #[tokio::test]
    async fn test_item_errors_are_flat() {
        let mut field =
            Field::build(FieldSpec::list(FieldSpec::new(FieldKind::Integer)).name("ns")).unwrap();
        let source = InMemorySource::post([("ns.0", "1"), ("ns.1", "x"), ("ns.2", "y")]);
        let result = field.process_form_data(&source).await.unwrap();
        assert_eq!(result.errors.len(), 2);
        assert!(result.value.is_none());
        assert_eq!(field.errors().len(), 2);
    }

    #[tokio::test]
    async fn test_list_constraints() {
        let mut field = Field::build(
            FieldSpec::list(FieldSpec::new(FieldKind::Text))
                .name("tags")
                .constraints(Constraints::new().max_length(1)),
        )
        .unwrap();
        let source = InMemorySource::post([("tags.0", "a"), ("tags.1", "b")]);
        field.process_form_data(&source).await.unwrap();
        assert_eq!(
            field.errors(),
            ["List should have at most 1 item after validation, not 2"]
        );
    }

    #[tokio::test]
    async fn test_list_of_objects() {
        let mut field = Field::build(
            FieldSpec::list(FieldSpec::object(vec![
                FieldSpec::new(FieldKind::Text).name("city"),
            ]))
            .name("addresses"),
        )
        .unwrap();
        let source =
            InMemorySource::post([("addresses.0.city", "Paris"), ("addresses.1.city", "Rome")]);
        let result = field.process_form_data(&source).await.unwrap();
        assert!(result.errors.is_empty());
        assert_eq!(field.items()[1].children()[0].alias(), "addresses.1.city");
        assert_eq!(
            result.value,
            Some(Value::List(vec![
                Value::map([("city", "Paris")]),
                Value::map([("city", "Rome")]),
            ]))
        );
    }
}
