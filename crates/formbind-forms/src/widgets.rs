//! HTML rendering for fields.
//!
//! Each [`FieldKind`] maps to a [`Widget`] that turns a live [`Field`]
//! into markup. Rendering reads the field's display data, so a re-rendered
//! form shows what the user submitted next to its errors.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use formbind_core::{FormResult, Value};

use crate::fields::{Field, FieldKind};

/// Renders one kind of field.
pub trait Widget: Send + Sync + fmt::Debug {
    /// Renders `field` as an HTML string.
    ///
    /// # Errors
    ///
    /// Propagates configuration errors from building placeholder items.
    fn render(&self, field: &Field) -> FormResult<String>;
}

/// Returns the widget used for `kind`.
pub fn widget_for(kind: &FieldKind) -> Box<dyn Widget> {
    match kind {
        FieldKind::TextArea { rows, cols } => Box::new(TextArea {
            rows: *rows,
            cols: *cols,
        }),
        FieldKind::Boolean => Box::new(CheckboxInput),
        FieldKind::Choice(_) | FieldKind::Enum(_) | FieldKind::TimeZone => Box::new(Select),
        FieldKind::Object(_) => Box::new(Fieldset),
        FieldKind::List(_) => Box::new(ListContainer),
        other => Box::new(Input {
            input_type: other.input_type().unwrap_or("text"),
        }),
    }
}

/// An `<input>` element.
#[derive(Debug, Clone)]
pub struct Input {
    pub input_type: &'static str,
}

impl Widget for Input {
    fn render(&self, field: &Field) -> FormResult<String> {
        let mut attrs = base_attrs(field);
        match field.kind() {
            FieldKind::Password => {}
            FieldKind::File(spec) | FieldKind::Image(spec) => {
                if let Some(accept) = &spec.accept {
                    attrs.insert("accept".into(), accept.clone().into());
                }
                attrs.insert("multiple".into(), field.annotation().is_sequence().into());
            }
            _ => {
                if let Some(data) = field.data().filter(|d| !d.is_list()) {
                    attrs.insert("value".into(), data.clone());
                }
            }
        }
        if matches!(
            field.kind(),
            FieldKind::Integer | FieldKind::Float | FieldKind::Decimal | FieldKind::Range
        ) {
            let spec = field.spec();
            for (key, bound) in [("min", spec.min), ("max", spec.max), ("step", spec.step)] {
                if let Some(bound) = bound {
                    attrs.insert(key.into(), Value::Float(bound));
                }
            }
        }
        let element = format!(
            r#"<input type="{}" {}>"#,
            self.input_type,
            render_attrs(&attrs)
        );
        Ok(with_help_text(field, element))
    }
}

/// A `<textarea>` element.
#[derive(Debug, Clone)]
pub struct TextArea {
    pub rows: u32,
    pub cols: u32,
}

impl Widget for TextArea {
    fn render(&self, field: &Field) -> FormResult<String> {
        let mut attrs = base_attrs(field);
        attrs.insert("rows".into(), Value::Int(self.rows.into()));
        attrs.insert("cols".into(), Value::Int(self.cols.into()));
        let content = field.data().map(|d| escape_html(&d.to_string())).unwrap_or_default();
        let element = format!("<textarea {}>{content}</textarea>", render_attrs(&attrs));
        Ok(with_help_text(field, element))
    }
}

/// An `<input type="checkbox">`, checked when the display data is truthy.
#[derive(Debug, Clone)]
pub struct CheckboxInput;

impl Widget for CheckboxInput {
    fn render(&self, field: &Field) -> FormResult<String> {
        let mut attrs = base_attrs(field);
        attrs.insert("checked".into(), field.data().is_some_and(Value::is_truthy).into());
        let element = format!(r#"<input type="checkbox" {}>"#, render_attrs(&attrs));
        Ok(with_help_text(field, element))
    }
}

/// A `<select>` over the field's choices.
#[derive(Debug, Clone)]
pub struct Select;

impl Widget for Select {
    fn render(&self, field: &Field) -> FormResult<String> {
        let mut attrs = base_attrs(field);
        let mut options = String::new();
        if let Some(rules) = field.choice_rules() {
            attrs.insert("multiple".into(), rules.multiple().into());
            let current = field.data();
            for (token, label) in rules.choices() {
                let selected = if rules.is_selected(token, current) {
                    " selected"
                } else {
                    ""
                };
                let _ = write!(
                    options,
                    r#"<option value="{}"{selected}>{}</option>"#,
                    escape_html(&token.to_string()),
                    escape_html(label)
                );
            }
        }
        let element = format!("<select {}>{options}</select>", render_attrs(&attrs));
        Ok(with_help_text(field, element))
    }
}

/// A `<fieldset>` holding the children of an object field.
#[derive(Debug, Clone)]
pub struct Fieldset;

impl Widget for Fieldset {
    fn render(&self, field: &Field) -> FormResult<String> {
        let mut html = format!("<fieldset {}>", render_attrs(&container_attrs(field)));
        for child in field.children() {
            render_row(&mut html, child)?;
        }
        html.push_str("</fieldset>");
        Ok(html)
    }
}

/// The container of a list field. Carries a hidden `<id>-next-index`
/// input telling client scripts where the next item goes.
#[derive(Debug, Clone)]
pub struct ListContainer;

impl Widget for ListContainer {
    fn render(&self, field: &Field) -> FormResult<String> {
        let mut html = format!(
            r#"<div {}><input id="{}-next-index" value="{}" hidden>"#,
            render_attrs(&container_attrs(field)),
            escape_html(field.id()),
            field.items().len()
        );
        for item in field.display_items()?.iter() {
            render_row(&mut html, item)?;
        }
        html.push_str("</div>");
        Ok(html)
    }
}

fn render_row(html: &mut String, field: &Field) -> FormResult<()> {
    let _ = write!(html, "<div>{}{}</div>", field.label_tag(), field.render()?);
    Ok(())
}

fn base_attrs(field: &Field) -> BTreeMap<String, Value> {
    let spec = field.spec();
    let mut attrs = spec.attrs.clone();
    attrs.insert("id".into(), field.id().into());
    attrs.insert("name".into(), field.alias().into());
    attrs.insert("required".into(), field.required().into());
    attrs.insert("disabled".into(), spec.disabled.into());
    attrs.insert("readonly".into(), spec.read_only.into());
    if let Some(class) = &spec.class {
        attrs.insert("class".into(), class.clone().into());
    }
    attrs
}

fn container_attrs(field: &Field) -> BTreeMap<String, Value> {
    let spec = field.spec();
    let mut attrs = spec.attrs.clone();
    attrs.insert("id".into(), field.id().into());
    if let Some(class) = &spec.class {
        attrs.insert("class".into(), class.clone().into());
    }
    attrs
}

fn with_help_text(field: &Field, element: String) -> String {
    match field.help_text() {
        Some(help) => format!("<div>{element}<small>{}</small></div>", escape_html(help)),
        None => element,
    }
}

/// Formats HTML attributes, sorted by key.
///
/// `true` renders the bare attribute name; `false` and `Null` are
/// omitted. `data_`/`aria_` keys have their underscores turned into
/// hyphens and a trailing underscore is dropped, so `class_` renders as
/// `class`.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use formbind_core::Value;
/// use formbind_forms::widgets::render_attrs;
///
/// let attrs = BTreeMap::from([
///     ("checked".to_string(), Value::Bool(true)),
///     ("readonly".to_string(), Value::Bool(false)),
///     ("name".to_string(), Value::from("text1")),
///     ("data_user_id".to_string(), Value::Int(7)),
/// ]);
/// assert_eq!(render_attrs(&attrs), r#"checked data-user-id="7" name="text1""#);
/// ```
pub fn render_attrs(attrs: &BTreeMap<String, Value>) -> String {
    let mut params: Vec<(String, Option<String>)> = attrs
        .iter()
        .filter_map(|(key, value)| {
            let key = clean_key(key);
            match value {
                Value::Bool(true) => Some((key, None)),
                Value::Bool(false) | Value::Null => None,
                other => Some((key, Some(escape_html(&other.to_string())))),
            }
        })
        .collect();
    // cleaning can reorder keys
    params.sort_by(|a, b| a.0.cmp(&b.0));
    params
        .into_iter()
        .map(|(key, value)| match value {
            Some(value) => format!(r#"{key}="{value}""#),
            None => key,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn clean_key(key: &str) -> String {
    let key = key.strip_suffix('_').unwrap_or(key);
    if key.starts_with("data_") || key.starts_with("aria_") {
        key.replace('_', "-")
    } else {
        key.to_string()
    }
}

/// Escapes text for use in HTML content and attribute values.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// A `<label>` pointing at a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLabel {
    pub field_id: String,
    pub text: String,
}

impl FieldLabel {
    pub fn new(field_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for FieldLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"<label for="{}">{}</label>"#,
            escape_html(&self.field_id),
            escape_html(&self.text)
        )
    }
}

impl Field {
    /// Renders the field with the widget for its kind.
    ///
    /// # Errors
    ///
    /// Propagates configuration errors from building list placeholders.
    pub fn render(&self) -> FormResult<String> {
        widget_for(self.kind()).render(self)
    }

    /// The field's `<label>`.
    pub fn label_tag(&self) -> FieldLabel {
        FieldLabel::new(self.id(), self.label())
    }

    /// The current errors as a `<ul class="errorlist">`, or an empty
    /// string when there are none.
    pub fn errors_as_ul(&self) -> String {
        if self.errors().is_empty() {
            return String::new();
        }
        let items: String = self
            .errors()
            .iter()
            .map(|e| format!("<li>{}</li>", escape_html(e)))
            .collect();
        format!(r#"<ul class="errorlist">{items}</ul>"#)
    }
}
