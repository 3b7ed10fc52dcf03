//! Form fields.
//!
//! A [`FieldSpec`] is the immutable description of a field: its kind,
//! name, declared type, default and presentation options. [`Field::build`]
//! turns a spec into a live [`Field`] in two explicit phases: the setup
//! checks reject inconsistent specs with
//! [`FormError::ImproperlyConfigured`], then the field loads its default.
//!
//! A field has two processing entry points:
//!
//! - [`Field::process`] coerces a value directly (defaults, pre-fill).
//!   Choice membership rules are not applied on this path.
//! - [`Field::process_form_data`] reads the field's keys from a
//!   [`FormDataSource`], coerces and applies the field's domain rules.
//!
//! Object fields (see [`object`]) and list fields (see [`list`]) own child
//! fields whose keys are prefixed with their own.

pub mod choice;
pub mod list;
pub mod object;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use formbind_core::{FormError, FormResult, Value};

use crate::keys;
use crate::schema::{Constraints, EnumDef, RecordSchema, TypeSpec};
use crate::source::FormDataSource;
use crate::validation::{format_errors, serialize_value, validate_value, ErrorDetail};

pub use choice::{ChoiceRules, CoerceType, COMMON_TIMEZONES};

/// Name given to fields built without one.
pub const DEFAULT_NAME: &str = "no-name";

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Options of a choice field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChoiceSpec {
    /// Ordered `(token, label)` pairs.
    pub choices: Vec<(Value, String)>,
    /// `None` infers multiplicity from the declared type.
    pub multiple: Option<bool>,
}

/// Options of an enum field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumSpec {
    /// The enumeration. Taken from the declared type when unset.
    pub enum_def: Option<Arc<EnumDef>>,
    pub multiple: Option<bool>,
}

/// Options of a file field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSpec {
    /// HTML `accept` pattern.
    pub accept: Option<String>,
    pub multiple: Option<bool>,
}

/// Children of an object field: explicit field specs or a record schema.
#[derive(Debug, Clone, Default)]
pub struct ObjectSpec {
    pub fields: Vec<FieldSpec>,
    pub schema: Option<Arc<RecordSchema>>,
}

/// The kind of a field. Determines its default type, its processing
/// behavior and its widget.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Text,
    TextArea { rows: u32, cols: u32 },
    Email,
    Url,
    Phone,
    Color,
    Password,
    Integer,
    Float,
    Decimal,
    Range,
    Boolean,
    Date,
    DateTime,
    DateTimeLocal,
    Time,
    /// A choice over [`COMMON_TIMEZONES`].
    TimeZone,
    File(FileSpec),
    Image(FileSpec),
    Choice(ChoiceSpec),
    Enum(EnumSpec),
    Object(ObjectSpec),
    /// A repeated field; items are built from the boxed template.
    List(Box<FieldSpec>),
}

impl FieldKind {
    /// A text area with the default size.
    pub const fn text_area() -> Self {
        Self::TextArea { rows: 6, cols: 30 }
    }

    /// The `type` attribute of the rendered `<input>`, for kinds rendered
    /// as one.
    pub const fn input_type(&self) -> Option<&'static str> {
        Some(match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Url => "url",
            Self::Phone => "tel",
            Self::Color => "color",
            Self::Password => "password",
            Self::Integer | Self::Float | Self::Decimal => "number",
            Self::Range => "range",
            Self::Boolean => "checkbox",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::DateTimeLocal => "datetime-local",
            Self::Time => "time",
            Self::File(_) | Self::Image(_) => "file",
            Self::TextArea { .. }
            | Self::TimeZone
            | Self::Choice(_)
            | Self::Enum(_)
            | Self::Object(_)
            | Self::List(_) => return None,
        })
    }

    /// The type used when the field spec declares none.
    pub fn default_annotation(&self) -> Option<TypeSpec> {
        let many = |ty: TypeSpec, multiple: Option<bool>| {
            if multiple.unwrap_or(false) {
                TypeSpec::list(ty)
            } else {
                ty
            }
        };
        Some(match self {
            Self::Text
            | Self::TextArea { .. }
            | Self::Phone
            | Self::Color
            | Self::Password
            | Self::TimeZone => TypeSpec::Str,
            Self::Email => TypeSpec::Email,
            Self::Url => TypeSpec::Url,
            Self::Integer | Self::Range => TypeSpec::Int,
            Self::Float => TypeSpec::Float,
            Self::Decimal => TypeSpec::Decimal,
            Self::Boolean => TypeSpec::Bool,
            Self::Date => TypeSpec::Date,
            Self::DateTime | Self::DateTimeLocal => TypeSpec::DateTime,
            Self::Time => TypeSpec::Time,
            Self::File(spec) | Self::Image(spec) => many(TypeSpec::File, spec.multiple),
            Self::Choice(spec) => many(TypeSpec::Str, spec.multiple),
            Self::Enum(spec) => {
                let def = Arc::clone(spec.enum_def.as_ref()?);
                many(TypeSpec::Enum(def), spec.multiple)
            }
            Self::Object(spec) => spec
                .schema
                .as_ref()
                .map_or(TypeSpec::Dict, |schema| TypeSpec::Record(Arc::clone(schema))),
            Self::List(base) => TypeSpec::list(
                base.annotation
                    .clone()
                    .or_else(|| base.kind.default_annotation())?,
            ),
        })
    }

    const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Integer | Self::Float | Self::Decimal | Self::Range
        )
    }
}

/// The construction parameters of a field.
///
/// # Examples
///
/// ```
/// use formbind_forms::fields::{Field, FieldKind, FieldSpec};
/// use formbind_forms::schema::Constraints;
///
/// let spec = FieldSpec::new(FieldKind::Integer)
///     .name("age")
///     .constraints(Constraints::new().le(100.0));
/// let field = Field::build(spec).unwrap();
/// assert_eq!(field.alias(), "age");
/// assert!(field.required());
/// ```
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: Option<String>,
    /// Flat key the field reads; defaults to the name.
    pub alias: Option<String>,
    /// HTML id and list key prefix; defaults to the alias.
    pub id: Option<String>,
    pub kind: FieldKind,
    pub annotation: Option<TypeSpec>,
    /// `None` makes the field required.
    pub default: Option<Value>,
    pub constraints: Constraints,
    pub label: Option<String>,
    pub help_text: Option<String>,
    /// Extra HTML attributes.
    pub attrs: BTreeMap<String, Value>,
    pub disabled: bool,
    pub read_only: bool,
    pub class: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
}

impl FieldSpec {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            name: None,
            alias: None,
            id: None,
            kind,
            annotation: None,
            default: None,
            constraints: Constraints::default(),
            label: None,
            help_text: None,
            attrs: BTreeMap::new(),
            disabled: false,
            read_only: false,
            class: None,
            min: None,
            max: None,
            step: None,
        }
    }

    /// A single-choice field over `(token, label)` pairs.
    pub fn choice<I, T, L>(choices: I) -> Self
    where
        I: IntoIterator<Item = (T, L)>,
        T: Into<Value>,
        L: Into<String>,
    {
        Self::new(FieldKind::Choice(ChoiceSpec {
            choices: choices
                .into_iter()
                .map(|(t, l)| (t.into(), l.into()))
                .collect(),
            multiple: None,
        }))
    }

    /// A field over the members of `def`.
    pub fn enumeration(def: Arc<EnumDef>) -> Self {
        Self::new(FieldKind::Enum(EnumSpec {
            enum_def: Some(def),
            multiple: None,
        }))
    }

    /// An object field with explicit children.
    pub fn object(fields: Vec<Self>) -> Self {
        Self::new(FieldKind::Object(ObjectSpec {
            fields,
            schema: None,
        }))
    }

    /// An object field whose children are generated from `schema`.
    pub fn object_schema(schema: Arc<RecordSchema>) -> Self {
        Self::new(FieldKind::Object(ObjectSpec {
            fields: Vec::new(),
            schema: Some(schema),
        }))
    }

    /// A list field repeating `base`.
    pub fn list(base: Self) -> Self {
        Self::new(FieldKind::List(Box::new(base)))
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn annotation(mut self, annotation: TypeSpec) -> Self {
        self.annotation = Some(annotation);
        self
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = Some(text.into());
        self
    }

    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    #[must_use]
    pub const fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    #[must_use]
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    #[must_use]
    pub const fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    #[must_use]
    pub const fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    #[must_use]
    pub const fn step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    /// Sets multiplicity on choice, enum and file kinds. Ignored otherwise.
    #[must_use]
    pub fn multiple(mut self, multiple: bool) -> Self {
        match &mut self.kind {
            FieldKind::Choice(spec) => spec.multiple = Some(multiple),
            FieldKind::Enum(spec) => spec.multiple = Some(multiple),
            FieldKind::File(spec) | FieldKind::Image(spec) => spec.multiple = Some(multiple),
            _ => {}
        }
        self
    }

    fn explicit_multiple(&self) -> Option<bool> {
        match &self.kind {
            FieldKind::Choice(spec) => spec.multiple,
            FieldKind::Enum(spec) => spec.multiple,
            FieldKind::File(spec) | FieldKind::Image(spec) => spec.multiple,
            _ => None,
        }
    }
}

/// The outcome of reading one field from submitted form data.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldResult {
    /// The typed value. For an object whose children failed this is the
    /// partial mapping of the children that succeeded.
    pub value: Option<Value>,
    pub errors: Vec<ErrorDetail>,
    /// What was submitted; `Null` when nothing was.
    pub raw_data: Value,
}

#[derive(Debug, Clone, Default)]
struct FieldState {
    value: Option<Value>,
    data: Option<Value>,
    raw_data: Option<Value>,
    errors: Vec<String>,
}

#[derive(Debug, Clone)]
enum FieldNode {
    Leaf,
    Choice(ChoiceRules),
    Object { children: Vec<Field> },
    List { base: Box<Field>, items: Vec<Field> },
}

/// A live form field.
#[derive(Debug, Clone)]
pub struct Field {
    spec: FieldSpec,
    name: String,
    alias: String,
    id: String,
    annotation: TypeSpec,
    constraints: Constraints,
    state: FieldState,
    node: FieldNode,
}

impl Field {
    /// Builds a field from `spec`, runs the setup checks and loads the
    /// default.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::ImproperlyConfigured`] when the field spec is
    /// inconsistent: no resolvable type, no choices, both children and a
    /// schema on an object, a non-sequence type on a list, or an enum type
    /// that does not match the declared enumeration.
    pub fn build(mut spec: FieldSpec) -> FormResult<Self> {
        let name = match (&spec.name, &spec.kind) {
            (Some(name), _) => name.clone(),
            (None, FieldKind::Object(_)) => {
                let suffix = uuid::Uuid::new_v4().simple().to_string();
                let name = format!("object_{}", &suffix[..5]);
                spec.name = Some(name.clone());
                name
            }
            (None, _) => DEFAULT_NAME.to_string(),
        };
        let alias = spec.alias.clone().unwrap_or_else(|| name.clone());
        let id = spec.id.clone().unwrap_or_else(|| alias.clone());

        Self::validate_setup(&mut spec, &name)?;

        let annotation = spec
            .annotation
            .clone()
            .or_else(|| spec.kind.default_annotation())
            .ok_or_else(|| {
                FormError::ImproperlyConfigured(format!("Field '{name}' has no declared type"))
            })?;
        let constraints = fold_constraints(&spec);
        let node = Self::create_node(&spec, &name, &alias, &id, &annotation)?;

        let mut field = Self {
            spec,
            name,
            alias,
            id,
            annotation,
            constraints,
            state: FieldState::default(),
            node,
        };
        field.on_field_ready()?;
        Ok(field)
    }

    /// Rejects inconsistent specs and fills the parts that can be
    /// inferred from the declared type.
    fn validate_setup(spec: &mut FieldSpec, name: &str) -> FormResult<()> {
        let improper = |msg: String| Err(FormError::ImproperlyConfigured(msg));
        if name.is_empty() {
            return improper("Name is required".to_string());
        }

        // An explicitly declared sequence type makes the field multi-valued.
        if let (Some(annotation), None) = (&spec.annotation, spec.explicit_multiple()) {
            let multiple = annotation.is_sequence();
            spec.kind = match std::mem::replace(&mut spec.kind, FieldKind::Text) {
                FieldKind::Choice(mut c) => {
                    c.multiple = Some(multiple);
                    FieldKind::Choice(c)
                }
                FieldKind::Enum(mut e) => {
                    e.multiple = Some(multiple);
                    FieldKind::Enum(e)
                }
                FieldKind::File(mut f) => {
                    f.multiple = Some(multiple);
                    FieldKind::File(f)
                }
                FieldKind::Image(mut f) => {
                    f.multiple = Some(multiple);
                    FieldKind::Image(f)
                }
                other => other,
            };
        }

        let annotation = spec.annotation.clone();
        match &mut spec.kind {
            FieldKind::Choice(choice) if choice.choices.is_empty() => {
                return improper("Must provide 'choice'".to_string());
            }
            FieldKind::Enum(enum_spec) => {
                let declared = annotation.as_ref().and_then(TypeSpec::enum_def).cloned();
                if let (Some(def), Some(declared)) = (&enum_spec.enum_def, &declared) {
                    if def.name != declared.name {
                        return improper(format!(
                            "Annotation {} is not the same as the enum {}",
                            declared.name, def.name
                        ));
                    }
                }
                if enum_spec.enum_def.is_none() {
                    match declared {
                        Some(declared) => enum_spec.enum_def = Some(declared),
                        None => {
                            let got = annotation
                                .as_ref()
                                .map_or_else(|| "None".to_string(), ToString::to_string);
                            return improper(format!(
                                "EnumField Expected a Enum type but got {got}"
                            ));
                        }
                    }
                }
            }
            FieldKind::Object(object) => {
                let declared = annotation.as_ref().and_then(TypeSpec::record_schema).cloned();
                if !object.fields.is_empty() && object.schema.is_some() {
                    return improper(
                        "You cannot provide both fields and schema to ObjectField.".to_string(),
                    );
                }
                if let (Some(schema), Some(declared)) = (&object.schema, &declared) {
                    if schema.name != declared.name {
                        return improper(format!(
                            "Annotation {} is not the same as the provided schema {}",
                            declared.name, schema.name
                        ));
                    }
                }
                if object.schema.is_none() && object.fields.is_empty() {
                    match declared {
                        Some(declared) => object.schema = Some(declared),
                        None => {
                            return improper("Must provide either 'schema' or 'fields'".to_string());
                        }
                    }
                }
            }
            FieldKind::List(_) => {
                if let Some(annotation) = &annotation {
                    if !annotation.is_sequence() {
                        return improper("Annotation must be a Sequence".to_string());
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn create_node(
        spec: &FieldSpec,
        name: &str,
        alias: &str,
        id: &str,
        annotation: &TypeSpec,
    ) -> FormResult<FieldNode> {
        let required = spec.default.is_none();
        Ok(match &spec.kind {
            FieldKind::Choice(choice) => FieldNode::Choice(ChoiceRules::from_choices(
                choice.choices.clone(),
                annotation,
            )),
            FieldKind::Enum(enum_spec) => match &enum_spec.enum_def {
                Some(def) => {
                    FieldNode::Choice(ChoiceRules::from_enum(def, annotation.is_sequence()))
                }
                None => FieldNode::Leaf,
            },
            FieldKind::TimeZone => FieldNode::Choice(ChoiceRules::timezones(required)),
            FieldKind::Object(object) => FieldNode::Object {
                children: object::build_children(object, alias)?,
            },
            FieldKind::List(base) => {
                let mut base_spec = (**base).clone();
                base_spec.name = Some(name.to_string());
                base_spec.alias = Some(id.to_string());
                base_spec.id = None;
                if base_spec.annotation.is_none() {
                    base_spec.annotation = annotation.item_type().cloned();
                }
                FieldNode::List {
                    base: Box::new(Self::build(base_spec)?),
                    items: Vec::new(),
                }
            }
            _ => FieldNode::Leaf,
        })
    }

    fn on_field_ready(&mut self) -> FormResult<()> {
        if matches!(self.spec.kind, FieldKind::Enum(_)) {
            self.spec.default = self.spec.default.take().map(unwrap_enum);
        }
        self.load()
    }

    /// Builds a new field from a modified copy of this field's spec.
    ///
    /// The alias and id are reset before `edit` runs, so they default to
    /// the (possibly new) name unless `edit` sets them.
    pub fn rebuild(&self, edit: impl FnOnce(FieldSpec) -> FieldSpec) -> FormResult<Self> {
        let mut spec = self.spec.clone();
        spec.alias = None;
        spec.id = None;
        Self::build(edit(spec))
    }

    /// Coerces `raw` and stores the result.
    ///
    /// On failure the previous value is kept and, unless `suppress_errors`
    /// is set, the formatted errors are recorded. Choice membership is not
    /// checked on this path.
    pub fn process(&mut self, raw: &Value, suppress_errors: bool) -> FormResult<()> {
        self.state.errors.clear();
        match self.node {
            FieldNode::Object { .. } => self.process_object(raw, suppress_errors),
            FieldNode::List { .. } => self.process_list(raw, suppress_errors),
            FieldNode::Leaf | FieldNode::Choice(_) => {
                match validate_value(&self.annotation, &self.constraints, raw) {
                    Ok(value) => self.set_value(value),
                    Err(errors) if !suppress_errors => self.state.errors = format_errors(&errors),
                    Err(_) => {}
                }
                Ok(())
            }
        }
    }

    /// Resets transient state and processes the default.
    pub fn load(&mut self) -> FormResult<()> {
        self.clear();
        let default = self.spec.default.clone().unwrap_or(Value::Null);
        self.process(&default, true)
    }

    /// Resets value, display data, raw data and errors. List items are
    /// dropped.
    pub fn clear(&mut self) {
        self.state = FieldState::default();
        match &mut self.node {
            FieldNode::Object { children } => children.iter_mut().for_each(Self::clear),
            FieldNode::List { items, .. } => items.clear(),
            FieldNode::Leaf | FieldNode::Choice(_) => {}
        }
    }

    /// Reads this field from `source`, applying its domain rules.
    ///
    /// Validation failures are returned in the result and recorded on the
    /// field; only a failing source or a configuration error is an `Err`.
    pub fn process_form_data<'a>(
        &'a mut self,
        source: &'a dyn FormDataSource,
    ) -> BoxFuture<'a, FormResult<FieldResult>> {
        Box::pin(async move {
            match self.node {
                FieldNode::Object { .. } => self.object_form_data(source).await,
                FieldNode::List { .. } => self.list_form_data(source).await,
                FieldNode::Leaf | FieldNode::Choice(_) => self.leaf_form_data(source).await,
            }
        })
    }

    async fn leaf_form_data(&mut self, source: &dyn FormDataSource) -> FormResult<FieldResult> {
        let flat = source.flat_form_data().await?;
        let raw = if self.annotation.is_sequence() {
            flat.get_list(&self.alias).map(|values| Value::List(values.clone()))
        } else {
            flat.get(&self.alias).cloned()
        };
        tracing::trace!(key = %self.alias, found = raw.is_some(), "flat form lookup");

        let outcome = self.resolve(raw.as_ref());
        let raw_data = raw.unwrap_or(Value::Null);
        self.state.raw_data = Some(raw_data.clone());
        Ok(self.finish(outcome, raw_data))
    }

    /// Coerces a submitted value and applies choice rules. Absent and
    /// empty submissions take the default, or fail when required.
    fn resolve(&self, raw: Option<&Value>) -> Result<Value, Vec<ErrorDetail>> {
        let Some(raw) = raw.filter(|v| !is_blank(v)) else {
            return self.typed_default().ok_or_else(|| vec![ErrorDetail::missing()]);
        };
        let value = validate_value(&self.annotation, &self.constraints, raw)?;
        let preview_limit = formbind_core::settings::current().choice_preview_limit;
        match &self.node {
            FieldNode::Choice(rules) => rules
                .check(value, self.required(), preview_limit)
                .map_err(|e| vec![e]),
            _ => Ok(value),
        }
    }

    /// The default coerced through the annotation, so an enum token comes
    /// back as its member. Defaults the annotation rejects are kept as-is.
    fn typed_default(&self) -> Option<Value> {
        match self.spec.default.as_ref()? {
            Value::Null => Some(Value::Null),
            default => Some(
                validate_value(&self.annotation, &Constraints::default(), default)
                    .unwrap_or_else(|_| default.clone()),
            ),
        }
    }

    /// Records a processing outcome and packages it for the parent.
    fn finish(&mut self, outcome: Result<Value, Vec<ErrorDetail>>, raw_data: Value) -> FieldResult {
        match outcome {
            Ok(value) => {
                self.state.errors.clear();
                self.set_value(value.clone());
                FieldResult {
                    value: Some(value),
                    errors: Vec::new(),
                    raw_data,
                }
            }
            Err(errors) => {
                tracing::debug!(field = %self.name, errors = errors.len(), "field rejected input");
                self.state.errors = format_errors(&errors);
                FieldResult {
                    value: None,
                    errors,
                    raw_data,
                }
            }
        }
    }

    fn set_value(&mut self, value: Value) {
        let data = match serialize_value(&value) {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(
                    field = %self.name,
                    error = %err,
                    "display value falls back to the typed value"
                );
                value.clone()
            }
        };
        self.state.data = Some(data);
        self.state.value = Some(value);
    }

    // ── Accessors ─────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub const fn annotation(&self) -> &TypeSpec {
        &self.annotation
    }

    pub const fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub const fn spec(&self) -> &FieldSpec {
        &self.spec
    }

    pub const fn kind(&self) -> &FieldKind {
        &self.spec.kind
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.spec.default.as_ref()
    }

    /// A field is required when it has no default.
    pub const fn required(&self) -> bool {
        self.spec.default.is_none()
    }

    /// The typed value of the last successful processing.
    pub fn value(&self) -> Option<&Value> {
        self.state.value.as_ref()
    }

    /// What was last submitted for this field.
    pub fn raw_data(&self) -> Option<&Value> {
        self.state.raw_data.as_ref()
    }

    /// The value to show in the widget: the submitted input when there is
    /// any, otherwise the serialized typed value.
    pub fn data(&self) -> Option<&Value> {
        match &self.state.raw_data {
            Some(raw) if raw.is_truthy() => Some(raw),
            _ => self.state.data.as_ref(),
        }
    }

    pub fn errors(&self) -> &[String] {
        &self.state.errors
    }

    /// The label text: explicit, or derived from the name.
    pub fn label(&self) -> Cow<'_, str> {
        self.spec
            .label
            .as_deref()
            .map_or_else(|| Cow::Owned(pretty_name(&self.name)), Cow::Borrowed)
    }

    pub fn help_text(&self) -> Option<&str> {
        self.spec.help_text.as_deref()
    }

    /// Choice rules of choice, enum and time zone fields.
    pub const fn choice_rules(&self) -> Option<&ChoiceRules> {
        match &self.node {
            FieldNode::Choice(rules) => Some(rules),
            _ => None,
        }
    }

    /// Children of an object field.
    pub fn children(&self) -> &[Self] {
        match &self.node {
            FieldNode::Object { children } => children,
            _ => &[],
        }
    }

    /// Looks up a child of an object field by name.
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children().iter().find(|c| c.name == name)
    }
}

/// Resolves the numeric `min`/`max`/`step` options into constraints.
/// Explicit strict bounds win over `min`/`max`.
fn fold_constraints(spec: &FieldSpec) -> Constraints {
    let mut constraints = spec.constraints.clone();
    if spec.kind.is_numeric() {
        if constraints.gt.is_none() {
            constraints.ge = constraints.ge.or(spec.min);
        }
        if constraints.lt.is_none() {
            constraints.le = constraints.le.or(spec.max);
        }
        if let Some(step) = spec.step.filter(|s| *s > 0.0) {
            constraints.multiple_of = constraints.multiple_of.or(Some(step));
        }
    }
    constraints
}

fn unwrap_enum(value: Value) -> Value {
    match value {
        Value::Enum(member) => *member.value,
        Value::List(items) => Value::List(items.into_iter().map(unwrap_enum).collect()),
        other => other,
    }
}

/// Submissions treated as absent.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::List(items) => items.is_empty(),
        _ => false,
    }
}

/// `first_name` -> `First name`.
pub fn pretty_name(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Builds the flat key of a child of `parent`.
pub(crate) fn child_alias(parent: &str, child: &FieldSpec) -> String {
    keys::compose(parent, child.name.as_deref().unwrap_or(DEFAULT_NAME))
}
