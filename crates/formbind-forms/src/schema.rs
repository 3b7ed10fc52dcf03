//! Type annotations and record schemas.
//!
//! A [`RecordSchema`] is a named record type with ordered, typed
//! [`Attribute`]s. Each attribute carries a [`TypeSpec`] annotation, an
//! optional default (an attribute without a default is required), declared
//! [`Constraints`], and optionally an explicit [`FieldSpec`] that pins the
//! form field used for it.
//!
//! Whole-record rules that span several attributes are expressed as
//! [`RecordValidator`]s and run after every attribute validated.

use std::fmt;
use std::sync::Arc;

use formbind_core::{RecordValue, ValidationError, Value};

use crate::fields::FieldSpec;

/// A declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    /// Accepts any value unchanged.
    Any,
    /// A string.
    Str,
    /// A 64-bit integer.
    Int,
    /// A floating-point number.
    Float,
    /// A decimal number.
    Decimal,
    /// A boolean.
    Bool,
    /// A calendar date.
    Date,
    /// A date and time.
    DateTime,
    /// A time of day.
    Time,
    /// An email address.
    Email,
    /// An absolute URL.
    Url,
    /// A UUID.
    Uuid,
    /// An uploaded file.
    File,
    /// A member of a declared enumeration.
    Enum(Arc<EnumDef>),
    /// A homogeneous sequence.
    List(Box<TypeSpec>),
    /// An instance of a record schema.
    Record(Arc<RecordSchema>),
    /// A string-keyed mapping.
    Dict,
    /// The inner type, or `None`.
    Optional(Box<TypeSpec>),
    /// A custom type validated like `base`, registered under its own name.
    Named {
        /// Registry tag.
        name: String,
        /// The type used for validation.
        base: Box<TypeSpec>,
    },
}

/// Identity of a type for registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Any,
    Str,
    Int,
    Float,
    Decimal,
    Bool,
    Date,
    DateTime,
    Time,
    Email,
    Url,
    Uuid,
    File,
    Enum,
    List,
    Record,
    Dict,
    Named(String),
}

impl TypeSpec {
    /// `List[inner]`.
    pub fn list(inner: Self) -> Self {
        Self::List(Box::new(inner))
    }

    /// `Optional[inner]`.
    pub fn optional(inner: Self) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// A named custom type.
    pub fn named(name: impl Into<String>, base: Self) -> Self {
        Self::Named {
            name: name.into(),
            base: Box::new(base),
        }
    }

    /// Returns the type with `Optional` and `Named` wrappers removed.
    pub fn origin(&self) -> &Self {
        match self {
            Self::Optional(inner) => inner.origin(),
            Self::Named { base, .. } => base.origin(),
            other => other,
        }
    }

    /// Returns `true` for sequence types (looking through `Optional`).
    pub fn is_sequence(&self) -> bool {
        matches!(self.origin(), Self::List(_))
    }

    /// Returns the element type of a sequence.
    pub fn item_type(&self) -> Option<&Self> {
        match self.origin() {
            Self::List(inner) => Some(inner),
            _ => None,
        }
    }

    /// Returns the enumeration referenced by this type, looking through
    /// `Optional` and `List`.
    pub fn enum_def(&self) -> Option<&Arc<EnumDef>> {
        match self.origin() {
            Self::Enum(def) => Some(def),
            Self::List(inner) => inner.enum_def(),
            _ => None,
        }
    }

    /// Returns the record schema referenced by this type.
    pub fn record_schema(&self) -> Option<&Arc<RecordSchema>> {
        match self.origin() {
            Self::Record(schema) => Some(schema),
            _ => None,
        }
    }

    /// Returns the registry tag of this type. `Optional` reports its
    /// inner tag.
    pub fn tag(&self) -> TypeTag {
        match self {
            Self::Any => TypeTag::Any,
            Self::Str => TypeTag::Str,
            Self::Int => TypeTag::Int,
            Self::Float => TypeTag::Float,
            Self::Decimal => TypeTag::Decimal,
            Self::Bool => TypeTag::Bool,
            Self::Date => TypeTag::Date,
            Self::DateTime => TypeTag::DateTime,
            Self::Time => TypeTag::Time,
            Self::Email => TypeTag::Email,
            Self::Url => TypeTag::Url,
            Self::Uuid => TypeTag::Uuid,
            Self::File => TypeTag::File,
            Self::Enum(_) => TypeTag::Enum,
            Self::List(_) => TypeTag::List,
            Self::Record(_) => TypeTag::Record,
            Self::Dict => TypeTag::Dict,
            Self::Optional(inner) => inner.tag(),
            Self::Named { name, .. } => TypeTag::Named(name.clone()),
        }
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "Any"),
            Self::Str => write!(f, "str"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Decimal => write!(f, "Decimal"),
            Self::Bool => write!(f, "bool"),
            Self::Date => write!(f, "date"),
            Self::DateTime => write!(f, "datetime"),
            Self::Time => write!(f, "time"),
            Self::Email => write!(f, "EmailStr"),
            Self::Url => write!(f, "AnyUrl"),
            Self::Uuid => write!(f, "UUID"),
            Self::File => write!(f, "UploadFile"),
            Self::Enum(def) => write!(f, "{}", def.name),
            Self::List(inner) => write!(f, "List[{inner}]"),
            Self::Record(schema) => write!(f, "{}", schema.name),
            Self::Dict => write!(f, "dict"),
            Self::Optional(inner) => write!(f, "Optional[{inner}]"),
            Self::Named { name, .. } => write!(f, "{name}"),
        }
    }
}

/// Declared value constraints, checked after coercion.
///
/// Length bounds apply to strings (in characters) and lists (in items);
/// numeric bounds apply to integers, floats and decimals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub ge: Option<f64>,
    pub gt: Option<f64>,
    pub le: Option<f64>,
    pub lt: Option<f64>,
    pub multiple_of: Option<f64>,
    pub pattern: Option<String>,
}

impl Constraints {
    /// No constraints.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn min_length(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    #[must_use]
    pub const fn max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }

    #[must_use]
    pub const fn ge(mut self, v: f64) -> Self {
        self.ge = Some(v);
        self
    }

    #[must_use]
    pub const fn gt(mut self, v: f64) -> Self {
        self.gt = Some(v);
        self
    }

    #[must_use]
    pub const fn le(mut self, v: f64) -> Self {
        self.le = Some(v);
        self
    }

    #[must_use]
    pub const fn lt(mut self, v: f64) -> Self {
        self.lt = Some(v);
        self
    }

    #[must_use]
    pub const fn multiple_of(mut self, v: f64) -> Self {
        self.multiple_of = Some(v);
        self
    }

    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Returns `true` if no constraint is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fills every unset constraint from `other`.
    #[must_use]
    pub fn or(self, other: &Self) -> Self {
        Self {
            min_length: self.min_length.or(other.min_length),
            max_length: self.max_length.or(other.max_length),
            ge: self.ge.or(other.ge),
            gt: self.gt.or(other.gt),
            le: self.le.or(other.le),
            lt: self.lt.or(other.lt),
            multiple_of: self.multiple_of.or(other.multiple_of),
            pattern: self.pattern.or_else(|| other.pattern.clone()),
        }
    }
}

/// A declared enumeration: ordered `(member name, token)` pairs.
///
/// # Examples
///
/// ```
/// use formbind_forms::schema::EnumDef;
///
/// let color = EnumDef::new("Color")
///     .member("RED", "red")
///     .member("GREEN", "green");
/// assert!(!color.is_int());
/// assert_eq!(color.from_token(&"green".into()).unwrap().name, "GREEN");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub members: Vec<(String, Value)>,
}

impl EnumDef {
    /// Creates an enumeration without members.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Adds a member.
    #[must_use]
    pub fn member(mut self, name: impl Into<String>, token: impl Into<Value>) -> Self {
        self.members.push((name.into(), token.into()));
        self
    }

    /// Wraps the definition for use in a [`TypeSpec::Enum`].
    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Returns `true` if every token is an integer.
    pub fn is_int(&self) -> bool {
        !self.members.is_empty() && self.members.iter().all(|(_, v)| matches!(v, Value::Int(_)))
    }

    /// Returns the member tokens in declaration order.
    pub fn tokens(&self) -> Vec<Value> {
        self.members.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Returns the member named `name`.
    pub fn get(&self, name: &str) -> Option<formbind_core::EnumMember> {
        self.members
            .iter()
            .find(|(n, _)| n == name)
            .map(|(n, v)| formbind_core::EnumMember::new(self.name.clone(), n.clone(), v.clone()))
    }

    /// Returns the member whose token equals `token`.
    pub fn from_token(&self, token: &Value) -> Option<formbind_core::EnumMember> {
        self.members
            .iter()
            .find(|(_, v)| v == token)
            .map(|(n, v)| formbind_core::EnumMember::new(self.name.clone(), n.clone(), v.clone()))
    }
}

/// One attribute of a [`RecordSchema`].
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    /// External key used for lookups; defaults to `name`.
    pub alias: Option<String>,
    pub annotation: TypeSpec,
    /// `None` makes the attribute required. `Some(Value::Null)` is an
    /// explicit `None` default.
    pub default: Option<Value>,
    pub constraints: Constraints,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Pins the form field generated for this attribute.
    pub field: Option<FieldSpec>,
}

impl Attribute {
    /// Creates a required attribute.
    pub fn new(name: impl Into<String>, annotation: TypeSpec) -> Self {
        Self {
            name: name.into(),
            alias: None,
            annotation,
            default: None,
            constraints: Constraints::default(),
            title: None,
            description: None,
            field: None,
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
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
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.field = Some(field);
        self
    }

    /// The key this attribute is read from.
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub const fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// A cross-attribute rule run on a fully validated record.
pub trait RecordValidator: Send + Sync + fmt::Debug {
    /// Validates the record.
    ///
    /// Errors with `field_errors` are reported per attribute; otherwise the
    /// top-level message is reported for the record as a whole.
    fn validate(&self, record: &RecordValue) -> Result<(), ValidationError>;
}

/// Adapts a closure into a [`RecordValidator`].
pub struct FnRecordValidator<F> {
    name: &'static str,
    func: F,
}

impl<F> FnRecordValidator<F>
where
    F: Fn(&RecordValue) -> Result<(), ValidationError> + Send + Sync,
{
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> fmt::Debug for FnRecordValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRecordValidator")
            .field("name", &self.name)
            .finish()
    }
}

impl<F> RecordValidator for FnRecordValidator<F>
where
    F: Fn(&RecordValue) -> Result<(), ValidationError> + Send + Sync,
{
    fn validate(&self, record: &RecordValue) -> Result<(), ValidationError> {
        (self.func)(record)
    }
}

/// A named record type.
///
/// # Examples
///
/// ```
/// use formbind_forms::schema::{Attribute, Constraints, RecordSchema, TypeSpec};
///
/// let person = RecordSchema::new("Person")
///     .attribute(Attribute::new("name", TypeSpec::Str))
///     .attribute(Attribute::new("age", TypeSpec::Int).constraints(Constraints::new().ge(0.0)))
///     .build();
///
/// assert_eq!(person.attributes().len(), 2);
/// assert!(person.get("age").unwrap().is_required());
/// ```
#[derive(Debug, Clone)]
pub struct RecordSchema {
    pub name: String,
    attributes: Vec<Attribute>,
    validators: Vec<Arc<dyn RecordValidator>>,
}

impl PartialEq for RecordSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.attributes.len() == other.attributes.len()
            && self
                .attributes
                .iter()
                .zip(&other.attributes)
                .all(|(a, b)| a.name == b.name && a.annotation == b.annotation)
    }
}

impl RecordSchema {
    /// Creates an empty schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            validators: Vec::new(),
        }
    }

    /// Appends an attribute.
    #[must_use]
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Adds a whole-record validator.
    #[must_use]
    pub fn validator(mut self, validator: impl RecordValidator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Adds a whole-record validator from a closure.
    #[must_use]
    pub fn validate_with<F>(self, name: &'static str, func: F) -> Self
    where
        F: Fn(&RecordValue) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.validator(FnRecordValidator::new(name, func))
    }

    /// Freezes the schema.
    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn validators(&self) -> &[Arc<dyn RecordValidator>] {
        &self.validators
    }

    /// Returns the attribute named `name`.
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}
