//! The coercion and validation engine.
//!
//! [`validate_value`] turns a raw value (usually a string from a form
//! submission, or an already typed value being re-processed) into a typed
//! [`Value`] for a [`TypeSpec`], then checks declared [`Constraints`].
//! Failures are returned as [`ErrorDetail`]s, never raised: a bad
//! submission is ordinary data.
//!
//! [`serialize_value`] is the reverse direction used to compute display
//! values. [`validate_record`] validates a whole mapping against a
//! [`RecordSchema`], including its cross-attribute validators.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use formbind_core::{FormError, FormResult, RecordValue, ValidationError, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::schema::{Constraints, EnumDef, RecordSchema, TypeSpec};

/// Machine-readable category of an [`ErrorDetail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Missing,
    StringType,
    IntType,
    IntParsing,
    IntFromFloat,
    FloatType,
    FloatParsing,
    DecimalType,
    DecimalParsing,
    BoolType,
    BoolParsing,
    DateType,
    DateParsing,
    DatetimeType,
    DatetimeParsing,
    TimeType,
    TimeParsing,
    UuidType,
    UuidParsing,
    UrlParsing,
    Enum,
    ListType,
    DictType,
    ModelType,
    StringTooShort,
    StringTooLong,
    StringPatternMismatch,
    TooShort,
    TooLong,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    MultipleOf,
    ValueError,
    TypeError,
}

/// One validation failure.
///
/// `loc` is the path below the value that was validated: attribute names
/// for records, indices for lists. It is empty for failures of the value
/// itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub loc: Vec<String>,
    pub msg: String,
    pub kind: ErrorKind,
}

impl ErrorDetail {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            loc: Vec::new(),
            msg: msg.into(),
            kind,
        }
    }

    /// The error reported for a required value that was not supplied.
    pub fn missing() -> Self {
        Self::new(ErrorKind::Missing, "Field required")
    }

    /// A failed domain rule.
    pub fn value_error(msg: impl fmt::Display) -> Self {
        Self::new(ErrorKind::ValueError, format!("Value error, {msg}"))
    }

    /// Prefixes `loc` with `segment`.
    #[must_use]
    pub fn at(mut self, segment: impl Into<String>) -> Self {
        self.loc.insert(0, segment.into());
        self
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.loc.is_empty() {
            write!(f, "{}", self.msg)
        } else {
            write!(f, "{}: {}", self.loc.join("."), self.msg)
        }
    }
}

/// Converts error details to the human-readable messages stored on fields
/// and forms.
pub fn format_errors(errors: &[ErrorDetail]) -> Vec<String> {
    errors.iter().map(ToString::to_string).collect()
}

/// Result of validating one value.
pub type Validated<T = Value> = Result<T, Vec<ErrorDetail>>;

/// Coerces `raw` to `ty` and checks `constraints`.
///
/// # Examples
///
/// ```
/// use formbind_core::Value;
/// use formbind_forms::schema::{Constraints, TypeSpec};
/// use formbind_forms::validation::validate_value;
///
/// let v = validate_value(&TypeSpec::Int, &Constraints::new(), &Value::from("42")).unwrap();
/// assert_eq!(v, Value::Int(42));
///
/// let errors = validate_value(&TypeSpec::Int, &Constraints::new().le(10.0), &Value::from("42"))
///     .unwrap_err();
/// assert_eq!(errors[0].msg, "Input should be less than or equal to 10");
/// ```
pub fn validate_value(ty: &TypeSpec, constraints: &Constraints, raw: &Value) -> Validated {
    match ty {
        TypeSpec::Any => Ok(raw.clone()),
        TypeSpec::Optional(inner) => {
            if raw.is_null() {
                Ok(Value::Null)
            } else {
                validate_value(inner, constraints, raw)
            }
        }
        TypeSpec::Named { base, .. } => validate_value(base, constraints, raw),
        TypeSpec::List(inner) => validate_list(inner, constraints, raw),
        TypeSpec::Record(schema) => match raw {
            Value::Record(record) if record.schema == schema.name => Ok(raw.clone()),
            Value::Map(values) => validate_record(schema, values).map(Value::Record),
            _ => Err(vec![ErrorDetail::new(
                ErrorKind::ModelType,
                format!(
                    "Input should be a valid dictionary or instance of {}",
                    schema.name
                ),
            )]),
        },
        TypeSpec::Dict => match raw {
            Value::Map(_) => Ok(raw.clone()),
            Value::Record(record) => Ok(Value::Map(record.fields.clone())),
            _ => Err(vec![ErrorDetail::new(
                ErrorKind::DictType,
                "Input should be a valid dictionary",
            )]),
        },
        scalar => {
            let value = coerce_scalar(scalar, raw).map_err(|e| vec![e])?;
            check_constraints(&value, constraints).map_err(|e| vec![e])?;
            Ok(value)
        }
    }
}

/// Validates a mapping against `schema`.
///
/// Each attribute is read by its alias, then by its name. Absent
/// attributes take their default or fail with `Field required`. A value
/// equal to the attribute's default is taken as is. Record validators run
/// only once every attribute is valid.
pub fn validate_record(
    schema: &RecordSchema,
    values: &BTreeMap<String, Value>,
) -> Validated<RecordValue> {
    let mut fields = BTreeMap::new();
    let mut errors = Vec::new();

    for attr in schema.attributes() {
        let raw = values.get(attr.key()).or_else(|| values.get(&attr.name));
        match (raw, &attr.default) {
            (None, Some(default)) => {
                fields.insert(attr.name.clone(), default.clone());
            }
            (None, None) => errors.push(ErrorDetail::missing().at(attr.key())),
            (Some(v), Some(default)) if v == default => {
                fields.insert(attr.name.clone(), default.clone());
            }
            (Some(v), _) => match validate_value(&attr.annotation, &attr.constraints, v) {
                Ok(typed) => {
                    fields.insert(attr.name.clone(), typed);
                }
                Err(errs) => errors.extend(errs.into_iter().map(|e| e.at(attr.key()))),
            },
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let record = RecordValue::new(schema.name.clone(), fields);
    for validator in schema.validators() {
        if let Err(err) = validator.validate(&record) {
            errors.extend(record_errors(&err));
        }
    }

    if errors.is_empty() {
        Ok(record)
    } else {
        Err(errors)
    }
}

/// Validates an untyped mapping. Every mapping is valid.
pub fn validate_dict(values: &BTreeMap<String, Value>) -> Validated {
    Ok(Value::Map(values.clone()))
}

fn record_errors(err: &ValidationError) -> Vec<ErrorDetail> {
    let mut out = Vec::new();
    if !err.message.is_empty() {
        out.push(ErrorDetail::value_error(&err.message));
    }
    let mut names: Vec<&String> = err.field_errors.keys().collect();
    names.sort();
    for name in names {
        for field_error in &err.field_errors[name] {
            out.extend(
                field_error
                    .messages()
                    .into_iter()
                    .map(|m| ErrorDetail::value_error(m).at(name.clone())),
            );
        }
    }
    out
}

/// Converts a typed value to its display form.
///
/// Enum members become their token, records become mappings and temporal
/// values become ISO 8601 text.
///
/// # Errors
///
/// Returns [`FormError::SerializationError`] for values without a display
/// form (uploaded files, raw JSON documents).
pub fn serialize_value(value: &Value) -> FormResult<Value> {
    Ok(match value {
        Value::Enum(member) => serialize_value(&member.value)?,
        Value::Record(record) => Value::Map(serialize_map(&record.fields)?),
        Value::Map(map) => Value::Map(serialize_map(map)?),
        Value::List(items) => {
            Value::List(items.iter().map(serialize_value).collect::<FormResult<_>>()?)
        }
        Value::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        Value::DateTime(dt) => Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        Value::DateTimeTz(dt) => Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        Value::Time(t) => Value::String(t.format("%H:%M:%S%.f").to_string()),
        Value::Uuid(u) => Value::String(u.to_string()),
        Value::Decimal(d) => Value::String(d.clone()),
        Value::File(file) => {
            return Err(FormError::SerializationError(format!(
                "Unable to serialize uploaded file '{}'",
                file.name
            )))
        }
        Value::Json(_) => {
            return Err(FormError::SerializationError(
                "JSON documents have no display form".to_string(),
            ))
        }
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_) => {
            value.clone()
        }
    })
}

fn serialize_map(map: &BTreeMap<String, Value>) -> FormResult<BTreeMap<String, Value>> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), serialize_value(v)?)))
        .collect()
}

// ── Message helpers ───────────────────────────────────────────────────

/// Renders a token the way it appears in messages: strings quoted,
/// numbers bare.
pub fn repr(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{s}'"),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        Value::Enum(member) => repr(&member.value),
        Value::List(items) => repr_list(items),
        other => other.to_string(),
    }
}

/// Renders `['a', 'b']`.
pub fn repr_list(values: &[Value]) -> String {
    let parts: Vec<String> = values.iter().map(repr).collect();
    format!("[{}]", parts.join(", "))
}

/// Renders `'a', 'b' or 'c'`.
pub fn expected_one_of(values: &[Value]) -> String {
    let parts: Vec<String> = values.iter().map(repr).collect();
    match parts.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} or {last}", rest.join(", ")),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ── Scalars ───────────────────────────────────────────────────────────

fn coerce_scalar(ty: &TypeSpec, raw: &Value) -> Result<Value, ErrorDetail> {
    match ty {
        TypeSpec::Str => match raw {
            Value::String(_) => Ok(raw.clone()),
            _ => Err(ErrorDetail::new(
                ErrorKind::StringType,
                "Input should be a valid string",
            )),
        },
        TypeSpec::Email => match raw {
            Value::String(s) => coerce_email(s),
            _ => Err(ErrorDetail::new(
                ErrorKind::StringType,
                "Input should be a valid string",
            )),
        },
        TypeSpec::Url => match raw {
            Value::String(s) => url::Url::parse(s.trim())
                .map(|u| Value::String(u.to_string()))
                .map_err(|e| {
                    ErrorDetail::new(
                        ErrorKind::UrlParsing,
                        format!("Input should be a valid URL, {e}"),
                    )
                }),
            _ => Err(ErrorDetail::new(
                ErrorKind::UrlParsing,
                "URL input should be a string or URL",
            )),
        },
        TypeSpec::Int => coerce_int(raw),
        TypeSpec::Float => coerce_float(raw),
        TypeSpec::Decimal => coerce_decimal(raw),
        TypeSpec::Bool => coerce_bool(raw),
        TypeSpec::Date => coerce_date(raw),
        TypeSpec::DateTime => coerce_datetime(raw),
        TypeSpec::Time => coerce_time(raw),
        TypeSpec::Uuid => match raw {
            Value::Uuid(_) => Ok(raw.clone()),
            Value::String(s) => uuid::Uuid::parse_str(s.trim())
                .map(Value::Uuid)
                .map_err(|e| {
                    ErrorDetail::new(
                        ErrorKind::UuidParsing,
                        format!("Input should be a valid UUID, {e}"),
                    )
                }),
            _ => Err(ErrorDetail::new(
                ErrorKind::UuidType,
                "UUID input should be a string or UUID object",
            )),
        },
        TypeSpec::File => match raw {
            Value::File(_) => Ok(raw.clone()),
            other => Err(ErrorDetail::new(
                ErrorKind::ValueError,
                format!("Expected UploadFile, received: {}", other.type_name()),
            )),
        },
        TypeSpec::Enum(def) => coerce_enum(def, raw),
        // Composite and wrapper types are handled by `validate_value`.
        _ => Ok(raw.clone()),
    }
}

fn coerce_email(s: &str) -> Result<Value, ErrorDetail> {
    let invalid = |reason: &str| {
        ErrorDetail::new(
            ErrorKind::ValueError,
            format!("value is not a valid email address: {reason}"),
        )
    };
    let s = s.trim();
    let Some((local, domain)) = s.rsplit_once('@') else {
        return Err(invalid("An email address must have an @-sign."));
    };
    if local.is_empty() {
        return Err(invalid("There must be something before the @-sign."));
    }
    if domain.is_empty() {
        return Err(invalid("There must be something after the @-sign."));
    }
    if s.chars().any(char::is_whitespace) {
        return Err(invalid("The email address contains invalid whitespace."));
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid(
            "The part after the @-sign is not valid. It should have a period.",
        ));
    }
    Ok(Value::String(s.to_string()))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_int(f: f64) -> Result<Value, ErrorDetail> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.2e18 {
        Ok(Value::Int(f as i64))
    } else {
        Err(ErrorDetail::new(
            ErrorKind::IntFromFloat,
            "Input should be a valid integer, got a number with a fractional part",
        ))
    }
}

fn coerce_int(raw: &Value) -> Result<Value, ErrorDetail> {
    let parse_error = || {
        ErrorDetail::new(
            ErrorKind::IntParsing,
            "Input should be a valid integer, unable to parse string as an integer",
        )
    };
    match raw {
        Value::Int(_) => Ok(raw.clone()),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => float_to_int(*f),
        Value::String(s) | Value::Decimal(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Value::Int(i));
            }
            // "3.0" is an integer, "3.5" is not.
            match s.parse::<f64>() {
                Ok(f) => float_to_int(f).map_err(|_| parse_error()),
                Err(_) => Err(parse_error()),
            }
        }
        _ => Err(ErrorDetail::new(
            ErrorKind::IntType,
            "Input should be a valid integer",
        )),
    }
}

#[allow(clippy::cast_precision_loss)]
fn coerce_float(raw: &Value) -> Result<Value, ErrorDetail> {
    match raw {
        Value::Float(_) => Ok(raw.clone()),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::String(s) | Value::Decimal(s) => {
            s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                ErrorDetail::new(
                    ErrorKind::FloatParsing,
                    "Input should be a valid number, unable to parse string as a number",
                )
            })
        }
        _ => Err(ErrorDetail::new(
            ErrorKind::FloatType,
            "Input should be a valid number",
        )),
    }
}

fn is_decimal_literal(s: &str) -> bool {
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (unsigned, None),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits_ok = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    let mantissa_ok = digits_ok(int_part)
        && digits_ok(frac_part)
        && !(int_part.is_empty() && frac_part.is_empty());
    let exponent_ok = exponent.map_or(true, |e| {
        let e = e.strip_prefix(['+', '-']).unwrap_or(e);
        !e.is_empty() && digits_ok(e)
    });
    mantissa_ok && exponent_ok
}

fn coerce_decimal(raw: &Value) -> Result<Value, ErrorDetail> {
    match raw {
        Value::Decimal(_) => Ok(raw.clone()),
        Value::Int(i) => Ok(Value::Decimal(i.to_string())),
        Value::Float(f) if f.is_finite() => Ok(Value::Decimal(f.to_string())),
        Value::String(s) if is_decimal_literal(s.trim()) => {
            Ok(Value::Decimal(s.trim().to_string()))
        }
        Value::String(_) | Value::Float(_) => Err(ErrorDetail::new(
            ErrorKind::DecimalParsing,
            "Input should be a valid decimal",
        )),
        _ => Err(ErrorDetail::new(
            ErrorKind::DecimalType,
            "Decimal input should be an integer, float, string or Decimal object",
        )),
    }
}

fn coerce_bool(raw: &Value) -> Result<Value, ErrorDetail> {
    let parse_error = || {
        ErrorDetail::new(
            ErrorKind::BoolParsing,
            "Input should be a valid boolean, unable to interpret input",
        )
    };
    match raw {
        Value::Bool(_) => Ok(raw.clone()),
        Value::Int(0) => Ok(Value::Bool(false)),
        Value::Int(1) => Ok(Value::Bool(true)),
        Value::Int(_) => Err(parse_error()),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "on" | "t" | "true" | "y" | "yes" => Ok(Value::Bool(true)),
            "0" | "f" | "false" | "n" | "no" | "off" => Ok(Value::Bool(false)),
            _ => Err(parse_error()),
        },
        _ => Err(ErrorDetail::new(
            ErrorKind::BoolType,
            "Input should be a valid boolean",
        )),
    }
}

fn coerce_date(raw: &Value) -> Result<Value, ErrorDetail> {
    match raw {
        Value::Date(_) => Ok(raw.clone()),
        Value::DateTime(dt) if dt.time() == NaiveTime::MIN => Ok(Value::Date(dt.date())),
        Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|_| {
                ErrorDetail::new(
                    ErrorKind::DateParsing,
                    "Input should be a valid date in the format YYYY-MM-DD",
                )
            }),
        _ => Err(ErrorDetail::new(
            ErrorKind::DateType,
            "Input should be a valid date",
        )),
    }
}

/// Seconds (or milliseconds, above 2e10) since the Unix epoch.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn from_timestamp(ts: f64) -> Option<DateTime<Utc>> {
    if !ts.is_finite() {
        return None;
    }
    let secs = if ts.abs() > 2e10 { ts / 1000.0 } else { ts };
    let whole = secs.floor();
    let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(whole as i64, nanos)
}

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

#[allow(clippy::cast_precision_loss)]
fn coerce_datetime(raw: &Value) -> Result<Value, ErrorDetail> {
    let parse_error = || {
        ErrorDetail::new(
            ErrorKind::DatetimeParsing,
            "Input should be a valid datetime",
        )
    };
    match raw {
        Value::DateTime(_) | Value::DateTimeTz(_) => Ok(raw.clone()),
        Value::Int(i) => from_timestamp(*i as f64)
            .map(Value::DateTimeTz)
            .ok_or_else(parse_error),
        Value::Float(f) => from_timestamp(*f)
            .map(Value::DateTimeTz)
            .ok_or_else(parse_error),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ts) = s.parse::<f64>() {
                return from_timestamp(ts)
                    .map(Value::DateTimeTz)
                    .ok_or_else(parse_error);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(Value::DateTimeTz(dt.with_timezone(&Utc)));
            }
            if let Some(dt) = NAIVE_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            {
                return Ok(Value::DateTime(dt));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(|d| Value::DateTime(d.and_time(NaiveTime::MIN)))
                .map_err(|_| parse_error())
        }
        _ => Err(ErrorDetail::new(
            ErrorKind::DatetimeType,
            "Input should be a valid datetime",
        )),
    }
}

fn coerce_time(raw: &Value) -> Result<Value, ErrorDetail> {
    match raw {
        Value::Time(_) => Ok(raw.clone()),
        Value::String(s) => {
            let s = s.trim();
            NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .map(Value::Time)
                .map_err(|_| {
                    ErrorDetail::new(
                        ErrorKind::TimeParsing,
                        "Input should be in a valid time format",
                    )
                })
        }
        _ => Err(ErrorDetail::new(
            ErrorKind::TimeType,
            "Input should be a valid time",
        )),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn coerce_enum(def: &EnumDef, raw: &Value) -> Result<Value, ErrorDetail> {
    if let Value::Enum(member) = raw {
        if member.enum_name == def.name && def.from_token(&member.value).is_some() {
            return Ok(raw.clone());
        }
    }
    let token = if def.is_int() {
        match raw {
            Value::Int(_) => Some(raw.clone()),
            Value::Float(f) if f.fract() == 0.0 => Some(Value::Int(*f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::Int),
            _ => None,
        }
    } else {
        Some(raw.clone())
    };
    token
        .and_then(|t| def.from_token(&t))
        .map(Value::Enum)
        .ok_or_else(|| {
            ErrorDetail::new(
                ErrorKind::Enum,
                format!("Input should be {}", expected_one_of(&def.tokens())),
            )
        })
}

// ── Composites and constraints ────────────────────────────────────────

fn validate_list(inner: &TypeSpec, constraints: &Constraints, raw: &Value) -> Validated {
    let Value::List(items) = raw else {
        return Err(vec![ErrorDetail::new(
            ErrorKind::ListType,
            "Input should be a valid list",
        )]);
    };

    let item_constraints = Constraints::default();
    let mut out = Vec::with_capacity(items.len());
    let mut errors = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match validate_value(inner, &item_constraints, item) {
            Ok(v) => out.push(v),
            Err(errs) => errors.extend(errs.into_iter().map(|e| e.at(index.to_string()))),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }
    check_length(out.len(), constraints, LengthOf::List).map_err(|e| vec![e])?;
    Ok(Value::List(out))
}

#[derive(Clone, Copy)]
enum LengthOf {
    String,
    List,
}

fn plural(n: usize, unit: &str) -> String {
    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

fn check_length(len: usize, c: &Constraints, of: LengthOf) -> Result<(), ErrorDetail> {
    if let Some(min) = c.min_length.filter(|min| len < *min) {
        return Err(match of {
            LengthOf::String => ErrorDetail::new(
                ErrorKind::StringTooShort,
                format!("String should have at least {}", plural(min, "character")),
            ),
            LengthOf::List => ErrorDetail::new(
                ErrorKind::TooShort,
                format!(
                    "List should have at least {} after validation, not {len}",
                    plural(min, "item")
                ),
            ),
        });
    }
    if let Some(max) = c.max_length.filter(|max| len > *max) {
        return Err(match of {
            LengthOf::String => ErrorDetail::new(
                ErrorKind::StringTooLong,
                format!("String should have at most {}", plural(max, "character")),
            ),
            LengthOf::List => ErrorDetail::new(
                ErrorKind::TooLong,
                format!(
                    "List should have at most {} after validation, not {len}",
                    plural(max, "item")
                ),
            ),
        });
    }
    Ok(())
}

static PATTERNS: Lazy<RwLock<HashMap<String, Regex>>> = Lazy::new(|| RwLock::new(HashMap::new()));

fn matches_pattern(s: &str, pattern: &str) -> bool {
    if let Ok(cache) = PATTERNS.read() {
        if let Some(re) = cache.get(pattern) {
            return re.is_match(s);
        }
    }
    match Regex::new(pattern) {
        Ok(re) => {
            let matched = re.is_match(s);
            if let Ok(mut cache) = PATTERNS.write() {
                cache.insert(pattern.to_string(), re);
            }
            matched
        }
        Err(err) => {
            tracing::warn!(pattern, error = %err, "invalid constraint pattern");
            false
        }
    }
}

fn check_constraints(value: &Value, c: &Constraints) -> Result<(), ErrorDetail> {
    if c.is_empty() {
        return Ok(());
    }
    match value {
        Value::String(s) => {
            check_length(s.chars().count(), c, LengthOf::String)?;
            if let Some(pattern) = &c.pattern {
                if !matches_pattern(s, pattern) {
                    return Err(ErrorDetail::new(
                        ErrorKind::StringPatternMismatch,
                        format!("String should match pattern '{pattern}'"),
                    ));
                }
            }
            Ok(())
        }
        Value::Int(_) | Value::Float(_) | Value::Decimal(_) => {
            value.as_float().map_or(Ok(()), |n| check_bounds(n, c))
        }
        _ => Ok(()),
    }
}

fn check_bounds(n: f64, c: &Constraints) -> Result<(), ErrorDetail> {
    if let Some(gt) = c.gt.filter(|gt| n <= *gt) {
        return Err(ErrorDetail::new(
            ErrorKind::GreaterThan,
            format!("Input should be greater than {}", fmt_number(gt)),
        ));
    }
    if let Some(ge) = c.ge.filter(|ge| n < *ge) {
        return Err(ErrorDetail::new(
            ErrorKind::GreaterThanEqual,
            format!("Input should be greater than or equal to {}", fmt_number(ge)),
        ));
    }
    if let Some(lt) = c.lt.filter(|lt| n >= *lt) {
        return Err(ErrorDetail::new(
            ErrorKind::LessThan,
            format!("Input should be less than {}", fmt_number(lt)),
        ));
    }
    if let Some(le) = c.le.filter(|le| n > *le) {
        return Err(ErrorDetail::new(
            ErrorKind::LessThanEqual,
            format!("Input should be less than or equal to {}", fmt_number(le)),
        ));
    }
    if let Some(m) = c.multiple_of.filter(|m| *m != 0.0) {
        let ratio = n / m;
        if (ratio - ratio.round()).abs() > 1e-9 {
            return Err(ErrorDetail::new(
                ErrorKind::MultipleOf,
                format!("Input should be a multiple of {}", fmt_number(m)),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use formbind_core::{EnumMember, UploadedFile};

    use super::*;
    use crate::schema::Attribute;

    fn none() -> Constraints {
        Constraints::new()
    }

    fn first_msg(ty: &TypeSpec, c: &Constraints, raw: impl Into<Value>) -> String {
        validate_value(ty, c, &raw.into()).unwrap_err()[0].msg.clone()
    }

    fn color() -> Arc<EnumDef> {
        EnumDef::new("Color")
            .member("RED", "red")
            .member("GREEN", "green")
            .member("BLUE", "blue")
            .build()
    }

    fn range() -> Arc<EnumDef> {
        EnumDef::new("Range")
            .member("TWENTY", 20)
            .member("FIFTY", 50)
            .member("TWO_HUNDRED", 200)
            .build()
    }

    #[test]
    fn test_string() {
        assert_eq!(
            validate_value(&TypeSpec::Str, &none(), &"John ".into()).unwrap(),
            Value::from("John ")
        );
        assert_eq!(
            first_msg(&TypeSpec::Str, &none(), 3),
            "Input should be a valid string"
        );
        assert_eq!(
            first_msg(&TypeSpec::Str, &none().min_length(3), "ab"),
            "String should have at least 3 characters"
        );
        assert_eq!(
            first_msg(&TypeSpec::Str, &none().max_length(1), "ab"),
            "String should have at most 1 character"
        );
        assert_eq!(
            first_msg(&TypeSpec::Str, &none().pattern("^a"), "ba"),
            "String should match pattern '^a'"
        );
        assert!(validate_value(&TypeSpec::Str, &none().pattern("^a"), &"ab".into()).is_ok());
    }

    #[test]
    fn test_int() {
        let int = TypeSpec::Int;
        assert_eq!(validate_value(&int, &none(), &" 7 ".into()).unwrap(), Value::Int(7));
        assert_eq!(validate_value(&int, &none(), &"3.0".into()).unwrap(), Value::Int(3));
        assert_eq!(
            first_msg(&int, &none(), "not_an_integer"),
            "Input should be a valid integer, unable to parse string as an integer"
        );
        assert_eq!(
            first_msg(&int, &none(), "1.5"),
            "Input should be a valid integer, unable to parse string as an integer"
        );
        assert_eq!(
            first_msg(&int, &none(), 1.5),
            "Input should be a valid integer, got a number with a fractional part"
        );
        assert_eq!(
            first_msg(&int, &none().le(100.0), "101"),
            "Input should be less than or equal to 100"
        );
        assert_eq!(
            first_msg(&int, &none().gt(0.0), "0"),
            "Input should be greater than 0"
        );
        assert_eq!(
            first_msg(&int, &none().multiple_of(5.0), "12"),
            "Input should be a multiple of 5"
        );
    }

    #[test]
    fn test_float_and_decimal() {
        assert_eq!(
            validate_value(&TypeSpec::Float, &none(), &"2.5".into()).unwrap(),
            Value::Float(2.5)
        );
        assert_eq!(
            first_msg(&TypeSpec::Float, &none(), "abc"),
            "Input should be a valid number, unable to parse string as a number"
        );
        assert_eq!(
            first_msg(&TypeSpec::Float, &none().lt(1.5), "1.5"),
            "Input should be less than 1.5"
        );
        assert_eq!(
            validate_value(&TypeSpec::Decimal, &none(), &"10.50".into()).unwrap(),
            Value::Decimal("10.50".into())
        );
        assert_eq!(
            first_msg(&TypeSpec::Decimal, &none(), "1.2.3"),
            "Input should be a valid decimal"
        );
        assert_eq!(
            first_msg(&TypeSpec::Decimal, &none().ge(1.0), "0.5"),
            "Input should be greater than or equal to 1"
        );
    }

    #[test]
    fn test_decimal_literal() {
        assert!(is_decimal_literal("1"));
        assert!(is_decimal_literal("-1.25"));
        assert!(is_decimal_literal(".5"));
        assert!(is_decimal_literal("1e-3"));
        assert!(!is_decimal_literal("."));
        assert!(!is_decimal_literal("1e"));
        assert!(!is_decimal_literal("abc"));
    }

    #[test]
    fn test_bool() {
        for t in ["1", "on", "t", "true", "Y", "yes"] {
            assert_eq!(
                validate_value(&TypeSpec::Bool, &none(), &t.into()).unwrap(),
                Value::Bool(true)
            );
        }
        for f in ["0", "f", "false", "n", "no", "OFF"] {
            assert_eq!(
                validate_value(&TypeSpec::Bool, &none(), &f.into()).unwrap(),
                Value::Bool(false)
            );
        }
        assert_eq!(
            first_msg(&TypeSpec::Bool, &none(), "maybe"),
            "Input should be a valid boolean, unable to interpret input"
        );
    }

    #[test]
    fn test_email() {
        assert!(validate_value(&TypeSpec::Email, &none(), &"a@b.com".into()).is_ok());
        assert_eq!(
            first_msg(&TypeSpec::Email, &none(), "ab.com"),
            "value is not a valid email address: An email address must have an @-sign."
        );
        assert_eq!(
            first_msg(&TypeSpec::Email, &none(), "a@b"),
            concat!(
                "value is not a valid email address: ",
                "The part after the @-sign is not valid. It should have a period."
            )
        );
    }

    #[test]
    fn test_url_and_uuid() {
        assert_eq!(
            validate_value(&TypeSpec::Url, &none(), &"https://example.com".into()).unwrap(),
            Value::from("https://example.com/")
        );
        assert!(first_msg(&TypeSpec::Url, &none(), "nope")
            .starts_with("Input should be a valid URL, "));

        let id = uuid::Uuid::new_v4();
        assert_eq!(
            validate_value(&TypeSpec::Uuid, &none(), &id.to_string().into()).unwrap(),
            Value::Uuid(id)
        );
        assert!(first_msg(&TypeSpec::Uuid, &none(), "x")
            .starts_with("Input should be a valid UUID, "));
    }

    #[test]
    fn test_datetime_from_timestamp_and_iso() {
        let v = validate_value(&TypeSpec::DateTime, &none(), &"2".into()).unwrap();
        assert_eq!(serialize_value(&v).unwrap(), Value::from("1970-01-01T00:00:02Z"));

        let v = validate_value(&TypeSpec::DateTime, &none(), &"2024-05-01T10:30:00+02:00".into())
            .unwrap();
        assert_eq!(serialize_value(&v).unwrap(), Value::from("2024-05-01T08:30:00Z"));

        let v = validate_value(&TypeSpec::DateTime, &none(), &"2024-05-01 10:30".into()).unwrap();
        assert!(matches!(v, Value::DateTime(_)));
        assert_eq!(serialize_value(&v).unwrap(), Value::from("2024-05-01T10:30:00"));

        assert_eq!(
            first_msg(&TypeSpec::DateTime, &none(), "yesterday"),
            "Input should be a valid datetime"
        );
    }

    #[test]
    fn test_date_and_time() {
        let d = validate_value(&TypeSpec::Date, &none(), &"2024-02-29".into()).unwrap();
        assert_eq!(serialize_value(&d).unwrap(), Value::from("2024-02-29"));
        assert!(validate_value(&TypeSpec::Date, &none(), &"2023-02-29".into()).is_err());

        let t = validate_value(&TypeSpec::Time, &none(), &"08:15".into()).unwrap();
        assert_eq!(serialize_value(&t).unwrap(), Value::from("08:15:00"));
    }

    #[test]
    fn test_file() {
        let file = Value::File(UploadedFile::new("a.txt", "text/plain", b"x".to_vec()));
        assert!(validate_value(&TypeSpec::File, &none(), &file).is_ok());
        assert_eq!(
            first_msg(&TypeSpec::File, &none(), "a.txt"),
            "Expected UploadFile, received: str"
        );
        assert!(serialize_value(&file).is_err());
    }

    #[test]
    fn test_enum() {
        let ty = TypeSpec::Enum(color());
        let v = validate_value(&ty, &none(), &"red".into()).unwrap();
        assert_eq!(v, Value::Enum(EnumMember::new("Color", "RED", "red")));
        assert_eq!(serialize_value(&v).unwrap(), Value::from("red"));
        assert!(validate_value(&ty, &none(), &v).is_ok());
        assert_eq!(
            first_msg(&ty, &none(), "purple"),
            "Input should be 'red', 'green' or 'blue'"
        );

        let ty = TypeSpec::Enum(range());
        assert_eq!(
            validate_value(&ty, &none(), &"50".into()).unwrap(),
            Value::Enum(EnumMember::new("Range", "FIFTY", 50))
        );
        assert_eq!(first_msg(&ty, &none(), "100"), "Input should be 20, 50 or 200");
    }

    #[test]
    fn test_list() {
        let ty = TypeSpec::list(TypeSpec::Int);
        assert_eq!(
            validate_value(&ty, &none(), &Value::strings(["1", "2"])).unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        let errors = validate_value(&ty, &none(), &Value::strings(["1", "x"])).unwrap_err();
        assert_eq!(errors[0].loc, vec!["1".to_string()]);
        assert_eq!(first_msg(&ty, &none(), "1"), "Input should be a valid list");
        assert_eq!(
            first_msg(&ty, &none().min_length(2), Value::strings(["1"])),
            "List should have at least 2 items after validation, not 1"
        );
    }

    #[test]
    fn test_optional() {
        let ty = TypeSpec::optional(TypeSpec::Int);
        assert_eq!(validate_value(&ty, &none(), &Value::Null).unwrap(), Value::Null);
        assert_eq!(validate_value(&ty, &none(), &"4".into()).unwrap(), Value::Int(4));
    }

    #[test]
    fn test_record() {
        let schema = RecordSchema::new("Sample")
            .attribute(Attribute::new("name", TypeSpec::Str))
            .attribute(Attribute::new("age", TypeSpec::Int))
            .attribute(Attribute::new("nick", TypeSpec::Str).default(Value::Null))
            .build();
        let ty = TypeSpec::Record(schema.clone());

        let ok = validate_value(
            &ty,
            &none(),
            &Value::map([("name", Value::from("John")), ("age", Value::from("30"))]),
        )
        .unwrap();
        let Value::Record(record) = &ok else { panic!("expected a record") };
        assert_eq!(record.get("age"), Some(&Value::Int(30)));
        assert_eq!(record.get("nick"), Some(&Value::Null));
        assert!(validate_value(&ty, &none(), &ok).is_ok());

        let errors = validate_value(&ty, &none(), &Value::map([("age", "x")])).unwrap_err();
        let messages = format_errors(&errors);
        assert!(messages.contains(&"name: Field required".to_string()));
        assert!(messages.iter().any(|m| m.starts_with("age: Input should be a valid integer")));

        assert_eq!(
            first_msg(&ty, &none(), "x"),
            "Input should be a valid dictionary or instance of Sample"
        );
    }

    #[test]
    fn test_record_alias_lookup() {
        let schema = RecordSchema::new("Filter")
            .attribute(Attribute::new("to_datetime", TypeSpec::DateTime).alias("to"))
            .build();
        let mut values = BTreeMap::new();
        values.insert("to".to_string(), Value::from("2"));
        assert!(validate_record(&schema, &values).is_ok());

        let mut values = BTreeMap::new();
        values.insert("to_datetime".to_string(), Value::from("2"));
        assert!(validate_record(&schema, &values).is_ok());

        let errors = validate_record(&schema, &BTreeMap::new()).unwrap_err();
        assert_eq!(errors[0].to_string(), "to: Field required");
    }

    #[test]
    fn test_record_validators() {
        let schema = RecordSchema::new("Signup")
            .attribute(Attribute::new("password", TypeSpec::Str))
            .attribute(Attribute::new("confirm", TypeSpec::Str))
            .validate_with("passwords_match", |r| {
                if r.get("password") == r.get("confirm") {
                    Ok(())
                } else {
                    let mut fields = std::collections::HashMap::new();
                    fields.insert(
                        "confirm".to_string(),
                        vec![ValidationError::new("Passwords do not match", "mismatch")],
                    );
                    Err(ValidationError::with_field_errors(fields))
                }
            })
            .build();
        let values: BTreeMap<String, Value> = [("password", "a"), ("confirm", "b")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::from(v)))
            .collect();
        let errors = validate_record(&schema, &values).unwrap_err();
        assert_eq!(
            errors[0].to_string(),
            "confirm: Value error, Passwords do not match"
        );
    }

    #[test]
    fn test_dict() {
        let map = Value::map([("a", 1)]);
        assert_eq!(validate_value(&TypeSpec::Dict, &none(), &map).unwrap(), map);
        assert_eq!(
            first_msg(&TypeSpec::Dict, &none(), "x"),
            "Input should be a valid dictionary"
        );
        assert!(validate_dict(&BTreeMap::new()).is_ok());
    }

    #[test]
    fn test_repr_helpers() {
        assert_eq!(repr_list(&[Value::from("a"), Value::Int(2)]), "['a', 2]");
        assert_eq!(expected_one_of(&[Value::from("a")]), "'a'");
        assert_eq!(expected_one_of(&[Value::Int(1), Value::Int(2)]), "1 or 2");
        assert_eq!(fmt_number(100.0), "100");
        assert_eq!(fmt_number(2.5), "2.5");
    }

    #[test]
    fn test_error_detail_display() {
        let e = ErrorDetail::missing().at("age").at("sample");
        assert_eq!(e.to_string(), "sample.age: Field required");
        assert_eq!(ErrorDetail::value_error("bad").msg, "Value error, bad");
        assert_eq!(format_errors(&[ErrorDetail::missing()]), vec!["Field required"]);
    }
}
