//! Choice, enum and time zone fields.
//!
//! These fields share [`ChoiceRules`]: an ordered list of `(token, label)`
//! pairs and a multiplicity flag. Submitted tokens are compared to the
//! declared ones through a [`CoerceType`], so `"20"` from the wire matches
//! a declared `20`.

use std::sync::Arc;

use formbind_core::Value;

use crate::schema::{EnumDef, TypeSpec};
use crate::validation::{repr_list, ErrorDetail};

/// Time zones offered by [`FieldKind::TimeZone`](super::FieldKind::TimeZone).
pub const COMMON_TIMEZONES: &[&str] = &[
    "UTC",
    "Africa/Cairo",
    "Africa/Johannesburg",
    "Africa/Lagos",
    "Africa/Nairobi",
    "America/Anchorage",
    "America/Argentina/Buenos_Aires",
    "America/Bogota",
    "America/Chicago",
    "America/Denver",
    "America/Halifax",
    "America/Los_Angeles",
    "America/Mexico_City",
    "America/New_York",
    "America/Phoenix",
    "America/Sao_Paulo",
    "America/Toronto",
    "America/Vancouver",
    "Asia/Bangkok",
    "Asia/Dhaka",
    "Asia/Dubai",
    "Asia/Hong_Kong",
    "Asia/Jakarta",
    "Asia/Jerusalem",
    "Asia/Karachi",
    "Asia/Kolkata",
    "Asia/Manila",
    "Asia/Seoul",
    "Asia/Shanghai",
    "Asia/Singapore",
    "Asia/Tehran",
    "Asia/Tokyo",
    "Atlantic/Reykjavik",
    "Australia/Adelaide",
    "Australia/Brisbane",
    "Australia/Perth",
    "Australia/Sydney",
    "Europe/Amsterdam",
    "Europe/Athens",
    "Europe/Berlin",
    "Europe/Dublin",
    "Europe/Istanbul",
    "Europe/Lisbon",
    "Europe/London",
    "Europe/Madrid",
    "Europe/Moscow",
    "Europe/Paris",
    "Europe/Rome",
    "Europe/Stockholm",
    "Europe/Warsaw",
    "Europe/Zurich",
    "Pacific/Auckland",
    "Pacific/Honolulu",
];

/// Token of the blank time zone option.
const BLANK_TIMEZONE: &str = " ";

/// How tokens are normalized before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoerceType {
    Str,
    Int,
}

impl CoerceType {
    fn for_annotation(annotation: &TypeSpec) -> Self {
        let item = annotation.item_type().unwrap_or(annotation);
        match item.origin() {
            TypeSpec::Int => Self::Int,
            TypeSpec::Enum(def) if def.is_int() => Self::Int,
            _ => Self::Str,
        }
    }

    /// Normalizes `value`; `None` when it cannot be compared at all.
    pub fn coerce(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (_, Value::Enum(member)) => self.coerce(&member.value),
            (Self::Str, Value::String(s)) => Some(Value::String(s.clone())),
            (Self::Str, Value::Null) => None,
            (Self::Str, other) => Some(Value::String(other.to_string())),
            (Self::Int, Value::Int(i)) => Some(Value::Int(*i)),
            (Self::Int, Value::String(s)) => s.trim().parse().ok().map(Value::Int),
            (Self::Int, _) => None,
        }
    }
}

/// Declared choices and the rules submitted tokens must satisfy.
#[derive(Debug, Clone)]
pub struct ChoiceRules {
    choices: Vec<(Value, String)>,
    multiple: bool,
    coerce: CoerceType,
    /// Enum fields rely on enum validation and skip the membership rule.
    check_membership: bool,
}

impl ChoiceRules {
    pub(crate) fn from_choices(choices: Vec<(Value, String)>, annotation: &TypeSpec) -> Self {
        Self {
            choices,
            multiple: annotation.is_sequence(),
            coerce: CoerceType::for_annotation(annotation),
            check_membership: true,
        }
    }

    /// Choices derived from enum members: the token is the member's value
    /// and the label its name with underscores as spaces.
    pub(crate) fn from_enum(def: &Arc<EnumDef>, multiple: bool) -> Self {
        Self {
            choices: def
                .members
                .iter()
                .map(|(name, token)| (token.clone(), name.replace('_', " ")))
                .collect(),
            multiple,
            coerce: if def.is_int() {
                CoerceType::Int
            } else {
                CoerceType::Str
            },
            check_membership: false,
        }
    }

    pub(crate) fn timezones(required: bool) -> Self {
        let mut choices: Vec<(Value, String)> = COMMON_TIMEZONES
            .iter()
            .map(|tz| (Value::from(*tz), tz.replace('_', " ")))
            .collect();
        if !required {
            choices.insert(0, (Value::from(BLANK_TIMEZONE), "Select Time Zone".to_string()));
        }
        Self {
            choices,
            multiple: false,
            coerce: CoerceType::Str,
            check_membership: true,
        }
    }

    pub fn choices(&self) -> &[(Value, String)] {
        &self.choices
    }

    pub const fn multiple(&self) -> bool {
        self.multiple
    }

    pub const fn coerce_type(&self) -> CoerceType {
        self.coerce
    }

    /// Returns `true` if `value` equals one of the declared tokens.
    pub fn is_member(&self, value: &Value) -> bool {
        let Some(token) = self.coerce.coerce(value) else {
            return false;
        };
        self.choices
            .iter()
            .any(|(declared, _)| self.coerce.coerce(declared).as_ref() == Some(&token))
    }

    /// Returns `true` if `token` is selected in `current`, a single value
    /// or a list of values.
    pub fn is_selected(&self, token: &Value, current: Option<&Value>) -> bool {
        let Some(token) = self.coerce.coerce(token) else {
            return false;
        };
        let matches = |v: &Value| self.coerce.coerce(v).as_ref() == Some(&token);
        match current {
            Some(Value::List(items)) => items.iter().any(matches),
            Some(value) => matches(value),
            None => false,
        }
    }

    /// Applies the membership rules to an already coerced value.
    ///
    /// A blank single value is accepted as `""` when the field is
    /// optional. A falsy multi value is accepted as is when the field is
    /// optional. Otherwise the first non-member fails.
    pub fn check(
        &self,
        value: Value,
        required: bool,
        preview: usize,
    ) -> Result<Value, ErrorDetail> {
        if !self.check_membership {
            return Ok(value);
        }
        if self.multiple {
            if !required && !value.is_truthy() {
                return Ok(value);
            }
            let Value::List(items) = &value else {
                return Err(ErrorDetail::value_error("Expected a list of values"));
            };
            if items.iter().any(|item| !self.is_member(item)) {
                return Err(self.not_a_member(preview));
            }
            return Ok(value);
        }
        if !required && matches!(&value, Value::String(s) if s.trim().is_empty()) {
            return Ok(Value::String(String::new()));
        }
        if self.is_member(&value) {
            Ok(value)
        } else {
            Err(self.not_a_member(preview))
        }
    }

    fn not_a_member(&self, preview: usize) -> ErrorDetail {
        let tokens: Vec<Value> = self
            .choices
            .iter()
            .take(preview)
            .map(|(token, _)| token.clone())
            .collect();
        ErrorDetail::value_error(format!("Input should be in {}", repr_list(&tokens)))
    }
}

#[cfg(test)]
mod tests {
    use formbind_core::EnumMember;

    use super::*;
    use crate::fields::{Field, FieldKind, FieldSpec};
    use crate::source::InMemorySource;

    fn fruit() -> FieldSpec {
        FieldSpec::choice([("apple", "Apple"), ("pear", "Pear"), ("plum", "Plum")]).name("fruit")
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
    fn test_declared_tokens_round_trip() {
        let mut field = Field::build(fruit()).unwrap();
        for token in ["apple", "pear", "plum"] {
            field.process(&token.into(), false).unwrap();
            assert!(field.errors().is_empty());
            assert_eq!(field.value(), Some(&Value::from(token)));
        }
    }

    #[test]
    fn test_single_membership() {
        let rules = Field::build(fruit()).unwrap().choice_rules().unwrap().clone();
        assert!(rules.check("pear".into(), true, 10).is_ok());
        let err = rules.check("kiwi".into(), true, 10).unwrap_err();
        assert_eq!(
            err.msg,
            "Value error, Input should be in ['apple', 'pear', 'plum']"
        );
        let err = rules.check("kiwi".into(), true, 2).unwrap_err();
        assert_eq!(err.msg, "Value error, Input should be in ['apple', 'pear']");
    }

    #[test]
    fn test_blank_single_value() {
        let rules = Field::build(fruit()).unwrap().choice_rules().unwrap().clone();
        assert_eq!(rules.check("  ".into(), false, 10).unwrap(), Value::from(""));
        assert!(rules.check("  ".into(), true, 10).is_err());
    }

    #[test]
    fn test_multiple_membership() {
        let field = Field::build(fruit().annotation(TypeSpec::list(TypeSpec::Str))).unwrap();
        let rules = field.choice_rules().unwrap();
        assert!(rules.multiple());
        assert!(rules.check(Value::strings(["apple", "plum"]), true, 10).is_ok());
        assert_eq!(
            rules.check("apple".into(), true, 10).unwrap_err().msg,
            "Value error, Expected a list of values"
        );
        assert!(rules
            .check(Value::strings(["apple", "kiwi"]), true, 10)
            .unwrap_err()
            .msg
            .starts_with("Value error, Input should be in"));
        assert_eq!(rules.check(Value::List(vec![]), false, 10).unwrap(), Value::List(vec![]));
    }

    #[test]
    fn test_int_coercion() {
        let field = Field::build(
            FieldSpec::choice([(1, "One"), (2, "Two")])
                .name("n")
                .annotation(TypeSpec::Int),
        )
        .unwrap();
        let rules = field.choice_rules().unwrap();
        assert_eq!(rules.coerce_type(), CoerceType::Int);
        assert!(rules.is_member(&"2".into()));
        assert!(!rules.is_member(&"3".into()));
        assert!(rules.is_selected(&Value::Int(2), Some(&"2".into())));
    }

    #[test]
    fn test_enum_choices() {
        let field = Field::build(FieldSpec::enumeration(range()).name("range")).unwrap();
        let rules = field.choice_rules().unwrap();
        assert_eq!(rules.coerce_type(), CoerceType::Int);
        assert_eq!(rules.choices()[2], (Value::Int(200), "TWO HUNDRED".to_string()));
    }

    #[test]
    fn test_enum_multi_process() {
        let mut field = Field::build(
            FieldSpec::enumeration(color())
                .name("colors")
                .annotation(TypeSpec::list(TypeSpec::Enum(color()))),
        )
        .unwrap();
        field.process(&Value::strings(["red", "green"]), false).unwrap();
        assert_eq!(
            field.value(),
            Some(&Value::List(vec![
                Value::Enum(EnumMember::new("Color", "RED", "red")),
                Value::Enum(EnumMember::new("Color", "GREEN", "green")),
            ]))
        );
        assert_eq!(field.data(), Some(&Value::strings(["red", "green"])));

        let before = field.value().cloned();
        field.process(&Value::strings(["red", "invalid"]), false).unwrap();
        assert_eq!(field.value().cloned(), before);
        assert!(field.errors()[0].contains("'red', 'green' or 'blue'"));
    }

    #[test]
    fn test_timezones() {
        let optional =
            Field::build(FieldSpec::new(FieldKind::TimeZone).name("tz").default("")).unwrap();
        let rules = optional.choice_rules().unwrap();
        assert_eq!(rules.choices()[0].1, "Select Time Zone");

        let required = Field::build(FieldSpec::new(FieldKind::TimeZone).name("tz")).unwrap();
        assert_eq!(required.choice_rules().unwrap().choices()[0].0, Value::from("UTC"));
    }

    #[tokio::test]
    async fn test_choice_form_data_error() {
        let mut field = Field::build(fruit()).unwrap();
        let source = InMemorySource::post([("fruit", "kiwi")]);
        let result = field.process_form_data(&source).await.unwrap();
        assert!(result.value.is_none());
        assert_eq!(
            field.errors(),
            ["Value error, Input should be in ['apple', 'pear', 'plum']"]
        );
    }
}
