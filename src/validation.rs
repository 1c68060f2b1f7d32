// Validation Engine - applies schema rules to untyped record data

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::infrastructure::store::Record;
use crate::record_schema::{Rule, Schema};

static DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").expect("digit pattern compiles"));

/// Error key used when a record lacks fields the schema expects
pub const MISSING_FIELDS_KEY: &str = "fields";

/// Outcome of validating a record: per-field messages, one per field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    pub is_valid: bool,
    pub errors: BTreeMap<String, String>,
}

impl Validation {
    fn reject(&mut self, key: &str, message: String) {
        self.is_valid = false;
        self.errors.insert(key.to_string(), message);
    }
}

/// Text form of a scalar value; `None` for null and non-scalars
fn as_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

impl Rule {
    /// Verdict of this rule for `value`
    pub fn check(&self, value: &Value) -> bool {
        match (self, as_text(value)) {
            (Rule::NullCheck { must_be_null }, _) => value.is_null() == *must_be_null,
            (_, None) => false,
            (Rule::MembershipCheck { allowed }, Some(text)) => {
                allowed.iter().any(|v| v == text.as_ref())
            }
            (Rule::PatternCheck(pattern), Some(text)) => pattern.matches_from_start(&text),
            (Rule::LengthCheck { min, max }, Some(text)) => {
                let length = text.chars().count();
                *min <= length && length <= *max
            }
            (Rule::DigitPresenceCheck { must_contain_digit }, Some(text)) => {
                DIGIT.is_match(&text) == *must_contain_digit
            }
        }
    }

    /// Human-readable failure message for `field`
    pub fn message(&self, field: &str) -> String {
        match self {
            Rule::NullCheck { must_be_null } => {
                let modal = if *must_be_null { "should" } else { "shouldn't" };
                format!("'{}' field {} be null.", field, modal)
            }
            Rule::MembershipCheck { allowed } => format!(
                "'{}' field should be one of these values: [{}]",
                field,
                allowed.join(", ")
            ),
            Rule::PatternCheck(_) => format!("Invalid '{}' field format", field),
            Rule::LengthCheck { min, max } => format!(
                "'{}' field must be {} characters or longer and {} characters and less in length.",
                field, min, max
            ),
            Rule::DigitPresenceCheck { must_contain_digit } => {
                let not = if *must_contain_digit { "" } else { "not " };
                format!("'{}' field must {}contain numbers.", field, not)
            }
        }
    }
}

/// Apply one rule to one field value
pub fn validate_field(rule: &Rule, field: &str, value: &Value) -> Result<(), String> {
    if rule.check(value) {
        Ok(())
    } else {
        Err(rule.message(field))
    }
}

/// Validate `columns` of `data` against `schema`.
///
/// Every column is scanned once, with no short-circuit:
/// a column outside the required set is reported under its own key;
/// a column without rules or without a value in `data` is reported under
/// [`MISSING_FIELDS_KEY`]; otherwise every rule runs and the message of the
/// last failing rule is kept.
pub fn validate_record(schema: &Schema, data: &Record, columns: &[String]) -> Validation {
    let mut validation = Validation {
        is_valid: true,
        errors: BTreeMap::new(),
    };

    for column in columns {
        if !schema.is_required(column) {
            validation.reject(
                column,
                format!("{} has no {} field", schema.names().object, column),
            );
        }

        let (Some(rules), Some(value)) = (schema.rules_for(column), data.get(column)) else {
            validation.reject(
                MISSING_FIELDS_KEY,
                format!("Not enough {} record fields", schema.names().singular),
            );
            continue;
        };

        let mut last_failure = None;
        for rule in rules {
            if let Err(message) = validate_field(rule, column, value) {
                last_failure = Some(message);
            }
        }
        if let Some(message) = last_failure {
            validation.reject(column, message);
        }
    }

    validation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_schema::Pattern;
    use crate::schemas::create_schema_registry;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_null_check() {
        let not_null = Rule::null(false);
        assert!(validate_field(&not_null, "user_id", &json!(1)).is_ok());
        assert_eq!(
            validate_field(&not_null, "user_id", &Value::Null).unwrap_err(),
            "'user_id' field shouldn't be null."
        );

        let must_be_null = Rule::null(true);
        assert!(validate_field(&must_be_null, "x", &Value::Null).is_ok());
        assert_eq!(
            validate_field(&must_be_null, "x", &json!("a")).unwrap_err(),
            "'x' field should be null."
        );
    }

    #[test]
    fn test_membership_is_case_sensitive() {
        let rule = Rule::one_of(&["male", "female"]);
        assert!(rule.check(&json!("male")));
        assert!(!rule.check(&json!("Male")));
        assert!(!rule.check(&json!("male ")));
        assert_eq!(
            rule.message("gender"),
            "'gender' field should be one of these values: [male, female]"
        );
    }

    #[test]
    fn test_length_bounds_are_inclusive() {
        let rule = Rule::length(5, 7);
        assert!(!rule.check(&json!("abcd")));
        assert!(rule.check(&json!("abcde")));
        assert!(rule.check(&json!("abcdefg")));
        assert!(!rule.check(&json!("abcdefgh")));
        assert_eq!(
            rule.message("name"),
            "'name' field must be 5 characters or longer and 7 characters and less in length."
        );
    }

    #[test]
    fn test_length_counts_characters() {
        let rule = Rule::length(5, 5);
        assert!(rule.check(&json!("héllo")));
    }

    #[test]
    fn test_pattern_accepts_prefix_match() {
        let rule = Rule::PatternCheck(Pattern::new(r"[a-z]+@[a-z]+\.[a-z]+").unwrap());
        assert!(rule.check(&json!("a@b.com")));
        // Trailing text after a match at position 0 is accepted.
        assert!(rule.check(&json!("a@b.com, and then some")));
        // A match that only starts later in the value is not.
        assert!(!rule.check(&json!("  a@b.com")));
        assert_eq!(rule.message("email"), "Invalid 'email' field format");
    }

    #[test]
    fn test_digit_presence() {
        let forbid = Rule::digits(false);
        assert!(forbid.check(&json!("Jonathan")));
        assert!(!forbid.check(&json!("Jonathan 2")));
        assert_eq!(forbid.message("name"), "'name' field must not contain numbers.");

        let demand = Rule::digits(true);
        assert!(demand.check(&json!("flat 12")));
        assert!(!demand.check(&json!("flat")));
        assert_eq!(demand.message("address"), "'address' field must contain numbers.");
    }

    #[test]
    fn test_numbers_are_checked_as_text() {
        assert!(Rule::length(1, 3).check(&json!(999)));
        assert!(Rule::one_of(&["1", "2"]).check(&json!(2)));
        assert!(Rule::digits(true).check(&json!(5)));
    }

    #[test]
    fn test_null_fails_non_null_rules() {
        assert!(!Rule::length(0, 10).check(&Value::Null));
        assert!(!Rule::one_of(&["a"]).check(&Value::Null));
        assert!(!Rule::digits(false).check(&Value::Null));
        assert!(!Rule::length(0, 10).check(&json!(["a"])));
    }

    #[test]
    fn test_validate_field_is_deterministic() {
        let rules = [
            Rule::null(false),
            Rule::one_of(&["a", "b"]),
            Rule::pattern("[0-9]+").unwrap(),
            Rule::length(2, 4),
            Rule::digits(true),
        ];
        let values = [json!("a"), json!("123"), json!(""), Value::Null, json!(42)];

        for rule in &rules {
            for value in &values {
                let first = validate_field(rule, "f", value);
                for _ in 0..3 {
                    assert_eq!(validate_field(rule, "f", value), first);
                }
            }
        }
    }

    #[test]
    fn test_unknown_gender_is_rejected() {
        let registry = create_schema_registry().unwrap();
        let validation = registry
            .validate_record("users", &record(json!({"gender": "unknown"})), &columns(&["gender"]))
            .unwrap();

        assert!(!validation.is_valid);
        assert_eq!(
            validation.errors.get("gender").map(String::as_str),
            Some("'gender' field should be one of these values: [male, female]")
        );
    }

    #[test]
    fn test_last_failing_rule_wins() {
        let registry = create_schema_registry().unwrap();
        // Too short and contains a digit: both name rules fail.
        let validation = registry
            .validate_record("users", &record(json!({"name": "J0"})), &columns(&["name"]))
            .unwrap();

        assert_eq!(validation.errors.len(), 1);
        assert_eq!(validation.errors["name"], "'name' field must not contain numbers.");
    }

    #[test]
    fn test_column_outside_required_set_is_reported() {
        let registry = create_schema_registry().unwrap();
        let validation = registry
            .validate_record("users", &record(json!({"nickname": "Jo"})), &columns(&["nickname"]))
            .unwrap();

        assert!(!validation.is_valid);
        assert_eq!(validation.errors["nickname"], "User has no nickname field");
        assert_eq!(validation.errors[MISSING_FIELDS_KEY], "Not enough user record fields");
    }

    #[test]
    fn test_missing_required_value() {
        let registry = create_schema_registry().unwrap();
        let schema = registry.schema("emails").unwrap();
        let data = record(json!({"user_id": "1", "type": "work"}));

        let validation = validate_record(schema, &data, schema.required_fields());
        assert!(!validation.is_valid);
        assert_eq!(validation.errors.len(), 1);
        assert_eq!(validation.errors[MISSING_FIELDS_KEY], "Not enough email record fields");
    }

    #[test]
    fn test_valid_phone() {
        let registry = create_schema_registry().unwrap();
        let schema = registry.schema("phones").unwrap();
        let data = record(json!({"user_id": "3", "type": "mobile", "number": "+380 50 123 45 67"}));

        let validation = validate_record(schema, &data, schema.required_fields());
        assert!(validation.is_valid, "{:?}", validation.errors);
        assert!(validation.errors.is_empty());
    }

    #[test]
    fn test_empty_columns_are_valid() {
        let registry = create_schema_registry().unwrap();
        let validation = registry
            .validate_record("users", &Record::new(), &[])
            .unwrap();
        assert!(validation.is_valid);
    }
}
