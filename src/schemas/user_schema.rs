// User Record Schema - people with a stored photo and nested contacts

use crate::error::AppResult;
use crate::record_schema::{FieldDefinition, RecordNames, RecordSchema, Rule};

/// Birth date between 1900 and 2019, `YYYY-M-D` with optional zero padding.
/// A digit may not follow the day.
pub const BORN_AT_PATTERN: &str = concat!(
    r"(?:19[0-9][0-9]|20[01][0-9])",
    r"-(?:0?[1-9]|1[0-2])",
    r"-(?:0?[1-9]|[12][0-9]|3[01])(?:\D|$)",
);

pub struct UserSchema;

impl RecordSchema for UserSchema {
    fn table() -> &'static str {
        "users"
    }

    fn names() -> RecordNames {
        RecordNames::new("User", "user", "users")
    }

    fn fields() -> AppResult<Vec<FieldDefinition>> {
        Ok(vec![
            FieldDefinition::new("name")
                .required()
                .validate(Rule::length(5, 70))
                .validate(Rule::digits(false)),
            FieldDefinition::new("photo_path")
                .required()
                .validate(Rule::length(0, 250)),
            FieldDefinition::new("gender")
                .required()
                .validate(Rule::one_of(&["male", "female"])),
            FieldDefinition::new("born_at")
                .required()
                .validate(Rule::pattern(BORN_AT_PATTERN)?),
            FieldDefinition::new("address")
                .required()
                .validate(Rule::length(10, 150)),
        ])
    }

    fn photo_field() -> Option<&'static str> {
        Some("photo_path")
    }

    fn nested() -> Vec<&'static str> {
        vec!["emails", "phones"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_schema::Pattern;

    #[test]
    fn test_born_at_pattern() {
        let pattern = Pattern::new(BORN_AT_PATTERN).unwrap();

        assert!(pattern.matches_from_start("1990-05-17"));
        assert!(pattern.matches_from_start("2019-12-31"));
        assert!(pattern.matches_from_start("1985-1-7"));
        assert!(pattern.matches_from_start("1990-05-17T10:00:00"));

        assert!(!pattern.matches_from_start("2020-01-01"));
        assert!(!pattern.matches_from_start("1899-01-01"));
        assert!(!pattern.matches_from_start("1990-13-01"));
        assert!(!pattern.matches_from_start("1990-05-32"));
        assert!(!pattern.matches_from_start("1990-05-170"));
        assert!(!pattern.matches_from_start("on 1990-05-17"));
    }

    #[test]
    fn test_required_fields_in_declaration_order() {
        let names: Vec<String> = UserSchema::fields()
            .unwrap()
            .into_iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();
        assert_eq!(names, ["name", "photo_path", "gender", "born_at", "address"]);
    }
}
