// Email Record Schema - addresses attached to a user

use crate::error::AppResult;
use crate::record_schema::{FieldDefinition, ForeignKey, RecordNames, RecordSchema, Rule};

pub const EMAIL_PATTERN: &str = r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+";

pub struct EmailSchema;

impl RecordSchema for EmailSchema {
    fn table() -> &'static str {
        "emails"
    }

    fn names() -> RecordNames {
        RecordNames::new("Email", "email", "emails")
    }

    fn fields() -> AppResult<Vec<FieldDefinition>> {
        Ok(vec![
            FieldDefinition::new("user_id")
                .required()
                .validate(Rule::null(false)),
            FieldDefinition::new("type")
                .required()
                .validate(Rule::one_of(&["personal", "work"])),
            FieldDefinition::new("email")
                .required()
                .validate(Rule::pattern(EMAIL_PATTERN)?),
        ])
    }

    fn foreign_key() -> Option<ForeignKey> {
        Some(ForeignKey::new("user_id", "users"))
    }
}
