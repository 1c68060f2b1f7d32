// Phone Record Schema - numbers attached to a user

use crate::error::AppResult;
use crate::record_schema::{FieldDefinition, ForeignKey, RecordNames, RecordSchema, Rule};

pub const PHONE_PATTERN: &str =
    r"^(\+)?((\d{2,3}) ?\d|\d)(([ -]?\d)|( ?(\d{2,3}) ?)){5,12}\d$";

pub struct PhoneSchema;

impl RecordSchema for PhoneSchema {
    fn table() -> &'static str {
        "phones"
    }

    fn names() -> RecordNames {
        RecordNames::new("Phone", "phone", "phones")
    }

    fn fields() -> AppResult<Vec<FieldDefinition>> {
        Ok(vec![
            FieldDefinition::new("user_id")
                .required()
                .validate(Rule::null(false)),
            FieldDefinition::new("type")
                .required()
                .validate(Rule::one_of(&["mobile", "city"])),
            FieldDefinition::new("number")
                .required()
                .validate(Rule::pattern(PHONE_PATTERN)?),
        ])
    }

    fn foreign_key() -> Option<ForeignKey> {
        Some(ForeignKey::new("user_id", "users"))
    }
}
