// Record Schema Framework - declarative description of each record type
// Fields, required subset and per-field validation rules live here; the
// validation engine in `validation.rs` interprets them.

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::infrastructure::store::Record;
use crate::validation::{self, Validation};

/// Primary key column shared by every record type
pub const PRIMARY_KEY: &str = "id";

/// Schema definition trait - one implementation per record type
pub trait RecordSchema: Send + Sync {
    /// Table (and record type) name
    fn table() -> &'static str
    where
        Self: Sized;

    /// Display names used in messages and read envelopes
    fn names() -> RecordNames
    where
        Self: Sized;

    /// Field definitions, excluding the primary key
    fn fields() -> AppResult<Vec<FieldDefinition>>
    where
        Self: Sized;

    /// Parent reference that must exist before a row is written
    fn foreign_key() -> Option<ForeignKey>
    where
        Self: Sized,
    {
        None
    }

    /// Field holding the stored photo path, for types that carry a photo
    fn photo_field() -> Option<&'static str>
    where
        Self: Sized,
    {
        None
    }

    /// Child record types that may be attached on create
    fn nested() -> Vec<&'static str>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

/// Singular/plural names of a record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordNames {
    /// Capitalised name, e.g. "User"
    pub object: String,
    pub singular: String,
    pub plural: String,
}

impl RecordNames {
    pub fn new(object: &str, singular: &str, plural: &str) -> Self {
        Self {
            object: object.to_string(),
            singular: singular.to_string(),
            plural: plural.to_string(),
        }
    }
}

/// Foreign key from a child record to its parent table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: String,
    pub references: String,
}

impl ForeignKey {
    pub fn new(column: &str, references: &str) -> Self {
        Self {
            column: column.to_string(),
            references: references.to_string(),
        }
    }
}

/// Field definition with its ordered validation rules
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    pub required: bool,
    pub rules: Vec<Rule>,
}

impl FieldDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: false,
            rules: Vec::new(),
        }
    }

    /// Mark field as required on create
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Add a validation rule; rules run in the order they are added
    pub fn validate(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// One atomic validation check
#[derive(Debug, Clone)]
pub enum Rule {
    NullCheck { must_be_null: bool },
    MembershipCheck { allowed: Vec<String> },
    PatternCheck(Pattern),
    LengthCheck { min: usize, max: usize },
    DigitPresenceCheck { must_contain_digit: bool },
}

impl Rule {
    pub fn null(must_be_null: bool) -> Self {
        Rule::NullCheck { must_be_null }
    }

    pub fn one_of(allowed: &[&str]) -> Self {
        Rule::MembershipCheck {
            allowed: allowed.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn pattern(source: &str) -> AppResult<Self> {
        Ok(Rule::PatternCheck(Pattern::new(source)?))
    }

    pub fn length(min: usize, max: usize) -> Self {
        Rule::LengthCheck { min, max }
    }

    pub fn digits(must_contain_digit: bool) -> Self {
        Rule::DigitPresenceCheck { must_contain_digit }
    }
}

/// Regex matched from the start of the value.
///
/// The match only has to begin at position 0; text after the match is
/// accepted.
#[derive(Debug, Clone)]
pub struct Pattern {
    anchored: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> AppResult<Self> {
        let anchored = Regex::new(&format!("^(?:{})", source)).map_err(|e| {
            AppError::ConfigurationError(format!("Invalid pattern '{}': {}", source, e))
        })?;
        Ok(Self { anchored })
    }

    pub fn matches_from_start(&self, text: &str) -> bool {
        self.anchored.is_match(text)
    }
}

/// Resolved schema for one record type
#[derive(Debug, Clone)]
pub struct Schema {
    table: String,
    names: RecordNames,
    fields: Vec<String>,
    required: Vec<String>,
    rules: HashMap<String, Vec<Rule>>,
    foreign_key: Option<ForeignKey>,
    photo_field: Option<String>,
    nested: Vec<String>,
}

impl Schema {
    fn from_definition<T: RecordSchema>() -> AppResult<Self> {
        let definitions = T::fields()?;

        let mut fields = vec![PRIMARY_KEY.to_string()];
        let mut required = Vec::new();
        let mut rules = HashMap::new();
        for definition in definitions {
            if definition.required {
                required.push(definition.name.clone());
            }
            if !definition.rules.is_empty() {
                rules.insert(definition.name.clone(), definition.rules);
            }
            fields.push(definition.name);
        }

        Ok(Self {
            table: T::table().to_string(),
            names: T::names(),
            fields,
            required,
            rules,
            foreign_key: T::foreign_key(),
            photo_field: T::photo_field().map(str::to_string),
            nested: T::nested().into_iter().map(str::to_string).collect(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn names(&self) -> &RecordNames {
        &self.names
    }

    /// All declared fields, primary key first
    pub fn all_fields(&self) -> &[String] {
        &self.fields
    }

    pub fn required_fields(&self) -> &[String] {
        &self.required
    }

    pub fn primary_key_field(&self) -> &'static str {
        PRIMARY_KEY
    }

    pub fn rules_for(&self, field: &str) -> Option<&[Rule]> {
        self.rules.get(field).map(Vec::as_slice)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.required.iter().any(|f| f == field)
    }

    pub fn foreign_key(&self) -> Option<&ForeignKey> {
        self.foreign_key.as_ref()
    }

    pub fn photo_field(&self) -> Option<&str> {
        self.photo_field.as_deref()
    }

    pub fn nested(&self) -> &[String] {
        &self.nested
    }
}

/// Schema registry - holds all record schemas, read-only once built
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema
    pub fn register<T: RecordSchema + 'static>(&mut self) -> AppResult<()> {
        let schema = Schema::from_definition::<T>()?;
        self.schemas.insert(schema.table.clone(), schema);
        Ok(())
    }

    /// Look up the schema of a record type
    pub fn schema(&self, record_type: &str) -> AppResult<&Schema> {
        self.schemas
            .get(record_type)
            .ok_or_else(|| AppError::UnknownRecordType(record_type.to_string()))
    }

    /// Registered record types, sorted by name
    pub fn record_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Validate `columns` of `data` against the rules of `record_type`
    pub fn validate_record(
        &self,
        record_type: &str,
        data: &Record,
        columns: &[String],
    ) -> AppResult<Validation> {
        let schema = self.schema(record_type)?;
        Ok(validation::validate_record(schema, data, columns))
    }

    /// Validate schema consistency
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (table, schema) in &self.schemas {
            if let Some(fk) = &schema.foreign_key {
                if !self.schemas.contains_key(&fk.references) {
                    errors.push(format!(
                        "Record type '{}' references undefined record type '{}'",
                        table, fk.references
                    ));
                }
                if !schema.has_field(&fk.column) {
                    errors.push(format!(
                        "Record type '{}' has foreign key on undeclared field '{}'",
                        table, fk.column
                    ));
                }
            }

            if let Some(photo) = &schema.photo_field {
                if !schema.has_field(photo) {
                    errors.push(format!(
                        "Record type '{}' stores photos in undeclared field '{}'",
                        table, photo
                    ));
                }
            }

            for child in &schema.nested {
                match self.schemas.get(child) {
                    None => errors.push(format!(
                        "Record type '{}' nests undefined record type '{}'",
                        table, child
                    )),
                    Some(child_schema) => {
                        let points_back = child_schema
                            .foreign_key
                            .as_ref()
                            .is_some_and(|fk| fk.references == *table);
                        if !points_back {
                            errors.push(format!(
                                "Nested record type '{}' has no foreign key to '{}'",
                                child, table
                            ));
                        }
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Interpret a field value as a row id
pub fn value_as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct TagSchema;

    impl RecordSchema for TagSchema {
        fn table() -> &'static str {
            "tags"
        }

        fn names() -> RecordNames {
            RecordNames::new("Tag", "tag", "tags")
        }

        fn fields() -> AppResult<Vec<FieldDefinition>> {
            Ok(vec![
                FieldDefinition::new("label")
                    .required()
                    .validate(Rule::length(1, 20)),
                FieldDefinition::new("note"),
            ])
        }

        fn foreign_key() -> Option<ForeignKey> {
            Some(ForeignKey::new("owner_id", "owners"))
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = SchemaRegistry::new();
        registry.register::<TagSchema>().unwrap();

        let schema = registry.schema("tags").unwrap();
        assert_eq!(schema.table(), "tags");
        assert_eq!(schema.all_fields(), ["id", "label", "note"]);
        assert_eq!(schema.required_fields(), ["label"]);
        assert_eq!(schema.primary_key_field(), "id");
        assert_eq!(schema.rules_for("label").map(|r| r.len()), Some(1));
        assert!(schema.rules_for("note").is_none());
        assert!(schema.is_required("label"));
        assert!(!schema.is_required("note"));
    }

    #[test]
    fn test_unknown_record_type() {
        let registry = SchemaRegistry::new();
        let err = registry.schema("widgets").unwrap_err();
        assert!(matches!(err, AppError::UnknownRecordType(name) if name == "widgets"));
    }

    #[test]
    fn test_validate_reports_dangling_references() {
        let mut registry = SchemaRegistry::new();
        registry.register::<TagSchema>().unwrap();

        let errors = registry.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("undefined record type 'owners'")));
        assert!(errors.iter().any(|e| e.contains("undeclared field 'owner_id'")));
    }

    #[test]
    fn test_invalid_pattern_is_configuration_error() {
        let err = Rule::pattern("(unclosed").unwrap_err();
        assert!(matches!(err, AppError::ConfigurationError(_)));
    }

    #[test]
    fn test_pattern_matches_from_start_only() {
        let pattern = Pattern::new("ab|cd").unwrap();
        assert!(pattern.matches_from_start("cdxx"));
        assert!(pattern.matches_from_start("ab"));
        assert!(!pattern.matches_from_start("xxab"));
    }

    #[test]
    fn test_value_as_id() {
        assert_eq!(value_as_id(&json!(7)), Some(7));
        assert_eq!(value_as_id(&json!("42")), Some(42));
        assert_eq!(value_as_id(&json!("abc")), None);
        assert_eq!(value_as_id(&Value::Null), None);
    }
}
