// Schema definitions module - centralized schema registry

pub mod email_schema;
pub mod phone_schema;
pub mod user_schema;

use crate::error::{AppError, AppResult};
use crate::record_schema::SchemaRegistry;

pub use email_schema::EmailSchema;
pub use phone_schema::PhoneSchema;
pub use user_schema::UserSchema;

/// Initialize and register all schemas
pub fn create_schema_registry() -> AppResult<SchemaRegistry> {
    let mut registry = SchemaRegistry::new();

    registry.register::<UserSchema>()?;
    registry.register::<EmailSchema>()?;
    registry.register::<PhoneSchema>()?;

    registry
        .validate()
        .map_err(|errors| AppError::ConfigurationError(errors.join("; ")))?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_consistent() {
        let registry = create_schema_registry().unwrap();
        assert_eq!(registry.record_types(), vec!["emails", "phones", "users"]);
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn test_child_types_reference_users() {
        let registry = create_schema_registry().unwrap();
        for child in ["emails", "phones"] {
            let fk = registry.schema(child).unwrap().foreign_key().unwrap();
            assert_eq!(fk.column, "user_id");
            assert_eq!(fk.references, "users");
        }
        assert!(registry.schema("users").unwrap().foreign_key().is_none());
    }
}
