// Record Service - validated create/read/update/delete over any registered record type
// Each call runs in one store transaction; dropping it on an early return rolls back.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::infrastructure::{
    BlobStore, Cleanup, Record, RecordStore, SortOrder, StoreTransaction,
};
use crate::record_schema::{value_as_id, ForeignKey, Schema, SchemaRegistry, PRIMARY_KEY};
use crate::services::envelope::{Envelope, FieldErrors, Selection};
use crate::validation::{validate_record, MISSING_FIELDS_KEY};

/// Error key for photo upload problems
pub const PHOTO_KEY: &str = "photo";

/// Where uploaded photos go and which extensions are accepted
#[derive(Debug, Clone)]
pub struct PhotoSettings {
    pub upload_folder: PathBuf,
    pub allowed_extensions: Vec<String>,
}

impl Default for PhotoSettings {
    fn default() -> Self {
        Self {
            upload_folder: PathBuf::from("./users/photos/"),
            allowed_extensions: vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()],
        }
    }
}

/// Uploaded photo file
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    pub fn new(file_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            bytes,
        }
    }

    /// Lower-cased text after the last `.` of the file name
    pub fn extension(&self) -> String {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or("")
            .to_lowercase()
    }
}

/// Requested list ordering, as received from the caller
#[derive(Debug, Clone, Default)]
pub struct SortBy {
    pub column: String,
    pub direction: String,
}

impl SortBy {
    pub fn new(column: &str, direction: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: direction.to_string(),
        }
    }

    /// Resolve against `schema`; unknown columns or directions are ignored
    fn resolve(&self, schema: &Schema) -> Option<SortOrder> {
        if !schema.has_field(&self.column) {
            return None;
        }
        match self.direction.to_lowercase().as_str() {
            "asc" => Some(SortOrder::ascending(&self.column)),
            "desc" => Some(SortOrder::descending(&self.column)),
            _ => None,
        }
    }
}

/// Stored photo file name: hex SHA-256 of the record id plus extension
pub fn photo_file_name(id: i64, extension: &str) -> String {
    let digest = Sha256::digest(id.to_string().as_bytes());
    format!("{}.{}", hex::encode(digest), extension)
}

#[derive(Clone)]
pub struct RecordService {
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    photos: Arc<PhotoSettings>,
}

impl RecordService {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        photos: PhotoSettings,
    ) -> Self {
        Self {
            registry,
            store,
            blobs,
            photos: Arc::new(photos),
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Validate and insert one record, with its photo and nested child records
    pub async fn create(
        &self,
        record_type: &str,
        mut data: Record,
        photo: Option<PhotoUpload>,
    ) -> AppResult<Envelope> {
        let schema = self.registry.schema(record_type)?;
        let mut errors = FieldErrors::new();
        let mut additional_fields = BTreeMap::new();

        if let Some(field) = schema.photo_field() {
            data.insert(field.to_string(), Value::from(""));
        }

        // Child records submitted alongside the parent
        let mut children: Vec<(&Schema, Vec<Record>)> = Vec::new();
        for child_type in schema.nested() {
            let child_schema = self.registry.schema(child_type)?;
            let Some(raw) = data.remove(child_type.as_str()) else {
                continue;
            };
            match parse_nested(child_type, &raw) {
                Ok(rows) => children.push((child_schema, rows)),
                Err(message) => {
                    errors.insert(child_type.clone(), message);
                }
            }
        }

        let validation = validate_record(schema, &data, schema.required_fields());
        errors.extend(validation.errors);

        for (child_schema, rows) in children.iter_mut() {
            let child_schema: &Schema = child_schema;
            for (index, row) in rows.iter_mut().enumerate() {
                if let Some(fk) = child_schema.foreign_key() {
                    row.insert(fk.column.clone(), Value::from(0));
                }
                let child = validate_record(child_schema, row, child_schema.required_fields());
                if !child.is_valid {
                    let key = format!("{}[{}]", child_schema.table(), index);
                    additional_fields.insert(key, child.errors);
                }
            }
        }

        let photo = match (schema.photo_field(), photo) {
            (Some(field), Some(upload)) => {
                if let Err(message) = self.check_extension(&upload) {
                    errors.insert(PHOTO_KEY.to_string(), message);
                }
                Some((field, upload))
            }
            (Some(_), None) => {
                errors.insert(PHOTO_KEY.to_string(), "Photo is required".to_string());
                None
            }
            (None, Some(_)) => {
                errors.insert(PHOTO_KEY.to_string(), no_photo_message(schema));
                None
            }
            (None, None) => None,
        };

        if !errors.is_empty() || !additional_fields.is_empty() {
            debug!("Rejected {} create: {:?}", schema.names().singular, errors);
            return Ok(Envelope::invalid(errors, additional_fields));
        }

        let mut tx = self.store.begin().await?;

        if let Some(fk) = schema.foreign_key() {
            match parent_id(&mut *tx, fk, data.get(&fk.column)).await? {
                Some(parent) => {
                    data.insert(fk.column.clone(), Value::from(parent));
                }
                None => return Ok(Envelope::invalid_foreign_key(&fk.column)),
            }
        }

        let ids = tx
            .insert(schema.table(), schema.required_fields(), std::slice::from_ref(&data))
            .await?;
        let Some(&id) = ids.first() else {
            return Ok(Envelope::not_created());
        };

        if let Some((field, upload)) = photo {
            let path = self.photo_path(id, &upload.extension());
            self.blobs.save(&upload.bytes, &path).await?;

            let mut values = Record::new();
            values.insert(field.to_string(), Value::from(path));
            tx.update(schema.table(), &values, id).await?;
        }

        for (child_schema, mut rows) in children {
            if rows.is_empty() {
                continue;
            }
            if let Some(fk) = child_schema.foreign_key() {
                for row in rows.iter_mut() {
                    row.insert(fk.column.clone(), Value::from(id));
                }
            }
            tx.insert(child_schema.table(), child_schema.required_fields(), &rows)
                .await?;
        }

        tx.commit().await?;
        info!("Created {} {}", schema.names().singular, id);
        Ok(Envelope::created(id))
    }

    /// One record by id, or every record in the requested order
    pub async fn read(
        &self,
        record_type: &str,
        id: Option<i64>,
        sort_by: Option<&SortBy>,
    ) -> AppResult<Selection> {
        let schema = self.registry.schema(record_type)?;
        let order = sort_by.and_then(|sort| sort.resolve(schema));
        let condition = id.map(|id| {
            let mut condition = Record::new();
            condition.insert(PRIMARY_KEY.to_string(), Value::from(id));
            condition
        });

        let mut tx = self.store.begin().await?;
        let rows = tx
            .select(schema.table(), &[], condition.as_ref(), order.as_ref())
            .await?;
        tx.commit().await?;

        let names = schema.names();
        Ok(match id {
            Some(_) => Selection::One {
                key: names.singular.clone(),
                record: rows.into_iter().next(),
            },
            None => Selection::Many {
                key: names.plural.clone(),
                records: rows,
            },
        })
    }

    /// Validate the supplied fields and apply them to record `id`
    pub async fn update(
        &self,
        record_type: &str,
        id: i64,
        data: Record,
        photo: Option<PhotoUpload>,
    ) -> AppResult<Envelope> {
        let schema = self.registry.schema(record_type)?;
        let columns: Vec<String> = data.keys().cloned().collect();
        let mut errors = validate_record(schema, &data, &columns).errors;

        // The stored photo path is written by the service only
        if let Some(field) = schema.photo_field() {
            if data.contains_key(field) {
                errors.insert(
                    field.to_string(),
                    format!("{} has no {} field", schema.names().object, field),
                );
            }
        }

        let photo = match (schema.photo_field(), photo) {
            (Some(field), Some(upload)) => {
                if let Err(message) = self.check_extension(&upload) {
                    errors.insert(PHOTO_KEY.to_string(), message);
                }
                Some((field, upload))
            }
            (None, Some(_)) => {
                errors.insert(PHOTO_KEY.to_string(), no_photo_message(schema));
                None
            }
            (_, None) => None,
        };

        if data.is_empty() && photo.is_none() && errors.is_empty() {
            errors.insert(
                MISSING_FIELDS_KEY.to_string(),
                format!("No {} fields to update", schema.names().singular),
            );
        }

        if !errors.is_empty() {
            debug!("Rejected {} {} update: {:?}", schema.names().singular, id, errors);
            return Ok(Envelope::invalid(errors, BTreeMap::new()));
        }

        let mut values = data;
        let mut tx = self.store.begin().await?;

        if let Some(fk) = schema.foreign_key() {
            if let Some(value) = values.get(&fk.column) {
                match parent_id(&mut *tx, fk, Some(value)).await? {
                    Some(parent) => {
                        values.insert(fk.column.clone(), Value::from(parent));
                    }
                    None => return Ok(Envelope::invalid_foreign_key(&fk.column)),
                }
            }
        }

        let mut pending_photo = None;
        if let Some((field, upload)) = photo {
            let previous = current_value(&mut *tx, schema.table(), field, id).await?;
            let path = self.photo_path(id, &upload.extension());
            values.insert(field.to_string(), Value::from(path.clone()));
            pending_photo = Some((path, upload, previous));
        }

        let updated = tx.update(schema.table(), &values, id).await?;
        if updated.is_empty() {
            return Ok(Envelope::no_such_record());
        }

        let mut replaced = None;
        if let Some((path, upload, previous)) = pending_photo {
            self.blobs.save(&upload.bytes, &path).await?;
            replaced = previous.filter(|old| !old.is_empty() && *old != path);
        }

        tx.commit().await?;

        let mut cleanup = Vec::new();
        if let Some(old) = replaced {
            cleanup.push(self.remove_photo(&old).await);
        }

        info!("Updated {} {}", schema.names().singular, id);
        Ok(Envelope::updated(cleanup))
    }

    /// Delete record `id` and, best effort, its stored photo
    pub async fn delete(&self, record_type: &str, id: i64) -> AppResult<Envelope> {
        let schema = self.registry.schema(record_type)?;
        let returning = schema.photo_field().unwrap_or(PRIMARY_KEY);

        let mut tx = self.store.begin().await?;
        let deleted = tx.delete(schema.table(), id, returning).await?;
        tx.commit().await?;

        if deleted.is_empty() {
            return Ok(Envelope::no_such_record());
        }

        let mut cleanup = Vec::new();
        if schema.photo_field().is_some() {
            for path in deleted.iter().filter_map(Value::as_str) {
                if !path.is_empty() {
                    cleanup.push(self.remove_photo(path).await);
                }
            }
        }

        let removed = cleanup.iter().filter(|c| c.is_removed()).count();
        info!(
            "Deleted {} {} ({} photo files removed)",
            schema.names().singular,
            id,
            removed
        );
        Ok(Envelope::deleted(cleanup))
    }

    /// Whether `path` names a file directly inside the upload folder
    fn is_stored_photo(&self, path: &str) -> bool {
        let Ok(rest) = Path::new(path).strip_prefix(&self.photos.upload_folder) else {
            return false;
        };
        let mut components = rest.components();
        matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        )
    }

    /// Best-effort removal of a stored photo; paths outside the upload folder are left alone
    async fn remove_photo(&self, path: &str) -> Cleanup {
        if !self.is_stored_photo(path) {
            warn!("Refusing to remove {} outside the upload folder", path);
            return Cleanup::Failed {
                path: path.to_string(),
                reason: "outside the upload folder".to_string(),
            };
        }
        self.blobs.remove_best_effort(path).await
    }

    fn photo_path(&self, id: i64, extension: &str) -> String {
        self.photos
            .upload_folder
            .join(photo_file_name(id, extension))
            .to_string_lossy()
            .into_owned()
    }

    fn check_extension(&self, upload: &PhotoUpload) -> Result<(), String> {
        let extension = upload.extension();
        if self.photos.allowed_extensions.iter().any(|e| *e == extension) {
            Ok(())
        } else {
            Err(format!(
                "Photo must be one of these types: [{}]",
                self.photos.allowed_extensions.join(", ")
            ))
        }
    }
}

fn no_photo_message(schema: &Schema) -> String {
    format!("{} has no photo field", schema.names().object)
}

/// Existing parent id referenced by `value`, if any
async fn parent_id(
    tx: &mut dyn StoreTransaction,
    fk: &ForeignKey,
    value: Option<&Value>,
) -> AppResult<Option<i64>> {
    let Some(id) = value.and_then(value_as_id) else {
        return Ok(None);
    };

    let mut condition = Record::new();
    condition.insert(PRIMARY_KEY.to_string(), Value::from(id));
    let rows = tx
        .select(&fk.references, &[PRIMARY_KEY.to_string()], Some(&condition), None)
        .await?;

    Ok((rows.len() == 1).then_some(id))
}

/// Current text value of `field` in row `id`
async fn current_value(
    tx: &mut dyn StoreTransaction,
    table: &str,
    field: &str,
    id: i64,
) -> AppResult<Option<String>> {
    let mut condition = Record::new();
    condition.insert(PRIMARY_KEY.to_string(), Value::from(id));
    let rows = tx
        .select(table, &[field.to_string()], Some(&condition), None)
        .await?;

    Ok(rows
        .first()
        .and_then(|row| row.get(field))
        .and_then(Value::as_str)
        .map(str::to_string))
}

/// Child records given as a JSON array of objects, or as its text form
fn parse_nested(key: &str, raw: &Value) -> Result<Vec<Record>, String> {
    let invalid = || format!("'{}' field must be a JSON array of objects", key);

    let items = match raw {
        Value::String(text) => {
            serde_json::from_str::<Vec<Value>>(text).map_err(|_| invalid())?
        }
        Value::Array(items) => items.clone(),
        _ => return Err(invalid()),
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(row) => Ok(row),
            _ => Err(invalid()),
        })
        .collect()
}
