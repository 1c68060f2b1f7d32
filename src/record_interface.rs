// Record Interface - HTTP routes for every registered record type

use axum::{
    extract::{FromRequest, Multipart, Path as AxumPath, Query, Request, State},
    http::header::CONTENT_TYPE,
    routing::{get, put},
    Form, Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::infrastructure::Record;
use crate::services::{
    record_service::PHOTO_KEY, Envelope, PhotoUpload, RecordService, Selection, SortBy,
};

/// Handler state: the shared service plus the record type a route serves
#[derive(Clone)]
pub struct RecordContext {
    pub service: Arc<RecordService>,
    pub record_type: Arc<str>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

impl ListParams {
    fn sort_by(&self) -> Option<SortBy> {
        let column = self.sort_by.as_deref()?;
        Some(SortBy::new(column, self.order.as_deref().unwrap_or("asc")))
    }
}

/// Form fields of a create or update request, multipart or url-encoded.
///
/// Every text field is kept as a string; a file part named `photo` becomes
/// the uploaded photo.
#[derive(Debug, Default)]
pub struct FormInput {
    pub data: Record,
    pub photo: Option<PhotoUpload>,
}

impl<S> FromRequest<S> for FormInput
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match content_type {
            None => Ok(Self::default()),
            Some(ct) if ct.starts_with("multipart/form-data") => {
                let multipart = Multipart::from_request(req, state)
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                Self::from_multipart(multipart).await
            }
            Some(_) => {
                let Form(fields) = Form::<Vec<(String, String)>>::from_request(req, state)
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;

                let data = fields
                    .into_iter()
                    .map(|(name, value)| (name, Value::String(value)))
                    .collect();
                Ok(Self { data, photo: None })
            }
        }
    }
}

impl FormInput {
    async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut input = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);

            match file_name {
                Some(file_name) if name == PHOTO_KEY => {
                    let bytes = field.bytes().await.map_err(|e| {
                        AppError::BadRequest(format!("Failed to read photo: {}", e))
                    })?;
                    // Browsers send an empty part when no file was chosen
                    if !file_name.is_empty() {
                        input.photo = Some(PhotoUpload::new(&file_name, bytes.to_vec()));
                    }
                }
                _ => {
                    let text = field.text().await.map_err(|e| {
                        AppError::BadRequest(format!("Failed to read field '{}': {}", name, e))
                    })?;
                    input.data.insert(name, Value::String(text));
                }
            }
        }

        Ok(input)
    }
}

// HTTP Handlers

pub async fn create_handler(
    State(ctx): State<RecordContext>,
    form: FormInput,
) -> AppResult<Envelope> {
    ctx.service.create(&ctx.record_type, form.data, form.photo).await
}

pub async fn list_handler(
    State(ctx): State<RecordContext>,
    Query(params): Query<ListParams>,
) -> AppResult<Selection> {
    let sort_by = params.sort_by();
    ctx.service.read(&ctx.record_type, None, sort_by.as_ref()).await
}

pub async fn read_handler(
    State(ctx): State<RecordContext>,
    AxumPath(id): AxumPath<i64>,
) -> AppResult<Selection> {
    ctx.service.read(&ctx.record_type, Some(id), None).await
}

pub async fn update_handler(
    State(ctx): State<RecordContext>,
    AxumPath(id): AxumPath<i64>,
    form: FormInput,
) -> AppResult<Envelope> {
    ctx.service.update(&ctx.record_type, id, form.data, form.photo).await
}

pub async fn delete_handler(
    State(ctx): State<RecordContext>,
    AxumPath(id): AxumPath<i64>,
) -> AppResult<Envelope> {
    ctx.service.delete(&ctx.record_type, id).await
}

/// Routes of one record type
fn record_type_router(service: Arc<RecordService>, record_type: &str) -> Router {
    let ctx = RecordContext {
        service,
        record_type: Arc::from(record_type),
    };

    Router::new()
        .route(
            &format!("/{}", record_type),
            put(create_handler).get(list_handler).post(list_handler),
        )
        .route(
            &format!("/{}/{{id}}", record_type),
            get(read_handler)
                .post(read_handler)
                .patch(update_handler)
                .delete(delete_handler),
        )
        .with_state(ctx)
}

// Create router covering every registered record type
pub fn create_record_router(service: Arc<RecordService>) -> Router {
    service
        .registry()
        .record_types()
        .into_iter()
        .fold(Router::new(), |router, record_type| {
            router.merge(record_type_router(service.clone(), record_type))
        })
}
