use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use user_records::{
    infrastructure::{MemoryBlobStore, SqliteStore},
    record_interface::create_record_router,
    schemas::create_schema_registry,
    services::{PhotoSettings, RecordService},
};

const BOUNDARY: &str = "record-test-boundary";

async fn app() -> Router {
    let registry = Arc::new(create_schema_registry().unwrap());
    let store = Arc::new(SqliteStore::new_in_memory().await.unwrap());
    let service = RecordService::new(
        registry,
        store,
        Arc::new(MemoryBlobStore::new()),
        PhotoSettings::default(),
    );
    Router::new().nest("/api", create_record_router(Arc::new(service)))
}

fn multipart_body(fields: &[(&str, &str)], photo: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = photo {
        body.extend_from_slice(
            format!(
                concat!(
                    "--{}\r\n",
                    "Content-Disposition: form-data; name=\"photo\"; filename=\"{}\"\r\n",
                    "Content-Type: application/octet-stream\r\n\r\n",
                ),
                BOUNDARY, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_request(method: Method, uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn form_request(method: Method, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

const USER_FIELDS: &[(&str, &str)] = &[
    ("name", "Alice Smith"),
    ("gender", "female"),
    ("born_at", "1990-05-17"),
    ("address", "12 Long Street, Springfield"),
];

async fn create_user(app: &Router, name: &str) -> i64 {
    let mut fields = vec![("name", name)];
    fields.extend_from_slice(&USER_FIELDS[1..]);
    let body = multipart_body(&fields, Some(("me.png", b"png-bytes")));
    let (status, body) = send(app, multipart_request(Method::PUT, "/api/users", body)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_create_and_read_user() {
    let app = app().await;
    let id = create_user(&app, "Alice Smith").await;

    let uri = format!("/api/users/{}", id);
    let (status, body) = send(&app, empty_request(Method::GET, &uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Alice Smith");
    assert_eq!(body["user"]["id"], id);

    let (status, body) = send(&app, empty_request(Method::POST, &uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["gender"], "female");
}

#[tokio::test]
async fn test_read_missing_user_is_null() {
    let app = app().await;

    let (status, body) = send(&app, empty_request(Method::GET, "/api/users/9")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"user": null}));
}

#[tokio::test]
async fn test_invalid_create_returns_errors() {
    let app = app().await;

    let (status, body) = send(
        &app,
        form_request(
            Method::PUT,
            "/api/users",
            concat!(
                "name=Alice+Smith&gender=unknown&born_at=1990-05-17",
                "&address=12+Long+Street%2C+Springfield",
            ),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["info"], "Invalid data");
    assert_eq!(
        body["errors"]["gender"],
        "'gender' field should be one of these values: [male, female]"
    );
    assert_eq!(body["errors"]["photo"], "Photo is required");
}

#[tokio::test]
async fn test_child_with_unknown_parent() {
    let app = app().await;

    let (status, body) = send(
        &app,
        form_request(Method::PUT, "/api/emails", "user_id=99&type=work&email=a%40example.com"),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, serde_json::json!({"info": "Invalid user_id"}));
}

#[tokio::test]
async fn test_create_child_with_form() {
    let app = app().await;
    let user_id = create_user(&app, "Alice Smith").await;

    let (status, body) = send(
        &app,
        form_request(
            Method::PUT,
            "/api/phones",
            &format!("user_id={}&type=mobile&number=%2B380501234567", user_id),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["info"], "Created");

    let (_, body) = send(&app, empty_request(Method::GET, "/api/phones")).await;
    assert_eq!(body["phones"][0]["number"], "+380501234567");
    assert_eq!(body["phones"][0]["user_id"], user_id);
}

#[tokio::test]
async fn test_update_user() {
    let app = app().await;
    let id = create_user(&app, "Alice Smith").await;
    let uri = format!("/api/users/{}", id);

    let (status, body) = send(&app, form_request(Method::PATCH, &uri, "name=Alice+Jones")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"], "Updated");

    let (_, body) = send(&app, empty_request(Method::GET, &uri)).await;
    assert_eq!(body["user"]["name"], "Alice Jones");
}

#[tokio::test]
async fn test_update_missing_user_is_not_found() {
    let app = app().await;

    let (status, body) = send(
        &app,
        form_request(Method::PATCH, "/api/users/42", "name=Alice+Jones"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["info"], "No record with such id");
}

#[tokio::test]
async fn test_update_photo_with_multipart() {
    let app = app().await;
    let id = create_user(&app, "Alice Smith").await;
    let uri = format!("/api/users/{}", id);

    let body = multipart_body(&[], Some(("new.jpeg", b"jpeg-bytes")));
    let (status, body) = send(&app, multipart_request(Method::PATCH, &uri, body)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (_, body) = send(&app, empty_request(Method::GET, &uri)).await;
    assert!(body["user"]["photo_path"].as_str().unwrap().ends_with(".jpeg"));
}

#[tokio::test]
async fn test_delete_user() {
    let app = app().await;
    let id = create_user(&app, "Alice Smith").await;
    let uri = format!("/api/users/{}", id);

    let (status, body) = send(&app, empty_request(Method::DELETE, &uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"info": "Deleted"}));

    let (status, _) = send(&app, empty_request(Method::DELETE, &uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_with_sorting() {
    let app = app().await;
    for name in ["Clara Rossi", "Alice Smith", "Boris Novak"] {
        create_user(&app, name).await;
    }

    let (status, body) = send(
        &app,
        empty_request(Method::GET, "/api/users?sort_by=name&order=desc"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Clara Rossi", "Boris Novak", "Alice Smith"]);
}

#[tokio::test]
async fn test_unregistered_type_has_no_route() {
    let app = app().await;

    let (status, _) = send(&app, empty_request(Method::GET, "/api/widgets")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
