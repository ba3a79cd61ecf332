/// Request builders for handler tests
use crate::{context::AppContext, server::build_router};
use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "cms-test-boundary";

/// One multipart part: name, optional file name, body
pub type Part<'a> = (&'a str, Option<&'a str>, &'a str);

pub async fn test_app(dir: &std::path::Path) -> (Router, AppContext) {
    let ctx = AppContext::for_tests(dir).await;
    (build_router(ctx.clone()), ctx)
}

pub async fn send(app: &Router, request: Request) -> (StatusCode, Value) {
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

pub fn get(uri: &str) -> Request {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str) -> Request {
    Request::delete(uri).body(Body::empty()).unwrap()
}

pub fn json(method: &str, uri: &str, body: Value) -> Request {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn multipart(method: &str, uri: &str, parts: &[Part<'_>]) -> Request {
    let mut body = Vec::new();
    for (name, file_name, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let disposition = match file_name {
            Some(file_name) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                name, file_name
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name),
        };
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(data.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Path of a local upload URL below the test upload directory
pub fn local_file(dir: &std::path::Path, url: &str) -> std::path::PathBuf {
    dir.join(url.trim_start_matches("/uploads/"))
}
