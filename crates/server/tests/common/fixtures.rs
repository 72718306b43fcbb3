//! Request builders and catalogue fixtures.

use super::server::TestServer;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use bytes::Bytes;
use folio_metadata::models::{IssueRow, VolumeRow};
use folio_metadata::repos::{IssueRepo, VolumeRepo};
use serde_json::Value;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "folio-test-boundary";

/// A response read to completion.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[allow(dead_code)]
impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }

    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `name=value` pair of the session cookie set by this response.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("folio_session="))
            .and_then(|v| v.split(';').next())
            .map(str::to_owned)
    }
}

/// Send a request through the router and read the whole response.
#[allow(dead_code)]
pub async fn send(server: &TestServer, request: Request<Body>) -> TestResponse {
    let response = server
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");
    TestResponse {
        status,
        headers,
        body,
    }
}

/// Build a request with an optional bearer token and JSON body.
#[allow(dead_code)]
pub fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("Failed to build request")
}

/// Bodyless request carrying an optional `Cookie` header.
#[allow(dead_code)]
pub fn request_with_cookie(method: Method, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("Failed to build request")
}

/// Hand-built `multipart/form-data` body.
#[derive(Default)]
#[allow(dead_code)]
pub struct MultipartBody {
    body: Vec<u8>,
}

#[allow(dead_code)]
impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder
            .body(Body::from(self.body))
            .expect("Failed to build request")
    }
}

/// Volume and issue to hang articles on.
#[allow(dead_code)]
pub struct Catalogue {
    pub volume_id: Uuid,
    pub issue_id: Uuid,
}

/// Insert a volume with one issue directly into the metadata store.
#[allow(dead_code)]
pub async fn seed_catalogue(server: &TestServer) -> Catalogue {
    let now = OffsetDateTime::now_utc();
    let volume = VolumeRow {
        volume_id: Uuid::new_v4(),
        year: 2024,
        name: "Volume 12".to_string(),
        slug: "volume-12".to_string(),
        created_at: now,
        updated_at: now,
    };
    server
        .metadata()
        .create_volume(&volume)
        .await
        .expect("Failed to create volume");
    let issue = IssueRow {
        issue_id: Uuid::new_v4(),
        volume_id: volume.volume_id,
        name: "Issue 1".to_string(),
        slug: "volume-12-issue-1".to_string(),
        created_at: now,
        updated_at: now,
    };
    server
        .metadata()
        .create_issue(&issue)
        .await
        .expect("Failed to create issue");
    Catalogue {
        volume_id: volume.volume_id,
        issue_id: issue.issue_id,
    }
}

/// Multipart form for a new article with a PDF attached.
#[allow(dead_code)]
pub fn article_form(catalogue: &Catalogue, slug: &str, pdf: &[u8]) -> MultipartBody {
    MultipartBody::new()
        .text("title", "Quantum Entropy")
        .text("author", "A. Lovelace")
        .text("abstract", "On entropy.")
        .text("slug", slug)
        .text("volume", &catalogue.volume_id.to_string())
        .text("issue", &catalogue.issue_id.to_string())
        .file("pdf", "paper.pdf", "application/pdf", pdf)
}

/// Create an article through the admin API and return its JSON.
#[allow(dead_code)]
pub async fn create_article(server: &TestServer, catalogue: &Catalogue, slug: &str) -> Value {
    let request = article_form(catalogue, slug, b"%PDF-1.7 test").into_request(
        Method::POST,
        "/api/admin/articles",
        Some(super::server::ADMIN_TOKEN),
    );
    let response = send(server, request).await;
    assert_eq!(
        response.status,
        StatusCode::CREATED,
        "article creation failed: {}",
        String::from_utf8_lossy(&response.body)
    );
    response.json()["data"].clone()
}

/// Multipart form for a complete manuscript submission.
#[allow(dead_code)]
pub fn submission_form(manuscript: &[u8]) -> MultipartBody {
    MultipartBody::new()
        .text("correspondingAuthor", "Ada Lovelace")
        .text("authorEmail", "ada@folio.test")
        .text("authorAffiliation", "Analytical Society")
        .text("authorCountry", "UK")
        .text(
            "coAuthors",
            r#"[{"name":"Charles Babbage","email":"cb@folio.test","affiliation":"Cambridge"}]"#,
        )
        .text("paperTitle", "Notes on the Engine")
        .text("paperAbstract", "A translation with notes.")
        .text("keywords", "computation, engines")
        .text("paperType", "Research Article")
        .text("subjectArea", "Mathematics")
        .text("copyrightAgreement", "true")
        .text("ethicsAgreement", "true")
        .file("manuscriptFile", "notes.pdf", "application/pdf", manuscript)
}
