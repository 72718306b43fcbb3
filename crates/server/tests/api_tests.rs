//! Integration tests for HTTP API endpoints.

mod common;

use axum::http::{Method, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::{
    ADMIN_EMAIL, ADMIN_TOKEN, AUTHOR_TOKEN, OTHER_AUTHOR_TOKEN, TestServer, create_article,
    json_request, seed_catalogue, send, submission_form,
};
use folio_core::config::{IdentityConfig, StaticIdentity};
use folio_metadata::repos::UserRepo;
use serde_json::{Value, json};

async fn submit(server: &TestServer, token: &str) -> Value {
    let request =
        submission_form(b"%PDF-1.7 manuscript").into_request(Method::POST, "/api/submissions", Some(token));
    let response = send(server, request).await;
    assert_eq!(
        response.status,
        StatusCode::CREATED,
        "submission failed: {}",
        String::from_utf8_lossy(&response.body)
    );
    response.json()
}

fn fake_jwt(header: Value) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode("{}")
    )
}

// =============================================================================
// Health and catalogue
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;
    let response = send(&server, json_request(Method::GET, "/v1/health", None, None)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["status"], "ok");
}

#[tokio::test]
async fn test_public_catalogue_lookups() {
    let server = TestServer::new().await;
    let catalogue = seed_catalogue(&server).await;
    create_article(&server, &catalogue, "paper").await;

    let volumes = send(&server, json_request(Method::GET, "/api/volumes", None, None)).await;
    assert_eq!(volumes.status, StatusCode::OK);
    assert_eq!(volumes.json()["status"], 200);
    assert_eq!(volumes.json()["data"][0]["slug"], "volume-12");

    let issue = send(
        &server,
        json_request(Method::GET, "/api/issues/volume-12-issue-1", None, None),
    )
    .await;
    assert_eq!(issue.status, StatusCode::OK);
    assert_eq!(issue.json()["data"]["volume"]["slug"], "volume-12");

    let article = send(&server, json_request(Method::GET, "/api/articles/paper", None, None)).await;
    let data = &article.json()["data"];
    assert_eq!(data["title"], "Quantum Entropy");
    assert_eq!(data["abstract"], "On entropy.");
    assert_eq!(data["issue"]["slug"], "volume-12-issue-1");

    let missing = send(&server, json_request(Method::GET, "/api/volumes/nope", None, None)).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_volume_with_issues_cannot_be_deleted() {
    let server = TestServer::new().await;
    let catalogue = seed_catalogue(&server).await;

    let response = send(
        &server,
        json_request(
            Method::DELETE,
            &format!("/api/admin/volumes/{}", catalogue.volume_id),
            Some(ADMIN_TOKEN),
            None,
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_admin_creates_volume_and_issue() {
    let server = TestServer::new().await;

    let volume = send(
        &server,
        json_request(
            Method::POST,
            "/api/admin/volumes",
            Some(ADMIN_TOKEN),
            Some(json!({ "year": 2025, "name": "Volume 13", "slug": "volume-13" })),
        ),
    )
    .await;
    assert_eq!(volume.status, StatusCode::CREATED);
    let volume_id = volume.json()["data"]["id"].as_str().unwrap().to_string();

    let issue = send(
        &server,
        json_request(
            Method::POST,
            "/api/admin/issues",
            Some(ADMIN_TOKEN),
            Some(json!({ "name": "Issue 1", "slug": "volume-13-issue-1", "volume": volume_id })),
        ),
    )
    .await;
    assert_eq!(issue.status, StatusCode::CREATED);
    assert_eq!(issue.json()["data"]["volumeId"], volume_id.as_str());

    let duplicate = send(
        &server,
        json_request(
            Method::POST,
            "/api/admin/volumes",
            Some(ADMIN_TOKEN),
            Some(json!({ "year": 2025, "name": "Again", "slug": "volume-13" })),
        ),
    )
    .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_missing_token_reason() {
    let server = TestServer::new().await;
    let response = send(&server, json_request(Method::GET, "/api/submissions", None, None)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["reason"], "no_token");
}

#[tokio::test]
async fn test_unknown_token_reason() {
    let server = TestServer::new().await;
    let response = send(
        &server,
        json_request(Method::GET, "/api/submissions", Some("forged"), None),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["reason"], "invalid_token");
}

#[tokio::test]
async fn test_public_routes_ignore_rejected_tokens() {
    let server = TestServer::new().await;
    let catalogue = seed_catalogue(&server).await;
    create_article(&server, &catalogue, "paper").await;

    let read = send(
        &server,
        json_request(Method::POST, "/api/articles/paper/read", Some("stale-token"), None),
    )
    .await;
    assert_eq!(read.status, StatusCode::OK);
    assert_eq!(read.json()["data"]["value"], 1);

    let article = send(
        &server,
        json_request(Method::GET, "/api/articles/paper", Some("stale-token"), None),
    )
    .await;
    assert_eq!(article.status, StatusCode::OK);
}

#[tokio::test]
async fn test_provider_outage_only_affects_protected_routes() {
    let server = TestServer::with_config(|config| {
        config.identity = IdentityConfig::Firebase {
            api_key: "test-key".to_string(),
            endpoint: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
        };
    })
    .await;
    let token = fake_jwt(json!({ "alg": "RS256", "kid": "key-1" }));

    let volumes = send(&server, json_request(Method::GET, "/api/volumes", Some(&token), None)).await;
    assert_eq!(volumes.status, StatusCode::OK);

    let mine = send(
        &server,
        json_request(Method::GET, "/api/submissions", Some(&token), None),
    )
    .await;
    assert_eq!(mine.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_malformed_jwt_reasons() {
    // Header checks reject these before the provider is contacted.
    let server = TestServer::with_config(|config| {
        config.identity = IdentityConfig::Firebase {
            api_key: "test-key".to_string(),
            endpoint: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
        };
    })
    .await;

    let cases = [
        ("not-a-jwt".to_string(), "invalid_token_format"),
        (
            fake_jwt(json!({ "alg": "HS256", "kid": "key-1" })),
            "invalid_algorithm",
        ),
        (fake_jwt(json!({ "alg": "RS256" })), "missing_kid"),
    ];
    for (token, reason) in cases {
        let response = send(
            &server,
            json_request(Method::GET, "/api/submissions", Some(&token), None),
        )
        .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{reason}");
        assert_eq!(response.json()["reason"], reason);
    }
}

#[tokio::test]
async fn test_signup_conflicts_with_existing_user() {
    let server = TestServer::new().await;
    let response = send(
        &server,
        json_request(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({ "idToken": AUTHOR_TOKEN, "username": "ada2" })),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let login = send(
        &server,
        json_request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "idToken": AUTHOR_TOKEN })),
        ),
    )
    .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.json()["user"]["username"], "ada");
}

// =============================================================================
// Administration guard
// =============================================================================

#[tokio::test]
async fn test_non_admin_is_forbidden() {
    let server = TestServer::new().await;
    let response = send(
        &server,
        json_request(Method::GET, "/api/admin/users", Some(AUTHOR_TOKEN), None),
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_without_local_user_is_not_found() {
    let server = TestServer::with_config(|config| {
        if let IdentityConfig::Static { users } = &mut config.identity {
            users.push(StaticIdentity {
                token: "ghost-token".to_string(),
                uid: "ghost-uid".to_string(),
                email: ADMIN_EMAIL.to_string(),
            });
        }
    })
    .await;

    let response = send(
        &server,
        json_request(Method::GET, "/api/admin/users", Some("ghost-token"), None),
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_lists_and_deletes_users() {
    let server = TestServer::new().await;
    let users = send(
        &server,
        json_request(Method::GET, "/api/admin/users", Some(ADMIN_TOKEN), None),
    )
    .await;
    assert_eq!(users.status, StatusCode::OK);
    let users = users.json();
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 3);

    let grace = users
        .iter()
        .find(|u| u["username"] == "grace")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();
    let deleted = send(
        &server,
        json_request(
            Method::DELETE,
            &format!("/api/admin/users/{grace}"),
            Some(ADMIN_TOKEN),
            None,
        ),
    )
    .await;
    assert_eq!(deleted.status, StatusCode::OK);

    let again = send(
        &server,
        json_request(
            Method::DELETE,
            &format!("/api/admin/users/{grace}"),
            Some(ADMIN_TOKEN),
            None,
        ),
    )
    .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);

    let revoked = send(
        &server,
        json_request(Method::GET, "/api/submissions", Some(OTHER_AUTHOR_TOKEN), None),
    )
    .await;
    assert_eq!(revoked.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_kept_when_provider_refuses_deletion() {
    let server = TestServer::new().await;
    let orphan = TestServer::create_user(&server.state, "orphan-uid", "orphan", "orphan@folio.test").await;

    let response = send(
        &server,
        json_request(
            Method::DELETE,
            &format!("/api/admin/users/{}", orphan.user_id),
            Some(ADMIN_TOKEN),
            None,
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        server
            .metadata()
            .get_user(orphan.user_id)
            .await
            .unwrap()
            .is_some()
    );
}

// =============================================================================
// Submissions
// =============================================================================

#[tokio::test]
async fn test_submission_lifecycle() {
    let server = TestServer::new().await;
    let created = submit(&server, AUTHOR_TOKEN).await;
    let id = created["submissionId"].as_str().unwrap().to_string();
    assert!(created["manuscriptUrl"].as_str().unwrap().contains("/submissions/"));

    let mine = send(
        &server,
        json_request(Method::GET, "/api/submissions", Some(AUTHOR_TOKEN), None),
    )
    .await;
    let mine = mine.json();
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["status"], "Pending");
    assert_eq!(mine[0]["coAuthors"][0]["name"], "Charles Babbage");

    let download = send(
        &server,
        json_request(
            Method::GET,
            &format!("/api/submissions/{id}?download=true"),
            Some(AUTHOR_TOKEN),
            None,
        ),
    )
    .await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(download.body.as_ref(), b"%PDF-1.7 manuscript");
    assert_eq!(download.header(header::CONTENT_TYPE), Some("application/pdf"));

    let approved = send(
        &server,
        json_request(
            Method::PATCH,
            &format!("/api/admin/submissions/{id}/approve"),
            Some(ADMIN_TOKEN),
            None,
        ),
    )
    .await;
    assert_eq!(approved.status, StatusCode::OK);
    assert_eq!(approved.json()["status"], "Approved");

    let rejected = send(
        &server,
        json_request(
            Method::PATCH,
            &format!("/api/admin/submissions/{id}/reject"),
            Some(ADMIN_TOKEN),
            None,
        ),
    )
    .await;
    assert_eq!(rejected.json()["status"], "Rejected");

    let withdrawn = send(
        &server,
        json_request(
            Method::DELETE,
            &format!("/api/submissions/{id}"),
            Some(AUTHOR_TOKEN),
            None,
        ),
    )
    .await;
    assert_eq!(withdrawn.status, StatusCode::OK);

    let all = send(
        &server,
        json_request(Method::GET, "/api/admin/submissions", Some(ADMIN_TOKEN), None),
    )
    .await;
    assert!(all.json().as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_submissions_are_private_to_their_author() {
    let server = TestServer::new().await;
    let created = submit(&server, AUTHOR_TOKEN).await;
    let id = created["submissionId"].as_str().unwrap();

    let response = send(
        &server,
        json_request(
            Method::GET,
            &format!("/api/submissions/{id}"),
            Some(OTHER_AUTHOR_TOKEN),
            None,
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let theirs = send(
        &server,
        json_request(Method::GET, "/api/submissions", Some(OTHER_AUTHOR_TOKEN), None),
    )
    .await;
    assert!(theirs.json().as_array().unwrap().is_empty());

    let approve = send(
        &server,
        json_request(
            Method::PATCH,
            &format!("/api/admin/submissions/{id}/approve"),
            Some(AUTHOR_TOKEN),
            None,
        ),
    )
    .await;
    assert_eq!(approve.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_submission_requires_agreements() {
    let server = TestServer::new().await;
    let request = submission_form(b"%PDF-1.7")
        .text("ethicsAgreement", "false")
        .into_request(Method::POST, "/api/submissions", Some(AUTHOR_TOKEN));
    // The later field wins, so ethicsAgreement is now "false".
    let response = send(&server, request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(server.storage.put_calls(), 0);
}

#[tokio::test]
async fn test_submission_rejects_unsupported_manuscript_type() {
    let server = TestServer::new().await;
    let request = common::MultipartBody::new()
        .text("correspondingAuthor", "Ada Lovelace")
        .text("authorEmail", "ada@folio.test")
        .text("authorAffiliation", "Analytical Society")
        .text("authorCountry", "UK")
        .text("paperTitle", "Notes")
        .text("paperAbstract", "Notes.")
        .text("keywords", "notes")
        .text("paperType", "Research Article")
        .text("subjectArea", "Mathematics")
        .text("copyrightAgreement", "true")
        .text("ethicsAgreement", "true")
        .file("manuscriptFile", "notes.png", "image/png", b"png")
        .into_request(Method::POST, "/api/submissions", Some(AUTHOR_TOKEN));
    let response = send(&server, request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}
