//! End-to-end tests driving the full router with axum-test

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::Utc;
use serde_json::{json, Value};

use folio::api::{build_router, AppState};
use folio::config::Config;
use folio::db::{create_test_pool, migrations};
use folio::models::Role;
use folio::services::revalidate::sign;

const PASSWORD: &str = "correct horse battery";

struct Harness {
    server: TestServer,
}

async fn harness_with(config: Config) -> Harness {
    let pool = create_test_pool().await.unwrap();
    migrations::run_migrations(&pool).await.unwrap();
    let state = AppState::new(pool, config);
    for (name, role) in [
        ("admin", Role::Admin),
        ("editor", Role::Editor),
        ("author", Role::Author),
        ("moderator", Role::Moderator),
    ] {
        state
            .user_service
            .create_user(name, &format!("{}@example.com", name), PASSWORD, role)
            .await
            .unwrap();
    }
    let server = TestServer::new(build_router(state)).unwrap();
    Harness { server }
}

async fn harness() -> Harness {
    harness_with(Config::default()).await
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

async fn login(h: &Harness, username: &str) -> String {
    let response = h
        .server
        .post("/api/v1/auth/login")
        .json(&json!({ "username_or_email": username, "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    response.json::<Value>()["token"].as_str().unwrap().to_string()
}

async fn create_post(h: &Harness, token: &str, body: Value) -> Value {
    let response = h
        .server
        .post("/api/v1/admin/posts")
        .add_header(header::AUTHORIZATION, bearer(token))
        .json(&body)
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED, "{}", response.text());
    response.json::<Value>()
}

#[tokio::test]
async fn health_and_site_info() {
    let h = harness().await;

    let health = h.server.get("/api/v1/health").await;
    assert_eq!(health.status_code(), StatusCode::OK);
    assert_eq!(health.json::<Value>()["status"], "ok");

    let site = h.server.get("/api/v1/site").await.json::<Value>();
    assert_eq!(site["name"], "Folio");
    assert_eq!(site["features"]["wallet_demo"], false);
}

#[tokio::test]
async fn admin_routes_require_credentials_and_permissions() {
    let h = harness().await;

    let anonymous = h.server.get("/api/v1/admin/posts").await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.json::<Value>()["error"]["code"], "UNAUTHORIZED");

    let garbage = h
        .server
        .get("/api/v1/admin/posts")
        .add_header(header::AUTHORIZATION, bearer("not-a-session"))
        .await;
    assert_eq!(garbage.status_code(), StatusCode::UNAUTHORIZED);

    let moderator = login(&h, "moderator").await;
    let forbidden = h
        .server
        .post("/api/v1/admin/posts")
        .add_header(header::AUTHORIZATION, bearer(&moderator))
        .json(&json!({ "title": "Nope", "body_mdx": "x" }))
        .await;
    assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

    let tokens = h
        .server
        .get("/api/v1/admin/tokens")
        .add_header(header::AUTHORIZATION, bearer(&login(&h, "editor").await))
        .await;
    assert_eq!(tokens.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn login_sets_cookie_and_logout_ends_session() {
    let h = harness().await;

    let response = h
        .server
        .post("/api/v1/auth/login")
        .json(&json!({ "username": "editor", "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    let token = response.json::<Value>()["token"].as_str().unwrap().to_string();

    let cookie_header = HeaderValue::from_str(&format!("session={}", token)).unwrap();
    let me = h
        .server
        .get("/api/v1/auth/me")
        .add_header(header::COOKIE, cookie_header.clone())
        .await;
    assert_eq!(me.status_code(), StatusCode::OK);
    let me = me.json::<Value>();
    assert_eq!(me["role"], "editor");
    assert!(me["permissions"]
        .as_array()
        .unwrap()
        .contains(&json!("posts:publish")));

    let logout = h
        .server
        .post("/api/v1/auth/logout")
        .add_header(header::COOKIE, cookie_header.clone())
        .await;
    assert_eq!(logout.status_code(), StatusCode::OK);

    let after = h
        .server
        .get("/api/v1/auth/me")
        .add_header(header::COOKIE, cookie_header)
        .await;
    assert_eq!(after.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn repeated_login_failures_are_rate_limited() {
    let h = harness().await;
    for _ in 0..5 {
        let response = h
            .server
            .post("/api/v1/auth/login")
            .json(&json!({ "username_or_email": "editor", "password": "wrong" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    let limited = h
        .server
        .post("/api/v1/auth/login")
        .json(&json!({ "username_or_email": "editor", "password": PASSWORD }))
        .await;
    assert_eq!(limited.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.json::<Value>()["error"]["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn feed_pagination_follows_cursor() {
    let h = harness().await;
    let editor = login(&h, "editor").await;

    let base = Utc::now() - chrono::Duration::days(10);
    for i in 0..5 {
        create_post(
            &h,
            &editor,
            json!({
                "title": format!("Entry {}", i),
                "body_mdx": "Some words here.",
                "status": "published",
                "published_at": (base + chrono::Duration::days(i)).to_rfc3339(),
                "tags": ["Rust"],
            }),
        )
        .await;
    }
    create_post(&h, &editor, json!({ "title": "Unfinished", "body_mdx": "draft" })).await;

    let mut slugs = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let path = match &cursor {
            Some(c) => format!("/api/v1/posts?limit=2&tag=rust&cursor={}", c),
            None => "/api/v1/posts?limit=2&tag=rust".to_string(),
        };
        let page = h.server.get(&path).await.json::<Value>();
        let items = page["items"].as_array().unwrap();
        assert!(items.len() <= 2);
        slugs.extend(items.iter().map(|p| p["slug"].as_str().unwrap().to_string()));
        match page["next_cursor"].as_str() {
            Some(next) => cursor = Some(next.to_string()),
            None => break,
        }
    }
    assert_eq!(slugs, vec!["entry-4", "entry-3", "entry-2", "entry-1", "entry-0"]);

    let bad = h.server.get("/api/v1/posts?cursor=%21%21").await;
    assert_eq!(bad.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn public_post_lookup_hides_drafts_and_reports_archived() {
    let h = harness().await;
    let editor = login(&h, "editor").await;

    let post = create_post(
        &h,
        &editor,
        json!({ "title": "Retired", "body_mdx": "x", "status": "published" }),
    )
    .await;
    create_post(&h, &editor, json!({ "title": "Secret", "body_mdx": "x" })).await;

    assert_eq!(h.server.get("/api/v1/posts/retired").await.status_code(), StatusCode::OK);
    assert_eq!(h.server.get("/api/v1/posts/secret").await.status_code(), StatusCode::NOT_FOUND);

    let id = post["id"].as_i64().unwrap();
    let archived = h
        .server
        .put(&format!("/api/v1/admin/posts/{}", id))
        .add_header(header::AUTHORIZATION, bearer(&editor))
        .json(&json!({ "status": "archived" }))
        .await;
    assert_eq!(archived.status_code(), StatusCode::OK);
    assert_eq!(h.server.get("/api/v1/posts/retired").await.status_code(), StatusCode::GONE);

    let duplicate = h
        .server
        .post("/api/v1/admin/posts")
        .add_header(header::AUTHORIZATION, bearer(&editor))
        .json(&json!({ "title": "Retired", "body_mdx": "x" }))
        .await;
    assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn comment_submission_moderation_and_visibility() {
    let h = harness().await;
    let editor = login(&h, "editor").await;
    create_post(
        &h,
        &editor,
        json!({ "title": "Discuss", "body_mdx": "x", "status": "published" }),
    )
    .await;

    let submitted = h
        .server
        .post("/api/v1/posts/discuss/comments")
        .json(&json!({ "author_name": "Reader", "author_email": "r@example.com", "body": "Great read" }))
        .await;
    assert_eq!(submitted.status_code(), StatusCode::CREATED);
    let submitted = submitted.json::<Value>();
    assert_eq!(submitted["status"], "pending");
    let comment_id = submitted["id"].as_i64().unwrap();

    let visible = h.server.get("/api/v1/posts/discuss/comments").await.json::<Value>();
    assert!(visible.as_array().unwrap().is_empty());

    let moderator = login(&h, "moderator").await;
    let queue = h
        .server
        .get("/api/v1/admin/comments?status=pending")
        .add_header(header::AUTHORIZATION, bearer(&moderator))
        .await
        .json::<Value>();
    assert_eq!(queue["total"], 1);
    assert_eq!(queue["items"][0]["post_slug"], "discuss");

    let approved = h
        .server
        .post(&format!("/api/v1/admin/comments/{}/approve", comment_id))
        .add_header(header::AUTHORIZATION, bearer(&moderator))
        .await;
    assert_eq!(approved.status_code(), StatusCode::OK);
    assert_eq!(approved.json::<Value>()["status"], "approved");

    let visible = h.server.get("/api/v1/posts/discuss/comments").await.json::<Value>();
    let threads = visible.as_array().unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0]["body"], "Great read");
    assert!(threads[0]["avatar_url"].as_str().unwrap().contains("gravatar"));
    assert!(threads[0].get("author_email").is_none());

    let unknown_action = h
        .server
        .post(&format!("/api/v1/admin/comments/{}/pin", comment_id))
        .add_header(header::AUTHORIZATION, bearer(&moderator))
        .await;
    assert_eq!(unknown_action.status_code(), StatusCode::NOT_FOUND);

    let audit = h
        .server
        .get("/api/v1/admin/audit?action=comment.approve")
        .add_header(header::AUTHORIZATION, bearer(&editor))
        .await
        .json::<Value>();
    assert_eq!(audit["total"], 1);
    assert_eq!(audit["items"][0]["actor"], "moderator");

    let missing_post = h
        .server
        .post("/api/v1/posts/nowhere/comments")
        .json(&json!({ "author_name": "Reader", "body": "hi" }))
        .await;
    assert_eq!(missing_post.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_tokens_authenticate_until_revoked() {
    let h = harness().await;
    let admin = login(&h, "admin").await;

    let issued = h
        .server
        .post("/api/v1/admin/tokens")
        .add_header(header::AUTHORIZATION, bearer(&admin))
        .json(&json!({ "name": "deploy", "role": "editor" }))
        .await;
    assert_eq!(issued.status_code(), StatusCode::CREATED);
    let issued = issued.json::<Value>();
    let token = issued["token"].as_str().unwrap().to_string();
    assert!(token.starts_with("folio_"));
    assert!(issued.get("token_hash").is_none());

    let me = h
        .server
        .get("/api/v1/auth/me")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .json::<Value>();
    assert_eq!(me["via"], "api_token");
    assert_eq!(me["role"], "editor");

    let id = issued["id"].as_i64().unwrap();
    let revoked = h
        .server
        .delete(&format!("/api/v1/admin/tokens/{}", id))
        .add_header(header::AUTHORIZATION, bearer(&admin))
        .await;
    assert_eq!(revoked.status_code(), StatusCode::NO_CONTENT);

    let after = h
        .server
        .get("/api/v1/auth/me")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(after.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn revalidation_accepts_signatures_or_permitted_principals() {
    let mut config = Config::default();
    config.revalidate.secret = Some("hook-secret".to_string());
    let h = harness_with(config).await;

    let unauthenticated = h.server.post("/api/v1/revalidate").await;
    assert_eq!(unauthenticated.status_code(), StatusCode::UNAUTHORIZED);

    let body = r#"{"paths":["/blog/hello","/sitemap.xml"]}"#;
    let ts = Utc::now().timestamp().to_string();
    let signature = sign("hook-secret", &ts, body.as_bytes()).unwrap();
    let signed = h
        .server
        .post("/api/v1/revalidate")
        .add_header(
            HeaderName::from_static("x-folio-signature"),
            HeaderValue::from_str(&signature).unwrap(),
        )
        .add_header(
            HeaderName::from_static("x-folio-timestamp"),
            HeaderValue::from_str(&ts).unwrap(),
        )
        .text(body)
        .await;
    assert_eq!(signed.status_code(), StatusCode::OK);
    let signed = signed.json::<Value>();
    assert_eq!(signed["revalidated"], true);
    assert_eq!(signed["purged"], json!(["post:slug:hello", "sitemap"]));

    let tampered = h
        .server
        .post("/api/v1/revalidate")
        .add_header(
            HeaderName::from_static("x-folio-signature"),
            HeaderValue::from_str(&signature).unwrap(),
        )
        .add_header(
            HeaderName::from_static("x-folio-timestamp"),
            HeaderValue::from_str(&ts).unwrap(),
        )
        .text(r#"{"paths":[]}"#)
        .await;
    assert_eq!(tampered.status_code(), StatusCode::UNAUTHORIZED);

    let author = login(&h, "author").await;
    let forbidden = h
        .server
        .post("/api/v1/revalidate")
        .add_header(header::AUTHORIZATION, bearer(&author))
        .await;
    assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

    let editor = login(&h, "editor").await;
    let purge_all = h
        .server
        .post("/api/v1/revalidate")
        .add_header(header::AUTHORIZATION, bearer(&editor))
        .await;
    assert_eq!(purge_all.status_code(), StatusCode::OK);
    assert_eq!(
        purge_all.json::<Value>()["purged"],
        json!(["post:*", "posts:*", "sitemap"])
    );
}

#[tokio::test]
async fn sitemap_is_served_as_xml() {
    let h = harness().await;
    let editor = login(&h, "editor").await;
    create_post(
        &h,
        &editor,
        json!({ "title": "Mapped", "kind": "note", "body_mdx": "x", "status": "published" }),
    )
    .await;

    let response = h.server.get("/sitemap.xml").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let headers = response.headers();
    assert!(headers
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("application/xml"));
    assert_eq!(
        headers.get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=3600"
    );
    assert!(response.text().contains("http://localhost:3000/notes/mapped"));
}

#[tokio::test]
async fn wallet_demo_is_hidden_when_disabled() {
    let h = harness().await;
    assert_eq!(
        h.server.get("/demo/wallet/stats").await.status_code(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        h.server.post("/demo/wallet/connect").await.status_code(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn wallet_demo_simulates_and_refuses_live_calls() {
    let mut config = Config::default();
    config.wallet_demo.enabled = true;
    let h = harness_with(config).await;
    let editor = login(&h, "editor").await;
    create_post(
        &h,
        &editor,
        json!({ "title": "Tippable", "body_mdx": "x", "status": "published" }),
    )
    .await;

    let receipt = h
        .server
        .post("/demo/wallet/tips")
        .json(&json!({ "post_slug": "tippable", "amount": 3.5 }))
        .await;
    assert_eq!(receipt.status_code(), StatusCode::CREATED);
    assert_eq!(receipt.json::<Value>()["simulated"], true);

    let too_much = h
        .server
        .post("/demo/wallet/tips")
        .json(&json!({ "post_slug": "tippable", "amount": 5000.0 }))
        .await;
    assert_eq!(too_much.status_code(), StatusCode::BAD_REQUEST);

    let totals = h.server.get("/demo/wallet/tips/tippable").await.json::<Value>();
    assert_eq!(totals["count"], 1);

    let attestation = h
        .server
        .post("/demo/wallet/attestations")
        .json(&json!({ "subject": "0xabc", "statement": "authored this" }))
        .await
        .json::<Value>();
    let uid = attestation["uid"].as_str().unwrap();
    let fetched = h.server.get(&format!("/demo/wallet/attestations/{}", uid)).await;
    assert_eq!(fetched.status_code(), StatusCode::OK);

    for response in [
        h.server.post("/demo/wallet/connect").await,
        h.server.post("/demo/wallet/transfer").await,
        h.server.get("/demo/wallet/balance/0xabc").await,
    ] {
        assert_eq!(response.status_code(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(response.json::<Value>()["error"]["code"], "NOT_IMPLEMENTED");
    }

    let stats = h.server.get("/demo/wallet/stats").await.json::<Value>();
    assert_eq!(stats["tips"], 1);
    assert_eq!(stats["attestations"], 1);
}

#[tokio::test]
async fn revalidation_rejects_out_of_range_timestamps() {
    let mut config = Config::default();
    config.revalidate.secret = Some("hook-secret".to_string());
    let h = harness_with(config).await;

    for ts in ["-9223372036854775808", "9223372036854775807"] {
        let response = h
            .server
            .post("/api/v1/revalidate")
            .add_header(
                HeaderName::from_static("x-folio-signature"),
                HeaderValue::from_static("sha256=00"),
            )
            .add_header(
                HeaderName::from_static("x-folio-timestamp"),
                HeaderValue::from_static(ts),
            )
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn comment_limits_apply_per_client_address() {
    let h = harness().await;
    let editor = login(&h, "editor").await;
    create_post(
        &h,
        &editor,
        json!({ "title": "Busy", "body_mdx": "x", "status": "published" }),
    )
    .await;

    // No proxy headers and no peer address: nothing to key the limit on
    for name in ["Ada", "Bob", "Cy", "Dee", "Eve", "Fay"] {
        let response = h
            .server
            .post("/api/v1/posts/busy/comments")
            .json(&json!({ "author_name": name, "body": "hello" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
    }

    let forwarded = HeaderName::from_static("x-forwarded-for");
    for _ in 0..5 {
        let response = h
            .server
            .post("/api/v1/posts/busy/comments")
            .add_header(forwarded.clone(), HeaderValue::from_static("203.0.113.9"))
            .json(&json!({ "author_name": "Gus", "body": "hello" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
    }
    let limited = h
        .server
        .post("/api/v1/posts/busy/comments")
        .add_header(forwarded.clone(), HeaderValue::from_static("203.0.113.9"))
        .json(&json!({ "author_name": "Gus", "body": "hello" }))
        .await;
    assert_eq!(limited.status_code(), StatusCode::TOO_MANY_REQUESTS);

    let other = h
        .server
        .post("/api/v1/posts/busy/comments")
        .add_header(forwarded, HeaderValue::from_static("198.51.100.1"))
        .json(&json!({ "author_name": "Hal", "body": "hello" }))
        .await;
    assert_eq!(other.status_code(), StatusCode::CREATED);
}
