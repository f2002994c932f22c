use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use minisocial::api::server::{AppState, app};
use minisocial::auth::TokenKeys;
use minisocial::db::repo;

async fn test_app() -> Router {
    // One connection: each sqlite :memory: connection is its own database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    repo::init_schema(&pool).await.unwrap();
    app(Arc::new(AppState {
        db: pool,
        keys: TokenKeys::new("test-secret"),
    }))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Registers a user and returns (token, user id).
async fn register(app: &Router, username: &str) -> (String, String) {
    let (status, body) = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "pw",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register failed: {body}");
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

async fn create_post(app: &Router, token: &str, text: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/posts/create",
        Some(token),
        Some(json!({ "text": text })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create post failed: {body}");
    body["id"].as_str().unwrap().to_string()
}

fn feed_texts(feed: &Value) -> Vec<&str> {
    feed.as_array()
        .unwrap()
        .iter()
        .map(|p| p["text"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn register_rejects_missing_fields() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "username": "alice", "email": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing fields");
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = test_app().await;
    register(&app, "alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "username": "alice2",
            "email": "alice@example.com",
            "password": "other",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Email already registered");

    // The first record is intact: the original password still logs in.
    let (status, body) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "alice");
}

#[tokio::test]
async fn login_failures_are_generic() {
    let app = test_app().await;
    register(&app, "alice").await;

    for payload in [
        json!({ "email": "alice@example.com", "password": "wrong" }),
        json!({ "email": "nobody@example.com", "password": "pw" }),
    ] {
        let (status, body) = send(&app, "POST", "/auth/login", None, Some(payload)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");
    }
}

#[tokio::test]
async fn protected_routes_reject_missing_or_bad_tokens() {
    let app = test_app().await;

    let routes = [
        ("POST", "/posts/create"),
        ("POST", "/posts/like/some-id"),
        ("POST", "/comments/add"),
        ("PUT", "/users/some-id"),
        ("POST", "/users/follow/some-id"),
        ("POST", "/users/unfollow/some-id"),
    ];

    for (method, uri) in routes {
        let (status, body) = send(&app, method, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(body["message"], "No token provided", "{method} {uri}");
    }

    // Malformed scheme.
    let request = Request::builder()
        .method("POST")
        .uri("/posts/create")
        .header(header::AUTHORIZATION, "Basic abc")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["message"], "Token format invalid");

    // Well-formed header, bogus token.
    let (status, body) = send(&app, "POST", "/posts/create", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn create_post_requires_text() {
    let app = test_app().await;
    let (token, _) = register(&app, "alice").await;

    for payload in [json!({}), json!({ "text": "   " })] {
        let (status, body) = send(&app, "POST", "/posts/create", Some(&token), Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Text is required");
    }
}

#[tokio::test]
async fn full_scenario() {
    let app = test_app().await;
    let (token_a, id_a) = register(&app, "alice").await;
    let (token_b, _) = register(&app, "bob").await;

    let post_id = create_post(&app, &token_a, "hello world").await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/users/follow/{id_a}"),
        Some(&token_b),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Followed");

    let (status, feed) = send(&app, "GET", "/posts", Some(&token_b), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(feed_texts(&feed).contains(&"hello world"));

    let (status, body) = send(
        &app,
        "POST",
        &format!("/posts/like/{post_id}"),
        Some(&token_a),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Liked");
    assert_eq!(body["likesCount"], 1);

    let (_, post) = send(&app, "GET", &format!("/posts/{post_id}"), None, None).await;
    assert_eq!(post["likes"], json!([id_a]));

    let (status, body) = send(
        &app,
        "POST",
        &format!("/posts/like/{post_id}"),
        Some(&token_a),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Unliked");
    assert_eq!(body["likesCount"], 0);

    let (_, post) = send(&app, "GET", &format!("/posts/{post_id}"), None, None).await;
    assert_eq!(post["likes"], json!([]));
}

#[tokio::test]
async fn follow_rules() {
    let app = test_app().await;
    let (token_a, id_a) = register(&app, "alice").await;
    let (token_b, id_b) = register(&app, "bob").await;

    // Following twice leaves exactly one edge.
    for _ in 0..2 {
        let (status, _) = send(
            &app,
            "POST",
            &format!("/users/follow/{id_a}"),
            Some(&token_b),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, profile_a) = send(&app, "GET", &format!("/users/{id_a}"), None, None).await;
    assert_eq!(profile_a["followersCount"], 1);
    let (_, profile_b) = send(&app, "GET", &format!("/users/{id_b}"), None, None).await;
    assert_eq!(profile_b["followingCount"], 1);

    // Self-follow is forbidden.
    let (status, body) = send(
        &app,
        "POST",
        &format!("/users/follow/{id_a}"),
        Some(&token_a),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Can't follow yourself");

    // Unknown target.
    let (status, _) = send(
        &app,
        "POST",
        "/users/follow/no-such-user",
        Some(&token_a),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Unfollowing a non-followed pair is a successful no-op.
    let (status, body) = send(
        &app,
        "POST",
        &format!("/users/unfollow/{id_b}"),
        Some(&token_a),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Unfollowed");

    // Unfollow removes the real edge.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/users/unfollow/{id_a}"),
        Some(&token_b),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, profile_a) = send(&app, "GET", &format!("/users/{id_a}"), None, None).await;
    assert_eq!(profile_a["followersCount"], 0);
}

#[tokio::test]
async fn feed_scoping_and_order() {
    let app = test_app().await;
    let (token_a, _) = register(&app, "alice").await;
    let (token_b, id_b) = register(&app, "bob").await;
    let (token_c, id_c) = register(&app, "carol").await;
    let (token_d, _) = register(&app, "dave").await;

    for id in [&id_b, &id_c] {
        send(
            &app,
            "POST",
            &format!("/users/follow/{id}"),
            Some(&token_a),
            None,
        )
        .await;
    }

    create_post(&app, &token_a, "from alice").await;
    create_post(&app, &token_b, "from bob").await;
    create_post(&app, &token_c, "from carol").await;
    create_post(&app, &token_d, "from dave").await;

    // Authenticated: exactly {own} ∪ {followed}, newest first.
    let (status, feed) = send(&app, "GET", "/posts", Some(&token_a), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        feed_texts(&feed),
        vec!["from carol", "from bob", "from alice"]
    );

    // Anonymous: the public firehose, newest first.
    let (status, feed) = send(&app, "GET", "/posts", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        feed_texts(&feed),
        vec!["from dave", "from carol", "from bob", "from alice"]
    );

    // Author projection is populated.
    let author = &feed.as_array().unwrap()[0]["author"];
    assert_eq!(author["username"], "dave");
    assert!(author["avatar"].is_string());
}

#[tokio::test]
async fn comments_flow() {
    let app = test_app().await;
    let (token, _) = register(&app, "alice").await;
    let post_id = create_post(&app, &token, "hello").await;

    let (status, body) = send(
        &app,
        "POST",
        "/comments/add",
        Some(&token),
        Some(json!({ "text": "no post id" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing fields");

    for text in ["first!", "second!"] {
        let (status, body) = send(
            &app,
            "POST",
            "/comments/add",
            Some(&token),
            Some(json!({ "postId": post_id, "text": text })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["author"]["username"], "alice");
    }

    // Oldest first.
    let (status, comments) = send(&app, "GET", &format!("/comments/{post_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    let texts: Vec<&str> = comments
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["first!", "second!"]);

    // No referential check: commenting on a missing post succeeds.
    let (status, _) = send(
        &app,
        "POST",
        "/comments/add",
        Some(&token),
        Some(json!({ "postId": "no-such-post", "text": "orphan" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_entities_are_404() {
    let app = test_app().await;
    let (token, _) = register(&app, "alice").await;

    let (status, _) = send(&app, "GET", "/posts/no-such-post", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/users/no-such-user", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/posts/like/no-such-post", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn edit_profile_rules() {
    let app = test_app().await;
    let (token_a, id_a) = register(&app, "alice").await;
    let (_, id_b) = register(&app, "bob").await;

    // Partial update; empty bio is a valid explicit value, empty username
    // is ignored.
    let (status, profile) = send(
        &app,
        "PUT",
        &format!("/users/{id_a}"),
        Some(&token_a),
        Some(json!({ "username": "", "bio": "hi there", "avatar": "http://a/b.png" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "alice");
    assert_eq!(profile["bio"], "hi there");
    assert_eq!(profile["avatar"], "http://a/b.png");

    let (status, profile) = send(
        &app,
        "PUT",
        &format!("/users/{id_a}"),
        Some(&token_a),
        Some(json!({ "username": "alice2", "bio": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "alice2");
    assert_eq!(profile["bio"], "");
    assert_eq!(profile["avatar"], "http://a/b.png");

    // Only the caller's own profile may be edited.
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/users/{id_b}"),
        Some(&token_a),
        Some(json!({ "bio": "hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cannot edit another user's profile");

    let (_, profile_b) = send(&app, "GET", &format!("/users/{id_b}"), None, None).await;
    assert_eq!(profile_b["bio"], "");
}

#[tokio::test]
async fn profile_excludes_password() {
    let app = test_app().await;
    let (_, id) = register(&app, "alice").await;

    let (status, profile) = send(&app, "GET", &format!("/users/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(profile.get("password").is_none());
    assert!(profile.get("passwordHash").is_none());
    assert_eq!(profile["followersCount"], 0);
    assert_eq!(profile["followingCount"], 0);
}
