use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use sphere_api::{
    AppConfig, AppState, MemoryRepository, config::Env, create_router, repository::RepositoryState,
};
use std::sync::Arc;
use tower::ServiceExt;

fn spawn_app(env: Env) -> Router {
    let repo: RepositoryState = Arc::new(MemoryRepository::new());
    let config = AppConfig {
        env,
        ..AppConfig::default()
    };
    create_router(AppState::new(repo, config))
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
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Registers `email` and logs in, returning `(user id, access token)`.
async fn sign_up(app: &Router, email: &str) -> (i64, String) {
    let credentials = json!({ "email": email, "password": "password123" });
    let (status, user) = send(app, "POST", "/users", None, Some(credentials.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, token) = send(app, "POST", "/login", None, Some(credentials)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(token["token_type"], "bearer");

    let id = user["id"].as_i64().unwrap();
    let access_token = token["access_token"].as_str().unwrap().to_string();
    (id, access_token)
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app(Env::Production);
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app(Env::Production);
    let (status, doc) = send(&app, "GET", "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/posts/{id}"].is_object());
    assert!(doc["paths"]["/vote"].is_object());
}

#[tokio::test]
async fn test_authenticated_routes_reject_anonymous_requests() {
    let app = spawn_app(Env::Production);
    for (method, uri) in [("GET", "/posts"), ("GET", "/posts/1"), ("DELETE", "/users/1")] {
        let (status, _) = send(&app, method, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
    }
}

#[tokio::test]
async fn test_user_profile_is_public_and_hides_the_hash() {
    let app = spawn_app(Env::Production);
    let (id, _) = sign_up(&app, "pub@example.com").await;

    let (status, user) = send(&app, "GET", &format!("/users/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["email"], "pub@example.com");
    assert!(user.get("password_hash").is_none());
    assert!(user.get("password").is_none());
}

#[tokio::test]
async fn test_post_lifecycle() {
    let app = spawn_app(Env::Production);
    let (alice_id, alice) = sign_up(&app, "alice@example.com").await;
    let (_, bob) = sign_up(&app, "bob@example.com").await;

    // Create
    let (status, post) = send(
        &app,
        "POST",
        "/posts",
        Some(&alice),
        Some(json!({ "title": "Hello", "content": "World" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["owner_id"].as_i64(), Some(alice_id));
    assert_eq!(post["published"], true);
    let uri = format!("/posts/{}", post["id"]);

    // Someone else
    let (status, body) = send(&app, "GET", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Not authorized to perform requested action");

    // Vote from bob, read back by alice
    let vote = json!({ "post_id": post["id"], "dir": 1 });
    let (status, _) = send(&app, "POST", "/vote", Some(&bob), Some(vote)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, read) = send(&app, "GET", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["Post"]["title"], "Hello");
    assert_eq!(read["votes"], 1);

    // Partial update
    let (status, updated) = send(&app, "PUT", &uri, Some(&alice), Some(json!({ "title": "Hi" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Hi");
    assert_eq!(updated["content"], "World");

    // Delete
    let (status, _) = send(&app, "DELETE", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "GET", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], format!("Post with ID {} was not found", post["id"]));
}

#[tokio::test]
async fn test_list_query_parameters() {
    let app = spawn_app(Env::Production);
    let (_, alice) = sign_up(&app, "alice@example.com").await;

    let (status, body) = send(&app, "GET", "/posts", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "No Posts Were Found");

    for title in ["rust one", "go", "rust two", "rust three"] {
        let post = json!({ "title": title, "content": "c", "published": false });
        send(&app, "POST", "/posts", Some(&alice), Some(post)).await;
    }

    let (status, rows) = send(&app, "GET", "/posts?search=rust&limit=2&skip=1", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<_> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["Post"]["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["rust two", "rust three"]);

    let (status, _) = send(&app, "GET", "/posts?limit=0", Some(&alice), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_local_bypass_header_over_http() {
    let app = spawn_app(Env::Local);
    let (alice_id, _) = sign_up(&app, "alice@example.com").await;

    let request = Request::builder()
        .method("POST")
        .uri("/posts")
        .header("x-user-id", alice_id.to_string())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "title": "t", "content": "c" }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_deleted_user_token_stops_working() {
    let app = spawn_app(Env::Production);
    let (alice_id, alice) = sign_up(&app, "alice@example.com").await;

    let (status, _) = send(&app, "DELETE", &format!("/users/{alice_id}"), Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", "/posts", Some(&alice), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
