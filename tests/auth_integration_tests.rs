use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use sphere_api::{
    AppConfig, AppState, MemoryRepository,
    auth::{AuthUser, Claims, issue_token, verify_token},
    config::Env,
    repository::{IdentityStore, Repository, RepositoryState},
};
use std::sync::Arc;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

fn token_with(secret: &str, user_id: i32, exp_offset_secs: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + exp_offset_secs) as usize,
    };
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

/// State over a memory store holding one user, `alice@example.com`.
async fn create_app_state(env: Env) -> (AppState, i32) {
    let repo = MemoryRepository::new();
    let mut session = repo.begin().await.unwrap();
    let user = session
        .insert_user("alice@example.com", "not-a-real-hash")
        .await
        .unwrap();
    session.commit().await.unwrap();

    let config = AppConfig {
        env,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };
    let repo: RepositoryState = Arc::new(repo);
    (AppState::new(repo, config), user.id)
}

fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(parts: &mut Parts, token: &str) {
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
}

fn with_bypass(parts: &mut Parts, user_id: &str) {
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(user_id).unwrap(),
    );
}

// --- Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let (app_state, user_id) = create_app_state(Env::Production).await;
    let token = token_with(TEST_JWT_SECRET, user_id, 3600);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &token);

    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(user.id, user_id);
    assert_eq!(user.email, "alice@example.com");
    assert_eq!(user.actor().id, user_id);
}

#[tokio::test]
async fn test_issued_token_round_trips_through_the_extractor() {
    let (app_state, user_id) = create_app_state(Env::Production).await;
    let token = issue_token(&app_state.config, user_id).unwrap();

    let claims = verify_token(&app_state.config, &token).unwrap();
    assert_eq!(claims.sub, user_id);
    assert_eq!(claims.exp - claims.iat, 30 * 60);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &token);
    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(user.id, user_id);
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let (app_state, _) = create_app_state(Env::Production).await;
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_without_bearer_prefix() {
    let (app_state, user_id) = create_app_state(Env::Production).await;
    let token = token_with(TEST_JWT_SECRET, user_id, 3600);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Token {}", token)).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let (app_state, user_id) = create_app_state(Env::Production).await;
    // Well past the default validation leeway.
    let token = token_with(TEST_JWT_SECRET, user_id, -3600);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &token);

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_wrong_secret() {
    let (app_state, user_id) = create_app_state(Env::Production).await;
    let token = token_with("some-other-secret", user_id, 3600);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &token);

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_when_subject_no_longer_exists() {
    let (app_state, user_id) = create_app_state(Env::Production).await;
    let token = token_with(TEST_JWT_SECRET, user_id + 100, 3600);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &token);

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_local_bypass_success() {
    let (app_state, user_id) = create_app_state(Env::Local).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bypass(&mut parts, &user_id.to_string());

    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(user.id, user_id);
}

#[tokio::test]
async fn test_local_bypass_with_unknown_user_falls_through_to_401() {
    let (app_state, user_id) = create_app_state(Env::Local).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bypass(&mut parts, &(user_id + 1).to_string());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let (app_state, user_id) = create_app_state(Env::Production).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bypass(&mut parts, &user_id.to_string());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}
