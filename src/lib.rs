use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core: persistence contracts, the ownership gate and the post read model.
pub mod aggregation;
pub mod authorization;
pub mod error;
pub mod memory;
pub mod models;
pub mod repository;

// Services over the repository.
pub mod accounts;
pub mod password;
pub mod posts;
pub mod votes;

// Transport and configuration.
pub mod auth;
pub mod config;
pub mod handlers;
pub mod routes;

use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use accounts::AccountService;
pub use config::AppConfig;
pub use memory::MemoryRepository;
pub use posts::PostService;
pub use repository::{PostgresRepository, RepositoryState};
pub use votes::VoteService;

/// ApiDoc
///
/// OpenAPI document for every handler, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::get_user, handlers::delete_user, handlers::login,
        handlers::list_posts, handlers::create_post, handlers::get_post, handlers::update_post,
        handlers::delete_post, handlers::vote
    ),
    components(
        schemas(
            models::Post, models::PostWithVotes, models::CreatePostRequest,
            models::UpdatePostRequest, models::CreateUserRequest, models::LoginRequest,
            models::VoteRequest, models::UserOut, models::Token, models::MessageResponse,
            error::ErrorBody,
        )
    ),
    tags(
        (name = "sphere-api", description = "Posts, votes and accounts")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Shared, cheaply cloned state handed to every request. The services all
/// hold the same repository handle.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub config: AppConfig,
    pub posts: PostService,
    pub accounts: AccountService,
    pub votes: VoteService,
}

impl AppState {
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            posts: PostService::new(repo.clone(), config.empty_list_policy),
            accounts: AccountService::new(repo.clone(), config.clone()),
            votes: VoteService::new(repo.clone()),
            repo,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 unless an `AuthUser` can be extracted.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routes, the auth layer over the authenticated routes, and
/// the request-id, tracing and CORS layers around everything.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, tagged with the `x-request-id` set by the layer above.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
