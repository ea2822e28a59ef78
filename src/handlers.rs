use crate::{
    AppState,
    auth::AuthUser,
    error::{ErrorBody, ServiceError},
    models::{
        CreatePostRequest, CreateUserRequest, ListParams, LoginRequest, MessageResponse, Post,
        PostWithVotes, Token, UpdatePostRequest, UserOut, VoteRequest,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

type ApiResult<T> = Result<T, ServiceError>;

// --- Accounts ---

/// register_user
///
/// [Public Route] Creates an account. The email is stored trimmed and lowercased.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User Created", body = UserOut),
        (status = 409, description = "Email Taken", body = ErrorBody),
        (status = 422, description = "Invalid Email or Password", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserOut>)> {
    let user = state.accounts.register(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// get_user
///
/// [Public Route] Public profile of one user.
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserOut),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<UserOut>> {
    Ok(Json(state.accounts.get_user(id).await?))
}

/// delete_user
///
/// [Authenticated Route] Deletes the caller's own account with its posts and votes.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not Account Holder", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    state.accounts.delete_user(auth.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// login
///
/// [Public Route] Exchanges credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token Issued", body = Token),
        (status = 401, description = "Invalid Credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<Token>> {
    Ok(Json(state.accounts.login(payload).await?))
}

// --- Posts ---

/// list_posts
///
/// [Authenticated Route] The caller's own posts with vote counts, ordered by id.
#[utoipa::path(
    get,
    path = "/posts",
    params(ListParams),
    responses(
        (status = 200, description = "Posts", body = [PostWithVotes]),
        (status = 404, description = "No Posts Were Found", body = ErrorBody),
        (status = 422, description = "Bad Pagination", body = ErrorBody)
    )
)]
pub async fn list_posts(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<PostWithVotes>>> {
    Ok(Json(state.posts.list(auth.actor(), params).await?))
}

/// create_post
///
/// [Authenticated Route] New post owned by the caller.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreatePostRequest,
    responses((status = 201, description = "Post Created", body = Post))
)]
pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let post = state.posts.create(auth.actor(), payload).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// get_post
///
/// [Authenticated Route] One post with its vote count. Owner only.
#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(("id" = i32, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post", body = PostWithVotes),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<PostWithVotes>> {
    Ok(Json(state.posts.get(auth.actor(), id).await?))
}

/// update_post
///
/// [Authenticated Route] Partial update; omitted fields keep their value.
#[utoipa::path(
    put,
    path = "/posts/{id}",
    params(("id" = i32, Path, description = "Post id")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdatePostRequest>,
) -> ApiResult<Json<Post>> {
    Ok(Json(state.posts.update(auth.actor(), id, payload).await?))
}

/// delete_post
#[utoipa::path(
    delete,
    path = "/posts/{id}",
    params(("id" = i32, Path, description = "Post id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    state.posts.delete(auth.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Votes ---

/// vote
///
/// [Authenticated Route] `dir = 1` adds the caller's vote, `dir = 0` removes it.
/// Votes are not restricted to the post owner.
#[utoipa::path(
    post,
    path = "/vote",
    request_body = VoteRequest,
    responses(
        (status = 201, description = "Vote Recorded", body = MessageResponse),
        (status = 404, description = "Post or Vote Not Found", body = ErrorBody),
        (status = 409, description = "Already Voted", body = ErrorBody),
        (status = 422, description = "Bad Direction", body = ErrorBody)
    )
)]
pub async fn vote(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<VoteRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let outcome = state.votes.vote(auth.actor(), payload).await?;
    let body = MessageResponse {
        message: outcome.message().to_string(),
    };
    Ok((StatusCode::CREATED, Json(body)))
}
