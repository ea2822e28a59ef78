use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The canonical identity record stored in the `users` table.
/// The password hash never leaves the process: it is skipped on serialization
/// and callers outside the persistence layer should expose [`UserOut`] instead.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Post
///
/// A text post from the `posts` table. `owner_id`, `id` and `created_at` are
/// fixed at insert time; only the fields in [`PostFields`] are ever rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub owner_id: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Vote
///
/// One row of the `votes` table. The pair is the primary key, so a user can
/// vote for a given post at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Vote {
    pub user_id: i32,
    pub post_id: i32,
}

/// PostWithVotes
///
/// Read-side shape of every post query: the post plus its vote tally.
/// Serialized as `{"Post": {...}, "votes": n}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PostWithVotes {
    #[serde(rename = "Post")]
    pub post: Post,
    #[ts(type = "number")]
    pub votes: i64,
}

/// The three mutable columns of a post, written as a unit by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFields {
    pub title: String,
    pub content: String,
    pub published: bool,
}

impl PostFields {
    /// Copies exactly the supplied changes over the current values of `post`.
    pub fn merged(post: &Post, changes: UpdatePostRequest) -> Self {
        Self {
            title: changes.title.unwrap_or_else(|| post.title.clone()),
            content: changes.content.unwrap_or_else(|| post.content.clone()),
            published: changes.published.unwrap_or(post.published),
        }
    }
}

impl From<CreatePostRequest> for PostFields {
    fn from(req: CreatePostRequest) -> Self {
        Self {
            title: req.title,
            content: req.content,
            published: req.published,
        }
    }
}

// --- Request Payloads (Input Schemas) ---

fn default_published() -> bool {
    true
}

/// CreatePostRequest
///
/// Input payload for `POST /posts`. `published` defaults to `true` when omitted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default = "default_published")]
    pub published: bool,
}

/// UpdatePostRequest
///
/// Partial update payload for `PUT /posts/{id}`. Absent fields keep their
/// stored value; `None` fields are omitted when serialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

/// ListParams
///
/// Query parameters for `GET /posts`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Page size, 1 to 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Number of matching posts to skip.
    #[serde(default)]
    pub skip: i64,
    /// Case-sensitive substring the title must contain.
    #[serde(default)]
    pub search: String,
}

fn default_limit() -> i64 {
    10
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            skip: 0,
            search: String::new(),
        }
    }
}

/// CreateUserRequest
///
/// Input payload for `POST /users`. The plain password is hashed before it
/// reaches the store and is never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// VoteRequest
///
/// Input payload for `POST /vote`. `dir = 1` casts a vote, `dir = 0` withdraws it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct VoteRequest {
    pub post_id: i32,
    pub dir: u8,
}

// --- Output Schemas ---

/// UserOut
///
/// Public projection of a [`User`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserOut {
    pub id: i32,
    pub email: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserOut {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// Token
///
/// Bearer token returned by `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

impl Token {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// MessageResponse
///
/// Body of `POST /vote` on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}
