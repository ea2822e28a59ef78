use crate::error::RepoError;
use crate::models::{Post, PostFields, User, Vote};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;
use std::sync::Arc;

pub type RepoResult<T> = Result<T, RepoError>;

/// PostFilter
///
/// Predicate for [`PostStore::find_filtered`]. Every populated field narrows
/// the match; an empty filter matches all posts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub id: Option<i32>,
    pub owner_id: Option<i32>,
    /// Case-sensitive substring of `title`. Empty string matches everything.
    pub title_contains: Option<String>,
}

impl PostFilter {
    pub fn matches(&self, post: &Post) -> bool {
        self.id.is_none_or(|id| post.id == id)
            && self.owner_id.is_none_or(|owner| post.owner_id == owner)
            && self
                .title_contains
                .as_deref()
                .is_none_or(|needle| post.title.contains(needle))
    }
}

/// Pagination window applied after filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

// --- Store Contracts ---

/// Identity Store: users.
#[async_trait]
pub trait IdentityStore: Send {
    async fn find_user(&mut self, id: i32) -> RepoResult<Option<User>>;
    async fn find_user_by_email(&mut self, email: &str) -> RepoResult<Option<User>>;
    async fn insert_user(&mut self, email: &str, password_hash: &str) -> RepoResult<User>;
    /// Removes the user. Owned posts and the user's votes go with it.
    async fn delete_user(&mut self, id: i32) -> RepoResult<()>;
}

/// Post Store: posts, without vote data.
#[async_trait]
pub trait PostStore: Send {
    async fn insert_post(&mut self, owner_id: i32, fields: &PostFields) -> RepoResult<Post>;
    async fn find_post(&mut self, id: i32) -> RepoResult<Option<Post>>;
    /// Like `find_post`, but the row stays locked until the session ends.
    async fn lock_post(&mut self, id: i32) -> RepoResult<Option<Post>>;
    /// Matching posts ordered by ascending id, filtered before the page is cut.
    async fn find_filtered(&mut self, filter: &PostFilter, page: Page) -> RepoResult<Vec<Post>>;
    async fn update_post(&mut self, id: i32, fields: &PostFields) -> RepoResult<Post>;
    /// Removes the post. Its votes go with it.
    async fn delete_post(&mut self, id: i32) -> RepoResult<()>;
}

/// Vote Store: (user, post) pairs.
#[async_trait]
pub trait VoteStore: Send {
    async fn count_by_post(&mut self, post_id: i32) -> RepoResult<i64>;
    /// Counts for the given posts. Posts without votes are absent from the map.
    async fn count_by_posts(&mut self, post_ids: &[i32]) -> RepoResult<HashMap<i32, i64>>;
    /// Returns false if the pair already existed.
    async fn insert_vote(&mut self, vote: Vote) -> RepoResult<bool>;
    /// Returns false if there was nothing to remove.
    async fn delete_vote(&mut self, vote: Vote) -> RepoResult<bool>;
}

/// Session
///
/// One unit of work against all three stores. Writes become visible on
/// [`Session::commit`]; dropping an uncommitted session discards them and
/// releases the underlying connection.
#[async_trait]
pub trait Session: IdentityStore + PostStore + VoteStore {
    async fn commit(self: Box<Self>) -> RepoResult<()>;
}

/// Repository
///
/// Entry point of the persistence layer. Hands out a fresh [`Session`] per
/// operation; no connection is held between operations.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn begin(&self) -> RepoResult<Box<dyn Session>>;
}

/// RepositoryState
///
/// The type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres ---

/// PostgresRepository
///
/// [`Repository`] backed by a PostgreSQL pool. Each session is one
/// database transaction.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn begin(&self) -> RepoResult<Box<dyn Session>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSession { tx }))
    }
}

/// An open transaction. Rolled back by sqlx on drop unless committed.
pub struct PgSession {
    tx: Transaction<'static, Postgres>,
}

const POST_COLUMNS: &str = "id, title, content, published, owner_id, created_at";

#[async_trait]
impl IdentityStore for PgSession {
    async fn find_user(&mut self, id: i32) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&mut self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(user)
    }

    async fn insert_user(&mut self, email: &str, password_hash: &str) -> RepoResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (email, password_hash) VALUES ($1, $2)
               RETURNING id, email, password_hash, created_at"#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(user)
    }

    async fn delete_user(&mut self, id: i32) -> RepoResult<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PostStore for PgSession {
    async fn insert_post(&mut self, owner_id: i32, fields: &PostFields) -> RepoResult<Post> {
        let sql = format!(
            "INSERT INTO posts (title, content, published, owner_id) VALUES ($1, $2, $3, $4) RETURNING {POST_COLUMNS}"
        );
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(&fields.title)
            .bind(&fields.content)
            .bind(fields.published)
            .bind(owner_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(post)
    }

    async fn find_post(&mut self, id: i32) -> RepoResult<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(post)
    }

    async fn lock_post(&mut self, id: i32) -> RepoResult<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1 FOR UPDATE");
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(post)
    }

    /// Builds the WHERE clause with QueryBuilder so every value is a bind
    /// parameter. `strpos` keeps the title match a plain case-sensitive
    /// substring test, with no LIKE wildcards to escape.
    async fn find_filtered(&mut self, filter: &PostFilter, page: Page) -> RepoResult<Vec<Post>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts WHERE TRUE"));

        if let Some(id) = filter.id {
            builder.push(" AND id = ");
            builder.push_bind(id);
        }
        if let Some(owner_id) = filter.owner_id {
            builder.push(" AND owner_id = ");
            builder.push_bind(owner_id);
        }
        if let Some(needle) = filter.title_contains.as_deref().filter(|s| !s.is_empty()) {
            builder.push(" AND strpos(title, ");
            builder.push_bind(needle.to_string());
            builder.push(") > 0");
        }

        builder.push(" ORDER BY id ASC LIMIT ");
        builder.push_bind(page.limit);
        builder.push(" OFFSET ");
        builder.push_bind(page.offset);

        let posts = builder
            .build_query_as::<Post>()
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(posts)
    }

    async fn update_post(&mut self, id: i32, fields: &PostFields) -> RepoResult<Post> {
        let sql = format!(
            "UPDATE posts SET title = $2, content = $3, published = $4 WHERE id = $1 RETURNING {POST_COLUMNS}"
        );
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .bind(&fields.title)
            .bind(&fields.content)
            .bind(fields.published)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(post)
    }

    async fn delete_post(&mut self, id: i32) -> RepoResult<()> {
        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl VoteStore for PgSession {
    async fn count_by_post(&mut self, post_id: i32) -> RepoResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn count_by_posts(&mut self, post_ids: &[i32]) -> RepoResult<HashMap<i32, i64>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, (i32, i64)>(
            "SELECT post_id, COUNT(*) FROM votes WHERE post_id = ANY($1) GROUP BY post_id",
        )
        .bind(post_ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().collect())
    }

    /// `ON CONFLICT DO NOTHING` keeps the insert idempotent; the affected row
    /// count tells a new vote from a repeated one.
    async fn insert_vote(&mut self, vote: Vote) -> RepoResult<bool> {
        let result = sqlx::query(
            "INSERT INTO votes (user_id, post_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(vote.user_id)
        .bind(vote.post_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_vote(&mut self, vote: Vote) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM votes WHERE user_id = $1 AND post_id = $2")
            .bind(vote.user_id)
            .bind(vote.post_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Session for PgSession {
    async fn commit(self: Box<Self>) -> RepoResult<()> {
        let session = *self;
        session.tx.commit().await?;
        Ok(())
    }
}
