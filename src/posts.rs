//! Resource access layer for posts.
//!
//! Every operation opens its own session, runs existence, ownership and the
//! write inside it, and commits only on success. Single-post operations report
//! a missing post before they look at ownership.

use crate::aggregation::{self, EmptyListPolicy};
use crate::authorization::{self, Action, Actor};
use crate::error::ServiceError;
use crate::models::{CreatePostRequest, ListParams, Post, PostFields, PostWithVotes, UpdatePostRequest};
use crate::repository::{Page, PostFilter, PostStore, RepositoryState, Session};

pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Clone)]
pub struct PostService {
    repo: RepositoryState,
    empty_list: EmptyListPolicy,
}

impl PostService {
    pub fn new(repo: RepositoryState, empty_list: EmptyListPolicy) -> Self {
        Self { repo, empty_list }
    }

    /// The actor's own posts whose title contains `params.search`, paginated.
    pub async fn list(
        &self,
        actor: Actor,
        params: ListParams,
    ) -> Result<Vec<PostWithVotes>, ServiceError> {
        let page = validate_page(&params)?;
        let filter = PostFilter {
            owner_id: Some(actor.id),
            title_contains: Some(params.search),
            ..PostFilter::default()
        };

        let mut session = self.repo.begin().await?;
        let rows = aggregation::posts_with_votes(session.as_mut(), &filter, page).await?;
        tracing::debug!(actor = actor.id, count = rows.len(), "listed posts");
        self.empty_list.apply(rows)
    }

    pub async fn create(&self, actor: Actor, req: CreatePostRequest) -> Result<Post, ServiceError> {
        let fields = PostFields::from(req);

        let mut session = self.repo.begin().await?;
        let post = session.insert_post(actor.id, &fields).await?;
        session.commit().await?;

        tracing::info!(actor = actor.id, post_id = post.id, "post created");
        Ok(post)
    }

    pub async fn get(&self, actor: Actor, post_id: i32) -> Result<PostWithVotes, ServiceError> {
        let mut session = self.repo.begin().await?;
        let found = aggregation::post_with_votes(session.as_mut(), post_id)
            .await?
            .ok_or_else(|| ServiceError::post_not_found(post_id))?;
        authorization::ensure(actor, &found.post, Action::Read)?;
        Ok(found)
    }

    /// Copies the supplied fields onto the post. `id`, `owner_id` and
    /// `created_at` are never written.
    pub async fn update(
        &self,
        actor: Actor,
        post_id: i32,
        changes: UpdatePostRequest,
    ) -> Result<Post, ServiceError> {
        let mut session = self.repo.begin().await?;
        let current = owned_post(session.as_mut(), actor, post_id, Action::Update).await?;

        let fields = PostFields::merged(&current, changes);
        let updated = session.update_post(post_id, &fields).await?;
        session.commit().await?;

        tracing::info!(actor = actor.id, post_id, "post updated");
        Ok(updated)
    }

    pub async fn delete(&self, actor: Actor, post_id: i32) -> Result<(), ServiceError> {
        let mut session = self.repo.begin().await?;
        owned_post(session.as_mut(), actor, post_id, Action::Delete).await?;

        session.delete_post(post_id).await?;
        session.commit().await?;

        tracing::info!(actor = actor.id, post_id, "post deleted");
        Ok(())
    }
}

/// Locks the post for the rest of the session, then checks the actor owns it.
async fn owned_post(
    session: &mut dyn Session,
    actor: Actor,
    post_id: i32,
    action: Action,
) -> Result<Post, ServiceError> {
    let post = session
        .lock_post(post_id)
        .await?
        .ok_or_else(|| ServiceError::post_not_found(post_id))?;
    authorization::ensure(actor, &post, action)?;
    Ok(post)
}

fn validate_page(params: &ListParams) -> Result<Page, ServiceError> {
    if !(1..=MAX_PAGE_SIZE).contains(&params.limit) {
        return Err(ServiceError::Invalid(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    if params.skip < 0 {
        return Err(ServiceError::Invalid("skip must not be negative".to_string()));
    }
    Ok(Page {
        limit: params.limit,
        offset: params.skip,
    })
}
