//! In-process [`Repository`] with the same observable behaviour as the
//! Postgres schema: serial ids, unique emails, foreign keys and cascades.
//!
//! Sessions are serialised: `begin` takes an owned lock on the tables and the
//! session works on a copy that replaces the shared tables only on commit.

use crate::error::RepoError;
use crate::models::{Post, PostFields, User, Vote};
use crate::repository::{
    IdentityStore, Page, PostFilter, PostStore, RepoResult, Repository, Session, VoteStore,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    posts: BTreeMap<i32, Post>,
    votes: BTreeSet<Vote>,
    last_user_id: i32,
    last_post_id: i32,
}

#[derive(Clone, Default)]
pub struct MemoryRepository {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn begin(&self) -> RepoResult<Box<dyn Session>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemorySession { guard, working }))
    }
}

pub struct MemorySession {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

impl MemorySession {
    fn cascade_post(&mut self, post_id: i32) {
        self.working.posts.remove(&post_id);
        self.working.votes.retain(|v| v.post_id != post_id);
    }
}

#[async_trait]
impl IdentityStore for MemorySession {
    async fn find_user(&mut self, id: i32) -> RepoResult<Option<User>> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> RepoResult<Option<User>> {
        Ok(self
            .working
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert_user(&mut self, email: &str, password_hash: &str) -> RepoResult<User> {
        if self.working.users.values().any(|u| u.email == email) {
            return Err(RepoError::Constraint("users_email_key".to_string()));
        }
        self.working.last_user_id += 1;
        let user = User {
            id: self.working.last_user_id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        self.working.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete_user(&mut self, id: i32) -> RepoResult<()> {
        self.working.users.remove(&id);
        let owned: Vec<i32> = self
            .working
            .posts
            .values()
            .filter(|p| p.owner_id == id)
            .map(|p| p.id)
            .collect();
        for post_id in owned {
            self.cascade_post(post_id);
        }
        self.working.votes.retain(|v| v.user_id != id);
        Ok(())
    }
}

#[async_trait]
impl PostStore for MemorySession {
    async fn insert_post(&mut self, owner_id: i32, fields: &PostFields) -> RepoResult<Post> {
        if !self.working.users.contains_key(&owner_id) {
            return Err(RepoError::Constraint("post_users_fk".to_string()));
        }
        self.working.last_post_id += 1;
        let post = Post {
            id: self.working.last_post_id,
            title: fields.title.clone(),
            content: fields.content.clone(),
            published: fields.published,
            owner_id,
            created_at: Utc::now(),
        };
        self.working.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn find_post(&mut self, id: i32) -> RepoResult<Option<Post>> {
        Ok(self.working.posts.get(&id).cloned())
    }

    async fn lock_post(&mut self, id: i32) -> RepoResult<Option<Post>> {
        // The session already holds the table lock.
        self.find_post(id).await
    }

    async fn find_filtered(&mut self, filter: &PostFilter, page: Page) -> RepoResult<Vec<Post>> {
        let skip = usize::try_from(page.offset).unwrap_or(0);
        let take = usize::try_from(page.limit).unwrap_or(0);
        Ok(self
            .working
            .posts
            .values()
            .filter(|p| filter.matches(p))
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }

    async fn update_post(&mut self, id: i32, fields: &PostFields) -> RepoResult<Post> {
        let post = self
            .working
            .posts
            .get_mut(&id)
            .ok_or(RepoError::Database(sqlx::Error::RowNotFound))?;
        post.title = fields.title.clone();
        post.content = fields.content.clone();
        post.published = fields.published;
        Ok(post.clone())
    }

    async fn delete_post(&mut self, id: i32) -> RepoResult<()> {
        self.cascade_post(id);
        Ok(())
    }
}

#[async_trait]
impl VoteStore for MemorySession {
    async fn count_by_post(&mut self, post_id: i32) -> RepoResult<i64> {
        let count = self
            .working
            .votes
            .iter()
            .filter(|v| v.post_id == post_id)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn count_by_posts(&mut self, post_ids: &[i32]) -> RepoResult<HashMap<i32, i64>> {
        let mut counts = HashMap::new();
        for vote in self.working.votes.iter().filter(|v| post_ids.contains(&v.post_id)) {
            *counts.entry(vote.post_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn insert_vote(&mut self, vote: Vote) -> RepoResult<bool> {
        if !self.working.users.contains_key(&vote.user_id) {
            return Err(RepoError::Constraint("votes_user_id_fkey".to_string()));
        }
        if !self.working.posts.contains_key(&vote.post_id) {
            return Err(RepoError::Constraint("votes_post_id_fkey".to_string()));
        }
        Ok(self.working.votes.insert(vote))
    }

    async fn delete_vote(&mut self, vote: Vote) -> RepoResult<bool> {
        Ok(self.working.votes.remove(&vote))
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn commit(self: Box<Self>) -> RepoResult<()> {
        let MemorySession { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
