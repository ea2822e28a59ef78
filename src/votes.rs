//! Casting and withdrawing votes. Any authenticated user may vote on any
//! existing post; ownership plays no part.

use crate::authorization::Actor;
use crate::error::ServiceError;
use crate::models::{Vote, VoteRequest};
use crate::repository::{PostStore, RepositoryState, VoteStore};

/// What a successful vote request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Added,
    Removed,
}

impl VoteOutcome {
    pub fn message(self) -> &'static str {
        match self {
            VoteOutcome::Added => "Successfully added vote",
            VoteOutcome::Removed => "Successfully deleted vote",
        }
    }
}

#[derive(Clone)]
pub struct VoteService {
    repo: RepositoryState,
}

impl VoteService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// `dir = 1` adds the actor's vote, `dir = 0` removes it.
    pub async fn vote(&self, actor: Actor, req: VoteRequest) -> Result<VoteOutcome, ServiceError> {
        if req.dir > 1 {
            return Err(ServiceError::Invalid("dir must be 0 or 1".to_string()));
        }

        let mut session = self.repo.begin().await?;
        if session.find_post(req.post_id).await?.is_none() {
            return Err(ServiceError::post_not_found(req.post_id));
        }

        let vote = Vote {
            user_id: actor.id,
            post_id: req.post_id,
        };
        let outcome = if req.dir == 1 {
            if !session.insert_vote(vote).await? {
                return Err(ServiceError::Conflict(format!(
                    "user {} has already voted on post {}",
                    actor.id, req.post_id
                )));
            }
            VoteOutcome::Added
        } else {
            if !session.delete_vote(vote).await? {
                return Err(ServiceError::NotFound {
                    entity: "Vote on post",
                    id: req.post_id,
                });
            }
            VoteOutcome::Removed
        };
        session.commit().await?;

        tracing::info!(actor = actor.id, post_id = req.post_id, ?outcome, "vote recorded");
        Ok(outcome)
    }
}
