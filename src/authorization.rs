//! Ownership gate for single-post operations.
//!
//! One rule, applied to every action: the actor must own the post. There is
//! no role hierarchy and no shared ownership. Listing never reaches the gate;
//! it is scoped by an owner filter before the query runs.

use crate::error::ServiceError;
use crate::models::Post;

/// The identity asserted by an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i32,
}

impl Actor {
    pub fn new(id: i32) -> Self {
        Self { id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

pub fn authorize(actor: Actor, post: &Post, _action: Action) -> Decision {
    if post.owner_id == actor.id {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// Runs [`authorize`] and turns a denial into [`ServiceError::Forbidden`].
///
/// Only call this on a post that is known to exist: a missing post must be
/// reported as not found before ownership is considered.
pub fn ensure(actor: Actor, post: &Post, action: Action) -> Result<(), ServiceError> {
    match authorize(actor, post, action) {
        Decision::Allow => Ok(()),
        Decision::Deny => {
            tracing::warn!(
                actor = actor.id,
                post_id = post.id,
                owner_id = post.owner_id,
                ?action,
                "ownership check denied"
            );
            Err(ServiceError::Forbidden)
        }
    }
}
