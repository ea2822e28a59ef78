//! Account operations: registration, lookup, removal and login.

use lazy_static::lazy_static;
use regex::Regex;

use crate::auth;
use crate::authorization::Actor;
use crate::config::AppConfig;
use crate::error::{RepoError, ServiceError};
use crate::models::{CreateUserRequest, LoginRequest, Token, UserOut};
use crate::password::{hash_password, verify_password};
use crate::repository::{IdentityStore, RepositoryState};

pub const MIN_PASSWORD_LEN: usize = 8;

const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

/// Lowercased, trimmed form under which emails are stored and looked up.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles");
    }
    EMAIL_RE.is_match(email)
}

#[derive(Clone)]
pub struct AccountService {
    repo: RepositoryState,
    config: AppConfig,
}

impl AccountService {
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self { repo, config }
    }

    pub async fn register(&self, req: CreateUserRequest) -> Result<UserOut, ServiceError> {
        let email = normalize_email(&req.email);
        if !is_valid_email(&email) {
            return Err(ServiceError::Invalid("invalid email address".to_string()));
        }
        if req.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::Invalid(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let mut session = self.repo.begin().await?;
        if session.find_user_by_email(&email).await?.is_some() {
            return Err(email_taken(&email));
        }

        let hash = hash_password(&req.password)?;
        let user = match session.insert_user(&email, &hash).await {
            Ok(user) => user,
            // Lost a race with a concurrent registration.
            Err(RepoError::Constraint(name)) if name == EMAIL_UNIQUE_CONSTRAINT => {
                return Err(email_taken(&email));
            }
            Err(e) => return Err(e.into()),
        };
        session.commit().await?;

        tracing::info!(user_id = user.id, "user registered");
        Ok(user.into())
    }

    pub async fn get_user(&self, id: i32) -> Result<UserOut, ServiceError> {
        let mut session = self.repo.begin().await?;
        let user = session
            .find_user(id)
            .await?
            .ok_or_else(|| ServiceError::user_not_found(id))?;
        Ok(user.into())
    }

    /// Only the account holder may delete the account. Their posts and votes
    /// are removed with it.
    pub async fn delete_user(&self, actor: Actor, id: i32) -> Result<(), ServiceError> {
        let mut session = self.repo.begin().await?;
        if session.find_user(id).await?.is_none() {
            return Err(ServiceError::user_not_found(id));
        }
        if actor.id != id {
            tracing::warn!(actor = actor.id, user_id = id, "account deletion denied");
            return Err(ServiceError::Forbidden);
        }

        session.delete_user(id).await?;
        session.commit().await?;

        tracing::info!(user_id = id, "user deleted");
        Ok(())
    }

    /// Unknown email and wrong password both yield [`ServiceError::Unauthorized`].
    pub async fn login(&self, req: LoginRequest) -> Result<Token, ServiceError> {
        let email = normalize_email(&req.email);

        let mut session = self.repo.begin().await?;
        let Some(user) = session.find_user_by_email(&email).await? else {
            tracing::debug!("login for unknown email");
            return Err(ServiceError::Unauthorized);
        };
        drop(session);

        if !verify_password(&req.password, &user.password_hash)? {
            tracing::debug!(user_id = user.id, "login with wrong password");
            return Err(ServiceError::Unauthorized);
        }

        let access_token = auth::issue_token(&self.config, user.id)?;
        tracing::info!(user_id = user.id, "user logged in");
        Ok(Token::bearer(access_token))
    }
}

fn email_taken(email: &str) -> ServiceError {
    ServiceError::Conflict(format!("User with email {email} already exists"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn email_shape_is_checked() {
        assert!(is_valid_email("a@b.io"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("no-at-sign.io"));
        assert!(!is_valid_email("two words@b.io"));
    }
}
