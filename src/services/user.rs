//! User service
//!
//! Accounts, password login and browser sessions:
//! - `create_user` / `ensure_bootstrap_admin` for provisioning
//! - `login` / `logout` / `validate_session` for the session cookie
//! - `cleanup_expired_sessions` for the periodic maintenance task

use crate::config::BootstrapAdmin;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Role, Session, User};
use crate::services::password::{hash_password, verify_password};
use crate::services::validation::is_valid_email;
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, session_repo: Arc<dyn SessionRepository>) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_expiration_days,
        }
    }

    /// Session lifetime, used for the cookie `Max-Age`
    pub fn session_lifetime(&self) -> Duration {
        Duration::days(self.session_expiration_days)
    }

    /// Create an account with the given role.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for blank fields or a malformed email
    /// - `UserExists` if the username or email is taken
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<User, UserServiceError> {
        let username = username.trim();
        let email = email.trim();

        if username.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Username cannot be empty".to_string(),
            ));
        }
        if password.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Password cannot be empty".to_string(),
            ));
        }
        if !is_valid_email(email) {
            return Err(UserServiceError::ValidationError(
                "Invalid email format".to_string(),
            ));
        }

        if self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }
        if self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let password_hash = hash_password(password).context("Failed to hash password")?;
        let user = self
            .user_repo
            .create(&CreateUserInput {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
                role,
            })
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = user.id, role = %user.role, "Created user {}", user.username);
        Ok(user)
    }

    /// Create the configured admin account when the database has no users.
    ///
    /// Returns the created user, or `None` when accounts already exist.
    pub async fn ensure_bootstrap_admin(
        &self,
        admin: &BootstrapAdmin,
    ) -> Result<Option<User>, UserServiceError> {
        let count = self.user_repo.count().await.context("Failed to count users")?;
        if count > 0 {
            return Ok(None);
        }

        let user = self
            .create_user(&admin.username, &admin.email, &admin.password, Role::Admin)
            .await?;
        Ok(Some(user))
    }

    /// Login with a username or email and a password.
    ///
    /// The same `AuthenticationError` is returned for an unknown account and
    /// for a wrong password.
    pub async fn login(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<(User, Session), UserServiceError> {
        let invalid = || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let user = self
            .find_user_by_username_or_email(username_or_email.trim())
            .await?
            .ok_or_else(invalid)?;

        let password_valid =
            verify_password(password, &user.password_hash).context("Failed to verify password")?;
        if !password_valid {
            return Err(invalid());
        }

        let session = self.create_session(user.id).await?;
        Ok((user, session))
    }

    /// Delete a session. Unknown tokens are ignored.
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Expired sessions are deleted and reported as absent.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .find(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired(Utc::now())
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }

    async fn find_user_by_username_or_email(
        &self,
        username_or_email: &str,
    ) -> Result<Option<User>, UserServiceError> {
        if let Some(user) = self
            .user_repo
            .get_by_username(username_or_email)
            .await
            .context("Failed to get user by username")?
        {
            return Ok(Some(user));
        }

        Ok(self
            .user_repo
            .get_by_email(username_or_email)
            .await
            .context("Failed to get user by email")?)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + self.session_lifetime(),
            created_at: now,
        };

        self.session_repo
            .insert(&session)
            .await
            .context("Failed to create session")?;

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup_test_service() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        (pool, UserService::new(user_repo, session_repo))
    }

    #[tokio::test]
    async fn test_create_user_validates_input() {
        let (_pool, service) = setup_test_service().await;

        for (name, email, password) in [
            ("", "a@example.com", "pw"),
            ("ada", "not-an-email", "pw"),
            ("ada", "a@example.com", ""),
        ] {
            let result = service.create_user(name, email, password, Role::Author).await;
            assert!(matches!(result, Err(UserServiceError::ValidationError(_))));
        }
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicates() {
        let (_pool, service) = setup_test_service().await;
        service
            .create_user("ada", "ada@example.com", "pw", Role::Author)
            .await
            .unwrap();

        let same_name = service
            .create_user("ada", "other@example.com", "pw", Role::Author)
            .await;
        assert!(matches!(same_name, Err(UserServiceError::UserExists(_))));

        let same_email = service
            .create_user("grace", "ada@example.com", "pw", Role::Author)
            .await;
        assert!(matches!(same_email, Err(UserServiceError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_login_with_username_or_email() {
        let (_pool, service) = setup_test_service().await;
        let user = service
            .create_user("ada", "ada@example.com", "secret123", Role::Editor)
            .await
            .unwrap();

        let (by_name, session) = service.login("ada", "secret123").await.unwrap();
        assert_eq!(by_name.id, user.id);
        assert!(session.expires_at > Utc::now() + Duration::days(6));

        let (by_email, _) = service.login("ada@example.com", "secret123").await.unwrap();
        assert_eq!(by_email.id, user.id);
    }

    #[tokio::test]
    async fn test_login_failures_look_the_same() {
        let (_pool, service) = setup_test_service().await;
        service
            .create_user("ada", "ada@example.com", "secret123", Role::Editor)
            .await
            .unwrap();

        let wrong_password = service.login("ada", "nope").await.unwrap_err();
        let unknown_user = service.login("nobody", "secret123").await.unwrap_err();
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (_pool, service) = setup_test_service().await;
        service
            .create_user("ada", "ada@example.com", "secret123", Role::Viewer)
            .await
            .unwrap();
        let (_, session) = service.login("ada", "secret123").await.unwrap();

        let user = service.validate_session(&session.id).await.unwrap();
        assert_eq!(user.unwrap().username, "ada");

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        service.logout("unknown").await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_session_is_removed() {
        let (pool, service) = setup_test_service().await;
        let user = service
            .create_user("ada", "ada@example.com", "secret123", Role::Viewer)
            .await
            .unwrap();

        let session_repo = SqlxSessionRepository::new(pool);
        let expired = Session {
            id: "expired-token".to_string(),
            user_id: user.id,
            expires_at: Utc::now() - Duration::hours(1),
            created_at: Utc::now() - Duration::days(8),
        };
        session_repo.insert(&expired).await.unwrap();

        assert!(service.validate_session("expired-token").await.unwrap().is_none());
        assert!(session_repo.find("expired-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let (pool, service) = setup_test_service().await;
        let user = service
            .create_user("ada", "ada@example.com", "secret123", Role::Viewer)
            .await
            .unwrap();
        let session_repo = SqlxSessionRepository::new(pool);
        for i in 0..3 {
            session_repo
                .insert(&Session {
                    id: format!("old-{}", i),
                    user_id: user.id,
                    expires_at: Utc::now() - Duration::hours(1),
                    created_at: Utc::now() - Duration::days(8),
                })
                .await
                .unwrap();
        }
        service.login("ada", "secret123").await.unwrap();

        assert_eq!(service.cleanup_expired_sessions().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_only_on_empty_database() {
        let (_pool, service) = setup_test_service().await;
        let admin = BootstrapAdmin {
            username: "root".to_string(),
            email: "root@example.com".to_string(),
            password: "changeme".to_string(),
        };

        let created = service.ensure_bootstrap_admin(&admin).await.unwrap().unwrap();
        assert_eq!(created.role, Role::Admin);
        assert!(service.ensure_bootstrap_admin(&admin).await.unwrap().is_none());
    }
}
