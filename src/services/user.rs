//! User service
//!
//! Implements account and login state management:
//! - registration (user and profile created together)
//! - login/logout backed by session rows
//! - resolving a session token into an `Identity`

use crate::db::is_unique_violation;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Identity, LoginInput, NewProfile, Profile, RegisterInput, Session, User, UserId};
use crate::services::password::{hash_password, verify_password};
use crate::services::validation::{check_email, check_length, check_required, FieldErrors};
use anyhow::Context;
use chrono::Duration;
use std::sync::Arc;

/// Default session expiration time in days
pub const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Unknown email or wrong password; the two are never told apart
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Validation error (invalid form input)
    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    /// Email already registered
    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    /// Internal error
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
    /// Create a new user service with the given repositories
    pub fn new(user_repo: Arc<dyn UserRepository>, session_repo: Arc<dyn SessionRepository>) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    /// Create a new user service with custom session expiration
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

    /// How long a new session lasts
    pub fn session_lifetime(&self) -> Duration {
        Duration::days(self.session_expiration_days)
    }

    /// Register a new user
    ///
    /// # Errors
    ///
    /// - `ValidationError` for invalid form fields
    /// - `DuplicateEmail` if the email is taken; no user or profile is stored
    /// - `InternalError` for database errors
    pub async fn register(&self, input: RegisterInput) -> Result<(User, Profile), UserServiceError> {
        let profile = validate_register_input(&input).map_err(UserServiceError::ValidationError)?;
        let email = input.email.trim();

        let password_hash = hash_password(&input.password1).context("Failed to hash password")?;

        match self
            .user_repo
            .create_with_profile(email, &password_hash, &profile)
            .await
        {
            Ok((user, profile)) => {
                tracing::info!("Registered user {}", user.id);
                Ok((user, profile))
            }
            Err(e) if is_unique_violation(&e) => Err(UserServiceError::DuplicateEmail(email.to_string())),
            Err(e) => Err(UserServiceError::InternalError(e)),
        }
    }

    /// Login with credentials
    ///
    /// Validates the form, then the credentials, and creates a new session.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if the form is invalid; no lookup is attempted
    /// - `InvalidCredentials` for an unknown email or a wrong password
    /// - `InternalError` for database errors
    pub async fn login(&self, input: &LoginInput) -> Result<Session, UserServiceError> {
        validate_login_input(input).map_err(UserServiceError::ValidationError)?;

        let user = self
            .user_repo
            .get_by_email(input.email.trim())
            .await
            .context("Failed to get user by email")?
            .ok_or(UserServiceError::InvalidCredentials)?;

        let password_valid =
            verify_password(&input.password, &user.password_hash).context("Failed to verify password")?;
        if !password_valid {
            return Err(UserServiceError::InvalidCredentials);
        }

        let session = Session::new(user.id, self.session_lifetime());
        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        tracing::debug!("User {} logged in", user.id);
        Ok(created)
    }

    /// Logout (invalidate session). An unknown token is not an error.
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token into the identity it grants
    ///
    /// Missing, expired and orphaned sessions all resolve to `Anonymous`;
    /// expired ones are removed on the way.
    pub async fn resolve_identity(&self, token: &str) -> Result<Identity, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(Identity::Anonymous),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to remove expired session: {:#}", e);
            }
            return Ok(Identity::Anonymous);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(match user {
            Some(user) => Identity::Authenticated(UserId(user.id)),
            None => Identity::Anonymous,
        })
    }

    /// Get a user together with their profile
    pub async fn get_user_with_profile(
        &self,
        id: UserId,
    ) -> Result<Option<(User, Profile)>, UserServiceError> {
        let Some(user) = self
            .user_repo
            .get_by_id(id.0)
            .await
            .context("Failed to get user")?
        else {
            return Ok(None);
        };

        let profile = self
            .user_repo
            .get_profile(user.id)
            .await
            .context("Failed to get profile")?;

        Ok(profile.map(|profile| (user, profile)))
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;

        Ok(count)
    }
}

/// Validate the registration form, producing the profile to store
pub fn validate_register_input(input: &RegisterInput) -> Result<NewProfile, FieldErrors> {
    let mut errors = FieldErrors::new();

    let name = input.name.trim();
    check_length(&mut errors, "name", name, 4, 100);

    let age_raw = input.age.trim();
    let age = if age_raw.is_empty() {
        None
    } else {
        match age_raw.parse::<i32>() {
            Ok(age) if (0..=150).contains(&age) => Some(age),
            Ok(_) => {
                errors.add("age", "Age must be between 0 and 150.");
                None
            }
            Err(_) => {
                errors.add("age", "Not a valid integer value.");
                None
            }
        }
    };

    let city = input.city.trim();
    check_length(&mut errors, "city", city, 0, 100);

    check_email(&mut errors, "email", input.email.trim());

    check_required(&mut errors, "password1", &input.password1);
    check_length(&mut errors, "password1", &input.password1, 4, 100);
    check_required(&mut errors, "password2", &input.password2);
    if input.password1 != input.password2 {
        errors.add("password2", "Passwords do not match.");
    }

    errors.into_result()?;

    Ok(NewProfile {
        name: name.to_string(),
        age,
        city: city.to_string(),
    })
}

/// Validate the login form
pub fn validate_login_input(input: &LoginInput) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    check_email(&mut errors, "email", input.email.trim());
    check_required(&mut errors, "password", &input.password);
    check_length(&mut errors, "password", &input.password, 4, 100);
    errors.into_result()
}
