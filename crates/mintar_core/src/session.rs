//! crates/mintar_core/src/session.rs
//!
//! Persists the login state (token and user profile) in the key-value backend,
//! one key per field.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info};

use crate::domain::{AuthStatus, LoginData, UserProfile};
use crate::ports::{KeyValueBackend, PortResult};

const TOKEN_KEY: &str = "auth_token";
const USER_ID_KEY: &str = "user_id";
const USER_EMAIL_KEY: &str = "user_email";
const USER_NAME_KEY: &str = "user_name";
const REMEMBER_ME_KEY: &str = "remember_me";

const ALL_KEYS: [&str; 5] = [
    TOKEN_KEY,
    USER_ID_KEY,
    USER_EMAIL_KEY,
    USER_NAME_KEY,
    REMEMBER_ME_KEY,
];

/// Reads and writes the persisted login state.
#[derive(Clone)]
pub struct AuthSessionStore {
    backend: Arc<dyn KeyValueBackend>,
}

impl AuthSessionStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self { backend }
    }

    /// Stores the token and whichever profile fields are present.
    pub async fn save_login_data(
        &self,
        login: &LoginData,
        remember_me: Option<bool>,
    ) -> PortResult<()> {
        self.backend.set(TOKEN_KEY, &login.token).await?;
        if let Some(user) = &login.user {
            self.write_user(user).await?;
        }
        if let Some(remember) = remember_me {
            self.backend
                .set(REMEMBER_ME_KEY, if remember { "true" } else { "false" })
                .await?;
        }
        info!(email = ?login.user.as_ref().and_then(|u| u.email.as_deref()), "Login data saved");
        Ok(())
    }

    async fn write_user(&self, user: &UserProfile) -> PortResult<()> {
        if let Some(user_id) = user.user_id {
            self.backend.set(USER_ID_KEY, &user_id.to_string()).await?;
        }
        if let Some(email) = user.email.as_deref().filter(|e| !e.is_empty()) {
            self.backend.set(USER_EMAIL_KEY, email).await?;
        }
        if let Some(name) = user.name.as_deref().filter(|n| !n.is_empty()) {
            self.backend.set(USER_NAME_KEY, name).await?;
        }
        Ok(())
    }

    /// The persisted login, or `None` when no token is stored.
    pub async fn login_data(&self) -> PortResult<Option<LoginData>> {
        let (token, user_id, email, name) = futures::try_join!(
            self.backend.get(TOKEN_KEY),
            self.backend.get(USER_ID_KEY),
            self.backend.get(USER_EMAIL_KEY),
            self.backend.get(USER_NAME_KEY),
        )?;

        let Some(token) = token.filter(|t| !t.is_empty()) else {
            debug!("No login token stored");
            return Ok(None);
        };

        let user = UserProfile {
            // A non-numeric id is ignored rather than reported.
            user_id: user_id.and_then(|v| v.trim().parse().ok()),
            email: email.filter(|e| !e.is_empty()),
            name: name.filter(|n| !n.is_empty()),
        };

        Ok(Some(LoginData {
            token,
            user: (!user.is_empty()).then_some(user),
        }))
    }

    pub async fn status(&self) -> PortResult<AuthStatus> {
        Ok(match self.login_data().await? {
            Some(login) => AuthStatus::Authenticated(login),
            None => AuthStatus::Unauthenticated,
        })
    }

    pub async fn token(&self) -> PortResult<Option<String>> {
        Ok(self
            .backend
            .get(TOKEN_KEY)
            .await?
            .filter(|t| !t.is_empty()))
    }

    pub async fn is_logged_in(&self) -> PortResult<bool> {
        Ok(self.token().await?.is_some())
    }

    pub async fn user(&self) -> PortResult<Option<UserProfile>> {
        Ok(self.login_data().await?.and_then(|login| login.user))
    }

    pub async fn remember_me(&self) -> PortResult<bool> {
        Ok(self.backend.get(REMEMBER_ME_KEY).await?.as_deref() == Some("true"))
    }

    /// Overwrites the profile fields present in `update`; absent fields are kept.
    pub async fn update_user(&self, update: &UserProfile) -> PortResult<()> {
        self.write_user(update).await
    }

    pub async fn update_token(&self, token: &str) -> PortResult<()> {
        self.backend.set(TOKEN_KEY, token).await
    }

    /// Removes every login key.
    pub async fn clear(&self) -> PortResult<()> {
        try_join_all(ALL_KEYS.iter().map(|key| self.backend.delete(key))).await?;
        info!("Login data cleared");
        Ok(())
    }
}
