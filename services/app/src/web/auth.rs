//! services/app/src/web/auth.rs
//!
//! Authentication endpoints: login, registration, logout, the current login
//! state, and profile updates. Credentials are checked by the remote API; the
//! resulting token is kept in device storage.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use mintar_core::{
    domain::{AuthStatus, LoginData, ProfileUpdate, UserProfile},
    ports::PortError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::web::middleware::AuthToken;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ProfileUpdateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub authenticated: bool,
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl AuthResponse {
    fn anonymous() -> Self {
        Self {
            authenticated: false,
            user_id: None,
            email: None,
            name: None,
        }
    }

    fn from_login(login: &LoginData) -> Self {
        let user = login.user.clone().unwrap_or_default();
        Self {
            authenticated: true,
            user_id: user.user_id,
            email: user.email,
            name: user.name,
        }
    }
}

fn storage_failure(action: &str, e: PortError) -> (StatusCode, String) {
    error!("Failed to {}: {:?}", action, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Failed to {}", action),
    )
}

fn remote_failure(action: &str, e: PortError) -> (StatusCode, String) {
    match e {
        PortError::Rejected(message) => (StatusCode::UNAUTHORIZED, message),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        other => {
            error!("Failed to {}: {:?}", action, other);
            (StatusCode::BAD_GATEWAY, format!("Failed to {}", action))
        }
    }
}

fn require_fields(fields: &[(&str, &str)]) -> Result<(), (StatusCode, String)> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((name, _)) => Err((StatusCode::BAD_REQUEST, format!("{} is required", name))),
        None => Ok(()),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/login - Log in and keep the token on the device
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Failed to store the login")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_fields(&[("email", req.email.as_str()), ("password", req.password.as_str())])?;

    let login = state
        .auth
        .login(&req.email, &req.password)
        .await
        .map_err(|e| remote_failure("log in", e))?;

    state
        .sessions
        .save_login_data(&login, Some(req.remember_me))
        .await
        .map_err(|e| storage_failure("save login data", e))?;

    info!(email = %req.email, "User logged in");
    Ok(Json(AuthResponse::from_login(&login)))
}

/// POST /auth/register - Create an account, logging in when the API issues a token
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Missing fields"),
        (status = 401, description = "Registration rejected"),
        (status = 500, description = "Failed to store the login")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_fields(&[
        ("name", req.name.as_str()),
        ("email", req.email.as_str()),
        ("password", req.password.as_str()),
    ])?;

    let login = state
        .auth
        .register(&req.name, &req.email, &req.password)
        .await
        .map_err(|e| remote_failure("register", e))?;

    let response = match login {
        Some(login) => {
            state
                .sessions
                .save_login_data(&login, None)
                .await
                .map_err(|e| storage_failure("save login data", e))?;
            AuthResponse::from_login(&login)
        }
        None => AuthResponse::anonymous(),
    };

    info!(email = %req.email, logged_in = response.authenticated, "User registered");
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /auth/logout - Forget the stored login
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful", body = AuthResponse),
        (status = 500, description = "Failed to clear the login")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .sessions
        .clear()
        .await
        .map_err(|e| storage_failure("log out", e))?;

    Ok(Json(AuthResponse::anonymous()))
}

/// GET /auth/me - The current login state
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current login state", body = AuthResponse),
        (status = 500, description = "Failed to read the login")
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let status = state
        .sessions
        .status()
        .await
        .map_err(|e| storage_failure("read login data", e))?;

    Ok(Json(match status {
        AuthStatus::Authenticated(login) => AuthResponse::from_login(&login),
        AuthStatus::Unauthenticated => AuthResponse::anonymous(),
    }))
}

/// PUT /auth/profile - Update name or email remotely and in the stored login
#[utoipa::path(
    put,
    path = "/auth/profile",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Profile updated", body = AuthResponse),
        (status = 401, description = "Not logged in"),
        (status = 502, description = "The remote API refused the update")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthToken(token)): Extension<AuthToken>,
    Json(req): Json<ProfileUpdateRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let update = ProfileUpdate {
        name: req.name.filter(|n| !n.trim().is_empty()),
        email: req.email.filter(|e| !e.trim().is_empty()),
    };

    state
        .auth
        .update_profile(&token, &update)
        .await
        .map_err(|e| match e {
            PortError::Rejected(message) => (StatusCode::BAD_GATEWAY, message),
            other => remote_failure("update profile", other),
        })?;

    state
        .sessions
        .update_user(&UserProfile {
            user_id: None,
            email: update.email,
            name: update.name,
        })
        .await
        .map_err(|e| storage_failure("save profile", e))?;

    let login = state
        .sessions
        .login_data()
        .await
        .map_err(|e| storage_failure("read login data", e))?;

    Ok(Json(match login {
        Some(login) => AuthResponse::from_login(&login),
        None => AuthResponse::anonymous(),
    }))
}
