//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for login and logout.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use doorlock_core::domain::{LogKind, NewLogEntry, Principal};
use doorlock_core::ports::{PortError, PortResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::password::verify_password;
use crate::web::middleware::SESSION_COOKIE;
use crate::web::record;
use crate::web::state::AppState;
use crate::web::token::SESSION_TTL_SECS;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(alias = "identifier")]
    pub surname: String,
    #[serde(alias = "secret")]
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct PrincipalResponse {
    pub id: Uuid,
    pub surname: String,
}

impl From<Principal> for PrincipalResponse {
    fn from(principal: Principal) -> Self {
        Self {
            id: principal.id,
            surname: principal.surname,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    pub user: PrincipalResponse,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/login - Login with the household credential
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, session cookie set", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = match authenticate(&state, &req.surname, &req.password).await {
        Ok(principal) => principal,
        Err(e) => {
            if matches!(e, PortError::InvalidCredentials) {
                warn!("Failed login attempt for '{}'", req.surname);
                record(
                    &state,
                    NewLogEntry::new(LogKind::FailedAttempt, req.surname.clone(), false)
                        .with_details("Invalid login credentials"),
                )
                .await;
            }
            return Err(e.into());
        }
    };

    let (token, _claims) = state.tokens.issue(&principal, Utc::now());
    info!("User {} logged in", principal.surname);
    record(
        &state,
        NewLogEntry::new(LogKind::Login, principal.surname.clone(), true),
    )
    .await;

    let cookie = session_cookie(&token, state.config.secure_cookies);
    let response = LoginResponse {
        success: true,
        user: principal.into(),
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Acknowledge a logout
///
/// Sessions are stateless; the client discards its own cookie.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout acknowledged", body = SuccessResponse)
    )
)]
pub async fn logout_handler() -> Json<SuccessResponse> {
    Json(SuccessResponse { success: true })
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Resolves a surname/secret pair to a principal.
///
/// An unknown surname and a wrong secret are indistinguishable to the caller.
pub async fn authenticate(state: &AppState, surname: &str, secret: &str) -> PortResult<Principal> {
    let credential = match state.credentials.find_by_surname(surname).await {
        Ok(credential) => credential,
        Err(PortError::NotFound(_)) => return Err(PortError::InvalidCredentials),
        Err(e) => return Err(e),
    };
    if !verify_password(secret, &credential.password_hash)? {
        return Err(PortError::InvalidCredentials);
    }
    Ok(credential.principal())
}

pub fn session_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        SESSION_COOKIE, token, SESSION_TTL_SECS
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
