//! services/api/src/web/rest.rs
//!
//! Plain CRUD endpoints for the dashboard (activity log, settings, household
//! users) and the master definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::web::auth::{self, LoginRequest, LoginResponse, PrincipalResponse, SuccessResponse};
use crate::web::door::{
    self, OkResponse, PasscodeRequest, SurnameRequest, SurnameResponse, ToggleResponse,
};
use crate::web::record;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use doorlock_core::domain::{
    DoorStatus, LogEntry, LogFilter, LogKind, NewLogEntry, NewUser, Settings, SettingsPatch, User,
    UserPatch, UserRole,
};
use doorlock_core::ports::PortError;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, OpenApi};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login_handler,
        auth::logout_handler,
        door::lock_handler,
        door::unlock_handler,
        door::toggle_handler,
        door::verify_passcode_handler,
        door::update_passcode_handler,
        door::surname_handler,
        door::update_surname_handler,
        door::status_handler,
        door::doorbell_handler,
        list_logs_handler,
        create_log_handler,
        get_settings_handler,
        update_settings_handler,
        list_users_handler,
        create_user_handler,
        update_user_handler,
        delete_user_handler,
    ),
    components(
        schemas(
            LoginRequest,
            LoginResponse,
            PrincipalResponse,
            SuccessResponse,
            PasscodeRequest,
            SurnameRequest,
            OkResponse,
            SurnameResponse,
            ToggleResponse,
            DoorStatus,
            LogKind,
            LogEntry,
            NewLogEntry,
            Settings,
            SettingsPatch,
            UserRole,
            User,
            NewUser,
            UserPatch,
        )
    ),
    tags(
        (name = "Door Lock API", description = "Session, door actuation, passcode and dashboard endpoints.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Activity Log
//=========================================================================================

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogQuery {
    /// A log type, or `all`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl LogQuery {
    fn into_filter(self) -> Result<LogFilter, PortError> {
        let kind = match self.kind.as_deref() {
            None | Some("") | Some("all") => None,
            Some(raw) => Some(raw.parse::<LogKind>().map_err(PortError::MalformedInput)?),
        };
        Ok(LogFilter {
            kind,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

/// GET /logs - Activity log, newest first
#[utoipa::path(
    get,
    path = "/logs",
    params(LogQuery),
    responses(
        (status = 200, description = "Matching entries, newest first", body = [LogEntry]),
        (status = 400, description = "Unknown log type or out-of-range paging")
    )
)]
pub async fn list_logs_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    let filter = query.into_filter()?;
    Ok(Json(state.logs.list(&filter).await?))
}

/// POST /logs - Append an entry
#[utoipa::path(
    post,
    path = "/logs",
    request_body = NewLogEntry,
    responses(
        (status = 200, description = "Entry recorded", body = LogEntry)
    )
)]
pub async fn create_log_handler(
    State(state): State<Arc<AppState>>,
    Json(entry): Json<NewLogEntry>,
) -> Result<Json<LogEntry>, ApiError> {
    Ok(Json(state.logs.append(entry).await?))
}

//=========================================================================================
// Settings
//=========================================================================================

/// GET /settings
#[utoipa::path(
    get,
    path = "/settings",
    responses(
        (status = 200, description = "Current settings", body = Settings)
    )
)]
pub async fn get_settings_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Settings>, ApiError> {
    Ok(Json(state.settings.get().await?))
}

/// PATCH /settings - Merge a partial update
#[utoipa::path(
    patch,
    path = "/settings",
    request_body = SettingsPatch,
    responses(
        (status = 200, description = "Settings after the merge", body = Settings)
    )
)]
pub async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<Settings>, ApiError> {
    let settings = state.settings.update(patch).await?;
    record(
        &state,
        NewLogEntry::new(LogKind::Settings, "Owner", true).with_details("Settings updated"),
    )
    .await;
    Ok(Json(settings))
}

//=========================================================================================
// Household Users
//=========================================================================================

/// GET /users
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Household members", body = [User])
    )
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.users.list().await?))
}

/// POST /users
#[utoipa::path(
    post,
    path = "/users",
    request_body = NewUser,
    responses(
        (status = 200, description = "Member added", body = User)
    )
)]
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    Json(new_user): Json<NewUser>,
) -> Result<Json<User>, ApiError> {
    let user = state.users.create(new_user).await?;
    info!("Added user {}", user.name);
    record(
        &state,
        NewLogEntry::new(LogKind::UserAdded, "Owner", true).with_details(user.name.clone()),
    )
    .await;
    Ok(Json(user))
}

/// PATCH /users/{id}
#[utoipa::path(
    patch,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "The member's id.")),
    request_body = UserPatch,
    responses(
        (status = 200, description = "Member after the merge", body = User),
        (status = 404, description = "No such member")
    )
)]
pub async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.users.update(id, patch).await?))
}

/// DELETE /users/{id}
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "The member's id.")),
    responses(
        (status = 200, description = "Member removed", body = SuccessResponse),
        (status = 404, description = "No such member")
    )
)]
pub async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.users.delete(id).await?;
    info!("Removed user {}", id);
    record(
        &state,
        NewLogEntry::new(LogKind::UserRemoved, "Owner", true).with_details(id.to_string()),
    )
    .await;
    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_and_empty_type_mean_no_filter() {
        for raw in [None, Some("all"), Some("")] {
            let query = LogQuery {
                kind: raw.map(str::to_string),
                ..Default::default()
            };
            assert_eq!(query.into_filter().unwrap().kind, None);
        }
    }

    #[test]
    fn document_lists_every_dashboard_route() {
        let doc = ApiDoc::openapi();
        for route in [
            "/door/status",
            "/logs",
            "/settings",
            "/users",
            "/users/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(route), "{} missing", route);
        }

        let schemas = doc.components.expect("components").schemas;
        for name in ["LogEntry", "Settings", "User", "DoorStatus"] {
            assert!(schemas.contains_key(name), "{} schema missing", name);
        }
    }

    #[test]
    fn unknown_type_is_malformed() {
        let query = LogQuery {
            kind: Some("burglary".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            query.into_filter(),
            Err(PortError::MalformedInput(_))
        ));
    }
}
