//! services/api/src/web/door.rs
//!
//! Door endpoints: actuation proxied to the remote controller, passcode
//! verification and maintenance, the cached status and the doorbell.

use axum::{extract::State, response::Json, Extension};
use doorlock_core::domain::{DoorStatus, LockAction, LogKind, NewLogEntry};
use doorlock_core::passcode::validate_new_passcode;
use doorlock_core::ports::PortError;
use doorlock_core::status::StatusUpdate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::auth::SuccessResponse;
use crate::web::protocol::DoorEvent;
use crate::web::record;
use crate::web::state::{AppState, Session};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct PasscodeRequest {
    pub passcode: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SurnameRequest {
    pub surname: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SurnameResponse {
    pub surname: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResponse {
    pub success: bool,
    pub is_locked: bool,
}

//=========================================================================================
// Actuation
//=========================================================================================

/// POST /door/lock - Lock the door
#[utoipa::path(
    post,
    path = "/door/lock",
    responses(
        (status = 200, description = "Actuator acknowledged", body = SuccessResponse),
        (status = 401, description = "No session cookie"),
        (status = 403, description = "Invalid or expired session"),
        (status = 502, description = "Actuator unreachable")
    )
)]
pub async fn lock_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<SuccessResponse>, ApiError> {
    actuate(&state, &session, LockAction::Lock).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /door/unlock - Unlock the door
#[utoipa::path(
    post,
    path = "/door/unlock",
    responses(
        (status = 200, description = "Actuator acknowledged", body = SuccessResponse),
        (status = 401, description = "No session cookie"),
        (status = 403, description = "Invalid or expired session"),
        (status = 502, description = "Actuator unreachable")
    )
)]
pub async fn unlock_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<SuccessResponse>, ApiError> {
    actuate(&state, &session, LockAction::Unlock).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /door/toggle - Flip the lock relative to the cached state
#[utoipa::path(
    post,
    path = "/door/toggle",
    responses(
        (status = 200, description = "Actuator acknowledged", body = ToggleResponse),
        (status = 401, description = "No session cookie"),
        (status = 403, description = "Invalid or expired session"),
        (status = 502, description = "Actuator unreachable")
    )
)]
pub async fn toggle_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let action = LockAction::toggle_from(state.hub.snapshot().locked);
    actuate(&state, &session, action).await?;
    Ok(Json(ToggleResponse {
        success: true,
        is_locked: action.leaves_locked(),
    }))
}

/// Sends one command to the actuator. No retry: the caller decides whether to re-invoke.
///
/// On acknowledgement the mirror flips optimistically; the next status push
/// from the actuator confirms or corrects it.
async fn actuate(state: &AppState, session: &Session, action: LockAction) -> Result<(), ApiError> {
    let actor = session.claims.surname.clone();
    match state.device.actuate(action, &session.token).await {
        Ok(()) => {
            info!(?action, actor = %actor, "Actuator acknowledged");
            state.hub.apply(StatusUpdate::Actuated(action));
            state.hub.announce(DoorEvent::from(action));
            record(state, NewLogEntry::new(LogKind::from(action), actor, true)).await;
            Ok(())
        }
        Err(e) => {
            error!(?action, "Actuation failed: {}", e);
            record(
                state,
                NewLogEntry::new(LogKind::from(action), actor, false).with_details(e.to_string()),
            )
            .await;
            Err(e.into())
        }
    }
}

//=========================================================================================
// Passcode and Surname
//=========================================================================================

/// POST /door/verify-passcode - Check a door passcode
#[utoipa::path(
    post,
    path = "/door/verify-passcode",
    request_body = PasscodeRequest,
    responses(
        (status = 200, description = "Passcode matches", body = OkResponse),
        (status = 401, description = "Invalid passcode")
    )
)]
pub async fn verify_passcode_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasscodeRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    match state.verifier.verify(&req.passcode).await {
        Ok(()) => Ok(Json(OkResponse { ok: true })),
        Err(PortError::InvalidCode) => {
            warn!("Wrong door passcode entered");
            record(
                &state,
                NewLogEntry::new(LogKind::FailedAttempt, "Unknown", false)
                    .with_details("Wrong passcode"),
            )
            .await;
            Err(PortError::InvalidCode.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /door/update-passcode - Replace the door passcode
#[utoipa::path(
    post,
    path = "/door/update-passcode",
    request_body = PasscodeRequest,
    responses(
        (status = 200, description = "Passcode updated", body = OkResponse),
        (status = 400, description = "Passcode is not six digits"),
        (status = 404, description = "No credential record")
    )
)]
pub async fn update_passcode_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasscodeRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    validate_new_passcode(&req.passcode)?;

    let updated = state.credentials.update_passcode(&req.passcode).await?;
    if updated == 0 {
        return Err(PortError::NotFound("No credential record to update".to_string()).into());
    }

    info!("Door passcode changed");
    record(
        &state,
        NewLogEntry::new(LogKind::Settings, "Owner", true).with_details("Passcode changed"),
    )
    .await;
    Ok(Json(OkResponse { ok: true }))
}

/// GET /door/surname - The household surname shown on the door unit
#[utoipa::path(
    get,
    path = "/door/surname",
    responses(
        (status = 200, description = "Current surname", body = SurnameResponse),
        (status = 404, description = "No credential record")
    )
)]
pub async fn surname_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SurnameResponse>, ApiError> {
    let credential = state.credentials.first_credential().await?;
    Ok(Json(SurnameResponse {
        surname: credential.surname,
    }))
}

/// POST /door/update-surname - Rename the household
#[utoipa::path(
    post,
    path = "/door/update-surname",
    request_body = SurnameRequest,
    responses(
        (status = 200, description = "Surname updated", body = SuccessResponse),
        (status = 400, description = "Empty surname"),
        (status = 404, description = "No credential record")
    )
)]
pub async fn update_surname_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SurnameRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let surname = req.surname.trim();
    if surname.is_empty() {
        return Err(PortError::MalformedInput("surname must not be empty".to_string()).into());
    }

    let updated = state.credentials.update_surname(surname).await?;
    if updated == 0 {
        return Err(PortError::NotFound("No credential record to update".to_string()).into());
    }
    Ok(Json(SuccessResponse { success: true }))
}

//=========================================================================================
// Status and Doorbell
//=========================================================================================

/// GET /door/status - The cached door state
#[utoipa::path(
    get,
    path = "/door/status",
    responses(
        (status = 200, description = "Last known lock state", body = DoorStatus),
        (status = 401, description = "No session cookie"),
        (status = 403, description = "Invalid or expired session")
    )
)]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<DoorStatus> {
    Json(state.hub.snapshot())
}

/// POST /doorbell/trigger - Ring the bell on every connected panel
///
/// The physical chime is rung in the background; its failure does not fail the request.
#[utoipa::path(
    post,
    path = "/doorbell/trigger",
    responses(
        (status = 200, description = "Doorbell event broadcast", body = SuccessResponse)
    )
)]
pub async fn doorbell_handler(State(state): State<Arc<AppState>>) -> Json<SuccessResponse> {
    info!("Doorbell rang");
    state.hub.announce(DoorEvent::Doorbell);

    let device = state.device.clone();
    tokio::spawn(async move {
        if let Err(e) = device.ring().await {
            warn!("Doorbell chime failed: {}", e);
        }
    });

    record(&state, NewLogEntry::new(LogKind::Doorbell, "Visitor", true)).await;
    Json(SuccessResponse { success: true })
}
