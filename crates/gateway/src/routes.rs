//! Route handlers.

use {
    axum::{
        Json,
        extract::{Path, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use {
    wagate_common::Error,
    wagate_sessions::QrStatus,
};

use crate::server::AppState;

/// Error body for every failure response.
#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn error_response(err: Error) -> Response {
    let status = match err {
        Error::UnknownUser(_) => StatusCode::NOT_FOUND,
        Error::SendFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::InvalidRecipient | Error::InvalidInput(_) | Error::NotConnected(_) => {
            StatusCode::BAD_REQUEST
        },
    };
    (status, Json(ErrorBody {
        error: err.to_string(),
    }))
        .into_response()
}

/// `GET /` — static success payload.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": "wagate" }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Serialize)]
pub struct StartSessionResponse {
    pub success: bool,
    pub message: String,
}

/// `POST /api/session/start` — create (or re-acknowledge) a session.
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> Response {
    let Some(user_id) = req.user_id.filter(|id| !id.trim().is_empty()) else {
        return error_response(Error::InvalidInput("userId"));
    };

    state.registry.start_session(&user_id).await;
    Json(StartSessionResponse {
        success: true,
        message: format!("session started for {user_id}"),
    })
    .into_response()
}

#[derive(Serialize)]
pub struct QrResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
}

/// `GET /api/qr/{user_id}` — QR/connection status for polling clients.
pub async fn qr_status(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    match state.registry.qr_status(&user_id).await {
        Ok(QrStatus::Connected) => Json(QrResponse {
            status: "connected",
            qr: None,
        })
        .into_response(),
        Ok(QrStatus::Waiting) => Json(QrResponse {
            status: "waiting",
            qr: None,
        })
        .into_response(),
        Ok(QrStatus::Qr(payload)) => Json(QrResponse {
            status: "qr",
            qr: Some(payload),
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub connected: bool,
}

/// `GET /api/status/{user_id}` — plain connection check.
///
/// Unlike the QR endpoint this never fails: unknown users are simply not
/// connected.
pub async fn status(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    Json(StatusResponse {
        connected: state.registry.is_ready(&user_id).await,
    })
    .into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize)]
pub struct SendResponse {
    pub success: bool,
}

/// `POST /api/send` — relay one text message.
pub async fn send(State(state): State<AppState>, Json(req): Json<SendRequest>) -> Response {
    let Some(user_id) = req.user_id.filter(|v| !v.trim().is_empty()) else {
        return error_response(Error::InvalidInput("userId"));
    };
    let Some(number) = req.number.filter(|v| !v.trim().is_empty()) else {
        return error_response(Error::InvalidInput("number"));
    };
    let Some(message) = req.message.filter(|v| !v.trim().is_empty()) else {
        return error_response(Error::InvalidInput("message"));
    };

    debug!(user_id, "send requested");
    match state.registry.send(&user_id, &number, &message).await {
        Ok(()) => Json(SendResponse { success: true }).into_response(),
        Err(err) => error_response(err),
    }
}
