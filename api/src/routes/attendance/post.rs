use axum::{
    Extension, Json,
    extract::{ConnectInfo, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use services::token::AttendanceToken;
use services::verifier::VerificationResult;
use std::net::SocketAddr;
use util::state::AppState;

use super::common::{
    IssueQrReq, PayloadReq, QrIssueResponse, failure, misconfigured, outcome, verifier,
};
use crate::{auth::AuthUser, response::ApiResponse};

async fn issue_for(state: &AppState, subject_id: &str, body: IssueQrReq, addr: SocketAddr) -> Response {
    let verifier = match verifier(state) {
        Ok(v) => v,
        Err(e) => return misconfigured(e),
    };
    let ip = addr.ip().to_string();

    match verifier
        .sessions()
        .create(subject_id, body.duration_seconds, Some(&ip), Utc::now())
        .await
    {
        Ok(session) => {
            let response = QrIssueResponse {
                token: AttendanceToken {
                    subject_id: session.subject_id.clone(),
                    session_id: session.session_id.clone(),
                    issued_at: session.issued_at.timestamp(),
                    integrity_tag: session.integrity_tag,
                },
                session_id: session.session_id,
                subject_id: session.subject_id,
                payload: session.raw_payload,
                issued_at: session.issued_at,
                expires_at: session.expires_at,
            };
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(response, "Attendance token issued")),
            )
                .into_response()
        }
        Err(e) => failure(&e).into_response(),
    }
}

/// POST /api/attendance/qr
///
/// Issues a single-use attendance token for the caller.
///
/// ### Request Body
/// ```json
/// { "duration_seconds": 300 }
/// ```
/// `duration_seconds` is optional and defaults to `QR_SESSION_SECONDS`.
///
/// ### Responses
/// - `201 Created` with `sessionId`, `payload` (the string to encode in the QR), `token`, `issuedAt`, `expiresAt`
/// - `400 Bad Request` when the duration is below one second or above `QR_MAX_SESSION_SECONDS`
/// - `503 Service Unavailable` on storage failure
pub async fn issue_qr(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<IssueQrReq>,
) -> Response {
    issue_for(&state, &claims.sub, body, addr).await
}

/// POST /api/attendance/subjects/{subject_id}/qr (staff)
pub async fn issue_qr_for_subject(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<IssueQrReq>,
) -> Response {
    issue_for(&state, &subject_id, body, addr).await
}

/// POST /api/attendance/verify (staff)
///
/// Dry run: reports whether a scanned token would be accepted. Nothing is
/// written and the token stays usable.
///
/// ### Request Body
/// ```json
/// { "payload": "{\"integrityTag\":\"…\",\"issuedAt\":1704096000,\"sessionId\":\"…\",\"subjectId\":\"S-001\"}" }
/// ```
///
/// ### Responses
/// - `200 OK` with `data.code = "Eligible"`
/// - `400` `MalformedPayload` / `IntegrityFailure`
/// - `404` `SessionNotFound` / `UnknownSubject`
/// - `409` `SessionAlreadyUsed` / `AlreadyMarkedToday`
/// - `410` `SessionExpired`
pub async fn verify_token(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<PayloadReq>,
) -> Response {
    let verifier = match verifier(&state) {
        Ok(v) => v,
        Err(e) => return misconfigured(e),
    };
    let ip = addr.ip().to_string();

    match verifier.verify(&body.raw(), Some(&ip), Utc::now()).await {
        Ok(eligible) => outcome(VerificationResult::eligible(&eligible)).into_response(),
        Err(e) => failure(&e).into_response(),
    }
}

/// POST /api/attendance/scan (staff)
///
/// Verifies a scanned token, checks the subject in and consumes the token.
///
/// ### Responses
/// - `201 Created` with `data.code = "CheckedIn"` and the new record
/// - the same failures as `/verify`, plus `409 AlreadyCheckedIn`
pub async fn scan(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<PayloadReq>,
) -> Response {
    let verifier = match verifier(&state) {
        Ok(v) => v,
        Err(e) => return misconfigured(e),
    };
    let ip = addr.ip().to_string();

    match verifier.check_in_with_token(&body.raw(), Some(&ip), Utc::now()).await {
        Ok(checked_in) => outcome(VerificationResult::checked_in(&checked_in)).into_response(),
        Err(e) => failure(&e).into_response(),
    }
}

async fn check_out_subject_at(state: &AppState, subject_id: &str) -> Response {
    let verifier = match verifier(state) {
        Ok(v) => v,
        Err(e) => return misconfigured(e),
    };

    match verifier.ledger().check_out(subject_id, Utc::now()).await {
        Ok(record) => outcome(VerificationResult::checked_out(&record)).into_response(),
        Err(e) => failure(&e).into_response(),
    }
}

/// POST /api/attendance/check-out
///
/// Closes the caller's open record for today.
///
/// ### Responses
/// - `200 OK` with `data.code = "CheckedOut"` and `durationMinutes`
/// - `409 Conflict` `NoOpenSession`
/// - `422 Unprocessable Entity` `InvalidTimeOrder`
pub async fn check_out(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> Response {
    check_out_subject_at(&state, &claims.sub).await
}

/// POST /api/attendance/subjects/{subject_id}/check-out (staff)
pub async fn check_out_subject(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> Response {
    check_out_subject_at(&state, &subject_id).await
}
