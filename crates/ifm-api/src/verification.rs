use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::warn;

use ifm_mail::MailError;
use ifm_types::api::{SendCodeRequest, VerifyCodeRequest};
use ifm_types::envelope::{Envelope, ResultCode};

use crate::extract::ApiJson;
use crate::state::AppState;

/// POST /verification-codes: Mail a fresh one-time code to `email`.
pub async fn send_code(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SendCodeRequest>,
) -> impl IntoResponse {
    match state.mailer.generate_and_send(&req.email).await {
        Ok(()) => (StatusCode::OK, Json(Envelope::ok())),
        Err(e @ MailError::InvalidAddress(_)) => (
            StatusCode::BAD_REQUEST,
            Json(Envelope::with_code(ResultCode::BadRequest).data("error", e.to_string())),
        ),
        Err(e) => {
            warn!("Verification mail to {} failed: {}", req.email, e);
            (
                StatusCode::BAD_GATEWAY,
                Json(
                    Envelope::error()
                        .message("unknown error, verification mail not sent")
                        .data("error", e.to_string()),
                ),
            )
        }
    }
}

/// POST /verification-codes/verify: Check and consume a code.
pub async fn verify_code(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyCodeRequest>,
) -> Json<Envelope> {
    let verified = state.mailer.verify(&req.email, &req.code);
    Json(Envelope::ok().data("verified", verified))
}
