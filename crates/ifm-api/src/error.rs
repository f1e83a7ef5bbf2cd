use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use ifm_storage::PictureError;
use ifm_types::envelope::{Envelope, ResultCode};

/// Every way a channel operation can fail. Rendered into the response
/// envelope at the HTTP boundary; never propagated further.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel {0} does not exist")]
    NotFound(i64),
    #[error("user {user_id} is not the creator of channel {channel_id}")]
    Forbidden { user_id: i64, channel_id: i64 },
    #[error("uploaded file is empty")]
    EmptyUpload,
    #[error("hashtag {0} does not exist")]
    UnknownHashtag(i64),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error(transparent)]
    Picture(#[from] PictureError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ChannelError {
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::NotFound(_) => ResultCode::NotFound,
            Self::Forbidden { .. } => ResultCode::NoPermission,
            Self::EmptyUpload | Self::PayloadTooLarge(_) => ResultCode::UploadFailed,
            Self::BadRequest(_) => ResultCode::BadRequest,
            Self::UnknownHashtag(_) | Self::Picture(_) | Self::Store(_) => ResultCode::UnknownReason,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::EmptyUpload | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnknownHashtag(_) | Self::Picture(_) | Self::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn to_envelope(&self) -> Envelope {
        let envelope = Envelope::with_code(self.result_code()).data("error", self.to_string());
        match self {
            Self::Picture(_) => envelope.message("unknown error, picture upload failed"),
            _ => envelope,
        }
    }
}

impl IntoResponse for ChannelError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            error!("Channel operation failed: {:#}", self);
        }
        (self.status(), Json(self.to_envelope())).into_response()
    }
}
