use std::sync::Arc;

use ifm_mail::VerificationMailer;

use crate::service::ChannelService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub channels: ChannelService,
    pub mailer: VerificationMailer,
    pub jwt_secret: String,
}
