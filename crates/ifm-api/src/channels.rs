use axum::{
    Extension, Json,
    extract::{State, multipart::Field},
};
use tracing::debug;

use ifm_types::api::{Claims, SearchQuery, UpdateDetailRequest, UpdateTitleRequest};
use ifm_types::envelope::Envelope;

use crate::error::ChannelError;
use crate::extract::{ApiJson, ApiMultipart, ApiPath, ApiQuery};
use crate::service::PictureUpload;
use crate::state::AppState;

type ApiResult = Result<Json<Envelope>, ChannelError>;

// ── Reads ───────────────────────────────────────────────────────────────

/// GET /channels/{channel_id}
pub async fn get_channel(State(state): State<AppState>, ApiPath(channel_id): ApiPath<i64>) -> ApiResult {
    let view = state.channels.get_channel(channel_id).await?;
    Ok(Json(Envelope::ok().data("channel", view)))
}

/// GET /users/{user_id}/channels
pub async fn list_by_user(State(state): State<AppState>, ApiPath(user_id): ApiPath<i64>) -> ApiResult {
    let views = state.channels.list_channels_by_user(user_id).await?;
    Ok(Json(Envelope::ok().data("channelList", views)))
}

/// GET /channels/popular
pub async fn list_popular(State(state): State<AppState>) -> ApiResult {
    let views = state.channels.list_popular_channels().await?;
    Ok(Json(Envelope::ok().data("channelList", views)))
}

/// GET /channels/search?keyword=
pub async fn search(State(state): State<AppState>, ApiQuery(query): ApiQuery<SearchQuery>) -> ApiResult {
    let views = state.channels.search_channels(&query.keyword).await?;
    Ok(Json(Envelope::ok().data("channelList", views)))
}

/// GET /hashtags
pub async fn list_hashtags(State(state): State<AppState>) -> ApiResult {
    let hashtags = state.channels.list_hashtags().await?;
    Ok(Json(Envelope::ok().data("hashtagList", hashtags)))
}

// ── Writes ──────────────────────────────────────────────────────────────

/// POST /channels: Multipart with `title`, `detail`, `picture` and any
/// number of `hashtagId` fields (each may also be a comma-separated list).
pub async fn create_channel(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiMultipart(mut multipart): ApiMultipart,
) -> ApiResult {
    let mut title = None;
    let mut detail = String::new();
    let mut picture = PictureUpload::default();
    let mut hashtag_ids = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => title = Some(field.text().await?),
            "detail" => detail = field.text().await?,
            "picture" => picture = read_picture(field).await?,
            "hashtagId" | "hashtagIds" => {
                let raw = field.text().await?;
                hashtag_ids.extend(parse_ids(&raw)?);
            }
            other => debug!("Ignoring multipart field '{}'", other),
        }
    }

    let title = title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ChannelError::BadRequest("title is required".into()))?;

    let channel_id = state
        .channels
        .create_channel(claims.sub, &title, &detail, picture, &hashtag_ids)
        .await?;
    Ok(Json(Envelope::ok().data("channelId", channel_id)))
}

/// PUT /channels/{channel_id}/picture: Multipart with a `picture` field.
pub async fn update_picture(
    State(state): State<AppState>,
    ApiPath(channel_id): ApiPath<i64>,
    Extension(claims): Extension<Claims>,
    ApiMultipart(mut multipart): ApiMultipart,
) -> ApiResult {
    let mut picture = PictureUpload::default();
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("picture") {
            picture = read_picture(field).await?;
        }
    }

    let path = state
        .channels
        .update_channel_picture(claims.sub, channel_id, picture)
        .await?;
    Ok(Json(Envelope::ok().data("channelPicture", path)))
}

/// PUT /channels/{channel_id}/title
pub async fn update_title(
    State(state): State<AppState>,
    ApiPath(channel_id): ApiPath<i64>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateTitleRequest>,
) -> ApiResult {
    if req.title.trim().is_empty() {
        return Err(ChannelError::BadRequest("title must not be empty".into()));
    }
    state
        .channels
        .update_channel_title(claims.sub, channel_id, &req.title)
        .await?;
    Ok(Json(Envelope::ok().data("channelTitle", req.title)))
}

/// PUT /channels/{channel_id}/detail
pub async fn update_detail(
    State(state): State<AppState>,
    ApiPath(channel_id): ApiPath<i64>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateDetailRequest>,
) -> ApiResult {
    state
        .channels
        .update_channel_detail(claims.sub, channel_id, &req.detail)
        .await?;
    Ok(Json(Envelope::ok().data("channelDetail", req.detail)))
}

/// DELETE /channels/{channel_id}
pub async fn delete_channel(
    State(state): State<AppState>,
    ApiPath(channel_id): ApiPath<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult {
    state.channels.delete_channel(claims.sub, channel_id).await?;
    Ok(Json(Envelope::ok()))
}

// ── Subscriptions ───────────────────────────────────────────────────────

/// GET /channels/{channel_id}/subscription
pub async fn check_subscription(
    State(state): State<AppState>,
    ApiPath(channel_id): ApiPath<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult {
    let subscribed = state.channels.is_subscribed(claims.sub, channel_id).await?;
    Ok(Json(Envelope::ok().data("subscription", subscribed)))
}

/// POST /channels/{channel_id}/subscription: Subscribe or unsubscribe,
/// whichever flips the current state.
pub async fn toggle_subscription(
    State(state): State<AppState>,
    ApiPath(channel_id): ApiPath<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult {
    let subscribed = state.channels.toggle_subscription(claims.sub, channel_id).await?;
    Ok(Json(Envelope::ok().data("subscription", subscribed)))
}

/// GET /subscriptions
pub async fn list_subscribed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult {
    let views = state.channels.list_subscribed_channels(claims.sub).await?;
    Ok(Json(Envelope::ok().data("channelList", views)))
}

// ── Multipart helpers ───────────────────────────────────────────────────

async fn read_picture(field: Field<'_>) -> Result<PictureUpload, ChannelError> {
    let file_name = field.file_name().map(str::to_string);
    let data = field.bytes().await?;
    Ok(PictureUpload { file_name, data })
}

fn parse_ids(raw: &str) -> Result<Vec<i64>, ChannelError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| ChannelError::BadRequest(format!("invalid hashtag id '{}'", s)))
        })
        .collect()
}
