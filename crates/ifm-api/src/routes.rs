use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::services::ServeDir;

use crate::channels;
use crate::middleware::require_auth;
use crate::state::AppState;
use crate::verification;

/// URL prefix under which stored channel pictures are served.
pub const PICTURE_ROUTE: &str = "/images/channel";

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let picture_dir = state.channels.pictures().dir().to_path_buf();

    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/hashtags", get(channels::list_hashtags))
        .route("/channels/popular", get(channels::list_popular))
        .route("/channels/search", get(channels::search))
        .route("/channels/{channel_id}", get(channels::get_channel))
        .route("/users/{user_id}/channels", get(channels::list_by_user))
        .route("/verification-codes", post(verification::send_code))
        .route("/verification-codes/verify", post(verification::verify_code))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/channels", post(channels::create_channel))
        .route("/channels/{channel_id}", delete(channels::delete_channel))
        .route("/channels/{channel_id}/picture", put(channels::update_picture))
        .route("/channels/{channel_id}/title", put(channels::update_title))
        .route("/channels/{channel_id}/detail", put(channels::update_detail))
        .route(
            "/channels/{channel_id}/subscription",
            get(channels::check_subscription).post(channels::toggle_subscription),
        )
        .route("/subscriptions", get(channels::list_subscribed))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service(PICTURE_ROUTE, ServeDir::new(picture_dir))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

pub async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use ifm_db::Database;
    use ifm_mail::{LogTransport, VerificationMailer};
    use ifm_storage::PictureStore;
    use ifm_types::api::Claims;
    use ifm_types::envelope::Envelope;

    use crate::service::ChannelService;
    use crate::state::AppStateInner;

    const SECRET: &str = "test-secret";
    const BOUNDARY: &str = "ifm-test-boundary";

    async fn app(tmp: &TempDir) -> Router {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let pictures = Arc::new(
            PictureStore::new(tmp.path().join("channel"), PICTURE_ROUTE)
                .await
                .unwrap(),
        );
        let state = Arc::new(AppStateInner {
            channels: ChannelService::new(db, pictures),
            mailer: VerificationMailer::new(
                Arc::new(LogTransport),
                "no-reply@ifm.local",
                Duration::from_secs(60),
            ),
            jwt_secret: SECRET.to_string(),
        });
        router(state, 1024 * 1024)
    }

    fn token(user_id: i64) -> String {
        let claims = Claims {
            sub: user_id,
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Envelope) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn json_request(method: &str, uri: &str, user: Option<i64>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn create_request(user: i64, title: &str, hashtags: &[i64], picture: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        let mut text_field = |name: &str, value: &str| {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        };
        text_field("title", title);
        text_field("detail", "headlines every morning");
        for id in hashtags {
            text_field("hashtagId", &id.to_string());
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"picture\"; filename=\"cover.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(picture);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/channels")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::AUTHORIZATION, format!("Bearer {}", token(user)))
            .body(Body::from(body))
            .unwrap()
    }

    fn get_request(uri: &str, user: Option<i64>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let tmp = TempDir::new().unwrap();
        let resp = app(&tmp).await.oneshot(get_request("/health", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_channel_returns_not_found_envelope() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp).await;

        let (status, env) = send(&app, get_request("/channels/41", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!env.success);
        assert_eq!(env.code, 90000);
        assert_eq!(env.data["error"], "channel 41 does not exist");
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp).await;

        let (status, env) = send(&app, json_request("PUT", "/channels/1/title", None, serde_json::json!({"title": "x"}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(env.code, 20003);

        let mut req = get_request("/subscriptions", None);
        req.headers_mut()
            .insert(header::AUTHORIZATION, "Bearer not-a-jwt".parse().unwrap());
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_requests_get_envelopes() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp).await;

        let (status, env) = send(&app, get_request("/channels/abc", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!env.success);
        assert_eq!(env.code, 40000);

        let (status, env) = send(
            &app,
            json_request("PUT", "/channels/1/title", Some(1), serde_json::json!({"titel": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(env.code, 40000);

        let (status, env) = send(
            &app,
            json_request("POST", "/verification-codes", None, serde_json::json!({"mail": "a@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(env.code, 40000);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_with_envelope() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp).await;

        let picture = vec![0u8; 2 * 1024 * 1024];
        let (status, env) = send(&app, create_request(1, "Too Big", &[], &picture)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(!env.success);
        assert_eq!(env.code, 70000);

        let (_, env) = send(&app, get_request("/users/1/channels", None)).await;
        assert!(env.data["channelList"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_list_and_guard_ownership() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp).await;

        let (status, env) = send(&app, create_request(1, "Daily News", &[3, 7], b"\x89PNG")).await;
        assert_eq!(status, StatusCode::OK, "{:?}", env);
        assert!(env.success);
        let channel_id = env.data["channelId"].as_i64().unwrap();

        let (_, env) = send(&app, get_request("/users/1/channels", None)).await;
        let list = env.data["channelList"].as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["channel"]["channelId"], channel_id);
        let tags: Vec<i64> = list[0]["channelHashtag"]
            .as_array()
            .unwrap()
            .iter()
            .map(|h| h["hashtagId"].as_i64().unwrap())
            .collect();
        assert_eq!(tags, vec![3, 7]);

        let uri = format!("/channels/{}/title", channel_id);
        let (status, env) = send(&app, json_request("PUT", &uri, Some(2), serde_json::json!({"title": "Hijacked"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(env.code, 20002);

        let (_, env) = send(&app, get_request(&format!("/channels/{}", channel_id), None)).await;
        assert_eq!(env.data["channel"]["channel"]["channelTitle"], "Daily News");

        let picture = env.data["channel"]["channel"]["channelPicture"].as_str().unwrap().to_string();
        let resp = app.clone().oneshot(get_request(&picture, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_with_empty_picture_is_upload_failure() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp).await;

        let (status, env) = send(&app, create_request(1, "Daily News", &[1], b"")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(env.code, 70000);

        let (_, env) = send(&app, get_request("/users/1/channels", None)).await;
        assert!(env.data["channelList"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscription_toggle_round_trips() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp).await;

        let (_, env) = send(&app, create_request(1, "Jazz", &[], b"img")).await;
        let uri = format!("/channels/{}/subscription", env.data["channelId"]);

        let (_, env) = send(&app, json_request("POST", &uri, Some(5), serde_json::json!({}))).await;
        assert_eq!(env.data["subscription"], true);
        let (_, env) = send(&app, get_request(&uri, Some(5))).await;
        assert_eq!(env.data["subscription"], true);
        let (_, env) = send(&app, get_request("/subscriptions", Some(5))).await;
        assert_eq!(env.data["channelList"].as_array().unwrap().len(), 1);

        let (_, env) = send(&app, json_request("POST", &uri, Some(5), serde_json::json!({}))).await;
        assert_eq!(env.data["subscription"], false);
        let (_, env) = send(&app, get_request(&uri, Some(5))).await;
        assert_eq!(env.data["subscription"], false);
    }

    #[tokio::test]
    async fn verification_code_for_bad_address_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp).await;

        let (status, env) = send(&app, json_request("POST", "/verification-codes", None, serde_json::json!({"email": "nope"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!env.success);

        let (status, env) = send(&app, json_request("POST", "/verification-codes", None, serde_json::json!({"email": "a@example.com"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(env.success);

        let (_, env) = send(
            &app,
            json_request("POST", "/verification-codes/verify", None, serde_json::json!({"email": "a@example.com", "code": "not-it"})),
        )
        .await;
        assert_eq!(env.data["verified"], false);
    }
}
