use axum::http::{self, Request, StatusCode};
use axum::response::Response;
use axum::routing::RouterIntoService;
use http_body_util::BodyExt;
use mock_server::{app, SEED_CHANNEL_ID, SEED_EMAIL, SEED_PASSWORD, SEED_VIDEO_ID};
use serde_json::{json, Value};
use tower::{Service, ServiceExt};

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<String> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(body.to_string()).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<String> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(String::new()).unwrap()
}

async fn send(app: &mut RouterIntoService<String>, request: Request<String>) -> Response {
    ServiceExt::ready(app).await.unwrap().call(request).await.unwrap()
}

async fn login(app: &mut RouterIntoService<String>) -> String {
    let resp = send(
        app,
        json_request(
            "POST",
            "/user/login",
            None,
            json!({"email": SEED_EMAIL, "password": SEED_PASSWORD}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    body["token"].as_str().unwrap().to_string()
}

// --- videos ---

#[tokio::test]
async fn list_videos_returns_seed() {
    let resp = app().oneshot(get_request("/video", None)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let videos = body_json(resp).await;
    assert_eq!(videos.as_array().unwrap().len(), 1);
    assert_eq!(videos[0]["_id"], SEED_VIDEO_ID);
    assert_eq!(videos[0]["channel"]["_id"], SEED_CHANNEL_ID);
}

#[tokio::test]
async fn get_video_not_found_carries_message() {
    let resp = app().oneshot(get_request("/video/nope", None)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await, json!({"message": "Video not found"}));
}

// --- auth ---

#[tokio::test]
async fn login_with_wrong_password_is_401() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/user/login",
            None,
            json!({"email": SEED_EMAIL, "password": "wrong"}),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["message"], "Invalid email or password");
}

#[tokio::test]
async fn actions_require_token() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/api/actions/likes",
            None,
            json!({"videoId": SEED_VIDEO_ID}),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["message"], "Not authorized, no token");
}

#[tokio::test]
async fn malformed_json_returns_422() {
    let resp = app()
        .oneshot(json_request("POST", "/user/login", None, json!({"nope": 1})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn register_then_duplicate_is_conflict() {
    let mut app = app().into_service();
    let input = json!({"username": "bo", "email": "bo@example.com", "password": "pw"});

    let resp = send(&mut app, json_request("POST", "/register", None, input.clone())).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(body_json(resp).await["user"]["username"], "bo");

    let resp = send(&mut app, json_request("POST", "/register", None, input)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn me_returns_logged_in_user() {
    let mut app = app().into_service();
    let token = login(&mut app).await;

    let resp = send(&mut app, get_request("/user/me", Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["user"]["email"], SEED_EMAIL);
}

// --- actions ---

#[tokio::test]
async fn like_toggles_and_dislike_removes_like() {
    let mut app = app().into_service();
    let token = login(&mut app).await;
    let body = json!({"videoId": SEED_VIDEO_ID});

    let resp = send(
        &mut app,
        json_request("POST", "/api/actions/likes", Some(&token), body.clone()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let liked = body_json(resp).await;
    assert_eq!(liked["video"]["likes"], 1);
    assert_eq!(liked["user"]["likedVideos"], json!([SEED_VIDEO_ID]));

    let resp = send(
        &mut app,
        json_request("POST", "/api/actions/dislikes", Some(&token), body.clone()),
    )
    .await;
    let disliked = body_json(resp).await;
    assert_eq!(disliked["video"]["likes"], 0);
    assert_eq!(disliked["user"]["likedVideos"], json!([]));
    assert_eq!(disliked["user"]["dislikedVideos"], json!([SEED_VIDEO_ID]));

    let resp = send(
        &mut app,
        json_request("POST", "/api/actions/likes", Some(&token), body),
    )
    .await;
    let relinked = body_json(resp).await;
    assert_eq!(relinked["video"]["likes"], 1);
    assert_eq!(relinked["user"]["dislikedVideos"], json!([]));
}

#[tokio::test]
async fn subscribe_toggles_subscriber_count() {
    let mut app = app().into_service();
    let token = login(&mut app).await;
    let body = json!({"channelId": SEED_CHANNEL_ID});

    let resp = send(
        &mut app,
        json_request("POST", "/api/actions/subscribe", Some(&token), body.clone()),
    )
    .await;
    let first = body_json(resp).await;
    assert_eq!(first["channel"]["subscribers"], 1);
    assert_eq!(first["user"]["subscribedChannels"], json!([SEED_CHANNEL_ID]));

    let resp = send(
        &mut app,
        json_request("POST", "/api/actions/subscribe", Some(&token), body),
    )
    .await;
    assert_eq!(body_json(resp).await["channel"]["subscribers"], 0);
}

#[tokio::test]
async fn watch_history_records_and_removes() {
    let mut app = app().into_service();
    let token = login(&mut app).await;
    let body = json!({"videoId": SEED_VIDEO_ID});

    let resp = send(
        &mut app,
        json_request("POST", "/other/watchhistory", Some(&token), body.clone()),
    )
    .await;
    let recorded = body_json(resp).await;
    let history = &recorded["user"]["watchHistory"];
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["video"], SEED_VIDEO_ID);

    let resp = send(
        &mut app,
        json_request("DELETE", "/other/watchhistory", Some(&token), body),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["user"]["watchHistory"], json!([]));
}

// --- comments ---

#[tokio::test]
async fn comment_lifecycle() {
    let mut app = app().into_service();
    let token = login(&mut app).await;
    let uri = format!("/comments/{SEED_VIDEO_ID}");

    let resp = send(&mut app, get_request(&uri, None)).await;
    assert_eq!(body_json(resp).await, json!([]));

    let resp = send(
        &mut app,
        json_request("POST", &uri, Some(&token), json!({"text": "   "})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(
        &mut app,
        json_request("POST", &uri, Some(&token), json!({"text": "Great cut"})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = send(&mut app, get_request(&uri, None)).await;
    let comments = body_json(resp).await;
    assert_eq!(comments[0]["text"], "Great cut");
    assert_eq!(comments[0]["user"]["username"], "ana");
}

// --- channels and studio ---

#[tokio::test]
async fn owner_can_update_and_delete_video() {
    let mut app = app().into_service();
    let token = login(&mut app).await;

    let resp = send(
        &mut app,
        json_request(
            "PUT",
            "/studio/updateVideo",
            Some(&token),
            json!({"videoId": SEED_VIDEO_ID, "title": "Knife skills 2"}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["title"], "Knife skills 2");

    let resp = send(
        &mut app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/video/{SEED_VIDEO_ID}"))
            .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
            .body(String::new())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&mut app, get_request("/video", None)).await;
    assert_eq!(body_json(resp).await, json!([]));
}

#[tokio::test]
async fn new_user_must_create_channel_before_uploading() {
    let mut app = app().into_service();
    let resp = send(
        &mut app,
        json_request(
            "POST",
            "/register",
            None,
            json!({"username": "bo", "email": "bo@example.com", "password": "pw"}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resp = send(
        &mut app,
        json_request(
            "POST",
            "/user/login",
            None,
            json!({"email": "bo@example.com", "password": "pw"}),
        ),
    )
    .await;
    let token = body_json(resp).await["token"].as_str().unwrap().to_string();
    let video = json!({"title": "First", "videoUrl": "https://cdn.example.com/f.mp4"});

    let resp = send(
        &mut app,
        json_request("POST", "/video", Some(&token), video.clone()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["message"], "Create a channel first");

    let resp = send(
        &mut app,
        json_request("POST", "/channel", Some(&token), json!({"channelName": "Bo"})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let channel_id = body_json(resp).await["channel"]["_id"].as_str().unwrap().to_string();

    let resp = send(&mut app, json_request("POST", "/video", Some(&token), video)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(body_json(resp).await["channel"]["_id"], channel_id.as_str());

    let resp = send(&mut app, get_request(&format!("/channel/{channel_id}"), None)).await;
    let page = body_json(resp).await;
    assert_eq!(page["channel"]["channelName"], "Bo");
    assert_eq!(page["videos"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn delete_account_revokes_token() {
    let mut app = app().into_service();
    let token = login(&mut app).await;

    let resp = send(
        &mut app,
        Request::builder()
            .method("DELETE")
            .uri("/user/delete")
            .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
            .body(String::new())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&mut app, get_request("/user/me", Some(&token))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_bytes(resp).await;
    assert!(!body.is_empty());
}
