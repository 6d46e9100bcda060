use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

pub const SEED_USER_ID: &str = "u1";
pub const SEED_USERNAME: &str = "ana";
pub const SEED_EMAIL: &str = "ana@example.com";
pub const SEED_PASSWORD: &str = "secret";
pub const SEED_CHANNEL_ID: &str = "c1";
pub const SEED_VIDEO_ID: &str = "v1";

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password: String,
    pub channel: Option<String>,
    pub liked_videos: Vec<String>,
    pub disliked_videos: Vec<String>,
    pub subscribed_channels: Vec<String>,
    pub watch_later: Vec<String>,
    pub watch_history: Vec<HistoryEntry>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub video: String,
    pub watched_at: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    #[serde(rename = "_id")]
    pub id: String,
    pub channel_name: String,
    pub owner: String,
    pub subscribers: i64,
}

#[derive(Clone, Debug)]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    pub video_url: String,
    pub likes: i64,
    pub channel: String,
}

/// A video as sent over the wire, with its channel populated.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoView {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub video_url: String,
    pub likes: i64,
    pub channel: Option<Channel>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CommentAuthor {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    pub text: String,
    pub user: CommentAuthor,
    pub video: String,
}

#[derive(Default)]
pub struct Backend {
    users: HashMap<String, User>,
    tokens: HashMap<String, String>,
    channels: HashMap<String, Channel>,
    videos: HashMap<String, VideoRecord>,
    comments: HashMap<String, Vec<Comment>>,
    clock: u64,
}

pub type Db = Arc<RwLock<Backend>>;

impl Backend {
    /// One user owning one channel with one video.
    pub fn seeded() -> Self {
        let mut backend = Backend::default();
        backend.users.insert(
            SEED_USER_ID.to_string(),
            User {
                id: SEED_USER_ID.to_string(),
                username: SEED_USERNAME.to_string(),
                email: SEED_EMAIL.to_string(),
                password: SEED_PASSWORD.to_string(),
                channel: Some(SEED_CHANNEL_ID.to_string()),
                liked_videos: Vec::new(),
                disliked_videos: Vec::new(),
                subscribed_channels: Vec::new(),
                watch_later: Vec::new(),
                watch_history: Vec::new(),
            },
        );
        backend.channels.insert(
            SEED_CHANNEL_ID.to_string(),
            Channel {
                id: SEED_CHANNEL_ID.to_string(),
                channel_name: "Ana's Kitchen".to_string(),
                owner: SEED_USER_ID.to_string(),
                subscribers: 0,
            },
        );
        backend.videos.insert(
            SEED_VIDEO_ID.to_string(),
            VideoRecord {
                id: SEED_VIDEO_ID.to_string(),
                title: "Knife skills".to_string(),
                video_url: "https://cdn.example.com/v1.mp4".to_string(),
                likes: 0,
                channel: SEED_CHANNEL_ID.to_string(),
            },
        );
        backend
    }

    fn view(&self, video: &VideoRecord) -> VideoView {
        VideoView {
            id: video.id.clone(),
            title: video.title.clone(),
            video_url: video.video_url.clone(),
            likes: video.likes,
            channel: self.channels.get(&video.channel).cloned(),
        }
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<String, Failure> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "Not authorized, no token"))?;
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "Not authorized, token failed"))
    }

    fn user(&self, id: &str) -> Result<&User, Failure> {
        self.users.get(id).ok_or_else(user_not_found)
    }
}

/// Error responses always carry `{"message": ...}`.
#[derive(Debug)]
pub struct Failure {
    status: StatusCode,
    message: String,
}

fn fail(status: StatusCode, message: &str) -> Failure {
    Failure {
        status,
        message: message.to_string(),
    }
}

fn video_not_found() -> Failure {
    fail(StatusCode::NOT_FOUND, "Video not found")
}

fn user_not_found() -> Failure {
    fail(StatusCode::NOT_FOUND, "User not found")
}

fn channel_not_found() -> Failure {
    fail(StatusCode::NOT_FOUND, "Channel not found")
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

type Reply = Result<Json<Value>, Failure>;

/// Flip membership of `id`; returns whether it is now present.
fn toggle(list: &mut Vec<String>, id: &str) -> bool {
    match list.iter().position(|item| item == id) {
        Some(pos) => {
            list.remove(pos);
            false
        }
        None => {
            list.push(id.to_string());
            true
        }
    }
}

fn remove(list: &mut Vec<String>, id: &str) -> bool {
    let before = list.len();
    list.retain(|item| item != id);
    list.len() != before
}

#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRef {
    pub video_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRef {
    pub channel_id: String,
}

#[derive(Deserialize)]
pub struct NewComment {
    pub text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVideo {
    pub title: String,
    pub video_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoChanges {
    pub video_id: String,
    pub title: Option<String>,
    pub video_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelFields {
    pub channel_name: String,
}

#[derive(Deserialize)]
pub struct ProfileChanges {
    pub username: Option<String>,
}

pub fn app() -> Router {
    app_with(Backend::seeded())
}

pub fn app_with(backend: Backend) -> Router {
    let db: Db = Arc::new(RwLock::new(backend));
    Router::new()
        .route("/user/login", post(login))
        .route("/register", post(register))
        .route("/user/me", get(me))
        .route("/user/delete", delete(delete_account))
        .route("/video", get(list_videos).post(create_video))
        .route("/video/{id}", get(get_video).delete(delete_video))
        .route("/api/actions/likes", post(like))
        .route("/api/actions/dislikes", post(dislike))
        .route("/api/actions/subscribe", post(subscribe))
        .route("/api/actions/watchlater", post(watch_later))
        .route(
            "/other/watchhistory",
            post(record_history).delete(remove_history),
        )
        .route("/other/watchlater", delete(remove_watch_later))
        .route("/comments/{video_id}", get(list_comments).post(post_comment))
        .route("/api/channels", get(list_channels))
        .route("/channel", post(create_channel))
        .route("/channel/{id}", get(get_channel))
        .route("/studio/updateChannel", put(update_channel))
        .route("/studio/updateProfile", put(update_profile))
        .route("/studio/updateVideo", put(update_video))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// --- auth ---

async fn login(State(db): State<Db>, Json(input): Json<Credentials>) -> Reply {
    let mut backend = db.write().await;
    let user = backend
        .users
        .values()
        .find(|u| u.email == input.email && u.password == input.password)
        .cloned()
        .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "Invalid email or password"))?;
    let token = Uuid::new_v4().to_string();
    backend.tokens.insert(token.clone(), user.id.clone());
    info!(user = %user.id, "login");
    Ok(Json(json!({ "user": user, "token": token })))
}

async fn register(
    State(db): State<Db>,
    Json(input): Json<Registration>,
) -> Result<(StatusCode, Json<Value>), Failure> {
    let mut backend = db.write().await;
    if backend.users.values().any(|u| u.email == input.email) {
        return Err(fail(StatusCode::CONFLICT, "Email already registered"));
    }
    let user = User {
        id: Uuid::new_v4().to_string(),
        username: input.username,
        email: input.email,
        password: input.password,
        channel: None,
        liked_videos: Vec::new(),
        disliked_videos: Vec::new(),
        subscribed_channels: Vec::new(),
        watch_later: Vec::new(),
        watch_history: Vec::new(),
    };
    backend.users.insert(user.id.clone(), user.clone());
    info!(user = %user.id, "registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered", "user": user })),
    ))
}

async fn me(State(db): State<Db>, headers: HeaderMap) -> Reply {
    let backend = db.read().await;
    let user_id = backend.authenticate(&headers)?;
    Ok(Json(json!({ "user": backend.user(&user_id)? })))
}

async fn delete_account(State(db): State<Db>, headers: HeaderMap) -> Reply {
    let mut guard = db.write().await;
    let backend = &mut *guard;
    let user_id = backend.authenticate(&headers)?;
    let user = backend.users.remove(&user_id).ok_or_else(user_not_found)?;
    backend.tokens.retain(|_, owner| *owner != user_id);
    if let Some(channel) = user.channel {
        backend.channels.remove(&channel);
        backend.videos.retain(|_, video| video.channel != channel);
    }
    Ok(Json(json!({ "message": "Account deleted" })))
}

async fn update_profile(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<ProfileChanges>,
) -> Reply {
    let mut guard = db.write().await;
    let backend = &mut *guard;
    let user_id = backend.authenticate(&headers)?;
    let user = backend.users.get_mut(&user_id).ok_or_else(user_not_found)?;
    if let Some(username) = input.username {
        user.username = username;
    }
    Ok(Json(json!({ "user": user })))
}

// --- videos ---

async fn list_videos(State(db): State<Db>) -> Json<Vec<VideoView>> {
    let backend = db.read().await;
    let mut videos: Vec<VideoView> = backend.videos.values().map(|v| backend.view(v)).collect();
    videos.sort_by(|a, b| a.id.cmp(&b.id));
    Json(videos)
}

async fn get_video(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<VideoView>, Failure> {
    let backend = db.read().await;
    let video = backend.videos.get(&id).ok_or_else(video_not_found)?;
    Ok(Json(backend.view(video)))
}

async fn create_video(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<NewVideo>,
) -> Result<(StatusCode, Json<VideoView>), Failure> {
    let mut backend = db.write().await;
    let user_id = backend.authenticate(&headers)?;
    let channel = backend
        .user(&user_id)?
        .channel
        .clone()
        .ok_or_else(|| fail(StatusCode::BAD_REQUEST, "Create a channel first"))?;
    let video = VideoRecord {
        id: Uuid::new_v4().to_string(),
        title: input.title,
        video_url: input.video_url,
        likes: 0,
        channel,
    };
    backend.videos.insert(video.id.clone(), video.clone());
    Ok((StatusCode::CREATED, Json(backend.view(&video))))
}

async fn update_video(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<VideoChanges>,
) -> Result<Json<VideoView>, Failure> {
    let mut guard = db.write().await;
    let backend = &mut *guard;
    let user_id = backend.authenticate(&headers)?;
    let owned = backend.user(&user_id)?.channel.clone();
    let video = backend.videos.get_mut(&input.video_id).ok_or_else(video_not_found)?;
    if owned.as_deref() != Some(video.channel.as_str()) {
        return Err(fail(StatusCode::FORBIDDEN, "Not your video"));
    }
    if let Some(title) = input.title {
        video.title = title;
    }
    if let Some(video_url) = input.video_url {
        video.video_url = video_url;
    }
    let video = video.clone();
    Ok(Json(backend.view(&video)))
}

async fn delete_video(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    let mut backend = db.write().await;
    let user_id = backend.authenticate(&headers)?;
    let owned = backend.user(&user_id)?.channel.clone();
    let video = backend.videos.get(&id).ok_or_else(video_not_found)?;
    if owned.as_deref() != Some(video.channel.as_str()) {
        return Err(fail(StatusCode::FORBIDDEN, "Not your video"));
    }
    backend.videos.remove(&id);
    backend.comments.remove(&id);
    Ok(Json(json!({ "message": "Video deleted" })))
}

// --- actions ---

async fn like(State(db): State<Db>, headers: HeaderMap, Json(input): Json<VideoRef>) -> Reply {
    let mut guard = db.write().await;
    let backend = &mut *guard;
    let user_id = backend.authenticate(&headers)?;
    let video = backend.videos.get_mut(&input.video_id).ok_or_else(video_not_found)?;
    let user = backend.users.get_mut(&user_id).ok_or_else(user_not_found)?;
    if toggle(&mut user.liked_videos, &video.id) {
        video.likes += 1;
        remove(&mut user.disliked_videos, &video.id);
    } else {
        video.likes -= 1;
    }
    let (user, video) = (user.clone(), video.clone());
    Ok(Json(json!({ "user": user, "video": backend.view(&video) })))
}

async fn dislike(State(db): State<Db>, headers: HeaderMap, Json(input): Json<VideoRef>) -> Reply {
    let mut guard = db.write().await;
    let backend = &mut *guard;
    let user_id = backend.authenticate(&headers)?;
    let video = backend.videos.get_mut(&input.video_id).ok_or_else(video_not_found)?;
    let user = backend.users.get_mut(&user_id).ok_or_else(user_not_found)?;
    if toggle(&mut user.disliked_videos, &video.id) && remove(&mut user.liked_videos, &video.id) {
        video.likes -= 1;
    }
    let (user, video) = (user.clone(), video.clone());
    Ok(Json(json!({ "user": user, "video": backend.view(&video) })))
}

async fn subscribe(State(db): State<Db>, headers: HeaderMap, Json(input): Json<ChannelRef>) -> Reply {
    let mut guard = db.write().await;
    let backend = &mut *guard;
    let user_id = backend.authenticate(&headers)?;
    let channel = backend
        .channels
        .get_mut(&input.channel_id)
        .ok_or_else(channel_not_found)?;
    let user = backend.users.get_mut(&user_id).ok_or_else(user_not_found)?;
    if toggle(&mut user.subscribed_channels, &channel.id) {
        channel.subscribers += 1;
    } else {
        channel.subscribers -= 1;
    }
    Ok(Json(json!({ "user": user, "channel": channel })))
}

async fn watch_later(State(db): State<Db>, headers: HeaderMap, Json(input): Json<VideoRef>) -> Reply {
    let mut guard = db.write().await;
    let backend = &mut *guard;
    let user_id = backend.authenticate(&headers)?;
    if !backend.videos.contains_key(&input.video_id) {
        return Err(video_not_found());
    }
    let user = backend.users.get_mut(&user_id).ok_or_else(user_not_found)?;
    toggle(&mut user.watch_later, &input.video_id);
    Ok(Json(json!({ "user": user })))
}

async fn record_history(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<VideoRef>,
) -> Reply {
    let mut guard = db.write().await;
    let backend = &mut *guard;
    let user_id = backend.authenticate(&headers)?;
    if !backend.videos.contains_key(&input.video_id) {
        return Err(video_not_found());
    }
    backend.clock += 1;
    let user = backend.users.get_mut(&user_id).ok_or_else(user_not_found)?;
    // Most recent view only.
    user.watch_history.retain(|entry| entry.video != input.video_id);
    user.watch_history.push(HistoryEntry {
        video: input.video_id,
        watched_at: backend.clock,
    });
    Ok(Json(json!({ "user": user })))
}

async fn remove_history(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<VideoRef>,
) -> Reply {
    let mut guard = db.write().await;
    let backend = &mut *guard;
    let user_id = backend.authenticate(&headers)?;
    let user = backend.users.get_mut(&user_id).ok_or_else(user_not_found)?;
    user.watch_history.retain(|entry| entry.video != input.video_id);
    Ok(Json(json!({ "user": user })))
}

async fn remove_watch_later(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<VideoRef>,
) -> Reply {
    let mut guard = db.write().await;
    let backend = &mut *guard;
    let user_id = backend.authenticate(&headers)?;
    let user = backend.users.get_mut(&user_id).ok_or_else(user_not_found)?;
    remove(&mut user.watch_later, &input.video_id);
    Ok(Json(json!({ "user": user })))
}

// --- comments ---

async fn list_comments(
    State(db): State<Db>,
    Path(video_id): Path<String>,
) -> Result<Json<Vec<Comment>>, Failure> {
    let backend = db.read().await;
    if !backend.videos.contains_key(&video_id) {
        return Err(video_not_found());
    }
    Ok(Json(backend.comments.get(&video_id).cloned().unwrap_or_default()))
}

async fn post_comment(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(video_id): Path<String>,
    Json(input): Json<NewComment>,
) -> Result<(StatusCode, Json<Comment>), Failure> {
    let mut backend = db.write().await;
    let user_id = backend.authenticate(&headers)?;
    if !backend.videos.contains_key(&video_id) {
        return Err(video_not_found());
    }
    if input.text.trim().is_empty() {
        return Err(fail(StatusCode::BAD_REQUEST, "Comment text is required"));
    }
    let user = backend.user(&user_id)?;
    let comment = Comment {
        id: Uuid::new_v4().to_string(),
        text: input.text,
        user: CommentAuthor {
            id: user.id.clone(),
            username: user.username.clone(),
        },
        video: video_id.clone(),
    };
    backend
        .comments
        .entry(video_id)
        .or_default()
        .push(comment.clone());
    Ok((StatusCode::CREATED, Json(comment)))
}

// --- channels ---

async fn list_channels(State(db): State<Db>) -> Json<Vec<Channel>> {
    let backend = db.read().await;
    let mut channels: Vec<Channel> = backend.channels.values().cloned().collect();
    channels.sort_by(|a, b| a.id.cmp(&b.id));
    Json(channels)
}

async fn get_channel(State(db): State<Db>, Path(id): Path<String>) -> Reply {
    let backend = db.read().await;
    let channel = backend.channels.get(&id).ok_or_else(channel_not_found)?;
    let videos: Vec<VideoView> = backend
        .videos
        .values()
        .filter(|video| video.channel == id)
        .map(|video| backend.view(video))
        .collect();
    Ok(Json(json!({ "channel": channel, "videos": videos })))
}

async fn create_channel(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<ChannelFields>,
) -> Result<(StatusCode, Json<Value>), Failure> {
    let mut guard = db.write().await;
    let backend = &mut *guard;
    let user_id = backend.authenticate(&headers)?;
    let user = backend.users.get_mut(&user_id).ok_or_else(user_not_found)?;
    if user.channel.is_some() {
        return Err(fail(StatusCode::BAD_REQUEST, "User already has a channel"));
    }
    let channel = Channel {
        id: Uuid::new_v4().to_string(),
        channel_name: input.channel_name,
        owner: user_id,
        subscribers: 0,
    };
    user.channel = Some(channel.id.clone());
    let user = user.clone();
    backend.channels.insert(channel.id.clone(), channel.clone());
    Ok((
        StatusCode::CREATED,
        Json(json!({ "channel": channel, "user": user })),
    ))
}

async fn update_channel(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<ChannelFields>,
) -> Reply {
    let mut guard = db.write().await;
    let backend = &mut *guard;
    let user_id = backend.authenticate(&headers)?;
    let channel_id = backend
        .user(&user_id)?
        .channel
        .clone()
        .ok_or_else(channel_not_found)?;
    let channel = backend.channels.get_mut(&channel_id).ok_or_else(channel_not_found)?;
    channel.channel_name = input.channel_name;
    Ok(Json(json!({ "channel": channel })))
}
