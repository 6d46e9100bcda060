//! Descriptor builders for every endpoint the client calls.
//!
//! # Design
//! `VideoApi` holds only an optional bearer token. Each method returns a
//! `RequestDescriptor` with a base-relative target; the command executing it
//! supplies the base URL. Authenticated endpoints carry the
//! `Authorization` header only when a token is present, and the server is
//! left to reject the request otherwise.

use serde::Serialize;
use serde_json::{json, Value};

use crate::descriptor::RequestDescriptor;
use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::types::{LoginRequest, RegisterRequest};

#[derive(Debug, Clone, Default)]
pub struct VideoApi {
    token: Option<String>,
}

impl VideoApi {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn public(&self, method: HttpMethod, target: String) -> RequestDescriptor {
        RequestDescriptor::new(method, target)
    }

    fn authed(&self, method: HttpMethod, target: String) -> RequestDescriptor {
        let descriptor = RequestDescriptor::new(method, target);
        match &self.token {
            Some(token) => descriptor.with_bearer(token),
            None => descriptor,
        }
    }

    // --- auth ---

    pub fn login(&self, input: &LoginRequest) -> Result<RequestDescriptor, ApiError> {
        Ok(self
            .public(HttpMethod::Post, "/user/login".into())
            .with_body(to_body(input)?))
    }

    pub fn register(&self, input: &RegisterRequest) -> Result<RequestDescriptor, ApiError> {
        Ok(self
            .public(HttpMethod::Post, "/register".into())
            .with_body(to_body(input)?))
    }

    pub fn me(&self) -> RequestDescriptor {
        self.authed(HttpMethod::Get, "/user/me".into())
    }

    pub fn delete_account(&self) -> RequestDescriptor {
        self.authed(HttpMethod::Delete, "/user/delete".into())
    }

    pub fn update_profile(&self, fields: Value) -> RequestDescriptor {
        self.authed(HttpMethod::Put, "/studio/updateProfile".into())
            .with_body(fields)
    }

    // --- videos ---

    pub fn list_videos(&self) -> RequestDescriptor {
        self.public(HttpMethod::Get, "/video".into())
    }

    pub fn get_video(&self, video_id: &str) -> RequestDescriptor {
        self.public(HttpMethod::Get, format!("/video/{video_id}"))
    }

    pub fn create_video(&self, fields: Value) -> RequestDescriptor {
        self.authed(HttpMethod::Post, "/video".into()).with_body(fields)
    }

    pub fn update_video(&self, fields: Value) -> RequestDescriptor {
        self.authed(HttpMethod::Put, "/studio/updateVideo".into())
            .with_body(fields)
    }

    pub fn delete_video(&self, video_id: &str) -> RequestDescriptor {
        self.authed(HttpMethod::Delete, format!("/video/{video_id}"))
    }

    // --- actions ---

    pub fn like(&self, video_id: &str) -> RequestDescriptor {
        self.authed(HttpMethod::Post, "/api/actions/likes".into())
            .with_body(json!({ "videoId": video_id }))
    }

    pub fn dislike(&self, video_id: &str) -> RequestDescriptor {
        self.authed(HttpMethod::Post, "/api/actions/dislikes".into())
            .with_body(json!({ "videoId": video_id }))
    }

    pub fn subscribe(&self, channel_id: &str) -> RequestDescriptor {
        self.authed(HttpMethod::Post, "/api/actions/subscribe".into())
            .with_body(json!({ "channelId": channel_id }))
    }

    pub fn watch_later(&self, video_id: &str) -> RequestDescriptor {
        self.authed(HttpMethod::Post, "/api/actions/watchlater".into())
            .with_body(json!({ "videoId": video_id }))
    }

    pub fn record_watch_history(&self, video_id: &str) -> RequestDescriptor {
        self.authed(HttpMethod::Post, "/other/watchhistory".into())
            .with_body(json!({ "videoId": video_id }))
    }

    pub fn remove_watch_history(&self, video_id: &str) -> RequestDescriptor {
        self.authed(HttpMethod::Delete, "/other/watchhistory".into())
            .with_body(json!({ "videoId": video_id }))
    }

    pub fn remove_watch_later(&self, video_id: &str) -> RequestDescriptor {
        self.authed(HttpMethod::Delete, "/other/watchlater".into())
            .with_body(json!({ "videoId": video_id }))
    }

    // --- comments ---

    pub fn list_comments(&self, video_id: &str) -> RequestDescriptor {
        self.public(HttpMethod::Get, format!("/comments/{video_id}"))
    }

    pub fn post_comment(&self, video_id: &str, text: &str) -> RequestDescriptor {
        self.authed(HttpMethod::Post, format!("/comments/{video_id}"))
            .with_body(json!({ "text": text }))
    }

    // --- channels ---

    pub fn list_channels(&self) -> RequestDescriptor {
        self.public(HttpMethod::Get, "/api/channels".into())
    }

    pub fn get_channel(&self, channel_id: &str) -> RequestDescriptor {
        self.public(HttpMethod::Get, format!("/channel/{channel_id}"))
    }

    pub fn create_channel(&self, fields: Value) -> RequestDescriptor {
        self.authed(HttpMethod::Post, "/channel".into()).with_body(fields)
    }

    pub fn update_channel(&self, fields: Value) -> RequestDescriptor {
        self.authed(HttpMethod::Put, "/studio/updateChannel".into())
            .with_body(fields)
    }
}

fn to_body<S: Serialize>(input: &S) -> Result<Value, ApiError> {
    serde_json::to_value(input).map_err(|e| ApiError::Serialization(e.to_string()))
}
