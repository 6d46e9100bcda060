//! Domain DTOs for the video-sharing API.
//!
//! # Design
//! The user record stays an open JSON object because the store merges
//! server-sent patches into it field by field, and the server decides which
//! fields a patch carries. Videos, channels and comments are typed on the
//! fields the client reads and keep everything else in `extra`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;

pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

/// The signed-in user as last reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord(pub Map<String, Value>);

impl UserRecord {
    pub fn id(&self) -> Option<&str> {
        self.0.get("_id").and_then(Value::as_str)
    }

    pub fn username(&self) -> Option<&str> {
        self.0.get("username").and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Shallow merge: every top-level field in `patch` replaces ours.
    pub fn merge(&mut self, patch: UserRecord) {
        self.0.extend(patch.0);
    }

    pub fn has_liked(&self, video_id: &str) -> bool {
        self.references("likedVideos", video_id)
    }

    pub fn has_disliked(&self, video_id: &str) -> bool {
        self.references("dislikedVideos", video_id)
    }

    pub fn is_subscribed(&self, channel_id: &str) -> bool {
        self.references("subscribedChannels", channel_id)
    }

    pub fn in_watch_later(&self, video_id: &str) -> bool {
        self.references("watchLater", video_id)
    }

    // Lists hold either bare ids or populated documents.
    fn references(&self, field: &str, id: &str) -> bool {
        let Some(Value::Array(items)) = self.0.get(field) else {
            return false;
        };
        items.iter().any(|item| match item {
            Value::String(s) => s == id,
            Value::Object(doc) => doc.get("_id").and_then(Value::as_str) == Some(id),
            _ => false,
        })
    }
}

impl From<Map<String, Value>> for UserRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: UserRecord,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub channel_name: Option<String>,
    #[serde(default)]
    pub subscribers: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub channel: Option<ChannelSummary>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub user: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body returned by the like/dislike/subscribe/watch-later endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub user: Option<UserRecord>,
    #[serde(default)]
    pub video: Option<Value>,
}

impl ActionResponse {
    pub fn video_likes(&self) -> Option<i64> {
        self.video.as_ref()?.get("likes")?.as_i64()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}
