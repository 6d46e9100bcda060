//! Controller behind the watch page of a single video.
//!
//! Every action owns its own `Command`, so a failing like never disturbs a
//! pending subscribe. Results are applied as continuations of the awaited
//! execution: the user patch goes into the store, and counters on the local
//! copy of the video are adjusted.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::command::{Command, FetchState, Settlement};
use crate::config::BaseUrl;
use crate::descriptor::RequestDescriptor;
use crate::error::ApiError;
use crate::store::AppStore;
use crate::transport::Transport;
use crate::types::{decode, ActionResponse, Comment, UserRecord, Video};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Like,
    Dislike,
    Subscribe,
    WatchLater,
    WatchHistory,
    Comment,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Like => "like",
            Action::Dislike => "dislike",
            Action::Subscribe => "subscribe",
            Action::WatchLater => "watch later",
            Action::WatchHistory => "watch history",
            Action::Comment => "comment",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionError {
    /// No session; nothing was sent.
    LoginRequired(Action),

    /// The action needs data from the video, which has not loaded yet.
    VideoNotLoaded,

    Failed(ApiError),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::LoginRequired(action) => write!(f, "Login to {}", action.name()),
            ActionError::VideoNotLoaded => write!(f, "video not loaded"),
            ActionError::Failed(err) => f.write_str(&err.user_message()),
        }
    }
}

impl std::error::Error for ActionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ActionError::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ApiError> for ActionError {
    fn from(err: ApiError) -> Self {
        ActionError::Failed(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied,
    /// A newer invocation of the same action took over.
    Superseded,
}

pub struct VideoPage<T: Transport + Clone> {
    video_id: String,
    store: Arc<AppStore>,
    video: Mutex<Option<Video>>,
    comments: Mutex<Vec<Comment>>,
    loader: Command<T>,
    like: Command<T>,
    dislike: Command<T>,
    subscribe: Command<T>,
    watch_later: Command<T>,
    history: Command<T>,
    comment_list: Command<T>,
    comment_post: Command<T>,
}

impl<T: Transport + Clone> VideoPage<T> {
    pub fn new(
        video_id: impl Into<String>,
        store: Arc<AppStore>,
        transport: T,
        base_url: BaseUrl,
    ) -> Self {
        let command = |label: &'static str| {
            Command::with_label(transport.clone(), base_url.clone(), label)
        };
        Self {
            video_id: video_id.into(),
            store,
            video: Mutex::new(None),
            comments: Mutex::new(Vec::new()),
            loader: command("video"),
            like: command("like"),
            dislike: command("dislike"),
            subscribe: command("subscribe"),
            watch_later: command("watch-later"),
            history: command("watch-history"),
            comment_list: command("comments"),
            comment_post: command("post-comment"),
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn video(&self) -> Option<Video> {
        self.video.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.comments.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn loading(&self) -> bool {
        self.loader.state().loading
    }

    pub fn action_state(&self, action: Action) -> FetchState {
        self.command(action).state()
    }

    fn command(&self, action: Action) -> &Command<T> {
        match action {
            Action::Like => &self.like,
            Action::Dislike => &self.dislike,
            Action::Subscribe => &self.subscribe,
            Action::WatchLater => &self.watch_later,
            Action::WatchHistory => &self.history,
            Action::Comment => &self.comment_post,
        }
    }

    /// Fetch the video and keep it as the local copy. `Ok(None)` when a
    /// newer load took over.
    pub async fn load(&self) -> Result<Option<Video>, ApiError> {
        let descriptor = self.store.api().get_video(&self.video_id);
        match self.loader.invoke(&descriptor).await {
            Settlement::Success(value) => {
                let video: Video = decode(value)?;
                *self.video.lock().unwrap_or_else(PoisonError::into_inner) = Some(video.clone());
                Ok(Some(video))
            }
            Settlement::Failure(err) => Err(err),
            Settlement::Superseded | Settlement::Skipped => Ok(None),
        }
    }

    pub async fn like(&self) -> Result<ActionOutcome, ActionError> {
        let user = self.require_user(Action::Like)?;
        let was_liked = user.has_liked(&self.video_id);
        let descriptor = self.store.api().like(&self.video_id);
        let Some(response) = self.run(Action::Like, descriptor).await? else {
            return Ok(ActionOutcome::Superseded);
        };
        self.update_video(|video| {
            video.likes = response
                .video_likes()
                .unwrap_or(if was_liked { video.likes - 1 } else { video.likes + 1 });
        });
        Ok(ActionOutcome::Applied)
    }

    pub async fn dislike(&self) -> Result<ActionOutcome, ActionError> {
        let user = self.require_user(Action::Dislike)?;
        let was_liked = user.has_liked(&self.video_id);
        let descriptor = self.store.api().dislike(&self.video_id);
        let Some(response) = self.run(Action::Dislike, descriptor).await? else {
            return Ok(ActionOutcome::Superseded);
        };
        self.update_video(|video| match response.video_likes() {
            Some(likes) => video.likes = likes,
            None if was_liked => video.likes -= 1,
            None => {}
        });
        Ok(ActionOutcome::Applied)
    }

    pub async fn subscribe(&self) -> Result<ActionOutcome, ActionError> {
        let user = self.require_user(Action::Subscribe)?;
        let channel_id = self
            .video()
            .and_then(|video| video.channel)
            .map(|channel| channel.id)
            .ok_or(ActionError::VideoNotLoaded)?;
        let was_subscribed = user.is_subscribed(&channel_id);
        let descriptor = self.store.api().subscribe(&channel_id);
        if self.run(Action::Subscribe, descriptor).await?.is_none() {
            return Ok(ActionOutcome::Superseded);
        }
        self.update_video(|video| {
            if let Some(channel) = video.channel.as_mut() {
                channel.subscribers += if was_subscribed { -1 } else { 1 };
            }
        });
        Ok(ActionOutcome::Applied)
    }

    pub async fn watch_later(&self) -> Result<ActionOutcome, ActionError> {
        self.require_user(Action::WatchLater)?;
        let descriptor = self.store.api().watch_later(&self.video_id);
        Ok(match self.run(Action::WatchLater, descriptor).await? {
            Some(_) => ActionOutcome::Applied,
            None => ActionOutcome::Superseded,
        })
    }

    /// Record this video in the signed-in user's watch history. Needs the
    /// video to be loaded.
    pub async fn record_view(&self) -> Result<ActionOutcome, ActionError> {
        self.require_user(Action::WatchHistory)?;
        if self.video().is_none() {
            return Err(ActionError::VideoNotLoaded);
        }
        let descriptor = self.store.api().record_watch_history(&self.video_id);
        Ok(match self.run(Action::WatchHistory, descriptor).await? {
            Some(_) => ActionOutcome::Applied,
            None => ActionOutcome::Superseded,
        })
    }

    pub async fn load_comments(&self) -> Result<Vec<Comment>, ApiError> {
        let descriptor = self.store.api().list_comments(&self.video_id);
        match self.comment_list.invoke(&descriptor).await {
            Settlement::Success(value) => {
                let comments: Vec<Comment> = decode(value)?;
                *self.comments.lock().unwrap_or_else(PoisonError::into_inner) = comments.clone();
                Ok(comments)
            }
            Settlement::Failure(err) => Err(err),
            Settlement::Superseded | Settlement::Skipped => Ok(self.comments()),
        }
    }

    /// Post a comment, then reload the thread.
    pub async fn post_comment(&self, text: &str) -> Result<Vec<Comment>, ActionError> {
        self.require_user(Action::Comment)?;
        let descriptor = self.store.api().post_comment(&self.video_id, text);
        match self.comment_post.invoke(&descriptor).await {
            Settlement::Failure(err) => return Err(ActionError::Failed(err)),
            Settlement::Success(_) | Settlement::Superseded | Settlement::Skipped => {}
        }
        Ok(self.load_comments().await?)
    }

    fn require_user(&self, action: Action) -> Result<UserRecord, ActionError> {
        self.store.user().ok_or(ActionError::LoginRequired(action))
    }

    /// Execute an action and merge the returned user into the store.
    async fn run(
        &self,
        action: Action,
        descriptor: RequestDescriptor,
    ) -> Result<Option<ActionResponse>, ActionError> {
        match self.command(action).invoke(&descriptor).await {
            Settlement::Success(value) => {
                let response: ActionResponse = decode(value)?;
                if let Some(user) = response.user.clone() {
                    self.store.update_user(user);
                }
                Ok(Some(response))
            }
            Settlement::Failure(err) => Err(ActionError::Failed(err)),
            Settlement::Superseded | Settlement::Skipped => Ok(None),
        }
    }

    fn update_video(&self, f: impl FnOnce(&mut Video)) {
        if let Some(video) = self
            .video
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            f(video);
        }
    }
}
