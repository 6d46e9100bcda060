//! Application-wide state: the session slice and the video list slice.
//!
//! The store is the only writer of `AppState`. Consumers mutate it through
//! the methods below and observe it through `subscribe`.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::VideoApi;
use crate::command::{Command, Settlement};
use crate::transport::Transport;
use crate::types::{decode, Session, UserRecord, Video};

pub const VIDEOS_ERROR: &str = "Failed to fetch videos";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<UserRecord>,
    pub token: Option<String>,
    pub loading: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoListState {
    pub videos: Vec<Video>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub auth: AuthState,
    pub videos: VideoListState,
}

impl AppState {
    pub fn is_authenticated(&self) -> bool {
        self.auth.user.is_some()
    }
}

pub struct AppStore {
    state: watch::Sender<AppState>,
    /// Bumped by every `load_videos`; only the newest load may end the
    /// pending state of the video slice.
    video_loads: AtomicU64,
}

impl AppStore {
    /// `token` is whatever the host persisted from an earlier session; the
    /// user stays unknown until the session is confirmed.
    pub fn new(token: Option<String>) -> Self {
        let (state, _) = watch::channel(AppState {
            auth: AuthState {
                token,
                ..AuthState::default()
            },
            ..AppState::default()
        });
        Self {
            state,
            video_loads: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> AppState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<UserRecord> {
        self.state.borrow().auth.user.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().auth.token.clone()
    }

    /// Endpoint builder carrying the current token.
    pub fn api(&self) -> VideoApi {
        VideoApi::new(self.token())
    }

    pub fn set_session(&self, session: Session) {
        info!(user = session.user.id().unwrap_or_default(), "session established");
        self.state.send_modify(|state| {
            state.auth.user = Some(session.user);
            state.auth.token = Some(session.token);
            state.auth.loading = false;
        });
    }

    pub fn clear_session(&self) {
        info!("session cleared");
        self.state.send_modify(|state| {
            state.auth = AuthState::default();
        });
    }

    /// Shallow-merge `patch` into the signed-in user. Returns `false`, and
    /// changes nothing, when there is no user.
    pub fn update_user(&self, patch: UserRecord) -> bool {
        self.state.send_if_modified(|state| match state.auth.user.as_mut() {
            Some(user) => {
                user.merge(patch);
                true
            }
            None => {
                debug!("ignoring user patch without a session");
                false
            }
        })
    }

    pub fn set_auth_loading(&self, loading: bool) {
        self.state.send_if_modified(|state| {
            let changed = state.auth.loading != loading;
            state.auth.loading = loading;
            changed
        });
    }

    /// Fetch `/video` through `command` and record the outcome in the video
    /// slice. Only the newest load writes the slice. A load that is
    /// superseded, skipped or dropped mid-flight ends the pending state
    /// without touching the list or the error.
    pub async fn load_videos<T: Transport>(&self, command: &Command<T>) -> Settlement {
        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = self.video_loads.fetch_add(1, Ordering::AcqRel) + 1;
            state.videos.loading = true;
            state.videos.error = None;
        });
        let load = VideoLoad {
            store: self,
            generation,
            outcome: LoadOutcome::Abandoned,
        };

        let settlement = command.invoke(&self.api().list_videos()).await;
        let outcome = match &settlement {
            Settlement::Success(value) => match decode::<Vec<Video>>(value.clone()) {
                Ok(videos) => LoadOutcome::Fulfilled(videos),
                Err(err) => {
                    warn!(error = %err, "video list has an unexpected shape");
                    LoadOutcome::Rejected
                }
            },
            Settlement::Failure(_) => LoadOutcome::Rejected,
            Settlement::Superseded | Settlement::Skipped => LoadOutcome::Abandoned,
        };
        load.finish(outcome);
        settlement
    }

    fn end_video_load(&self, generation: u64, outcome: LoadOutcome) {
        self.state.send_if_modified(|state| {
            if self.video_loads.load(Ordering::Acquire) != generation {
                return false;
            }
            state.videos.loading = false;
            match outcome {
                LoadOutcome::Fulfilled(videos) => state.videos.videos = videos,
                LoadOutcome::Rejected => state.videos.error = Some(VIDEOS_ERROR.to_string()),
                LoadOutcome::Abandoned => {}
            }
            true
        });
    }
}

enum LoadOutcome {
    Fulfilled(Vec<Video>),
    Rejected,
    Abandoned,
}

/// A pending video-list load. Ends the slice's pending state on drop, so a
/// cancelled `load_videos` future cannot leave it loading.
struct VideoLoad<'a> {
    store: &'a AppStore,
    generation: u64,
    outcome: LoadOutcome,
}

impl VideoLoad<'_> {
    fn finish(mut self, outcome: LoadOutcome) {
        self.outcome = outcome;
    }
}

impl Drop for VideoLoad<'_> {
    fn drop(&mut self) {
        let outcome = std::mem::replace(&mut self.outcome, LoadOutcome::Abandoned);
        self.store.end_video_load(self.generation, outcome);
    }
}
