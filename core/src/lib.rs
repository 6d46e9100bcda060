//! Client core for a video-sharing web application.
//!
//! # Overview
//! Requests are described as `RequestDescriptor` values and executed through
//! an injected `Transport`. A `Command` runs them with a single-flight
//! guarantee: only the newest execution may commit its outcome, and nothing
//! commits after teardown. `FetchHook` layers descriptor tracking on top, so
//! a consumer can feed it the current descriptor on every change and get one
//! execution per distinct value.
//!
//! # Design
//! - Outcomes are exposed as an observable `FetchState` (`tokio::sync::watch`).
//! - Failures are normalized into a single user-facing message; see
//!   `ApiError::user_message`.
//! - The hook never writes global state. `AppStore` is updated by consumers,
//!   such as `VideoPage`, after they await an execution.

pub mod api;
pub mod command;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod hook;
pub mod http;
pub mod store;
pub mod transport;
pub mod types;
pub mod video_page;

pub use api::VideoApi;
pub use command::{Command, Execution, FetchState, Settlement, Status};
pub use config::{BaseUrl, Config, ConfigError};
pub use descriptor::{bearer_headers, Headers, RequestDescriptor};
pub use error::{ApiError, TransportError, GENERIC_ERROR};
pub use hook::FetchHook;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use store::{AppState, AppStore, AuthState, VideoListState};
pub use transport::{Transport, UreqTransport};
pub use types::{ActionResponse, ChannelSummary, Comment, Session, UserRecord, Video};
pub use video_page::{Action, ActionError, ActionOutcome, VideoPage};
