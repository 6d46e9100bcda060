//! Single-flight async commands.
//!
//! # Design
//! A `Command` owns one observable `FetchState` and a generation counter.
//! `invoke` is the only way to start an execution: it bumps the generation,
//! marks the state as loading and returns an `Execution` future. When that
//! future settles it commits its outcome only if its generation is still the
//! newest one and the command has not been torn down. Anything else is
//! reported back to the caller as `Settlement::Superseded` and leaves the
//! state untouched. An execution dropped before it settles clears `loading`
//! if it was still the newest one, keeping `data` and `error`.
//!
//! Generation bumps and commits both happen inside the `watch` channel's
//! modify closure, so they are serialized against each other even when
//! executions run on different worker threads.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::BaseUrl;
use crate::descriptor::RequestDescriptor;
use crate::error::ApiError;
use crate::http::HttpResponse;
use crate::transport::Transport;
use crate::types::decode;

/// What a consumer reads from a command or hook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchState {
    pub data: Option<Value>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Pending,
    Success,
    Failure,
}

impl FetchState {
    pub fn status(&self) -> Status {
        if self.loading {
            Status::Pending
        } else if self.error.is_some() {
            Status::Failure
        } else if self.data.is_some() {
            Status::Success
        } else {
            Status::Idle
        }
    }

    pub fn data_as<T: DeserializeOwned>(&self) -> Option<Result<T, ApiError>> {
        self.data.clone().map(decode)
    }
}

/// How one execution ended, from the caller's point of view.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// Committed as the command's `data`.
    Success(Value),
    /// Committed as the command's `error`.
    Failure(ApiError),
    /// A newer execution started, or the command was torn down, before this
    /// one settled. Nothing was committed.
    Superseded,
    /// The descriptor was idle; no request was made.
    Skipped,
}

impl Settlement {
    pub fn is_committed(&self) -> bool {
        matches!(self, Settlement::Success(_) | Settlement::Failure(_))
    }

    /// `None` unless the outcome was committed.
    pub fn into_result(self) -> Option<Result<Value, ApiError>> {
        match self {
            Settlement::Success(value) => Some(Ok(value)),
            Settlement::Failure(err) => Some(Err(err)),
            Settlement::Superseded | Settlement::Skipped => None,
        }
    }
}

/// A started execution. Await it, or `spawn` it onto the tokio runtime.
#[must_use = "an execution does nothing unless awaited or spawned"]
pub struct Execution {
    future: Pin<Box<dyn Future<Output = Settlement> + Send>>,
}

impl Execution {
    fn new(future: impl Future<Output = Settlement> + Send + 'static) -> Self {
        Self {
            future: Box::pin(future),
        }
    }

    fn ready(settlement: Settlement) -> Self {
        Self::new(std::future::ready(settlement))
    }

    pub fn spawn(self) -> JoinHandle<Settlement> {
        tokio::spawn(self)
    }
}

impl Future for Execution {
    type Output = Settlement;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execution").finish_non_exhaustive()
    }
}

struct Inner<T> {
    transport: T,
    base_url: BaseUrl,
    label: &'static str,
    generation: AtomicU64,
    closed: AtomicBool,
    state: watch::Sender<FetchState>,
}

impl<T> Inner<T> {
    fn begin(&self) -> Option<u64> {
        let mut started = None;
        self.state.send_if_modified(|state| {
            if self.closed.load(Ordering::Acquire) {
                return false;
            }
            started = Some(self.generation.fetch_add(1, Ordering::AcqRel) + 1);
            state.loading = true;
            state.error = None;
            true
        });
        started
    }

    fn settle(&self, generation: u64, result: Result<Value, ApiError>) -> Settlement {
        let mut committed = false;
        self.state.send_if_modified(|state| {
            if self.closed.load(Ordering::Acquire)
                || self.generation.load(Ordering::Acquire) != generation
            {
                return false;
            }
            committed = true;
            state.loading = false;
            match &result {
                Ok(value) => {
                    state.data = Some(value.clone());
                    state.error = None;
                }
                Err(err) => state.error = Some(err.user_message()),
            }
            true
        });

        if !committed {
            debug!(label = self.label, generation, "discarding stale settlement");
            return Settlement::Superseded;
        }
        match result {
            Ok(value) => {
                debug!(label = self.label, generation, "execution succeeded");
                Settlement::Success(value)
            }
            Err(err) => {
                warn!(label = self.label, generation, error = %err, "execution failed");
                Settlement::Failure(err)
            }
        }
    }

    /// The execution with `generation` was dropped before settling.
    fn abandon(&self, generation: u64) {
        let cleared = self.state.send_if_modified(|state| {
            if self.closed.load(Ordering::Acquire)
                || self.generation.load(Ordering::Acquire) != generation
            {
                return false;
            }
            let was_loading = state.loading;
            state.loading = false;
            was_loading
        });
        if cleared {
            debug!(label = self.label, generation, "execution dropped before settling");
        }
    }

    fn supersede(&self) {
        self.state.send_if_modified(|state| {
            self.generation.fetch_add(1, Ordering::AcqRel);
            let was_loading = state.loading;
            state.loading = false;
            was_loading
        });
    }

    fn close(&self) {
        self.state.send_if_modified(|_| {
            self.closed.store(true, Ordering::Release);
            self.generation.fetch_add(1, Ordering::AcqRel);
            false
        });
    }
}

/// An explicit async command with a single-flight guarantee.
///
/// Dropping the command tears it down: executions still in flight settle as
/// `Superseded` and never touch the state again.
pub struct Command<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Command<T> {
    pub fn new(transport: T, base_url: BaseUrl) -> Self {
        Self::with_label(transport, base_url, "command")
    }

    /// `label` only shows up in log events.
    pub fn with_label(transport: T, base_url: BaseUrl, label: &'static str) -> Self {
        let (state, _) = watch::channel(FetchState::default());
        Self {
            inner: Arc::new(Inner {
                transport,
                base_url,
                label,
                generation: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                state,
            }),
        }
    }

    /// Start an execution of `descriptor`, superseding any pending one.
    ///
    /// An idle descriptor settles immediately as `Skipped` and leaves the
    /// state alone.
    pub fn invoke(&self, descriptor: &RequestDescriptor) -> Execution {
        let request = match descriptor.to_request(&self.inner.base_url) {
            Ok(Some(request)) => Ok(request),
            Ok(None) => return Execution::ready(Settlement::Skipped),
            Err(err) => Err(err),
        };

        let inner = Arc::clone(&self.inner);
        let Some(generation) = inner.begin() else {
            return Execution::ready(Settlement::Superseded);
        };
        debug!(
            label = inner.label,
            generation,
            method = %descriptor.method,
            target = descriptor.target.as_deref().unwrap_or_default(),
            "execution started"
        );

        let in_flight = InFlight {
            inner,
            generation,
            settled: false,
        };
        Execution::new(async move {
            let result = match request {
                Ok(request) => in_flight
                    .inner
                    .transport
                    .perform(request)
                    .await
                    .map_err(ApiError::from)
                    .and_then(interpret),
                Err(err) => Err(err),
            };
            in_flight.settle(result)
        })
    }

    pub fn state(&self) -> FetchState {
        self.inner.state.borrow().clone()
    }

    pub fn status(&self) -> Status {
        self.inner.state.borrow().status()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.inner.state.subscribe()
    }

    /// Number of executions started so far, plus supersessions.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Drop any pending execution's claim on the state and go idle, keeping
    /// the last settled `data` and `error`.
    pub(crate) fn supersede(&self) {
        self.inner.supersede();
    }

    pub fn teardown(&self) {
        self.inner.close();
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

/// Owned by an execution's future until it settles. Dropping it unsettled
/// gives the command its idle state back.
struct InFlight<T> {
    inner: Arc<Inner<T>>,
    generation: u64,
    settled: bool,
}

impl<T> InFlight<T> {
    fn settle(mut self, result: Result<Value, ApiError>) -> Settlement {
        self.settled = true;
        self.inner.settle(self.generation, result)
    }
}

impl<T> Drop for InFlight<T> {
    fn drop(&mut self) {
        if !self.settled {
            self.inner.abandon(self.generation);
        }
    }
}

impl<T: Transport> Drop for Command<T> {
    fn drop(&mut self) {
        self.inner.close();
    }
}

/// Map a response onto a payload: non-2xx is a server error, an empty body is
/// JSON `null`, and a body that is not JSON is kept as a string.
fn interpret(response: HttpResponse) -> Result<Value, ApiError> {
    if !response.is_success() {
        return Err(ApiError::from_response(response.status, &response.body));
    }
    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&response.body).unwrap_or(Value::String(response.body)))
}
