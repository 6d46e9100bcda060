//! Descriptor-driven fetching on top of `Command`.
//!
//! `FetchHook::set_descriptor` is the reactive entry point: feed it the
//! current descriptor every time the consumer's inputs change and it starts
//! exactly one execution per distinct value. The trigger convention falls
//! out of this: set an action descriptor, observe the settlement, then reset
//! to `RequestDescriptor::none()` so the next identical action counts as a
//! change again.

use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;

use crate::command::{Command, Execution, FetchState};
use crate::config::BaseUrl;
use crate::descriptor::RequestDescriptor;
use crate::transport::Transport;

pub struct FetchHook<T: Transport> {
    command: Command<T>,
    current: Mutex<RequestDescriptor>,
    last_active: Mutex<Option<RequestDescriptor>>,
}

impl<T: Transport> FetchHook<T> {
    pub fn new(transport: T, base_url: BaseUrl) -> Self {
        Self::from_command(Command::with_label(transport, base_url, "fetch-hook"))
    }

    pub fn from_command(command: Command<T>) -> Self {
        Self {
            command,
            current: Mutex::new(RequestDescriptor::none()),
            last_active: Mutex::new(None),
        }
    }

    /// Observe a new descriptor.
    ///
    /// Returns the started execution, or `None` when nothing started: the
    /// descriptor equals the previous one, or it is idle. Going idle
    /// supersedes whatever was in flight.
    pub fn set_descriptor(&self, descriptor: RequestDescriptor) -> Option<Execution> {
        // Held until the execution has begun, so the current descriptor and
        // the newest generation always belong together.
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == descriptor {
            return None;
        }

        if descriptor.is_idle() {
            *current = descriptor;
            self.command.supersede();
            return None;
        }

        let execution = self.command.invoke(&descriptor);
        *self.last_active.lock().unwrap_or_else(PoisonError::into_inner) = Some(descriptor.clone());
        *current = descriptor;
        Some(execution)
    }

    /// Shorthand for `set_descriptor(RequestDescriptor::none())`.
    pub fn reset(&self) {
        // Going idle never yields an execution.
        let _ = self.set_descriptor(RequestDescriptor::none());
    }

    /// Re-run the last non-idle descriptor, whether or not it is still
    /// current. `None` if nothing ever ran.
    pub fn refetch(&self) -> Option<Execution> {
        let _current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let last = self
            .last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;
        Some(self.command.invoke(&last))
    }

    pub fn descriptor(&self) -> RequestDescriptor {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn state(&self) -> FetchState {
        self.command.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.command.subscribe()
    }

    pub fn teardown(&self) {
        self.command.teardown();
    }
}
