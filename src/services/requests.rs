//! Requests awaiting a backend answer
//!
//! Each request gets a oneshot channel. The transport settles it when the
//! answer arrives; [`PendingRequests::expire`] settles whatever outlived its
//! deadline with [`RequestError::Timeout`].

use crate::config::SyncOptions;
use crate::services::logging::LogContext;
use crate::services::time_source::{SharedTimeSource, TimeSource};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// No answer before the deadline
    Timeout,
    /// Dropped before an answer, e.g. on disconnect
    Cancelled,
    /// The backend answered with an error
    Failed(String),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Timeout => write!(f, "request timed out"),
            RequestError::Cancelled => write!(f, "request cancelled"),
            RequestError::Failed(msg) => write!(f, "request failed: {msg}"),
        }
    }
}

impl std::error::Error for RequestError {}

pub type RequestResult<T> = Result<T, RequestError>;

struct Pending<T> {
    kind: String,
    deadline: Instant,
    sender: oneshot::Sender<RequestResult<T>>,
}

pub struct PendingRequests<T> {
    pending: HashMap<RequestId, Pending<T>>,
    next_id: u64,
    timeout: Duration,
    clock: SharedTimeSource,
    log: LogContext,
}

impl<T> fmt::Debug for PendingRequests<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequests")
            .field("pending", &self.pending.len())
            .field("timeout", &self.timeout)
            .field("clock", &self.clock)
            .finish()
    }
}

impl<T> PendingRequests<T> {
    pub fn new(options: &SyncOptions, clock: SharedTimeSource, log: &LogContext) -> Self {
        Self {
            pending: HashMap::new(),
            next_id: 0,
            timeout: Duration::from_millis(options.request_timeout_ms),
            clock,
            log: log.child("requests"),
        }
    }

    /// Track a new request; the receiver yields its outcome
    pub fn register(&mut self, kind: &str) -> (RequestId, oneshot::Receiver<RequestResult<T>>) {
        let id = RequestId(self.next_id);
        self.next_id += 1;

        let (sender, receiver) = oneshot::channel();
        let deadline = self.clock.now() + self.timeout;
        self.pending.insert(
            id,
            Pending {
                kind: kind.to_string(),
                deadline,
                sender,
            },
        );
        tracing::trace!(parent: self.log.span(), "request {} ({}) sent", id, kind);
        (id, receiver)
    }

    /// Deliver the answer to request `id`. Returns false for unknown or
    /// already settled ids.
    pub fn settle(&mut self, id: RequestId, result: RequestResult<T>) -> bool {
        let Some(pending) = self.pending.remove(&id) else {
            tracing::debug!(parent: self.log.span(), "answer for unknown request {}", id);
            return false;
        };
        // the requester may have stopped waiting
        let _ = pending.sender.send(result);
        true
    }

    /// Settle every request whose deadline is at or before `now` with a timeout.
    ///
    /// Returns how many requests expired.
    pub fn expire(&mut self, now: Instant) -> usize {
        let expired: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            if let Some(pending) = self.pending.remove(id) {
                tracing::warn!(
                    parent: self.log.span(),
                    "request {} ({}) timed out",
                    id,
                    pending.kind
                );
                let _ = pending.sender.send(Err(RequestError::Timeout));
            }
        }
        expired.len()
    }

    /// [`expire`](Self::expire) against the configured clock
    pub fn expire_now(&mut self) -> usize {
        let now = self.clock.now();
        self.expire(now)
    }

    /// Settle everything with [`RequestError::Cancelled`]
    pub fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            let _ = pending.sender.send(Err(RequestError::Cancelled));
        }
    }

    /// Earliest deadline among outstanding requests
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
