//! Outbound subscribe/unsubscribe queue
//!
//! The datastore reports the first and last watcher of every entry. The
//! queue turns those reports into requests for the transport, which drains
//! them whenever it is ready to talk to the backend.

use crate::model::datastore::{Datastore, DatastoreEvent};
use crate::services::events::SubscriptionId;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A request for the backend, carrying the entry's server id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionRequest {
    Subscribe(String),
    Unsubscribe(String),
}

impl SubscriptionRequest {
    pub fn server_id(&self) -> &str {
        match self {
            SubscriptionRequest::Subscribe(id) | SubscriptionRequest::Unsubscribe(id) => id,
        }
    }
}

#[derive(Debug)]
pub struct SubscriptionQueue {
    pending: Rc<RefCell<VecDeque<SubscriptionRequest>>>,
    subscription: Option<SubscriptionId>,
}

impl SubscriptionQueue {
    /// Start listening to `datastore`'s watch events.
    ///
    /// Clearing the datastore queues an `Unsubscribe` for every entry that
    /// was still watched. Requests already queued stay queued.
    pub fn attach(datastore: &mut Datastore) -> Self {
        let pending = Rc::new(RefCell::new(VecDeque::new()));
        let sink = pending.clone();
        let subscription = datastore.subscribe(move |event| {
            let mut queue = sink.borrow_mut();
            match event {
                DatastoreEvent::StartWatching { server_id, .. } => {
                    queue.push_back(SubscriptionRequest::Subscribe(server_id.clone()))
                }
                DatastoreEvent::StopWatching { server_id, .. } => {
                    queue.push_back(SubscriptionRequest::Unsubscribe(server_id.clone()))
                }
                DatastoreEvent::Cleared | DatastoreEvent::Ready => {}
            }
        });
        Self {
            pending,
            subscription: Some(subscription),
        }
    }

    /// Stop listening. Already queued requests stay available to `drain`.
    pub fn detach(&mut self, datastore: &mut Datastore) -> bool {
        self.subscription
            .take()
            .is_some_and(|id| datastore.unsubscribe(id))
    }

    /// Hand every queued request over, oldest first
    pub fn drain(&self) -> Vec<SubscriptionRequest> {
        self.pending.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }
}
