//! Cross-cutting services
//!
//! Backend synchronization plumbing, clocks, events and logging.

pub mod catalogue;
pub mod events;
pub mod logging;
pub mod requests;
pub mod subscriptions;
pub mod time_source;
pub mod tracing_setup;
