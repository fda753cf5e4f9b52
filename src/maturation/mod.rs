//! Conversation maturation: pairwise scripted exchanges between messaging
//! endpoints, run in timed rounds.

pub mod dispatcher;
pub mod pairing;
pub mod progress;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod script;
pub mod service;
pub mod throttle;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::Dispatcher;
pub use progress::{LogEntry, LogLevel, ProgressSink, ProgressSnapshot, ProgressStore};
pub use registry::{RunRegistry, StopSignal};
pub use resolver::{EndpointResolver, ResolveError};
pub use service::{MaturationService, RunOutcome, StartAck, StartRequest};
pub use types::{Endpoint, RunSettings, RunStats, RunStatus};
