//! Conductor
//!
//! Message transport and routing engine:
//! - Inbound queue feeding the agent's run loop
//! - Per-connection readers implementing the return-route protocol
//! - Reuse-or-open-or-queue outbound delivery
//! - Drain-then-cancel shutdown

pub mod engine;
pub mod pending;
pub mod queue;

pub use engine::{Conductor, SendOutcome};
pub use pending::{PendingMessage, PendingQueues};
pub use queue::MessageQueue;
