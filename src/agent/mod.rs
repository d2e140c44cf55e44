//! Agent
//!
//! Application-facing layer over the conductor:
//! - Literal message-type routes
//! - Versioned protocol modules with closest-compatible resolution
//! - Run loop with bounded or unbounded message processing

pub mod module;
pub mod runner;

pub use module::{handler, Handler, Module, ModuleInfo, ModuleRegistry, ModuleRoutes, RegisteredModule};
pub use runner::Agent;
