//! Hooks
//!
//! Ordered pre/post interception of named operations, owned per component.

pub mod registry;

pub use registry::{hooks_for, HookRegistry, HookStage, Hookable, PostHook, PreHook};
