//! Core module - request normalization and dispatch.
//!
//! - Tool input normalization into canonical action requests
//! - Per-call dispatch against a broker channel

pub mod dispatch;
pub mod request;

pub use dispatch::{DispatchResult, DispatchState, Dispatcher, Lifecycle};
pub use request::{normalize, ActionRequest, ToolInput};
