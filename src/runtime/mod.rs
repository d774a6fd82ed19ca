//! Runtime support for reactive primitives.
//!
//! This module provides the infrastructure for dependency tracking,
//! reactive graph management, batching, and disposal scopes.

mod context;
mod scope;

pub use context::ReactiveRuntime;
pub use scope::{on_scope_dispose, EffectScope};
