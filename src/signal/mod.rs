//! Fine-grained reactive primitives.
//!
//! This module provides the building blocks the stores are made of:
//! - Signals: Reactive value cells
//! - Computed: Cached derived values
//! - Effects and watchers: Side effects that react to changes

mod effect;
mod memo;
mod signal;
mod watch;

pub use effect::{create_effect, Effect};
pub use memo::{create_memo, Computed};
pub use signal::Signal;
pub use watch::{watch, WatchHandle, WatchOptions};
