//! # Pantry
//!
//! Named reactive stores for Rust.
//!
//! Pantry lets an application define stores holding mutable state, derived
//! values and operations, and share a single live instance of each store
//! through a [`Registry`].
//!
//! ## Stores
//!
//! - [`define_store`] / [`define_setup_store`] - Declare a store once
//! - [`Store`] - The live instance: `patch`, `subscribe`, `on_action`, `dispose`
//! - [`Registry`] - One instance and one state slice per identifier, plugins
//!
//! ## Signals (Low-level primitives)
//!
//! The reactive engine the stores are built on:
//! - [`Signal<T>`] - Reactive values that notify dependents when changed
//! - [`Computed<T>`] - Cached values that automatically track dependencies
//! - [`Effect`] and [`watch`] - Side effects that run when dependencies change
//! - [`runtime::EffectScope`] - Stops every watcher created inside it at once

pub mod error;
pub mod runtime;
pub mod signal;
pub mod store;

// Re-export main types for convenience
pub use error::{ActionError, StoreError};
pub use signal::{
    create_effect, create_memo, watch, Computed, Effect, Signal, WatchHandle, WatchOptions,
};
pub use store::{
    define_setup_store, define_store, ActionContext, ActionOutput, ActionReturn, ReactiveObject,
    Registry, SetupField, SetupOutput, Store, StoreDefinition, StoreOptions, StoreSource,
    Unsubscribe,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_works() {
        // Basic smoke test
        let registry = Registry::new();
        let counter = define_store("counter", StoreOptions::new().state(|| json!({ "count": 0 })));
        let store = counter.use_store(&registry).expect("store builds");
        assert_eq!(store.get("count"), Some(json!(0)));
        store.set("count", json!(42));
        assert_eq!(store.get("count"), Some(json!(42)));
    }
}
