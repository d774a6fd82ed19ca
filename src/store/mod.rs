//! Named stores and the registry that owns them.
//!
//! A store is defined once with [`define_store`] (from [`StoreOptions`]) or
//! [`define_setup_store`] (from a setup procedure) and resolved against a
//! [`Registry`]. The registry keeps one live instance per identifier and
//! one state slice per identifier.

mod action;
mod builder;
mod define;
mod merge;
mod options;
mod registry;
mod state;
#[allow(clippy::module_inception)]
mod store;
mod subscriptions;

pub use action::{ActionContext, ActionFn, ActionOutput, ActionReturn};
pub use builder::{SetupField, SetupFn, SetupOutput};
pub use define::{define_setup_store, define_store, StoreDefinition, StoreSource};
pub use merge::merge;
pub use options::{GetterFn, StateFactory, StoreOptions};
pub use registry::{Plugin, Registry, WeakRegistry};
pub use state::ReactiveObject;
pub use store::Store;
pub use subscriptions::{SubscriptionList, Unsubscribe};
