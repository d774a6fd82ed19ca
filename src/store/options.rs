use super::action::{async_action, sync_action, ActionFn};
use super::builder::{SetupFn, SetupOutput};
use super::registry::Registry;
use super::state::ReactiveObject;
use super::store::Store;
use crate::error::ActionError;
use crate::signal::Computed;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;

/// Produces the initial state of an options store. Expected to return a
/// JSON object.
pub type StateFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// A getter of an options store. Receives the live store instance.
pub type GetterFn = Arc<dyn Fn(&Store) -> Value + Send + Sync>;

/// Options-style store description: a state factory, operations and
/// getters.
///
/// ```
/// use pantry::{define_store, Registry, StoreOptions};
/// use serde_json::{json, Value};
///
/// let counter = define_store(
///     "counter",
///     StoreOptions::new()
///         .state(|| json!({ "count": 1 }))
///         .getter("double", |store| json!(store.get("count").and_then(|c| c.as_i64()).unwrap_or(0) * 2))
///         .action("increment", |store, _args| {
///             let count = store.get("count").and_then(|c| c.as_i64()).unwrap_or(0);
///             store.set("count", json!(count + 1));
///             Ok(Value::Null)
///         }),
/// );
///
/// let registry = Registry::new();
/// let store = counter.use_store(&registry).unwrap();
/// store.call("increment", &[]).unwrap();
/// assert_eq!(store.get("double"), Some(json!(4)));
/// ```
#[derive(Clone, Default)]
pub struct StoreOptions {
    pub(crate) id: Option<String>,
    state: Option<StateFactory>,
    actions: Vec<(String, ActionFn)>,
    getters: Vec<(String, GetterFn)>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed the store identifier in the options.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn state<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.state = Some(Arc::new(factory));
        self
    }

    pub fn action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Store, &[Value]) -> Result<Value, ActionError> + Send + Sync + 'static,
    {
        self.actions.push((name.into(), sync_action(action)));
        self
    }

    pub fn async_action<F, Fut>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(Store, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        self.actions.push((name.into(), async_action(action)));
        self
    }

    pub fn action_fn(mut self, name: impl Into<String>, action: ActionFn) -> Self {
        self.actions.push((name.into(), action));
        self
    }

    pub fn getter<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&Store) -> Value + Send + Sync + 'static,
    {
        self.getters.push((name.into(), Arc::new(getter)));
        self
    }

    pub(crate) fn state_factory(&self) -> Option<StateFactory> {
        self.state.clone()
    }

    /// Turn the description into a setup procedure for `id`.
    ///
    /// The procedure writes a fresh factory result into the registry slice
    /// (creating it on first use), exposes each slice field as a state
    /// entry, passes the operations through and wraps each getter in a
    /// [`Computed`] that reads the registered store instance.
    pub(crate) fn into_setup(self, id: &str) -> SetupFn {
        let id = id.to_string();
        let StoreOptions {
            state,
            actions,
            getters,
            ..
        } = self;

        Arc::new(move |registry: &Registry| -> anyhow::Result<SetupOutput> {
            let initial = initial_state(state.as_ref());
            let slice = match registry.state(&id) {
                Some(existing) => {
                    existing.assign(initial);
                    existing
                }
                None => {
                    let slice = ReactiveObject::from_map(initial);
                    registry.install_state(&id, slice.clone());
                    slice
                }
            };

            let mut output = SetupOutput::new();
            for (key, cell) in slice.fields() {
                output = output.state_ref(key, cell);
            }
            for (name, action) in &actions {
                output = output.action_fn(name.clone(), Arc::clone(action));
            }
            for (name, getter) in &getters {
                let registry = registry.downgrade();
                let id = id.clone();
                let getter = Arc::clone(getter);
                let derived = Computed::new(move || {
                    registry
                        .upgrade()
                        .and_then(|registry| registry.store(&id))
                        .map(|store| getter(&store))
                        .unwrap_or(Value::Null)
                });
                output = output.derived(name.clone(), derived);
            }
            Ok(output)
        })
    }
}

/// Run the state factory, falling back to an empty object.
pub(crate) fn initial_state(factory: Option<&StateFactory>) -> Map<String, Value> {
    match factory.map(|factory| factory()) {
        None => Map::new(),
        Some(Value::Object(map)) => map,
        Some(other) => {
            tracing::warn!(value = %other, "state factory did not return an object; using {{}}");
            Map::new()
        }
    }
}
