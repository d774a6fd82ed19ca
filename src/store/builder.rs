use super::action::{async_action, sync_action, ActionFn, InterceptedAction};
use super::options::StateFactory;
use super::registry::Registry;
use super::state::ReactiveObject;
use super::store::{Member, Store};
use crate::error::{ActionError, StoreError};
use crate::runtime::ReactiveRuntime;
use crate::signal::{Computed, Signal};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// A setup procedure: builds the fields of a store.
///
/// Runs inside the store's scope with the owning registry at hand, so it
/// can resolve other stores explicitly.
pub type SetupFn = Arc<dyn Fn(&Registry) -> anyhow::Result<SetupOutput> + Send + Sync>;

/// One named entry produced by a setup procedure.
pub enum SetupField {
    /// Mutable state. Becomes a field of the store's slice.
    State(Signal<Value>),
    /// Read-only derived value.
    Derived(Computed<Value>),
    /// Read-only plain value.
    Constant(Value),
    /// Operation, routed through the store's action subscribers.
    Action(ActionFn),
}

/// The ordered fields a setup procedure returns.
#[derive(Default)]
pub struct SetupOutput {
    fields: Vec<(String, SetupField)>,
}

impl SetupOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<String>, field: SetupField) -> Self {
        self.fields.push((key.into(), field));
        self
    }

    /// A state field with a fresh cell holding `initial`.
    pub fn state(self, key: impl Into<String>, initial: impl Into<Value>) -> Self {
        self.field(key, SetupField::State(Signal::new(initial.into())))
    }

    /// A state field backed by an existing cell.
    pub fn state_ref(self, key: impl Into<String>, cell: Signal<Value>) -> Self {
        self.field(key, SetupField::State(cell))
    }

    pub fn derived(self, key: impl Into<String>, computed: Computed<Value>) -> Self {
        self.field(key, SetupField::Derived(computed))
    }

    pub fn constant(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.field(key, SetupField::Constant(value.into()))
    }

    pub fn action<F>(self, key: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Store, &[Value]) -> Result<Value, ActionError> + Send + Sync + 'static,
    {
        self.field(key, SetupField::Action(sync_action(action)))
    }

    pub fn async_action<F, Fut>(self, key: impl Into<String>, action: F) -> Self
    where
        F: Fn(Store, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        self.field(key, SetupField::Action(async_action(action)))
    }

    pub fn action_fn(self, key: impl Into<String>, action: ActionFn) -> Self {
        self.field(key, SetupField::Action(action))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Construct the store `id` from `setup` and register it in `registry`.
///
/// The store is registered before its members are installed. A slice that
/// already exists for `id` is kept and the setup's own state cells are
/// dropped in its favour. Plugins run last, inside the store's scope.
pub(crate) fn build(
    id: &str,
    setup: &SetupFn,
    registry: &Registry,
    initial_state: Option<StateFactory>,
) -> Result<Store, StoreError> {
    tracing::debug!(store = %id, "building store");
    let runtime = registry.runtime();
    let scope = registry.scope().child();
    let existed = registry.state(id).is_some();

    let output = ReactiveRuntime::with_runtime(Arc::clone(&runtime), || {
        scope.run(|| setup(registry))
    })
    .ok_or_else(|| StoreError::ScopeStopped { id: id.to_string() })?
    .map_err(|source| {
        scope.stop();
        StoreError::SetupFailure {
            id: id.to_string(),
            source,
        }
    })?;

    let (slice, origin) = resolve_slice(registry, &runtime, id, existed);
    let fresh = origin == SliceOrigin::Fresh;

    let store = Store::new(
        id,
        slice.clone(),
        scope,
        registry.downgrade(),
        Arc::downgrade(&runtime),
        initial_state,
    );
    registry.register(store.clone());

    let subscribers = store.action_subscribers();
    for (key, field) in output.fields {
        match field {
            SetupField::State(cell) => {
                if fresh {
                    slice.link(&key, cell);
                }
            }
            SetupField::Derived(computed) => store.insert_member(key, Member::Derived(computed)),
            SetupField::Constant(value) => store.insert_member(key, Member::Constant(value)),
            SetupField::Action(raw) => {
                let action = InterceptedAction::new(key.clone(), raw, subscribers.clone());
                store.insert_member(key, Member::Action(Arc::new(action)));
            }
        }
    }

    if fresh {
        registry.install_state(id, slice);
    }

    for plugin in registry.plugins() {
        store.enter(|| store.scope().run(|| plugin(&store)));
    }

    Ok(store)
}

/// Where the slice a store is built on came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SliceOrigin {
    /// Present before the setup procedure ran.
    Reused,
    /// Installed by the setup procedure itself (options stores).
    Setup,
    /// Created by the builder; not installed yet.
    Fresh,
}

fn resolve_slice(
    registry: &Registry,
    runtime: &Arc<ReactiveRuntime>,
    id: &str,
    existed: bool,
) -> (ReactiveObject, SliceOrigin) {
    match registry.state(id) {
        Some(existing) if existed => {
            tracing::debug!(store = %id, "reusing existing state slice");
            (existing, SliceOrigin::Reused)
        }
        Some(installed) => (installed, SliceOrigin::Setup),
        None => (
            ReactiveRuntime::with_runtime(Arc::clone(runtime), ReactiveObject::new),
            SliceOrigin::Fresh,
        ),
    }
}
