use super::action::{ActionContext, ActionOutput, InterceptedAction};
use super::options::{initial_state, StateFactory};
use super::registry::WeakRegistry;
use super::state::ReactiveObject;
use super::subscriptions::{SubscriptionList, Unsubscribe};
use crate::error::StoreError;
use crate::runtime::{EffectScope, ReactiveRuntime};
use crate::signal::{watch, Computed, WatchHandle, WatchOptions};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// A non-state member installed on the store by the builder.
#[derive(Clone)]
pub(crate) enum Member {
    Derived(Computed<Value>),
    Constant(Value),
    Action(Arc<InterceptedAction>),
}

struct StoreInner {
    id: String,
    slice: ReactiveObject,
    scope: EffectScope,
    members: RwLock<BTreeMap<String, Member>>,
    action_subscribers: SubscriptionList<ActionContext>,
    initial_state: Option<StateFactory>,
    registry: WeakRegistry,
    runtime: Weak<ReactiveRuntime>,
}

/// A live store instance.
///
/// Handles are cheap to clone and all clones refer to the same instance;
/// the registry keeps exactly one instance per identifier.
///
/// State fields live in the registry's slice for this store and are read
/// through [`get`](Store::get) or [`state`](Store::state). Derived values
/// and constants from the setup are read through `get` as well, and
/// operations are invoked with [`call`](Store::call).
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    pub(crate) fn new(
        id: &str,
        slice: ReactiveObject,
        scope: EffectScope,
        registry: WeakRegistry,
        runtime: Weak<ReactiveRuntime>,
        initial_state: Option<StateFactory>,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                id: id.to_string(),
                slice,
                scope,
                members: RwLock::new(BTreeMap::new()),
                action_subscribers: SubscriptionList::new(),
                initial_state,
                registry,
                runtime,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The registry's state slice for this store (`$state`).
    pub fn state(&self) -> ReactiveObject {
        self.inner.slice.clone()
    }

    /// Overwrite top-level state fields (`$state = ...`).
    ///
    /// Goes through [`patch_with`](Store::patch_with), so the slice keeps its
    /// identity and fields absent from `values` are left alone.
    pub fn set_state(&self, values: Map<String, Value>) {
        self.patch_with(|state| state.assign(values));
    }

    /// Deep-merge a partial state into the slice.
    pub fn patch(&self, partial: &Map<String, Value>) {
        self.patch_with(|state| state.merge(partial));
    }

    /// Mutate the slice imperatively.
    ///
    /// Subscribers are notified once, after `mutator` returns.
    pub fn patch_with<F>(&self, mutator: F)
    where
        F: FnOnce(&ReactiveObject),
    {
        tracing::trace!(store = %self.inner.id, "patching state");
        let slice = &self.inner.slice;
        match self.inner.runtime.upgrade() {
            Some(runtime) => runtime.batch(|| mutator(slice)),
            None => mutator(slice),
        }
    }

    /// Call `callback` with a snapshot of the state after every change.
    ///
    /// The watcher lives in the store's scope and stops on
    /// [`dispose`](Store::dispose). State is always watched deeply; only
    /// `options.immediate` is taken into account.
    pub fn subscribe<F>(&self, callback: F, options: WatchOptions) -> WatchHandle
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let slice = self.inner.slice.clone();
        let options = WatchOptions {
            deep: true,
            ..options
        };
        self.enter(|| {
            self.inner.scope.run(|| {
                watch(
                    move || slice.snapshot(),
                    move |state: &Value, _: Option<&Value>| callback(state),
                    options,
                )
            })
        })
        .unwrap_or_else(WatchHandle::inert)
    }

    /// Register a subscriber called before every action of this store.
    pub fn on_action<F>(&self, callback: F) -> Unsubscribe
    where
        F: Fn(&ActionContext) + Send + Sync + 'static,
    {
        self.inner.action_subscribers.add(callback)
    }

    /// Stop the store's scope, drop its action subscribers and remove it
    /// from the registry. The state slice stays in the registry.
    pub fn dispose(&self) {
        tracing::debug!(store = %self.inner.id, "disposing store");
        self.inner.scope.stop();
        self.inner.action_subscribers.clear();
        if let Some(registry) = self.inner.registry.upgrade() {
            registry.unregister(self);
        }
    }

    /// Whether [`dispose`](Store::dispose) has not run yet.
    pub fn is_active(&self) -> bool {
        self.inner.scope.is_active()
    }

    /// Restore the declared state fields from a fresh state factory call.
    ///
    /// Only stores defined with [`StoreOptions`](crate::StoreOptions) have a
    /// state factory.
    pub fn reset(&self) -> Result<(), StoreError> {
        let factory = self
            .inner
            .initial_state
            .as_ref()
            .ok_or_else(|| StoreError::ResetUnsupported {
                id: self.inner.id.clone(),
            })?;
        let fresh = initial_state(Some(factory));
        self.patch_with(|state| state.assign(fresh));
        Ok(())
    }

    /// Read a state field, derived value or constant.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.member(key) {
            Some(Member::Derived(computed)) => Some(computed.get()),
            Some(Member::Constant(value)) => Some(value),
            Some(Member::Action(_)) => None,
            None => self.inner.slice.get(key),
        }
    }

    /// Write a state field directly, adding it when absent.
    pub fn set(&self, key: &str, value: Value) {
        self.inner.slice.set(key, value);
    }

    /// Invoke an operation by name.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<ActionOutput, StoreError> {
        match self.member(name) {
            Some(Member::Action(action)) => Ok(self.enter(|| action.invoke(self, args))),
            _ => Err(StoreError::UnknownAction {
                id: self.inner.id.clone(),
                name: name.to_string(),
            }),
        }
    }

    pub fn has_action(&self, name: &str) -> bool {
        matches!(self.member(name), Some(Member::Action(_)))
    }

    /// Every state field and member name.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = self.inner.slice.keys();
        keys.extend(self.inner.members.read().keys().cloned());
        keys.sort();
        keys.dedup();
        keys
    }

    /// Whether two handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn scope(&self) -> &EffectScope {
        &self.inner.scope
    }

    pub(crate) fn action_subscribers(&self) -> SubscriptionList<ActionContext> {
        self.inner.action_subscribers.clone()
    }

    pub(crate) fn insert_member(&self, key: String, member: Member) {
        self.inner.members.write().insert(key, member);
    }

    /// Run `f` with the store's runtime current.
    pub(crate) fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        match self.inner.runtime.upgrade() {
            Some(runtime) => ReactiveRuntime::with_runtime(runtime, f),
            None => f(),
        }
    }

    fn member(&self, key: &str) -> Option<Member> {
        self.inner.members.read().get(key).cloned()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("state", &self.inner.slice)
            .field("members", &self.inner.members.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
