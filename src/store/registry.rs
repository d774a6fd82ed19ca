use super::state::ReactiveObject;
use super::store::Store;
use crate::runtime::{EffectScope, ReactiveRuntime};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};

/// An extension run against every store built by a registry.
pub type Plugin = Arc<dyn Fn(&Store) + Send + Sync>;

struct RegistryInner {
    runtime: Arc<ReactiveRuntime>,
    scope: RwLock<EffectScope>,
    stores: RwLock<HashMap<String, Store>>,
    state: RwLock<BTreeMap<String, ReactiveObject>>,
    plugins: RwLock<Vec<Plugin>>,
}

/// Owner of every live store and of the root state tree.
///
/// Holds one store instance per identifier, one state slice per identifier
/// and a master scope that every store scope is a child of. Each registry
/// has its own reactive runtime.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

/// Non-owning handle to a [`Registry`].
#[derive(Clone)]
pub struct WeakRegistry {
    inner: Weak<RegistryInner>,
}

impl WeakRegistry {
    pub fn upgrade(&self) -> Option<Registry> {
        self.inner.upgrade().map(|inner| Registry { inner })
    }
}

// Thread-local stack of registries entered with `Registry::enter`
thread_local! {
    static ACTIVE_REGISTRY: RefCell<Vec<Registry>> = const { RefCell::new(Vec::new()) };
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                runtime: ReactiveRuntime::new(),
                scope: RwLock::new(EffectScope::new()),
                stores: RwLock::new(HashMap::new()),
                state: RwLock::new(BTreeMap::new()),
                plugins: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Run `f` with this registry as the active one on this thread.
    ///
    /// Store accessors resolved with
    /// [`use_active`](crate::StoreDefinition::use_active) inside `f` use it.
    pub fn enter<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        ACTIVE_REGISTRY.with(|stack| stack.borrow_mut().push(self.clone()));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        ACTIVE_REGISTRY.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// The innermost registry entered on this thread.
    pub fn active() -> Option<Self> {
        ACTIVE_REGISTRY.with(|stack| stack.borrow().last().cloned())
    }

    /// Install a plugin for stores built from now on.
    pub fn use_plugin<F>(&self, plugin: F) -> &Self
    where
        F: Fn(&Store) + Send + Sync + 'static,
    {
        self.inner.plugins.write().push(Arc::new(plugin));
        self
    }

    pub fn has(&self, id: &str) -> bool {
        self.inner.stores.read().contains_key(id)
    }

    pub fn store(&self, id: &str) -> Option<Store> {
        self.inner.stores.read().get(id).cloned()
    }

    /// Identifiers of the live stores, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.stores.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The state slice for `id`. Survives disposal of the store.
    pub fn state(&self, id: &str) -> Option<ReactiveObject> {
        self.inner.state.read().get(id).cloned()
    }

    /// Snapshot of the whole state tree, keyed by store identifier.
    pub fn state_tree(&self) -> Value {
        let slices: Vec<(String, ReactiveObject)> = self
            .inner
            .state
            .read()
            .iter()
            .map(|(id, slice)| (id.clone(), slice.clone()))
            .collect();
        let tree = slices
            .into_iter()
            .map(|(id, slice)| (id, slice.snapshot()))
            .collect::<Map<_, _>>();
        Value::Object(tree)
    }

    /// Stop every store scope and forget the live stores.
    ///
    /// The root state tree is kept; stores resolved afterwards start from
    /// their existing slices.
    pub fn dispose(&self) {
        tracing::debug!("disposing registry");
        let stores: Vec<Store> = self.inner.stores.write().drain().map(|(_, s)| s).collect();
        let scope = self.inner.scope.read().clone();
        scope.stop();
        for store in stores {
            store.dispose();
        }
    }

    pub fn downgrade(&self) -> WeakRegistry {
        WeakRegistry {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same registry.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn runtime(&self) -> Arc<ReactiveRuntime> {
        Arc::clone(&self.inner.runtime)
    }

    /// Parent scope for a new store. A stopped master scope is replaced so
    /// the registry stays usable after [`dispose`](Registry::dispose).
    pub(crate) fn scope(&self) -> EffectScope {
        let mut scope = self.inner.scope.write();
        if !scope.is_active() {
            *scope = EffectScope::new();
        }
        scope.clone()
    }

    pub(crate) fn plugins(&self) -> Vec<Plugin> {
        self.inner.plugins.read().clone()
    }

    pub(crate) fn register(&self, store: Store) {
        self.inner
            .stores
            .write()
            .insert(store.id().to_string(), store);
    }

    /// Remove `store` if it is the instance registered under its id.
    pub(crate) fn unregister(&self, store: &Store) {
        let mut stores = self.inner.stores.write();
        if stores.get(store.id()).is_some_and(|s| s.ptr_eq(store)) {
            stores.remove(store.id());
        }
    }

    pub(crate) fn install_state(&self, id: &str, slice: ReactiveObject) {
        self.inner
            .state
            .write()
            .entry(id.to_string())
            .or_insert(slice);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("stores", &self.ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::on_scope_dispose;
    use crate::store::{define_store, StoreOptions};
    use serde_json::json;

    #[test]
    fn enter_nests_and_restores() {
        let outer = Registry::new();
        let inner = Registry::new();
        assert!(Registry::active().is_none());

        outer.enter(|| {
            inner.enter(|| {
                assert!(Registry::active().is_some_and(|r| r.ptr_eq(&inner)));
            });
            assert!(Registry::active().is_some_and(|r| r.ptr_eq(&outer)));
        });
        assert!(Registry::active().is_none());
    }

    #[test]
    fn stale_handles_do_not_unregister_replacements() {
        let registry = Registry::new();
        let definition = define_store("cart", StoreOptions::new().state(|| json!({ "items": [] })));

        let stale = definition.use_store(&registry).expect("build");
        stale.dispose();
        let current = definition.use_store(&registry).expect("rebuild");

        stale.dispose();
        assert!(registry.store("cart").is_some_and(|s| s.ptr_eq(&current)));
    }

    #[test]
    fn registry_is_reusable_after_dispose() {
        let registry = Registry::new();
        let definition = define_store("prefs", StoreOptions::new().state(|| json!({ "dark": false })));
        definition.use_store(&registry).expect("build");

        registry.dispose();
        assert!(registry.ids().is_empty());

        let store = definition.use_store(&registry).expect("rebuild");
        assert!(store.is_active());
        assert_eq!(registry.ids(), vec!["prefs"]);
    }

    #[test]
    fn dropping_the_registry_detaches_weak_handles() {
        let registry = Registry::new();
        let weak = registry.downgrade();
        assert!(weak.upgrade().is_some());
        drop(registry);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn dispose_cleanups_can_resolve_stores() {
        let registry = Registry::new();
        let late = define_store("late", StoreOptions::new().state(|| json!({ "ready": true })));
        {
            let weak = registry.downgrade();
            registry.use_plugin(move |store| {
                if store.id() != "first" {
                    return;
                }
                let weak = weak.clone();
                let late = late.clone();
                on_scope_dispose(move || {
                    if let Some(registry) = weak.upgrade() {
                        let _ = late.use_store(&registry);
                    }
                });
            });
        }

        define_store("first", StoreOptions::new())
            .use_store(&registry)
            .expect("build");
        registry.dispose();

        assert!(!registry.has("first"));
        assert!(registry.store("late").is_some_and(|s| s.is_active()));
    }
}
