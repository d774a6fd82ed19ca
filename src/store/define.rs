use super::builder::{build, SetupFn, SetupOutput};
use super::options::{StateFactory, StoreOptions};
use super::registry::Registry;
use super::store::Store;
use crate::error::StoreError;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// How a store's fields are produced.
#[derive(Clone)]
pub enum StoreSource {
    Setup(SetupFn),
    Options(StoreOptions),
}

impl StoreSource {
    pub fn setup<F>(setup: F) -> Self
    where
        F: Fn(&Registry) -> anyhow::Result<SetupOutput> + Send + Sync + 'static,
    {
        StoreSource::Setup(Arc::new(setup))
    }
}

impl From<StoreOptions> for StoreSource {
    fn from(options: StoreOptions) -> Self {
        StoreSource::Options(options)
    }
}

impl From<SetupFn> for StoreSource {
    fn from(setup: SetupFn) -> Self {
        StoreSource::Setup(setup)
    }
}

/// Accessor for one store identifier.
///
/// The first resolution in a registry builds the store; later ones return
/// the same instance.
#[derive(Clone)]
pub struct StoreDefinition {
    id: String,
    setup: SetupFn,
    initial_state: Option<StateFactory>,
}

impl StoreDefinition {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resolve the store in `registry`, building it on first use.
    pub fn use_store(&self, registry: &Registry) -> Result<Store, StoreError> {
        if let Some(store) = registry.store(&self.id) {
            return Ok(store);
        }
        build(&self.id, &self.setup, registry, self.initial_state.clone())
    }

    /// Resolve the store in the registry entered on this thread.
    pub fn use_active(&self) -> Result<Store, StoreError> {
        let registry = Registry::active().ok_or(StoreError::NoActiveRegistry)?;
        self.use_store(&registry)
    }
}

impl TryFrom<StoreOptions> for StoreDefinition {
    type Error = StoreError;

    /// Define a store from options that carry their own identifier.
    fn try_from(options: StoreOptions) -> Result<Self, Self::Error> {
        let id = options.id.clone().ok_or(StoreError::MissingId)?;
        Ok(define_store(id, options))
    }
}

impl fmt::Debug for StoreDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreDefinition")
            .field("id", &self.id)
            .field("options", &self.initial_state.is_some())
            .finish()
    }
}

/// Define a store from a setup procedure or from [`StoreOptions`].
pub fn define_store(id: impl Into<String>, source: impl Into<StoreSource>) -> StoreDefinition {
    let id = id.into();
    match source.into() {
        StoreSource::Setup(setup) => StoreDefinition {
            id,
            setup,
            initial_state: None,
        },
        StoreSource::Options(options) => {
            let initial_state = options.state_factory();
            let setup = options.into_setup(&id);
            StoreDefinition {
                id,
                setup,
                initial_state: Some(initial_state.unwrap_or_else(empty_state)),
            }
        }
    }
}

fn empty_state() -> StateFactory {
    Arc::new(|| Value::Object(Map::new()))
}

/// Define a store from a setup procedure.
///
/// ```
/// use pantry::{define_setup_store, Registry, SetupOutput, Signal};
/// use serde_json::json;
///
/// let session = define_setup_store("session", |_registry| {
///     let user = Signal::new(json!(null));
///     Ok(SetupOutput::new().state_ref("user", user).constant("version", 2))
/// });
///
/// let registry = Registry::new();
/// let first = session.use_store(&registry).unwrap();
/// let second = session.use_store(&registry).unwrap();
/// assert!(first.ptr_eq(&second));
/// ```
pub fn define_setup_store<F>(id: impl Into<String>, setup: F) -> StoreDefinition
where
    F: Fn(&Registry) -> anyhow::Result<SetupOutput> + Send + Sync + 'static,
{
    define_store(id, StoreSource::setup(setup))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn options_with_embedded_id() {
        let definition = StoreDefinition::try_from(
            StoreOptions::new().id("prefs").state(|| json!({ "theme": "dark" })),
        )
        .expect("id present");
        assert_eq!(definition.id(), "prefs");

        let registry = Registry::new();
        let store = definition.use_store(&registry).expect("build");
        assert_eq!(store.get("theme"), Some(json!("dark")));
    }

    #[test]
    fn options_without_id_are_rejected() {
        let err = StoreDefinition::try_from(StoreOptions::new()).unwrap_err();
        assert!(matches!(err, StoreError::MissingId));
    }

    #[test]
    fn use_active_without_registry_fails() {
        let definition = define_store("orphan", StoreOptions::new());
        assert!(matches!(
            definition.use_active(),
            Err(StoreError::NoActiveRegistry)
        ));
    }

    #[test]
    fn use_active_resolves_entered_registry() {
        let definition = define_store("entered", StoreOptions::new());
        let registry = Registry::new();

        let store = registry.enter(|| definition.use_active()).expect("active registry");
        assert!(registry.store("entered").is_some_and(|s| s.ptr_eq(&store)));
    }
}
