use super::store::Store;
use super::subscriptions::{SubscriptionList, Unsubscribe};
use crate::error::ActionError;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A raw store operation. Receives the store it is bound to and the call
/// arguments.
pub type ActionFn = Arc<dyn Fn(&Store, &[Value]) -> ActionReturn + Send + Sync>;

/// What a raw operation produced.
pub enum ActionReturn {
    /// Returned or failed synchronously.
    Ready(Result<Value, ActionError>),
    /// Settles later.
    Pending(BoxFuture<'static, Result<Value, ActionError>>),
}

impl ActionReturn {
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        ActionReturn::Pending(future.boxed())
    }
}

impl From<Result<Value, ActionError>> for ActionReturn {
    fn from(result: Result<Value, ActionError>) -> Self {
        ActionReturn::Ready(result)
    }
}

impl From<Value> for ActionReturn {
    fn from(value: Value) -> Self {
        ActionReturn::Ready(Ok(value))
    }
}

/// What the caller of [`Store::call`] gets back.
pub enum ActionOutput {
    Ready(Value),
    Pending(BoxFuture<'static, Result<Value, ActionError>>),
}

impl ActionOutput {
    /// The value of a synchronous call, `None` for a pending one.
    pub fn ready(self) -> Option<Value> {
        match self {
            ActionOutput::Ready(value) => Some(value),
            ActionOutput::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ActionOutput::Pending(_))
    }

    /// Await the outcome whether or not the call was asynchronous.
    pub async fn settle(self) -> Result<Value, ActionError> {
        match self {
            ActionOutput::Ready(value) => Ok(value),
            ActionOutput::Pending(future) => future.await,
        }
    }
}

impl fmt::Debug for ActionOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOutput::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            ActionOutput::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Handed to every `on_action` subscriber once per invocation.
///
/// The `after` and `on_error` lists belong to this invocation only.
pub struct ActionContext {
    name: String,
    store_id: String,
    args: Vec<Value>,
    after: SubscriptionList<Value>,
    on_error: SubscriptionList<ActionError>,
}

impl ActionContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Run `callback` with the result once the invocation succeeds.
    pub fn after<F>(&self, callback: F) -> Unsubscribe
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.after.add(callback)
    }

    /// Run `callback` with the error if the invocation fails.
    pub fn on_error<F>(&self, callback: F) -> Unsubscribe
    where
        F: Fn(&ActionError) + Send + Sync + 'static,
    {
        self.on_error.add(callback)
    }
}

/// A store operation routed through the action subscribers.
pub(crate) struct InterceptedAction {
    name: String,
    raw: ActionFn,
    subscribers: SubscriptionList<ActionContext>,
}

impl InterceptedAction {
    pub(crate) fn new(
        name: impl Into<String>,
        raw: ActionFn,
        subscribers: SubscriptionList<ActionContext>,
    ) -> Self {
        Self {
            name: name.into(),
            raw,
            subscribers,
        }
    }

    /// Run the before hooks, the operation, then its after or error hooks.
    ///
    /// A synchronous failure is reported to the error hooks only and the
    /// caller receives `Null`. An asynchronous failure is reported to the
    /// error hooks and handed back to the caller as well.
    pub(crate) fn invoke(&self, store: &Store, args: &[Value]) -> ActionOutput {
        let context = ActionContext {
            name: self.name.clone(),
            store_id: store.id().to_string(),
            args: args.to_vec(),
            after: SubscriptionList::new(),
            on_error: SubscriptionList::new(),
        };
        tracing::trace!(store = %context.store_id, action = %self.name, "dispatching action");
        self.subscribers.trigger(&context);

        let ActionContext {
            name,
            store_id,
            after,
            on_error,
            ..
        } = context;

        match (self.raw)(store, args) {
            ActionReturn::Ready(Ok(value)) => {
                after.trigger(&value);
                ActionOutput::Ready(value)
            }
            ActionReturn::Ready(Err(err)) => {
                tracing::debug!(store = %store_id, action = %name, error = %err, "action failed");
                on_error.trigger(&err);
                after.trigger(&Value::Null);
                ActionOutput::Ready(Value::Null)
            }
            ActionReturn::Pending(future) => ActionOutput::Pending(
                async move {
                    match future.await {
                        Ok(value) => {
                            after.trigger(&value);
                            Ok(value)
                        }
                        Err(err) => {
                            tracing::debug!(store = %store_id, action = %name, error = %err, "async action rejected");
                            on_error.trigger(&err);
                            Err(err)
                        }
                    }
                }
                .boxed(),
            ),
        }
    }
}

/// Adapt a synchronous operation.
pub(crate) fn sync_action<F>(action: F) -> ActionFn
where
    F: Fn(&Store, &[Value]) -> Result<Value, ActionError> + Send + Sync + 'static,
{
    Arc::new(move |store: &Store, args: &[Value]| ActionReturn::Ready(action(store, args)))
}

/// Adapt an operation returning a future. The future owns its store handle.
pub(crate) fn async_action<F, Fut>(action: F) -> ActionFn
where
    F: Fn(Store, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
{
    Arc::new(move |store: &Store, args: &[Value]| {
        ActionReturn::pending(action(store.clone(), args.to_vec()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{define_setup_store, Registry, SetupOutput};
    use futures::executor::block_on;
    use parking_lot::Mutex;
    use serde_json::json;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(String) + Clone) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let push = {
            let log = log.clone();
            move |entry: String| log.lock().push(entry)
        };
        (log, push)
    }

    fn store() -> (Registry, Store) {
        let definition = define_setup_store("jobs", |_| {
            Ok(SetupOutput::new()
                .action("echo", |_, args| Ok(args.first().cloned().unwrap_or(Value::Null)))
                .action("fail", |_, _| Err(ActionError::new("sync failure")))
                .async_action("fetch", |_, args| async move {
                    Ok(json!({ "fetched": args.len() }))
                })
                .async_action("reject", |_, _| async move {
                    Err(ActionError::new("async failure"))
                }))
        });
        let registry = Registry::new();
        let store = definition.use_store(&registry).expect("store builds");
        (registry, store)
    }

    #[test]
    fn after_hooks_receive_the_return_value() {
        let (_registry, store) = store();
        let (log, push) = recorder();

        store.on_action(move |ctx| {
            push(format!("before {} {:?}", ctx.name(), ctx.args()));
            let push = push.clone();
            ctx.after(move |value| push(format!("after {value}")));
        });

        let output = store.call("echo", &[json!("hi")]).expect("known action");
        assert_eq!(output.ready(), Some(json!("hi")));
        assert_eq!(
            *log.lock(),
            vec![r#"before echo [String("hi")]"#, r#"after "hi""#]
        );
    }

    #[test]
    fn hook_lists_are_per_invocation() {
        let (_registry, store) = store();
        let (log, push) = recorder();

        store.on_action(move |ctx| {
            let push = push.clone();
            ctx.after(move |value| push(value.to_string()));
        });

        store.call("echo", &[json!(1)]).expect("known action");
        store.call("echo", &[json!(2)]).expect("known action");
        assert_eq!(*log.lock(), vec!["1", "2"]);
    }

    #[test]
    fn sync_errors_are_swallowed_and_reported() {
        let (_registry, store) = store();
        let (log, push) = recorder();

        store.on_action(move |ctx| {
            let on_error = push.clone();
            ctx.on_error(move |err| on_error(format!("error {err}")));
            let after = push.clone();
            ctx.after(move |value| after(format!("after {value}")));
        });

        let output = store.call("fail", &[]).expect("known action");
        assert_eq!(output.ready(), Some(Value::Null));
        assert_eq!(*log.lock(), vec!["error sync failure", "after null"]);
    }

    #[test]
    fn async_results_settle_through_hooks() {
        let (_registry, store) = store();
        let (log, push) = recorder();

        store.on_action(move |ctx| {
            let push = push.clone();
            ctx.after(move |value| push(format!("after {value}")));
        });

        let output = store.call("fetch", &[json!(1), json!(2)]).expect("known action");
        assert!(output.is_pending());
        assert!(log.lock().is_empty());

        let value = block_on(output.settle()).expect("resolves");
        assert_eq!(value, json!({ "fetched": 2 }));
        assert_eq!(*log.lock(), vec![r#"after {"fetched":2}"#]);
    }

    #[test]
    fn async_errors_reach_hooks_and_caller() {
        let (_registry, store) = store();
        let (log, push) = recorder();

        store.on_action(move |ctx| {
            let push = push.clone();
            ctx.on_error(move |err| push(format!("error {err}")));
        });

        let output = store.call("reject", &[]).expect("known action");
        let err = block_on(output.settle()).unwrap_err();
        assert_eq!(err.message(), "async failure");
        assert_eq!(*log.lock(), vec!["error async failure"]);
    }

    #[test]
    fn unsubscribed_hooks_stop_firing() {
        let (_registry, store) = store();
        let (log, push) = recorder();

        let handle = store.on_action(move |ctx| push(ctx.name().to_string()));
        store.call("echo", &[]).expect("known action");
        handle.unsubscribe();
        store.call("echo", &[]).expect("known action");

        assert_eq!(*log.lock(), vec!["echo"]);
    }

    #[test]
    fn later_subscribers_run_when_an_earlier_one_panics() {
        let (_registry, store) = store();
        let (log, push) = recorder();

        store.on_action(|_| panic!("broken subscriber"));
        store.on_action(move |ctx| push(ctx.name().to_string()));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            store.call("echo", &[]).map(|output| output.ready())
        }));
        assert!(result.is_err());
        assert_eq!(*log.lock(), vec!["echo"]);
    }
}
