//! Todo list store example
//!
//! Run with `RUST_LOG=pantry=debug` to see the store lifecycle.

use pantry::{define_store, ActionError, Registry, StoreOptions, WatchOptions};
use serde_json::{json, Map, Value};
use tracing_subscriber::EnvFilter;

fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();

    println!("=== Todo Store Example ===\n");

    let todos = define_store(
        "todos",
        StoreOptions::new()
            .state(|| json!({ "items": [], "filter": "all" }))
            .getter("remaining", |store| {
                let items = store.get("items").unwrap_or(Value::Null);
                let open = items
                    .as_array()
                    .map_or(0, |list| list.iter().filter(|item| item["done"] == json!(false)).count());
                json!(open)
            })
            .action("add", |store, args| {
                let title = args
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| ActionError::new("add expects a title"))?;
                let mut items = store.get("items").unwrap_or_else(|| json!([]));
                if let Some(list) = items.as_array_mut() {
                    list.push(json!({ "title": title, "done": false }));
                }
                store.set("items", items);
                Ok(json!(title))
            })
            .action("toggle", |store, args| {
                let index = args
                    .first()
                    .and_then(Value::as_u64)
                    .ok_or_else(|| ActionError::new("toggle expects an index"))?;
                let mut items = store.get("items").unwrap_or_else(|| json!([]));
                let item = items
                    .get_mut(index as usize)
                    .ok_or_else(|| ActionError::new("no such todo").with_payload(json!(index)))?;
                let done = item["done"] == json!(true);
                item["done"] = json!(!done);
                store.set("items", items);
                Ok(Value::Null)
            }),
    );

    let registry = Registry::new();
    registry.use_plugin(|store| println!("[plugin] store '{}' is ready", store.id()));

    let store = todos.use_store(&registry).expect("todo store builds");

    println!("1. Logging every action");
    store.on_action(|ctx| {
        println!("   -> {}({:?})", ctx.name(), ctx.args());
        let name = ctx.name().to_string();
        ctx.on_error(move |err| println!("   !! {name} failed: {err}"));
    });

    println!("2. Subscribing to state changes");
    store.subscribe(
        |state| println!("   state: {state}"),
        WatchOptions::default(),
    );

    println!("\n3. Adding todos");
    store.call("add", &[json!("write docs")]).expect("known action");
    store.call("add", &[json!("ship it")]).expect("known action");
    println!("   remaining = {:?}", store.get("remaining"));

    println!("\n4. Toggling a todo, then a missing one");
    store.call("toggle", &[json!(0)]).expect("known action");
    store.call("toggle", &[json!(9)]).expect("known action");
    println!("   remaining = {:?}", store.get("remaining"));

    println!("\n5. Patching several fields at once");
    let mut partial = Map::new();
    partial.insert("filter".into(), json!("open"));
    partial.insert("items".into(), json!([{ "title": "fresh start", "done": false }]));
    store.patch(&partial);

    println!("\n6. Resetting");
    store.reset().expect("options stores can reset");
    println!("   state tree: {}", registry.state_tree());

    store.dispose();
    println!("\nDisposed; registry has todos: {}", registry.has("todos"));
}
