//! Cows demo binary
//!
//! Loads a herd from a slow in-memory API, then creates, renames and deletes
//! cows while printing the collection after each request.

use anyhow::Context;
use composable_crud_core::CollectionState;
use composable_crud_runtime::Store;
use cows::{CowApi, cows_crud, create_cow, delete_cow, fetch_herd, rename_cow};
use serde_json::json;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn describe(cows: &CollectionState) -> String {
    let names: Vec<String> = cows
        .items
        .items()
        .map(|cow| {
            let field = |name: &str| cow.get(name).cloned().unwrap_or_default();
            format!("{}={}", field("id"), field("name"))
        })
        .collect();
    format!(
        "fetching={} creating={} updating={} deleting={} error={} cows=[{}]",
        cows.is_fetching,
        cows.is_creating,
        cows.is_updating,
        cows.is_deleting,
        cows.error.clone().unwrap_or_default(),
        names.join(", ")
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cows=debug,composable_crud_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    composable_crud_runtime::metrics::register_metrics();

    println!("=== Cows Example: Composable CRUD ===\n");

    let crud = cows_crud().context("loading cows.toml")?;
    let api = CowApi::new(
        vec![
            json!({ "id": 25, "name": "foo" }),
            json!({ "id": 26, "name": "bar" }),
            json!({ "id": 29, "name": "bla" }),
        ],
        Duration::from_millis(400),
    );
    let store = Store::new(crud.reducer.initial_state(), crud.reducer.clone(), ());

    // Print every state change
    let mut changes = store.subscribe();
    let watcher = tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            println!("    state: {}", describe(&changes.borrow_and_update()));
        }
    });

    println!(">>> Fetching the herd (slow, the loading flag shows)");
    store.run(&fetch_herd(&crud, &api)).await?;

    println!("\n>>> Creating Hubert and Berta side by side");
    store.spawn_all([
        &create_cow(&crud, &api, "Hubert"),
        &create_cow(&crud, &api, "Berta"),
    ])?;
    store
        .settle(Duration::from_secs(5))
        .await
        .context("waiting for the new cows")?;

    println!("\n>>> Renaming cow 29");
    store.run(&rename_cow(&crud, &api, 29, "dörthe")).await?;

    println!("\n>>> Deleting cow 26");
    store.run(&delete_cow(&crud, &api, 26)).await?;

    println!("\n>>> Deleting cow 99 (does not exist, the error is stored)");
    store.run(&delete_cow(&crud, &api, 99)).await?;

    println!("\nFinal: {}", store.state(describe));

    store
        .shutdown(Duration::from_secs(1))
        .await
        .context("shutting down store")?;
    drop(store);
    watcher.abort();

    println!("\n=== Demonstration Complete ===");
    Ok(())
}
