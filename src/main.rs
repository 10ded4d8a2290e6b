use anyhow::Context;
use polyorm::config::loader::{ConfigLoader, config_exists, default_config_path};
use polyorm::models::record::into_record;
use polyorm::observability::init_tracing;
use polyorm::{Orm, StorageFactory};
use serde_json::json;
use tracing::info;

const ITEM: &str = "Item";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::load().context("failed to load configuration")?;
    let _guard = init_tracing(&config.logging)?;

    if !config_exists() {
        info!(
            path = %default_config_path().display(),
            "Config file not found, using defaults and environment"
        );
    }

    if let Err(e) = ConfigLoader::validate(&config) {
        anyhow::bail!("invalid configuration: {}", e);
    }
    info!(
        app = %config.app_name,
        environment = %config.environment,
        "Starting polyorm demo..."
    );

    let adapter = StorageFactory::create(&config.database).await?;
    let orm = Orm::new(adapter);
    orm.define_model(ITEM, "items");
    let key = orm.binding(ITEM)?.primary_key.field;

    let saved = orm
        .insert(ITEM, into_record(json!({"name": "X", "value": 1}))?)
        .await?;
    let id = saved
        .get(&key)
        .cloned()
        .context("inserted record carries no key")?;
    info!(%id, "inserted item");

    let by_key = orm.binding(ITEM)?.primary_key.criteria_for(id);
    let found = orm.find_one(ITEM, &by_key).await?;
    info!(?found, "found item");

    let changed = orm
        .update(ITEM, &by_key, into_record(json!({"name": "Y", "value": 2}))?)
        .await?;
    info!(changed, "updated item");

    let found = orm.find_one(ITEM, &by_key).await?;
    info!(?found, "found updated item");

    let removed = orm.delete(ITEM, &by_key).await?;
    info!(removed, "deleted item");

    let found = orm.find_one(ITEM, &by_key).await?;
    info!(gone = found.is_none(), "lookup after delete");

    orm.disconnect().await?;
    info!("Demo finished");
    Ok(())
}
