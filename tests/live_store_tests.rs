//! 真实存储上的集成测试
//!
//! 需要运行中的数据库，默认忽略：
//! `TEST_REDIS_URL=redis://localhost:6379 cargo test -- --ignored`
//! 关系库需预先建表：
//! `CREATE TABLE items (id <自增主键>, name VARCHAR(64), value INT)`

use polyorm::config::config::{DatabaseConfig, DatabaseType};
use polyorm::models::record::into_record;
use polyorm::{Criteria, DatabaseAdapter, Orm, OrmError, Record, StorageFactory};
use serde_json::{Value, json};

fn record(value: Value) -> Record {
    into_record(value).unwrap()
}

fn config_from_env(kind: DatabaseType, var: &str) -> Option<DatabaseConfig> {
    let url = std::env::var(var).ok()?;
    let database = std::env::var("TEST_DATABASE").unwrap_or_else(|_| "polyorm_test".into());
    Some(DatabaseConfig::with_url(kind, url).database(database))
}

async fn run_scenario(config: DatabaseConfig) {
    let adapter = StorageFactory::create(&config).await.unwrap();
    assert!(StorageFactory::health_check(adapter.as_ref()).await.unwrap());

    let orm = Orm::new(adapter);
    orm.define_model("Item", "items");
    let key = orm.binding("Item").unwrap().primary_key;

    let saved = orm
        .insert("Item", record(json!({"name": "X", "value": 1})))
        .await
        .unwrap();
    let criteria = key.criteria_for(saved[&key.field].clone());

    let found = orm.find_one("Item", &criteria).await.unwrap().unwrap();
    assert_eq!(found["name"], json!("X"));

    let changed = orm
        .update("Item", &criteria, record(json!({"name": "Y", "value": 2})))
        .await
        .unwrap();
    assert_eq!(changed, 1);

    let found = orm.find_one("Item", &criteria).await.unwrap().unwrap();
    assert_eq!(found["name"], json!("Y"));
    assert_eq!(found[&key.field], saved[&key.field]);

    assert_eq!(orm.delete("Item", &criteria).await.unwrap(), 1);
    assert!(orm.find_one("Item", &criteria).await.unwrap().is_none());
    assert_eq!(orm.delete("Item", &criteria).await.unwrap(), 0);

    orm.disconnect().await.unwrap();
    assert!(matches!(
        orm.find("Item", &Criteria::new()).await,
        Err(OrmError::NotConnected(_))
    ));
}

#[tokio::test]
#[ignore]
async fn test_redis_scenario() {
    let Some(config) = config_from_env(DatabaseType::Redis, "TEST_REDIS_URL") else {
        return;
    };
    run_scenario(config).await;
}

#[tokio::test]
#[ignore]
async fn test_redis_requires_key_and_rejects_query() {
    let Some(config) = config_from_env(DatabaseType::Redis, "TEST_REDIS_URL") else {
        return;
    };
    let adapter = StorageFactory::create(&config).await.unwrap();
    // 已连接时再次 connect 不做任何事
    adapter.connect(&config).await.unwrap();

    let orm = Orm::new(adapter);
    orm.define_model("Item", "items");

    let err = orm
        .find_one("Item", &record(json!({"name": "X"})))
        .await
        .unwrap_err();
    assert!(err
        .to_string()
        .contains("findOne in RedisAdapter requires an \"id\" in criteria for direct lookup."));

    let err = orm
        .update("Item", &Criteria::new(), record(json!({"name": "Y"})))
        .await
        .unwrap_err();
    assert!(err
        .to_string()
        .contains("Update in RedisAdapter requires an \"id\" in criteria."));

    let err = orm.delete("Item", &Criteria::new()).await.unwrap_err();
    assert!(err
        .to_string()
        .contains("Delete in RedisAdapter requires an \"id\" in criteria."));

    let missing = record(json!({"id": "does-not-exist"}));
    assert_eq!(orm.update("Item", &missing, record(json!({"name": "Y"}))).await.unwrap(), 0);

    assert!(matches!(
        orm.query("KEYS *", vec![]).await,
        Err(OrmError::UnsupportedOperation(_))
    ));
    orm.disconnect().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_mongodb_scenario() {
    let Some(config) = config_from_env(DatabaseType::MongoDb, "TEST_MONGODB_URL") else {
        return;
    };
    run_scenario(config).await;
}

#[tokio::test]
#[ignore]
async fn test_mongodb_query_with_options() {
    let Some(config) = config_from_env(DatabaseType::MongoDb, "TEST_MONGODB_URL") else {
        return;
    };
    let orm = Orm::new(StorageFactory::create(&config).await.unwrap());
    orm.define_model("Item", "query_items");
    orm.delete("Item", &Criteria::new()).await.unwrap();
    for value in 1..=3 {
        orm.insert("Item", record(json!({"value": value}))).await.unwrap();
    }

    let rows = orm
        .query(
            "query_items",
            vec![json!({}), json!({"limit": 2, "sort": {"value": -1}})],
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["value"], json!(3));
    orm.disconnect().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_mysql_scenario() {
    let Some(config) = config_from_env(DatabaseType::MySql, "TEST_MYSQL_URL") else {
        return;
    };
    run_scenario(config).await;
}

#[tokio::test]
#[ignore]
async fn test_postgres_scenario() {
    let Some(config) = config_from_env(DatabaseType::PostgreSql, "TEST_POSTGRES_URL") else {
        return;
    };
    run_scenario(config).await;
}
