//! Redis 适配器
//!
//! 记录以 JSON 字符串存放在 `<prefix>:<id>` 下，前缀即模型的表名。
//! 除 `find` 外的操作都直接按键访问，因此条件中必须带主键。

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::{ConnectionLike, MultiplexedConnection};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::config::{DatabaseConfig, DatabaseType};
use crate::error::{OrmError, Result};
use crate::models::record::{Criteria, Record, RecordId, matches};
use crate::storage::adapter::{DatabaseAdapter, Target};

/// Redis 适配器
#[derive(Default)]
pub struct RedisAdapter {
    conn: RwLock<Option<MultiplexedConnection>>,
}

impl RedisAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        self.conn
            .read()
            .await
            .clone()
            .ok_or_else(|| OrmError::NotConnected(DatabaseType::Redis.to_string()))
    }
}

fn connection_url(config: &DatabaseConfig) -> String {
    if !config.url.is_empty() {
        return config.url.clone();
    }
    let auth = if config.password.is_empty() {
        String::new()
    } else {
        format!("{}:{}@", config.user, config.password)
    };
    format!(
        "redis://{}{}:{}",
        auth,
        config.host_or_default(),
        config.port.unwrap_or(6379)
    )
}

/// 键前缀不能含 `:`，否则 `a:*` 会扫到 `a:b` 模型的键
fn key_prefix(target: &Target) -> Result<&str> {
    if target.name.is_empty() || target.name.contains(':') {
        return Err(OrmError::InvalidArgument(format!(
            "Redis key prefix must be non-empty and must not contain ':', got {:?}",
            target.name
        )));
    }
    Ok(&target.name)
}

fn storage_key(prefix: &str, id: &Value) -> String {
    match id {
        Value::String(s) => format!("{}:{}", prefix, s),
        other => format!("{}:{}", prefix, other),
    }
}

/// 转义 `SCAN MATCH` 的通配符
fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn scan_pattern(prefix: &str) -> String {
    format!("{}:*", escape_glob(prefix))
}

fn key_in<'a>(target: &Target, criteria: &'a Criteria) -> Option<&'a Value> {
    target.primary_key.value_in(criteria)
}

fn decode(raw: &str) -> Result<Record> {
    match serde_json::from_str(raw)? {
        Value::Object(record) => Ok(record),
        other => Err(OrmError::Serialization(format!(
            "stored value is not an object: {}",
            other
        ))),
    }
}

async fn insert_on<C>(conn: &mut C, target: &Target, mut record: Record) -> Result<RecordId>
where
    C: ConnectionLike + Send,
{
    let prefix = key_prefix(target)?;
    let id = match target.primary_key.value_in(&record) {
        Some(id) => id.clone(),
        None => Value::String(Uuid::new_v4().to_string()),
    };
    let record_id = RecordId::from_value(&id).ok_or_else(|| {
        OrmError::InvalidArgument(format!(
            "{} of {} must be a string or integer, got {}",
            target.key_field(),
            target.name,
            id
        ))
    })?;

    let key = storage_key(prefix, &id);
    record.insert(target.key_field().to_string(), id);
    let payload = serde_json::to_string(&record)?;

    debug!(key = %key, "redis SET");
    let _: () = conn.set(&key, payload).await?;
    Ok(record_id)
}

async fn find_on<C>(conn: &mut C, target: &Target, criteria: &Criteria) -> Result<Vec<Record>>
where
    C: ConnectionLike + Send,
{
    let pattern = scan_pattern(key_prefix(target)?);

    debug!(pattern = %pattern, "redis SCAN");
    let mut keys: Vec<String> = Vec::new();
    let mut cursor: u64 = 0;
    loop {
        let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(&pattern)
            .query_async(conn)
            .await?;
        keys.extend(batch);
        if next == 0 {
            break;
        }
        cursor = next;
    }
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    debug!(count = keys.len(), "redis MGET");
    let values: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(conn).await?;

    let mut records = Vec::new();
    for raw in values.into_iter().flatten() {
        let record = decode(&raw)?;
        if matches(&record, criteria) {
            records.push(record);
        }
    }
    Ok(records)
}

async fn find_one_on<C>(
    conn: &mut C,
    target: &Target,
    id: &Value,
    criteria: &Criteria,
) -> Result<Option<Record>>
where
    C: ConnectionLike + Send,
{
    let key = storage_key(key_prefix(target)?, id);

    debug!(key = %key, "redis GET");
    let raw: Option<String> = conn.get(&key).await?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let record = decode(&raw)?;

    let mut rest = criteria.clone();
    rest.remove(target.key_field());
    Ok(matches(&record, &rest).then_some(record))
}

/// 整体替换；键不存在时不写入
async fn update_on<C>(conn: &mut C, target: &Target, id: &Value, mut data: Record) -> Result<u64>
where
    C: ConnectionLike + Send,
{
    let key = storage_key(key_prefix(target)?, id);

    let exists: bool = conn.exists(&key).await?;
    if !exists {
        debug!(key = %key, "redis update skipped, key absent");
        return Ok(0);
    }

    data.insert(target.key_field().to_string(), id.clone());
    let payload = serde_json::to_string(&data)?;

    debug!(key = %key, "redis SET");
    let _: () = conn.set(&key, payload).await?;
    Ok(1)
}

async fn delete_on<C>(conn: &mut C, target: &Target, id: &Value) -> Result<u64>
where
    C: ConnectionLike + Send,
{
    let key = storage_key(key_prefix(target)?, id);

    debug!(key = %key, "redis DEL");
    let removed: u64 = conn.del(&key).await?;
    Ok(removed)
}

#[async_trait]
impl DatabaseAdapter for RedisAdapter {
    fn kind(&self) -> DatabaseType {
        DatabaseType::Redis
    }

    fn supports_query(&self) -> bool {
        false
    }

    async fn connect(&self, config: &DatabaseConfig) -> Result<()> {
        let mut guard = self.conn.write().await;
        if guard.is_some() {
            return Ok(());
        }

        let client = redis::Client::open(connection_url(config))
            .map_err(|e| OrmError::Connection(format!("invalid Redis url: {}", e)))?;
        let pending = client.get_multiplexed_async_connection();
        let conn = match config.timeout() {
            Some(limit) => tokio::time::timeout(limit, pending).await.map_err(|_| {
                OrmError::Connection(format!("Redis connect timed out after {:?}", limit))
            })?,
            None => pending.await,
        }
        .map_err(|e| OrmError::Connection(format!("failed to connect to Redis: {}", e)))?;

        *guard = Some(conn);
        info!("Connected to Redis.");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if self.conn.write().await.take().is_some() {
            info!("Disconnected from Redis.");
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn insert(&self, target: &Target, record: Record) -> Result<RecordId> {
        let mut conn = self.connection().await?;
        insert_on(&mut conn, target, record).await
    }

    async fn find(&self, target: &Target, criteria: &Criteria) -> Result<Vec<Record>> {
        let mut conn = self.connection().await?;
        find_on(&mut conn, target, criteria).await
    }

    async fn find_one(&self, target: &Target, criteria: &Criteria) -> Result<Option<Record>> {
        let id = key_in(target, criteria).ok_or_else(|| {
            OrmError::InvalidArgument(format!(
                "findOne in RedisAdapter requires an \"{}\" in criteria for direct lookup.",
                target.key_field()
            ))
        })?;
        let mut conn = self.connection().await?;
        find_one_on(&mut conn, target, id, criteria).await
    }

    async fn update(&self, target: &Target, criteria: &Criteria, data: Record) -> Result<u64> {
        let id = key_in(target, criteria).ok_or_else(|| {
            OrmError::InvalidArgument(format!(
                "Update in RedisAdapter requires an \"{}\" in criteria.",
                target.key_field()
            ))
        })?;
        let mut conn = self.connection().await?;
        update_on(&mut conn, target, id, data).await
    }

    async fn delete(&self, target: &Target, criteria: &Criteria) -> Result<u64> {
        let id = key_in(target, criteria).ok_or_else(|| {
            OrmError::InvalidArgument(format!(
                "Delete in RedisAdapter requires an \"{}\" in criteria.",
                target.key_field()
            ))
        })?;
        let mut conn = self.connection().await?;
        delete_on(&mut conn, target, id).await
    }

    async fn query(&self, _raw: &str, _params: Vec<Value>) -> Result<Vec<Record>> {
        Err(OrmError::UnsupportedOperation(
            "Raw queries are not supported by RedisAdapter.".to_string(),
        ))
    }
}
