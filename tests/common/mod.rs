//! 测试用内存适配器

#![allow(dead_code)]

use async_trait::async_trait;
use bson::oid::ObjectId;
use polyorm::config::config::{DatabaseConfig, DatabaseType};
use polyorm::models::key::KeyStrategy;
use polyorm::models::record::matches;
use polyorm::{Criteria, DatabaseAdapter, OrmError, Record, RecordId, Result, Target};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::sync::Mutex;

/// 按表保存记录的内存适配器，主键生成方式遵循目标声明
pub struct MemoryAdapter {
    kind: DatabaseType,
    connected: AtomicBool,
    next_id: AtomicI64,
    tables: Mutex<HashMap<String, Vec<Record>>>,
}

impl MemoryAdapter {
    pub fn new(kind: DatabaseType) -> Self {
        Self {
            kind,
            connected: AtomicBool::new(false),
            next_id: AtomicI64::new(1),
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// 已连接的适配器
    pub fn connected(kind: DatabaseType) -> Self {
        let adapter = Self::new(kind);
        adapter.connected.store(true, Ordering::SeqCst);
        adapter
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(OrmError::NotConnected(self.kind.to_string()))
        }
    }
}

#[async_trait]
impl DatabaseAdapter for MemoryAdapter {
    fn kind(&self) -> DatabaseType {
        self.kind
    }

    fn supports_query(&self) -> bool {
        self.kind != DatabaseType::Redis
    }

    async fn connect(&self, _config: &DatabaseConfig) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_connected()
    }

    async fn insert(&self, target: &Target, mut record: Record) -> Result<RecordId> {
        self.ensure_connected()?;
        let id = match target.primary_key.value_in(&record) {
            Some(value) => RecordId::from_value(value)
                .ok_or_else(|| OrmError::InvalidArgument(format!("bad key {}", value)))?,
            None => match target.primary_key.strategy {
                KeyStrategy::StoreObject => RecordId::Object(ObjectId::new()),
                KeyStrategy::StoreScalar => RecordId::Int(self.next_id.fetch_add(1, Ordering::SeqCst)),
                KeyStrategy::ClientGenerated => {
                    return Err(OrmError::InvalidArgument(format!(
                        "insert into {} requires \"{}\"",
                        target.name,
                        target.key_field()
                    )));
                }
            },
        };
        record.insert(target.key_field().to_string(), id.to_value());
        self.tables
            .lock()
            .await
            .entry(target.name.clone())
            .or_default()
            .push(record);
        Ok(id)
    }

    async fn find(&self, target: &Target, criteria: &Criteria) -> Result<Vec<Record>> {
        self.ensure_connected()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .get(&target.name)
            .map(|rows| rows.iter().filter(|r| matches(r, criteria)).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_one(&self, target: &Target, criteria: &Criteria) -> Result<Option<Record>> {
        Ok(self.find(target, criteria).await?.into_iter().next())
    }

    async fn update(&self, target: &Target, criteria: &Criteria, mut data: Record) -> Result<u64> {
        self.ensure_connected()?;
        data.remove(target.key_field());
        let mut tables = self.tables.lock().await;
        let mut changed = 0;
        if let Some(rows) = tables.get_mut(&target.name) {
            for row in rows.iter_mut().filter(|r| matches(r, criteria)) {
                for (field, value) in &data {
                    row.insert(field.clone(), value.clone());
                }
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete(&self, target: &Target, criteria: &Criteria) -> Result<u64> {
        self.ensure_connected()?;
        let mut tables = self.tables.lock().await;
        let Some(rows) = tables.get_mut(&target.name) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !matches(r, criteria));
        Ok((before - rows.len()) as u64)
    }

    async fn query(&self, raw: &str, _params: Vec<Value>) -> Result<Vec<Record>> {
        self.ensure_connected()?;
        let tables = self.tables.lock().await;
        Ok(tables.get(raw).cloned().unwrap_or_default())
    }
}
