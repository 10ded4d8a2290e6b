//! 统一 CRUD 适配器契约

use async_trait::async_trait;
use serde_json::Value;

use crate::config::config::{DatabaseConfig, DatabaseType};
use crate::error::Result;
use crate::models::key::PrimaryKey;
use crate::models::record::{Criteria, Record, RecordId};

/// 操作目标：表 / 集合 / 键前缀，以及其主键声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// 表名、集合名或键前缀
    pub name: String,
    /// 主键声明
    pub primary_key: PrimaryKey,
}

impl Target {
    pub fn new(name: impl Into<String>, primary_key: PrimaryKey) -> Self {
        Self {
            name: name.into(),
            primary_key,
        }
    }

    /// 使用存储默认主键约定的目标
    pub fn for_store(db_type: DatabaseType, name: impl Into<String>) -> Self {
        Self::new(name, db_type.default_primary_key())
    }

    /// 主键字段名
    pub fn key_field(&self) -> &str {
        &self.primary_key.field
    }
}

/// 数据库适配器 trait
///
/// 除 `connect` / `disconnect` 外，所有操作在未连接时返回 `NotConnected`。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// 存储类型
    fn kind(&self) -> DatabaseType;

    /// 是否支持原生查询
    fn supports_query(&self) -> bool {
        true
    }

    /// 建立连接
    async fn connect(&self, config: &DatabaseConfig) -> Result<()>;

    /// 断开连接，未连接时无操作
    async fn disconnect(&self) -> Result<()>;

    /// 连通性检查
    async fn ping(&self) -> Result<()>;

    /// 插入记录，返回生成或给定的主键
    async fn insert(&self, target: &Target, record: Record) -> Result<RecordId>;

    /// 查找全部匹配记录
    async fn find(&self, target: &Target, criteria: &Criteria) -> Result<Vec<Record>>;

    /// 查找第一条匹配记录
    async fn find_one(&self, target: &Target, criteria: &Criteria) -> Result<Option<Record>>;

    /// 更新匹配记录（不修改主键字段），返回受影响数量
    async fn update(&self, target: &Target, criteria: &Criteria, data: Record) -> Result<u64>;

    /// 删除匹配记录，返回删除数量
    async fn delete(&self, target: &Target, criteria: &Criteria) -> Result<u64>;

    /// 原生查询透传，语义由各存储决定
    async fn query(&self, raw: &str, params: Vec<Value>) -> Result<Vec<Record>>;
}
