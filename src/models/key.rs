//! 主键声明
//!
//! 每个模型显式声明主键字段名及其生成方式，不再根据适配器类型推断。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::record::{Criteria, Record};

/// 主键生成方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// 客户端生成（缺失时由编排器分配 UUID v4）
    ClientGenerated,
    /// 存储生成标量（自增列等）
    StoreScalar,
    /// 存储生成对象标识（如 ObjectId）
    StoreObject,
}

/// 主键声明
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimaryKey {
    /// 字段名
    pub field: String,
    /// 生成方式
    pub strategy: KeyStrategy,
}

impl PrimaryKey {
    pub fn new(field: impl Into<String>, strategy: KeyStrategy) -> Self {
        Self {
            field: field.into(),
            strategy,
        }
    }

    pub fn client_generated(field: impl Into<String>) -> Self {
        Self::new(field, KeyStrategy::ClientGenerated)
    }

    pub fn store_scalar(field: impl Into<String>) -> Self {
        Self::new(field, KeyStrategy::StoreScalar)
    }

    pub fn store_object(field: impl Into<String>) -> Self {
        Self::new(field, KeyStrategy::StoreObject)
    }

    /// 读取记录中的主键值，`null` 视为缺失
    pub fn value_in<'a>(&self, record: &'a Record) -> Option<&'a Value> {
        record.get(&self.field).filter(|v| !v.is_null())
    }

    /// 以主键值构造查询条件
    pub fn criteria_for(&self, id: Value) -> Criteria {
        let mut criteria = Criteria::new();
        criteria.insert(self.field.clone(), id);
        criteria
    }
}
