//! 模型基础 trait
//!
//! 为实体类型提供 `save` / `remove` 以及静态查找方法。所有操作显式接收
//! `&Orm`，最终都经由编排器转发到适配器。

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{OrmError, Result};
use crate::models::key::PrimaryKey;
use crate::models::record::{Criteria, Record, from_record, to_record};
use crate::orm::{ModelBinding, Orm};

/// 模型 trait
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Item {
///     #[serde(skip_serializing_if = "Option::is_none")]
///     id: Option<i64>,
///     name: String,
/// }
///
/// impl Model for Item {
///     const MODEL: &'static str = "Item";
///     fn table_name() -> Option<&'static str> {
///         Some("items")
///     }
/// }
/// ```
#[async_trait]
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// 模型标识
    const MODEL: &'static str;

    /// 未注册绑定时使用的表名
    fn table_name() -> Option<&'static str> {
        None
    }

    /// 主键声明，缺省时使用当前存储的约定
    fn primary_key() -> Option<PrimaryKey> {
        None
    }

    /// 在编排器中注册本模型
    fn define(orm: &Orm) {
        let table = Self::table_name().unwrap_or(Self::MODEL);
        let key = Self::primary_key().unwrap_or_else(|| orm.adapter().kind().default_primary_key());
        orm.define_model_with_key(Self::MODEL, table, key);
    }

    /// 解析模型绑定：已注册的绑定优先，其次是 `table_name()`
    fn binding(orm: &Orm) -> Result<ModelBinding> {
        match orm.binding(Self::MODEL) {
            Ok(binding) => Ok(binding),
            Err(OrmError::NotDefined(model)) => {
                let table = Self::table_name().ok_or(OrmError::NotDefined(model))?;
                let key = Self::primary_key()
                    .unwrap_or_else(|| orm.adapter().kind().default_primary_key());
                Ok(ModelBinding::new(table, key))
            }
            Err(e) => Err(e),
        }
    }

    /// 无主键时插入并回填主键，否则按主键更新
    async fn save(&mut self, orm: &Orm) -> Result<()> {
        let binding = Self::binding(orm)?;
        let record = to_record(&*self)?;

        match binding.primary_key.value_in(&record).cloned() {
            None => {
                let completed = orm.insert_with(&binding, record).await?;
                *self = from_record(completed)?;
            }
            Some(id) => {
                let criteria = binding.primary_key.criteria_for(id);
                orm.update_with(&binding, &criteria, record).await?;
            }
        }
        Ok(())
    }

    /// 按主键删除
    async fn remove(&self, orm: &Orm) -> Result<u64> {
        let binding = Self::binding(orm)?;
        let record = to_record(self)?;
        let id = binding.primary_key.value_in(&record).cloned().ok_or_else(|| {
            OrmError::InvalidArgument(format!(
                "cannot remove {} without \"{}\"",
                Self::MODEL,
                binding.primary_key.field
            ))
        })?;
        let criteria = binding.primary_key.criteria_for(id);
        orm.delete_with(&binding, &criteria).await
    }

    async fn create(orm: &Orm, data: Record) -> Result<Self> {
        let binding = Self::binding(orm)?;
        let completed = orm.insert_with(&binding, data).await?;
        from_record(completed)
    }

    /// 按主键字段查找
    async fn find_by_id(orm: &Orm, id: Value) -> Result<Option<Self>> {
        let binding = Self::binding(orm)?;
        let criteria = binding.primary_key.criteria_for(id);
        orm.find_one_with(&binding, &criteria)
            .await?
            .map(from_record)
            .transpose()
    }

    async fn find(orm: &Orm, criteria: &Criteria) -> Result<Vec<Self>> {
        let binding = Self::binding(orm)?;
        orm.find_with(&binding, criteria)
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }

    async fn find_one(orm: &Orm, criteria: &Criteria) -> Result<Option<Self>> {
        let binding = Self::binding(orm)?;
        orm.find_one_with(&binding, criteria)
            .await?
            .map(from_record)
            .transpose()
    }

    async fn update(orm: &Orm, criteria: &Criteria, data: Record) -> Result<u64> {
        let binding = Self::binding(orm)?;
        orm.update_with(&binding, criteria, data).await
    }

    async fn delete(orm: &Orm, criteria: &Criteria) -> Result<u64> {
        let binding = Self::binding(orm)?;
        orm.delete_with(&binding, criteria).await
    }
}
