//! 映射编排层
//!
//! `Orm` 持有一个活动适配器和模型绑定注册表，把按模型标识发起的 CRUD
//! 调用解析为具体的表 / 集合 / 键前缀后转发给适配器。

pub mod model;

use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::config::config::DatabaseConfig;
use crate::error::{OrmError, Result};
use crate::models::key::{KeyStrategy, PrimaryKey};
use crate::models::record::{Criteria, Record, strip_absent};
use crate::storage::adapter::{DatabaseAdapter, Target};

pub use model::Model;

/// 模型绑定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelBinding {
    /// 表名、集合名或键前缀
    pub table: String,
    /// 主键声明
    pub primary_key: PrimaryKey,
}

impl ModelBinding {
    pub fn new(table: impl Into<String>, primary_key: PrimaryKey) -> Self {
        Self {
            table: table.into(),
            primary_key,
        }
    }

    fn target(&self) -> Target {
        Target::new(self.table.clone(), self.primary_key.clone())
    }
}

/// 映射编排器
pub struct Orm {
    adapter: Box<dyn DatabaseAdapter>,
    models: DashMap<String, ModelBinding>,
}

impl Orm {
    /// 以给定适配器创建编排器
    pub fn new(adapter: Box<dyn DatabaseAdapter>) -> Self {
        Self {
            adapter,
            models: DashMap::new(),
        }
    }

    /// 当前适配器
    pub fn adapter(&self) -> &dyn DatabaseAdapter {
        self.adapter.as_ref()
    }

    pub async fn connect(&self, config: &DatabaseConfig) -> Result<()> {
        self.adapter.connect(config).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.adapter.disconnect().await
    }

    /// 注册模型绑定，使用适配器的默认主键约定；覆盖已有绑定
    pub fn define_model(&self, model_id: &str, table: &str) {
        let primary_key = self.adapter.kind().default_primary_key();
        self.define_model_with_key(model_id, table, primary_key);
    }

    /// 注册模型绑定并显式声明主键；覆盖已有绑定
    pub fn define_model_with_key(&self, model_id: &str, table: &str, primary_key: PrimaryKey) {
        debug!(model = model_id, table = table, key = %primary_key.field, "define model");
        self.models
            .insert(model_id.to_string(), ModelBinding::new(table, primary_key));
    }

    /// 模型绑定，未定义时返回 `NotDefined`
    pub fn binding(&self, model_id: &str) -> Result<ModelBinding> {
        self.models
            .get(model_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OrmError::NotDefined(model_id.to_string()))
    }

    /// 模型对应的表名
    pub fn get_table_name(&self, model_id: &str) -> Result<String> {
        Ok(self.binding(model_id)?.table)
    }

    /// 插入记录，返回补全主键后的记录
    pub async fn insert(&self, model_id: &str, record: Record) -> Result<Record> {
        let binding = self.binding(model_id)?;
        self.insert_with(&binding, record).await
    }

    pub async fn find(&self, model_id: &str, criteria: &Criteria) -> Result<Vec<Record>> {
        let binding = self.binding(model_id)?;
        self.find_with(&binding, criteria).await
    }

    pub async fn find_one(&self, model_id: &str, criteria: &Criteria) -> Result<Option<Record>> {
        let binding = self.binding(model_id)?;
        self.find_one_with(&binding, criteria).await
    }

    /// 更新匹配记录，主键字段不会被修改
    pub async fn update(&self, model_id: &str, criteria: &Criteria, data: Record) -> Result<u64> {
        let binding = self.binding(model_id)?;
        self.update_with(&binding, criteria, data).await
    }

    pub async fn delete(&self, model_id: &str, criteria: &Criteria) -> Result<u64> {
        let binding = self.binding(model_id)?;
        self.delete_with(&binding, criteria).await
    }

    /// 原生查询透传
    pub async fn query(&self, raw: &str, params: Vec<Value>) -> Result<Vec<Record>> {
        if !self.adapter.supports_query() {
            return Err(OrmError::UnsupportedOperation(format!(
                "query is not supported by the {} adapter",
                self.adapter.kind()
            )));
        }
        self.adapter.query(raw, params).await
    }

    pub(crate) async fn insert_with(&self, binding: &ModelBinding, record: Record) -> Result<Record> {
        let mut record = strip_absent(record);
        let key = &binding.primary_key;
        if key.strategy == KeyStrategy::ClientGenerated && key.value_in(&record).is_none() {
            record.insert(key.field.clone(), Value::String(Uuid::new_v4().to_string()));
        }

        let id = self.adapter.insert(&binding.target(), record.clone()).await?;
        record.insert(key.field.clone(), id.to_value());
        Ok(record)
    }

    pub(crate) async fn find_with(&self, binding: &ModelBinding, criteria: &Criteria) -> Result<Vec<Record>> {
        self.adapter.find(&binding.target(), criteria).await
    }

    pub(crate) async fn find_one_with(
        &self,
        binding: &ModelBinding,
        criteria: &Criteria,
    ) -> Result<Option<Record>> {
        self.adapter.find_one(&binding.target(), criteria).await
    }

    pub(crate) async fn update_with(
        &self,
        binding: &ModelBinding,
        criteria: &Criteria,
        data: Record,
    ) -> Result<u64> {
        let mut data = strip_absent(data);
        data.remove(&binding.primary_key.field);
        self.adapter.update(&binding.target(), criteria, data).await
    }

    pub(crate) async fn delete_with(&self, binding: &ModelBinding, criteria: &Criteria) -> Result<u64> {
        self.adapter.delete(&binding.target(), criteria).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config::DatabaseType;
    use crate::models::record::{RecordId, into_record};
    use crate::storage::adapter::MockDatabaseAdapter;
    use mockall::predicate::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        into_record(value).unwrap()
    }

    fn mock(kind: DatabaseType) -> MockDatabaseAdapter {
        let mut adapter = MockDatabaseAdapter::new();
        adapter.expect_kind().return_const(kind);
        adapter
    }

    #[test]
    fn test_define_model_uses_store_key_convention() {
        let orm = Orm::new(Box::new(mock(DatabaseType::MongoDb)));
        orm.define_model("Item", "items");
        let binding = orm.binding("Item").unwrap();
        assert_eq!(binding.table, "items");
        assert_eq!(binding.primary_key, PrimaryKey::store_object("_id"));
    }

    #[test]
    fn test_define_model_overwrites() {
        let orm = Orm::new(Box::new(mock(DatabaseType::MySql)));
        orm.define_model("Item", "items");
        orm.define_model_with_key("Item", "items_v2", PrimaryKey::client_generated("uid"));
        assert_eq!(orm.get_table_name("Item").unwrap(), "items_v2");
        assert_eq!(
            orm.binding("Item").unwrap().primary_key,
            PrimaryKey::client_generated("uid")
        );
    }

    #[tokio::test]
    async fn test_undefined_model() {
        let orm = Orm::new(Box::new(MockDatabaseAdapter::new()));
        assert!(matches!(orm.get_table_name("Ghost"), Err(OrmError::NotDefined(_))));
        assert!(matches!(
            orm.find("Ghost", &Criteria::new()).await,
            Err(OrmError::NotDefined(name)) if name == "Ghost"
        ));
    }

    #[tokio::test]
    async fn test_insert_strips_absent_and_merges_key() {
        let mut adapter = mock(DatabaseType::MySql);
        adapter
            .expect_insert()
            .withf(|target, record| {
                target.name == "items" && !record.contains_key("note") && record["name"] == json!("X")
            })
            .times(1)
            .returning(|_, _| Ok(RecordId::Int(7)));

        let orm = Orm::new(Box::new(adapter));
        orm.define_model("Item", "items");
        let saved = orm
            .insert("Item", record(json!({"name": "X", "note": null})))
            .await
            .unwrap();
        assert_eq!(saved, record(json!({"id": 7, "name": "X"})));
    }

    #[tokio::test]
    async fn test_insert_generates_client_key() {
        let mut adapter = mock(DatabaseType::Redis);
        adapter
            .expect_insert()
            .withf(|_, record| record.get("id").and_then(Value::as_str).is_some())
            .times(1)
            .returning(|_, record| Ok(RecordId::from_value(&record["id"]).unwrap()));

        let orm = Orm::new(Box::new(adapter));
        orm.define_model("Item", "items");
        let saved = orm.insert("Item", record(json!({"name": "X"}))).await.unwrap();
        let id = saved["id"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_insert_keeps_supplied_client_key() {
        let mut adapter = mock(DatabaseType::Redis);
        adapter
            .expect_insert()
            .withf(|_, record| record["id"] == json!("fixed"))
            .returning(|_, _| Ok(RecordId::Text("fixed".into())));

        let orm = Orm::new(Box::new(adapter));
        orm.define_model("Item", "items");
        let saved = orm
            .insert("Item", record(json!({"id": "fixed", "name": "X"})))
            .await
            .unwrap();
        assert_eq!(saved["id"], json!("fixed"));
    }

    #[tokio::test]
    async fn test_update_removes_key_and_absent_fields() {
        let mut adapter = mock(DatabaseType::MongoDb);
        adapter
            .expect_update()
            .withf(|_, criteria, data| {
                criteria["name"] == json!("X")
                    && !data.contains_key("_id")
                    && !data.contains_key("note")
                    && data["value"] == json!(2)
            })
            .times(1)
            .returning(|_, _, _| Ok(1));

        let orm = Orm::new(Box::new(adapter));
        orm.define_model("Item", "items");
        let changed = orm
            .update(
                "Item",
                &record(json!({"name": "X"})),
                record(json!({"_id": "abc", "value": 2, "note": null})),
            )
            .await
            .unwrap();
        assert_eq!(changed, 1);
    }

    #[tokio::test]
    async fn test_delete_and_find_delegate() {
        let mut adapter = mock(DatabaseType::PostgreSql);
        adapter
            .expect_find()
            .withf(|target, _| target.name == "items")
            .returning(|_, _| Ok(vec![Record::new(), Record::new()]));
        adapter
            .expect_find_one()
            .returning(|_, _| Ok(None));
        adapter
            .expect_delete()
            .withf(|target, criteria| target.key_field() == "id" && criteria["id"] == json!(3))
            .returning(|_, _| Ok(0));

        let orm = Orm::new(Box::new(adapter));
        orm.define_model("Item", "items");
        assert_eq!(orm.find("Item", &Criteria::new()).await.unwrap().len(), 2);
        assert!(orm.find_one("Item", &Criteria::new()).await.unwrap().is_none());
        assert_eq!(orm.delete("Item", &record(json!({"id": 3}))).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_unsupported_adapter() {
        let mut adapter = mock(DatabaseType::Redis);
        adapter.expect_supports_query().return_const(false);
        adapter.expect_query().never();

        let orm = Orm::new(Box::new(adapter));
        assert!(matches!(
            orm.query("KEYS *", vec![]).await,
            Err(OrmError::UnsupportedOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_query_delegates() {
        let mut adapter = mock(DatabaseType::MySql);
        adapter.expect_supports_query().return_const(true);
        adapter
            .expect_query()
            .with(eq("SELECT 1 AS one"), eq(Vec::<Value>::new()))
            .returning(|_, _| Ok(vec![into_record(json!({"one": 1})).unwrap()]));

        let orm = Orm::new(Box::new(adapter));
        let rows = orm.query("SELECT 1 AS one", vec![]).await.unwrap();
        assert_eq!(rows[0]["one"], json!(1));
    }
}
