//! MongoDB 适配器
//!
//! 记录以 JSON 形式进出。主键字段中的对象 ID 写入时转换为 `ObjectId`，
//! 读出时渲染为十六进制字符串。

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{self, Bson, Document, doc, oid::ObjectId};
use mongodb::options::{ClientOptions, FindOptions};
use mongodb::{Client, Collection, Database};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::config::{DatabaseConfig, DatabaseType};
use crate::error::{OrmError, Result};
use crate::models::key::KeyStrategy;
use crate::models::record::{Criteria, Record, RecordId};
use crate::storage::adapter::{DatabaseAdapter, Target};

#[derive(Clone)]
struct MongoHandle {
    client: Client,
    db: Database,
}

/// MongoDB 适配器
#[derive(Default)]
pub struct MongoDbAdapter {
    handle: RwLock<Option<MongoHandle>>,
}

impl MongoDbAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    async fn database(&self) -> Result<Database> {
        self.handle
            .read()
            .await
            .as_ref()
            .map(|h| h.db.clone())
            .ok_or_else(|| OrmError::NotConnected(DatabaseType::MongoDb.to_string()))
    }

    async fn collection(&self, name: &str) -> Result<Collection<Document>> {
        Ok(self.database().await?.collection::<Document>(name))
    }
}

/// 对象主键的目标，把字符串主键转换为 `ObjectId`
fn to_native_key(document: &mut Document, target: &Target) -> Result<()> {
    if target.primary_key.strategy != KeyStrategy::StoreObject {
        return Ok(());
    }
    let field = target.key_field();
    if let Some(Bson::String(hex)) = document.get(field) {
        let oid = ObjectId::parse_str(hex).map_err(|e| {
            OrmError::InvalidArgument(format!("invalid {} {:?} for {}: {}", field, hex, target.name, e))
        })?;
        document.insert(field, Bson::ObjectId(oid));
    }
    Ok(())
}

fn to_document(record: &Record) -> Result<Document> {
    Ok(bson::to_document(record)?)
}

fn filter_for(target: &Target, criteria: &Criteria) -> Result<Document> {
    let mut filter = to_document(criteria)?;
    to_native_key(&mut filter, target)?;
    Ok(filter)
}

fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::Document(document) => Value::Object(document_to_record(document)),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        other => other.into_relaxed_extjson(),
    }
}

fn document_to_record(document: Document) -> Record {
    document
        .into_iter()
        .map(|(k, v)| (k, bson_to_json(v)))
        .collect::<Map<String, Value>>()
}

fn bson_to_record_id(value: Bson) -> RecordId {
    match value {
        Bson::ObjectId(oid) => RecordId::Object(oid),
        Bson::Int32(n) => RecordId::Int(n as i64),
        Bson::Int64(n) => RecordId::Int(n),
        Bson::String(s) => RecordId::Text(s),
        other => RecordId::Text(other.to_string()),
    }
}

fn find_options(options: Option<&Value>) -> Result<Option<FindOptions>> {
    let Some(options) = options.filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let Value::Object(options) = options else {
        return Err(OrmError::InvalidArgument(
            "MongoDB query options must be an object".to_string(),
        ));
    };

    let mut find = FindOptions::default();
    find.limit = options.get("limit").and_then(Value::as_i64);
    find.skip = options.get("skip").and_then(Value::as_u64);
    if let Some(sort) = options.get("sort") {
        let Value::Object(sort) = sort else {
            return Err(OrmError::InvalidArgument(
                "MongoDB sort option must be an object".to_string(),
            ));
        };
        find.sort = Some(to_document(sort)?);
    }
    Ok(Some(find))
}

/// 解析连接地址；仅在配置了超时时覆盖 url 中的 `connectTimeoutMS`
async fn client_options(config: &DatabaseConfig) -> Result<ClientOptions> {
    let mut options = ClientOptions::parse(&config.url)
        .await
        .map_err(|e| OrmError::Connection(format!("invalid MongoDB url: {}", e)))?;
    if let Some(timeout) = config.timeout() {
        options.connect_timeout = Some(timeout);
    }
    Ok(options)
}

#[async_trait]
impl DatabaseAdapter for MongoDbAdapter {
    fn kind(&self) -> DatabaseType {
        DatabaseType::MongoDb
    }

    async fn connect(&self, config: &DatabaseConfig) -> Result<()> {
        if config.url.is_empty() || config.database.is_empty() {
            return Err(OrmError::Connection(
                "MongoDB requires both url and database name".to_string(),
            ));
        }

        let options = client_options(config).await?;
        let client = Client::with_options(options)
            .map_err(|e| OrmError::Connection(format!("failed to create MongoDB client: {}", e)))?;
        let db = client.database(&config.database);
        db.run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| OrmError::Connection(format!("failed to connect to MongoDB: {}", e)))?;

        *self.handle.write().await = Some(MongoHandle { client, db });
        info!(database = %config.database, "Connected to MongoDB.");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let handle = self.handle.write().await.take();
        if let Some(handle) = handle {
            drop(handle.db);
            handle.client.shutdown().await;
            info!("Disconnected from MongoDB.");
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.database()
            .await?
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }

    async fn insert(&self, target: &Target, record: Record) -> Result<RecordId> {
        let collection = self.collection(&target.name).await?;
        let mut document = to_document(&record)?;
        to_native_key(&mut document, target)?;

        debug!(collection = %target.name, "mongodb insertOne");
        let result = collection.insert_one(document, None).await?;
        Ok(bson_to_record_id(result.inserted_id))
    }

    async fn find(&self, target: &Target, criteria: &Criteria) -> Result<Vec<Record>> {
        let collection = self.collection(&target.name).await?;
        let filter = filter_for(target, criteria)?;

        debug!(collection = %target.name, filter = %filter, "mongodb find");
        let documents: Vec<Document> = collection.find(filter, None).await?.try_collect().await?;
        Ok(documents.into_iter().map(document_to_record).collect())
    }

    async fn find_one(&self, target: &Target, criteria: &Criteria) -> Result<Option<Record>> {
        let collection = self.collection(&target.name).await?;
        let filter = filter_for(target, criteria)?;

        debug!(collection = %target.name, filter = %filter, "mongodb findOne");
        Ok(collection
            .find_one(filter, None)
            .await?
            .map(document_to_record))
    }

    async fn update(&self, target: &Target, criteria: &Criteria, mut data: Record) -> Result<u64> {
        let collection = self.collection(&target.name).await?;
        data.remove(target.key_field());
        if data.is_empty() {
            return Ok(0);
        }
        let filter = filter_for(target, criteria)?;
        let changes = to_document(&data)?;

        debug!(collection = %target.name, filter = %filter, "mongodb updateMany");
        let result = collection
            .update_many(filter, doc! { "$set": changes }, None)
            .await?;
        Ok(result.modified_count)
    }

    async fn delete(&self, target: &Target, criteria: &Criteria) -> Result<u64> {
        let collection = self.collection(&target.name).await?;
        let filter = filter_for(target, criteria)?;

        debug!(collection = %target.name, filter = %filter, "mongodb deleteMany");
        let result = collection.delete_many(filter, None).await?;
        Ok(result.deleted_count)
    }

    /// `raw` 为集合名，`params[0]` 为过滤条件，`params[1]` 为选项（`limit`、`skip`、`sort`）
    async fn query(&self, raw: &str, params: Vec<Value>) -> Result<Vec<Record>> {
        let collection = self.collection(raw).await?;
        let target = Target::for_store(DatabaseType::MongoDb, raw);

        let filter = match params.first() {
            None | Some(Value::Null) => Document::new(),
            Some(Value::Object(filter)) => filter_for(&target, filter)?,
            Some(other) => {
                return Err(OrmError::InvalidArgument(format!(
                    "MongoDB query filter must be an object, got {}",
                    other
                )));
            }
        };
        let options = find_options(params.get(1))?;

        debug!(collection = %raw, filter = %filter, "mongodb query");
        let documents: Vec<Document> = collection.find(filter, options).await?.try_collect().await?;
        Ok(documents.into_iter().map(document_to_record).collect())
    }
}
