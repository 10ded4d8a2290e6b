//! PostgreSQL 适配器
//!
//! 单个 `tokio_postgres::Client`，连接 future 在独立任务中驱动。
//! 参数按预编译语句声明的类型绑定，无类型的 JSON 值据此转换为列类型；
//! 无法绑定或无法读取的类型直接报错，不会静默变为 `null`。

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_postgres::types::{FromSql, ToSql, Type};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, info, warn};

use crate::config::config::{DatabaseConfig, DatabaseType};
use crate::error::{OrmError, Result};
use crate::models::record::{Criteria, Record, RecordId};
use crate::storage::adapter::{DatabaseAdapter, Target};
use crate::storage::sql::{Placeholder, SqlBuilder, Statement};

type SqlParam = Box<dyn ToSql + Sync + Send>;

/// PostgreSQL 适配器
#[derive(Default)]
pub struct PostgresAdapter {
    client: RwLock<Option<Arc<Client>>>,
}

impl PostgresAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    async fn client(&self) -> Result<Arc<Client>> {
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| OrmError::NotConnected(DatabaseType::PostgreSql.to_string()))
    }

    /// 连接参数：优先使用 url，否则由 host/port/user/password/database 组装
    fn pg_config(config: &DatabaseConfig) -> Result<tokio_postgres::Config> {
        let mut pg = if config.url.is_empty() {
            let mut pg = tokio_postgres::Config::new();
            pg.host(config.host_or_default())
                .port(config.port.unwrap_or(5432))
                .user(&config.user)
                .password(&config.password)
                .dbname(&config.database);
            pg
        } else {
            config
                .url
                .parse::<tokio_postgres::Config>()
                .map_err(|e| OrmError::Connection(format!("invalid PostgreSQL url: {}", e)))?
        };
        if let Some(timeout) = config.timeout() {
            pg.connect_timeout(timeout);
        }
        Ok(pg)
    }

    async fn rows(&self, stmt: &Statement) -> Result<Vec<Row>> {
        let client = self.client().await?;
        debug!(sql = %stmt.sql, params = stmt.params.len(), "postgres query");
        let prepared = client.prepare(&stmt.sql).await?;
        let params = bind_params(&stmt.params, prepared.params())?;
        let refs = param_refs(&params);
        client.query(&prepared, &refs).await.map_err(|e| {
            warn!(sql = %stmt.sql, error = %e, "postgres query failed");
            OrmError::from(e)
        })
    }

    async fn records(&self, stmt: &Statement) -> Result<Vec<Record>> {
        self.rows(stmt).await?.iter().map(row_to_record).collect()
    }

    async fn execute(&self, stmt: &Statement) -> Result<u64> {
        let client = self.client().await?;
        debug!(sql = %stmt.sql, params = stmt.params.len(), "postgres execute");
        let prepared = client.prepare(&stmt.sql).await?;
        let params = bind_params(&stmt.params, prepared.params())?;
        let refs = param_refs(&params);
        client.execute(&prepared, &refs).await.map_err(|e| {
            warn!(sql = %stmt.sql, error = %e, "postgres execute failed");
            OrmError::from(e)
        })
    }
}

fn param_refs(params: &[SqlParam]) -> Vec<&(dyn ToSql + Sync)> {
    params
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

fn bind_params(values: &[Value], types: &[Type]) -> Result<Vec<SqlParam>> {
    if values.len() != types.len() {
        return Err(OrmError::InvalidArgument(format!(
            "statement expects {} parameters, got {}",
            types.len(),
            values.len()
        )));
    }
    values
        .iter()
        .zip(types)
        .map(|(value, ty)| json_to_sql(value, ty))
        .collect()
}

/// `null` 绑定为 `None`，其余值必须能被 `convert` 接受
fn typed<T>(value: &Value, ty: &Type, convert: impl FnOnce(&Value) -> Option<T>) -> Result<Option<T>> {
    if value.is_null() {
        return Ok(None);
    }
    convert(value).map(Some).ok_or_else(|| {
        OrmError::InvalidArgument(format!("cannot bind {} as {}", value, ty))
    })
}

fn json_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_u64().map(Decimal::from))
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        Value::String(s) => s
            .parse::<Decimal>()
            .ok()
            .or_else(|| Decimal::from_scientific(s).ok()),
        _ => None,
    }
}

/// 精确可表示时输出为 JSON 数值，否则输出为字符串以免丢失精度
fn decimal_to_json(d: Decimal) -> Value {
    if d.fract().is_zero() {
        if let Some(n) = d.to_i64() {
            return Value::from(n);
        }
    }
    d.to_f64()
        .filter(|f| Decimal::from_f64(*f) == Some(d))
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(d.to_string()))
}

fn json_to_bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::String(s) => Some(s.as_bytes().to_vec()),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
            .collect(),
        _ => None,
    }
}

fn json_to_sql(value: &Value, ty: &Type) -> Result<SqlParam> {
    let param: SqlParam = match *ty {
        Type::BOOL => Box::new(typed(value, ty, Value::as_bool)?),
        Type::INT2 => Box::new(typed(value, ty, |v| {
            v.as_i64().and_then(|n| i16::try_from(n).ok())
        })?),
        Type::INT4 => Box::new(typed(value, ty, |v| {
            v.as_i64().and_then(|n| i32::try_from(n).ok())
        })?),
        Type::INT8 => Box::new(typed(value, ty, Value::as_i64)?),
        Type::FLOAT4 => Box::new(typed(value, ty, |v| v.as_f64().map(|f| f as f32))?),
        Type::FLOAT8 => Box::new(typed(value, ty, Value::as_f64)?),
        Type::NUMERIC => Box::new(typed(value, ty, json_to_decimal)?),
        Type::JSON | Type::JSONB => Box::new(typed(value, ty, |v| Some(v.clone()))?),
        Type::UUID => Box::new(typed(value, ty, |v| {
            v.as_str().and_then(|s| uuid::Uuid::parse_str(s).ok())
        })?),
        Type::TIMESTAMPTZ => Box::new(typed(value, ty, |v| {
            v.as_str()
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&chrono::Utc))
        })?),
        Type::TIMESTAMP => Box::new(typed(value, ty, |v| {
            v.as_str().and_then(|s| s.parse::<chrono::NaiveDateTime>().ok())
        })?),
        Type::DATE => Box::new(typed(value, ty, |v| {
            v.as_str().and_then(|s| s.parse::<chrono::NaiveDate>().ok())
        })?),
        Type::TIME => Box::new(typed(value, ty, |v| {
            v.as_str().and_then(|s| s.parse::<chrono::NaiveTime>().ok())
        })?),
        Type::BYTEA => Box::new(typed(value, ty, json_to_bytes)?),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            Box::new(typed(value, ty, |v| match v {
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })?)
        }
        _ => {
            return Err(OrmError::InvalidArgument(format!(
                "unsupported parameter type {} for {}",
                ty, value
            )));
        }
    };
    Ok(param)
}

fn row_to_record(row: &Row) -> Result<Record> {
    let mut record = Map::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        record.insert(column.name().to_string(), column_to_json(row, idx)?);
    }
    Ok(record)
}

fn column_to_json(row: &Row, idx: usize) -> Result<Value> {
    fn get<'a, T>(row: &'a Row, idx: usize) -> Result<Option<T>>
    where
        T: FromSql<'a>,
    {
        row.try_get::<_, Option<T>>(idx).map_err(|e| {
            let column = &row.columns()[idx];
            OrmError::Database(format!(
                "cannot decode column {} of type {}: {}",
                column.name(),
                column.type_(),
                e
            ))
        })
    }

    let ty = row.columns()[idx].type_();
    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx)?.map(Value::from),
        Type::INT2 => get::<i16>(row, idx)?.map(Value::from),
        Type::INT4 => get::<i32>(row, idx)?.map(Value::from),
        Type::INT8 => get::<i64>(row, idx)?.map(Value::from),
        Type::FLOAT4 => get::<f32>(row, idx)?.map(Value::from),
        Type::FLOAT8 => get::<f64>(row, idx)?.map(Value::from),
        Type::NUMERIC => get::<Decimal>(row, idx)?.map(decimal_to_json),
        Type::JSON | Type::JSONB => get::<Value>(row, idx)?,
        Type::UUID => get::<uuid::Uuid>(row, idx)?.map(|u| Value::String(u.to_string())),
        Type::TIMESTAMPTZ => get::<chrono::DateTime<chrono::Utc>>(row, idx)?
            .map(|dt| Value::String(dt.to_rfc3339())),
        Type::TIMESTAMP => {
            get::<chrono::NaiveDateTime>(row, idx)?.map(|dt| Value::String(dt.to_string()))
        }
        Type::DATE => get::<chrono::NaiveDate>(row, idx)?.map(|d| Value::String(d.to_string())),
        Type::TIME => get::<chrono::NaiveTime>(row, idx)?.map(|t| Value::String(t.to_string())),
        Type::BYTEA => get::<Vec<u8>>(row, idx)?.map(Value::from),
        // 其余类型按文本读取，驱动不接受时报错
        _ => get::<String>(row, idx)?.map(Value::String),
    };
    Ok(value.unwrap_or(Value::Null))
}

#[async_trait]
impl DatabaseAdapter for PostgresAdapter {
    fn kind(&self) -> DatabaseType {
        DatabaseType::PostgreSql
    }

    async fn connect(&self, config: &DatabaseConfig) -> Result<()> {
        let pg = Self::pg_config(config)?;
        let (client, connection) = pg
            .connect(NoTls)
            .await
            .map_err(|e| OrmError::Connection(format!("failed to connect to PostgreSQL: {}", e)))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "PostgreSQL connection closed with error");
            }
        });

        *self.client.write().await = Some(Arc::new(client));
        info!("Connected to PostgreSQL database.");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        // 最后一个 client 句柄释放后连接任务结束
        if self.client.write().await.take().is_some() {
            info!("Disconnected from PostgreSQL database.");
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.client().await?.simple_query("SELECT 1").await?;
        Ok(())
    }

    async fn insert(&self, target: &Target, record: Record) -> Result<RecordId> {
        let supplied = target.primary_key.value_in(&record).cloned();
        let stmt = SqlBuilder::new(Placeholder::Numbered).insert(
            &target.name,
            &record,
            Some(target.key_field()),
        )?;
        let returned = match self.rows(&stmt).await?.first() {
            Some(row) => Some(column_to_json(row, 0)?),
            None => None,
        };
        returned
            .filter(|v| !v.is_null())
            .or(supplied)
            .as_ref()
            .and_then(RecordId::from_value)
            .ok_or_else(|| {
                OrmError::Database(format!(
                    "insert into {} returned no {}",
                    target.name,
                    target.key_field()
                ))
            })
    }

    async fn find(&self, target: &Target, criteria: &Criteria) -> Result<Vec<Record>> {
        let stmt = SqlBuilder::new(Placeholder::Numbered).select(&target.name, criteria, false)?;
        self.records(&stmt).await
    }

    async fn find_one(&self, target: &Target, criteria: &Criteria) -> Result<Option<Record>> {
        let stmt = SqlBuilder::new(Placeholder::Numbered).select(&target.name, criteria, true)?;
        Ok(self.records(&stmt).await?.into_iter().next())
    }

    async fn update(&self, target: &Target, criteria: &Criteria, mut data: Record) -> Result<u64> {
        self.client().await?;
        data.remove(target.key_field());
        if data.is_empty() {
            return Ok(0);
        }
        let stmt = SqlBuilder::new(Placeholder::Numbered).update(&target.name, criteria, &data)?;
        self.execute(&stmt).await
    }

    async fn delete(&self, target: &Target, criteria: &Criteria) -> Result<u64> {
        let stmt = SqlBuilder::new(Placeholder::Numbered).delete(&target.name, criteria)?;
        self.execute(&stmt).await
    }

    async fn query(&self, raw: &str, params: Vec<Value>) -> Result<Vec<Record>> {
        let stmt = Statement {
            sql: raw.to_string(),
            params,
        };
        self.records(&stmt).await
    }
}
