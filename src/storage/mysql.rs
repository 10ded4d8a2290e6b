//! MySQL 适配器
//!
//! 单个 `mysql_async::Conn` 由互斥锁保护，语句使用 `?` 占位符和位置参数。

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::config::{DatabaseConfig, DatabaseType};
use crate::error::{OrmError, Result};
use crate::models::record::{Criteria, Record, RecordId};
use crate::storage::adapter::{DatabaseAdapter, Target};
use crate::storage::sql::{Placeholder, SqlBuilder, Statement};

/// 不返回行的语句的执行结果
struct ExecOutcome {
    affected_rows: u64,
    last_insert_id: Option<u64>,
}

/// MySQL 适配器
#[derive(Default)]
pub struct MySqlAdapter {
    conn: Mutex<Option<Conn>>,
}

impl MySqlAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn opts(config: &DatabaseConfig) -> Result<Opts> {
        if !config.url.is_empty() {
            return Opts::from_url(&config.url)
                .map_err(|e| OrmError::Connection(format!("invalid MySQL url: {}", e)));
        }
        let builder = OptsBuilder::default()
            .ip_or_hostname(config.host_or_default())
            .tcp_port(config.port.unwrap_or(3306))
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .db_name((!config.database.is_empty()).then(|| config.database.clone()));
        Ok(builder.into())
    }

    fn not_connected() -> OrmError {
        OrmError::NotConnected(DatabaseType::MySql.to_string())
    }

    async fn rows(&self, stmt: Statement) -> Result<Vec<Record>> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(Self::not_connected)?;
        debug!(sql = %stmt.sql, params = stmt.params.len(), "mysql query");

        let params: Vec<mysql_async::Value> = stmt.params.iter().map(json_to_mysql).collect();
        let rows: Vec<mysql_async::Row> = conn.exec(stmt.sql.as_str(), params).await.map_err(|e| {
            warn!(sql = %stmt.sql, error = %e, "mysql query failed");
            OrmError::from(e)
        })?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecOutcome> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(Self::not_connected)?;
        debug!(sql = %stmt.sql, params = stmt.params.len(), "mysql execute");

        let params: Vec<mysql_async::Value> = stmt.params.iter().map(json_to_mysql).collect();
        conn.exec_drop(stmt.sql.as_str(), params).await.map_err(|e| {
            warn!(sql = %stmt.sql, error = %e, "mysql execute failed");
            OrmError::from(e)
        })?;
        Ok(ExecOutcome {
            affected_rows: conn.affected_rows(),
            last_insert_id: conn.last_insert_id(),
        })
    }
}

fn json_to_mysql(value: &Value) -> mysql_async::Value {
    match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Bool(b) => mysql_async::Value::Int(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                mysql_async::Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                mysql_async::Value::UInt(u)
            } else {
                mysql_async::Value::Double(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => mysql_async::Value::Bytes(s.as_bytes().to_vec()),
        // 嵌套值以文本形式写入 JSON 列
        other => mysql_async::Value::Bytes(other.to_string().into_bytes()),
    }
}

fn mysql_to_json(value: mysql_async::Value) -> Value {
    match value {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => Value::String(s),
            Err(e) => Value::from(e.into_bytes()),
        },
        mysql_async::Value::Int(n) => Value::from(n),
        mysql_async::Value::UInt(n) => Value::from(n),
        mysql_async::Value::Float(f) => Value::from(f),
        mysql_async::Value::Double(d) => Value::from(d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            let date = chrono::NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32);
            match date {
                Some(date) if hour == 0 && min == 0 && sec == 0 && micro == 0 => {
                    Value::String(date.to_string())
                }
                Some(date) => date
                    .and_hms_micro_opt(hour as u32, min as u32, sec as u32, micro)
                    .map(|dt| Value::String(dt.to_string()))
                    .unwrap_or(Value::Null),
                None => Value::Null,
            }
        }
        mysql_async::Value::Time(negative, days, hour, min, sec, micro) => {
            let hours = days * 24 + hour as u32;
            let sign = if negative { "-" } else { "" };
            let text = if micro > 0 {
                format!("{}{:02}:{:02}:{:02}.{:06}", sign, hours, min, sec, micro)
            } else {
                format!("{}{:02}:{:02}:{:02}", sign, hours, min, sec)
            };
            Value::String(text)
        }
    }
}

fn row_to_record(row: &mysql_async::Row) -> Record {
    let mut record = Map::with_capacity(row.len());
    for (idx, column) in row.columns_ref().iter().enumerate() {
        let value: mysql_async::Value = row.get(idx).unwrap_or(mysql_async::Value::NULL);
        record.insert(column.name_str().to_string(), mysql_to_json(value));
    }
    record
}

#[async_trait]
impl DatabaseAdapter for MySqlAdapter {
    fn kind(&self) -> DatabaseType {
        DatabaseType::MySql
    }

    async fn connect(&self, config: &DatabaseConfig) -> Result<()> {
        let opts = Self::opts(config)?;
        let conn = Conn::new(opts)
            .await
            .map_err(|e| OrmError::Connection(format!("failed to connect to MySQL: {}", e)))?;

        let previous = self.conn.lock().await.replace(conn);
        if let Some(previous) = previous {
            if let Err(e) = previous.disconnect().await {
                warn!(error = %e, "failed to close previous MySQL connection");
            }
        }
        info!("Connected to MySQL database.");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let conn = self.conn.lock().await.take();
        if let Some(conn) = conn {
            conn.disconnect().await?;
            info!("Disconnected from MySQL database.");
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(Self::not_connected)?;
        conn.ping().await?;
        Ok(())
    }

    async fn insert(&self, target: &Target, record: Record) -> Result<RecordId> {
        let supplied = target.primary_key.value_in(&record).cloned();
        let stmt = SqlBuilder::new(Placeholder::Question).insert(&target.name, &record, None)?;
        let outcome = self.execute(stmt).await?;

        match outcome.last_insert_id.filter(|id| *id > 0) {
            Some(id) => i64::try_from(id)
                .map(RecordId::Int)
                .map_err(|_| OrmError::Database(format!("insert id {} out of range", id))),
            None => supplied
                .as_ref()
                .and_then(RecordId::from_value)
                .ok_or_else(|| {
                    OrmError::Database(format!(
                        "insert into {} produced no {}",
                        target.name,
                        target.key_field()
                    ))
                }),
        }
    }

    async fn find(&self, target: &Target, criteria: &Criteria) -> Result<Vec<Record>> {
        let stmt = SqlBuilder::new(Placeholder::Question).select(&target.name, criteria, false)?;
        self.rows(stmt).await
    }

    async fn find_one(&self, target: &Target, criteria: &Criteria) -> Result<Option<Record>> {
        let stmt = SqlBuilder::new(Placeholder::Question).select(&target.name, criteria, true)?;
        Ok(self.rows(stmt).await?.into_iter().next())
    }

    async fn update(&self, target: &Target, criteria: &Criteria, mut data: Record) -> Result<u64> {
        if self.conn.lock().await.is_none() {
            return Err(Self::not_connected());
        }
        data.remove(target.key_field());
        if data.is_empty() {
            return Ok(0);
        }
        let stmt = SqlBuilder::new(Placeholder::Question).update(&target.name, criteria, &data)?;
        Ok(self.execute(stmt).await?.affected_rows)
    }

    async fn delete(&self, target: &Target, criteria: &Criteria) -> Result<u64> {
        let stmt = SqlBuilder::new(Placeholder::Question).delete(&target.name, criteria)?;
        Ok(self.execute(stmt).await?.affected_rows)
    }

    async fn query(&self, raw: &str, params: Vec<Value>) -> Result<Vec<Record>> {
        self.rows(Statement {
            sql: raw.to_string(),
            params,
        })
        .await
    }
}
