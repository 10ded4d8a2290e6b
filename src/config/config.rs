use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::OrmError;
use crate::models::key::PrimaryKey;

/// 数据库类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// MongoDB 文档数据库
    MongoDb,
    /// MySQL 关系数据库
    MySql,
    /// PostgreSQL 关系数据库
    PostgreSql,
    /// Redis 键值数据库
    Redis,
}

impl DatabaseType {
    /// 全部支持的类型
    pub const ALL: [DatabaseType; 4] = [
        DatabaseType::MongoDb,
        DatabaseType::MySql,
        DatabaseType::PostgreSql,
        DatabaseType::Redis,
    ];

    /// 类型标签
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::MongoDb => "mongodb",
            DatabaseType::MySql => "mysql",
            DatabaseType::PostgreSql => "postgresql",
            DatabaseType::Redis => "redis",
        }
    }

    /// 该存储的主键约定
    pub fn default_primary_key(&self) -> PrimaryKey {
        match self {
            DatabaseType::MongoDb => PrimaryKey::store_object("_id"),
            DatabaseType::MySql | DatabaseType::PostgreSql => PrimaryKey::store_scalar("id"),
            DatabaseType::Redis => PrimaryKey::client_generated("id"),
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseType {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatabaseType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| OrmError::unsupported_type(Some(s)))
    }
}

/// 数据库配置
///
/// 各存储只读取自己需要的字段：
/// - mongodb: `url` + `database`
/// - mysql / postgresql: `url`，或 `host`/`user`/`password`/`database`/`port`
/// - redis: `url`，或 `host`/`port`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 存储类型标签，由工厂解析
    pub db_type: Option<String>,
    /// 连接地址
    pub url: String,
    /// 主机
    pub host: String,
    /// 端口
    pub port: Option<u16>,
    /// 用户名
    pub user: String,
    /// 密码
    pub password: String,
    /// 数据库名称
    pub database: String,
    /// 连接超时（秒），0 表示使用驱动默认值
    pub connect_timeout: u64,
}

impl DatabaseConfig {
    /// 以连接地址创建配置
    pub fn with_url(db_type: DatabaseType, url: impl Into<String>) -> Self {
        Self {
            db_type: Some(db_type.to_string()),
            url: url.into(),
            ..Default::default()
        }
    }

    /// 设置数据库名称
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// 连接超时
    pub fn timeout(&self) -> Option<std::time::Duration> {
        (self.connect_timeout > 0).then(|| std::time::Duration::from_secs(self.connect_timeout))
    }

    /// 主机，未配置时为 localhost
    pub fn host_or_default(&self) -> &str {
        if self.host.is_empty() {
            "localhost"
        } else {
            &self.host
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 结构化日志格式
    pub structured: bool,
    /// 日志文件路径
    pub log_dir: Option<PathBuf>,
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 应用名称
    pub app_name: String,
    /// 环境
    pub environment: String,
}

impl AppConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        Self {
            database: DatabaseConfig {
                db_type: Some(DatabaseType::Redis.to_string()),
                url: "redis://localhost:6379".into(),
                host: "localhost".into(),
                port: None,
                user: String::new(),
                password: String::new(),
                database: "polyorm".into(),
                connect_timeout: 10,
            },
            logging: LoggingConfig {
                level: "debug".into(),
                structured: false,
                log_dir: None,
            },
            app_name: "polyorm".into(),
            environment: "development".into(),
        }
    }

    /// 创建生产环境配置
    pub fn production() -> Self {
        let mut config = Self::development();
        config.environment = "production".into();
        config.logging.level = "info".into();
        config.logging.structured = true;
        config.logging.log_dir = Some(PathBuf::from("./logs"));
        config
    }
}
