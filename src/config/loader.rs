use crate::config::config::{AppConfig, DatabaseType};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::PathBuf;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "POLYORM_";

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从默认路径加载配置
    ///
    /// 优先级（后者覆盖前者）：
    /// 1. 内置默认值
    /// 2. ./polyorm.toml
    /// 3. 环境变量，例如 `POLYORM_DATABASE__URL`
    pub fn load() -> Result<AppConfig, figment::Error> {
        Self::load_from(default_config_path())
    }

    /// 从指定路径加载配置
    pub fn load_from(path: PathBuf) -> Result<AppConfig, figment::Error> {
        Self::figment(path).extract()
    }

    fn figment(path: PathBuf) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::development()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// 验证配置
    pub fn validate(config: &AppConfig) -> Result<(), ConfigValidationError> {
        let tag = config
            .database
            .db_type
            .as_deref()
            .ok_or(ConfigValidationError::MissingDatabaseType)?;

        let db_type: DatabaseType = tag
            .parse()
            .map_err(|_| ConfigValidationError::UnknownDatabaseType(tag.to_string()))?;

        if db_type == DatabaseType::MongoDb {
            if config.database.url.is_empty() {
                return Err(ConfigValidationError::MissingDatabaseUrl);
            }
            if config.database.database.is_empty() {
                return Err(ConfigValidationError::MissingDatabaseName);
            }
        }

        Ok(())
    }
}

/// 配置验证错误
#[derive(thiserror::Error, Debug)]
pub enum ConfigValidationError {
    #[error("数据库类型未配置")]
    MissingDatabaseType,

    #[error("未知的数据库类型: {0}")]
    UnknownDatabaseType(String),

    #[error("数据库连接 URL 未配置")]
    MissingDatabaseUrl,

    #[error("数据库名称未配置")]
    MissingDatabaseName,
}

/// 获取默认配置文件路径
pub fn default_config_path() -> PathBuf {
    PathBuf::from("polyorm.toml")
}

/// 检查配置文件是否存在
pub fn config_exists() -> bool {
    default_config_path().exists()
}
