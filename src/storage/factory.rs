//! 存储工厂模块
//!
//! 根据数据库类型创建对应的适配器实例。每次调用都构造新实例，不做缓存。

use crate::config::config::{DatabaseConfig, DatabaseType};
use crate::error::{OrmError, Result};
use crate::storage::adapter::DatabaseAdapter;
use tracing::info;

#[cfg(feature = "mongodb")]
use crate::storage::mongodb::MongoDbAdapter;
#[cfg(feature = "mysql")]
use crate::storage::mysql::MySqlAdapter;
#[cfg(feature = "postgres")]
use crate::storage::postgres::PostgresAdapter;
#[cfg(feature = "redis")]
use crate::storage::redis::RedisAdapter;

/// 存储工厂
pub struct StorageFactory;

impl StorageFactory {
    /// 创建未连接的适配器
    pub fn create_adapter(db_type: DatabaseType) -> Result<Box<dyn DatabaseAdapter>> {
        match db_type {
            #[cfg(feature = "mongodb")]
            DatabaseType::MongoDb => Ok(Box::new(MongoDbAdapter::new())),
            #[cfg(feature = "mysql")]
            DatabaseType::MySql => Ok(Box::new(MySqlAdapter::new())),
            #[cfg(feature = "postgres")]
            DatabaseType::PostgreSql => Ok(Box::new(PostgresAdapter::new())),
            #[cfg(feature = "redis")]
            DatabaseType::Redis => Ok(Box::new(RedisAdapter::new())),
            #[allow(unreachable_patterns)]
            disabled => Err(OrmError::Config(format!(
                "{} feature is not enabled. Enable the '{}' feature to use it.",
                disabled,
                Self::feature_name(disabled)
            ))),
        }
    }

    /// 按类型标签创建适配器，未知或缺失的标签返回 `UnsupportedType`
    pub fn create_adapter_from_tag(tag: Option<&str>) -> Result<Box<dyn DatabaseAdapter>> {
        let db_type = match tag {
            Some(tag) => tag.parse::<DatabaseType>()?,
            None => return Err(OrmError::unsupported_type(None)),
        };
        Self::create_adapter(db_type)
    }

    /// 根据配置创建并连接适配器
    pub async fn create(config: &DatabaseConfig) -> Result<Box<dyn DatabaseAdapter>> {
        let adapter = Self::create_adapter_from_tag(config.db_type.as_deref())?;
        adapter.connect(config).await?;
        info!(db_type = %adapter.kind(), "Storage adapter ready");
        Ok(adapter)
    }

    /// 检查存储是否可用，未连接时返回 false
    pub async fn health_check(adapter: &dyn DatabaseAdapter) -> Result<bool> {
        match adapter.ping().await {
            Ok(()) => Ok(true),
            Err(OrmError::NotConnected(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn feature_name(db_type: DatabaseType) -> &'static str {
        match db_type {
            DatabaseType::MongoDb => "mongodb",
            DatabaseType::MySql => "mysql",
            DatabaseType::PostgreSql => "postgres",
            DatabaseType::Redis => "redis",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::adapter::MockDatabaseAdapter;
    use rstest::rstest;

    #[rstest]
    #[case("mongodb", DatabaseType::MongoDb)]
    #[case("mysql", DatabaseType::MySql)]
    #[case("postgresql", DatabaseType::PostgreSql)]
    #[case("redis", DatabaseType::Redis)]
    fn test_create_adapter_from_tag(#[case] tag: &str, #[case] expected: DatabaseType) {
        let adapter = StorageFactory::create_adapter_from_tag(Some(tag)).unwrap();
        assert_eq!(adapter.kind(), expected);
    }

    #[rstest]
    #[case(Some("sqlite"), "sqlite")]
    #[case(Some("MongoDB"), "MongoDB")]
    #[case(Some(""), "")]
    #[case(None, "None")]
    fn test_unsupported_tags(#[case] tag: Option<&str>, #[case] carried: &str) {
        match StorageFactory::create_adapter_from_tag(tag) {
            Err(OrmError::UnsupportedType(value)) => assert_eq!(value, carried),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(adapter) => panic!("unexpected adapter: {}", adapter.kind()),
        }
    }

    #[test]
    fn test_every_call_builds_a_new_adapter() {
        let a = StorageFactory::create_adapter(DatabaseType::Redis).unwrap();
        let b = StorageFactory::create_adapter(DatabaseType::Redis).unwrap();
        let a_ptr = &*a as *const dyn DatabaseAdapter as *const ();
        let b_ptr = &*b as *const dyn DatabaseAdapter as *const ();
        assert_ne!(a_ptr, b_ptr);
    }

    #[tokio::test]
    async fn test_create_rejects_missing_type() {
        let config = DatabaseConfig::default();
        assert!(matches!(
            StorageFactory::create(&config).await,
            Err(OrmError::UnsupportedType(_))
        ));
    }

    #[tokio::test]
    async fn test_health_check() {
        let mut healthy = MockDatabaseAdapter::new();
        healthy.expect_ping().returning(|| Ok(()));
        assert!(StorageFactory::health_check(&healthy).await.unwrap());

        let mut idle = MockDatabaseAdapter::new();
        idle.expect_ping()
            .returning(|| Err(OrmError::NotConnected("redis".into())));
        assert!(!StorageFactory::health_check(&idle).await.unwrap());

        let mut broken = MockDatabaseAdapter::new();
        broken
            .expect_ping()
            .returning(|| Err(OrmError::Database("connection reset".into())));
        assert!(StorageFactory::health_check(&broken).await.is_err());
    }
}
