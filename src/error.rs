//! 错误处理模块
//!
//! 定义映射层的错误类型。适配器和编排器内部不捕获、不重试任何错误，
//! 所有失败都直接返回给调用方。

use thiserror::Error;

/// 映射层错误类型
#[derive(Error, Debug)]
pub enum OrmError {
    /// 连接错误（connect 阶段驱动拒绝配置或网络失败）
    #[error("连接错误: {0}")]
    Connection(String),

    /// 未连接（connect 之前或 disconnect 之后发起操作）
    #[error("未连接数据库: {0}")]
    NotConnected(String),

    /// 参数无效
    #[error("参数无效: {0}")]
    InvalidArgument(String),

    /// 不支持的数据库类型
    #[error("Unsupported database type: {0}")]
    UnsupportedType(String),

    /// 当前适配器不支持该操作
    #[error("不支持的操作: {0}")]
    UnsupportedOperation(String),

    /// 模型未定义
    #[error("模型未定义: {0}")]
    NotDefined(String),

    /// 数据库错误（操作阶段的驱动错误）
    #[error("数据库错误: {0}")]
    Database(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),
}

impl OrmError {
    /// 根据数据库标签构造不支持类型错误，缺失标签时记为 `None`
    pub fn unsupported_type(tag: Option<&str>) -> Self {
        match tag {
            Some(tag) => OrmError::UnsupportedType(tag.to_string()),
            None => OrmError::UnsupportedType("None".to_string()),
        }
    }

    /// 是否为连接相关错误
    pub fn is_connection(&self) -> bool {
        matches!(self, OrmError::Connection(_) | OrmError::NotConnected(_))
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(e: serde_json::Error) -> Self {
        OrmError::Serialization(e.to_string())
    }
}

impl From<figment::Error> for OrmError {
    fn from(e: figment::Error) -> Self {
        OrmError::Config(e.to_string())
    }
}

impl From<bson::ser::Error> for OrmError {
    fn from(e: bson::ser::Error) -> Self {
        OrmError::Serialization(e.to_string())
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for OrmError {
    fn from(e: mongodb::error::Error) -> Self {
        OrmError::Database(e.to_string())
    }
}

#[cfg(feature = "mysql")]
impl From<mysql_async::Error> for OrmError {
    fn from(e: mysql_async::Error) -> Self {
        OrmError::Database(e.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for OrmError {
    fn from(e: tokio_postgres::Error) -> Self {
        OrmError::Database(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for OrmError {
    fn from(e: redis::RedisError) -> Self {
        OrmError::Database(e.to_string())
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, OrmError>;
