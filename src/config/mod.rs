//! 配置管理模块
//!
//! 提供数据库连接配置与日志配置，支持 TOML 配置文件和环境变量覆盖。

pub mod config;
pub mod loader;

pub use config::{AppConfig, DatabaseConfig, DatabaseType, LoggingConfig};
