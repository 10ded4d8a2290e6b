//! 存储层模块
//!
//! 统一的适配器契约，以及 MongoDB、MySQL、PostgreSQL 和 Redis 的实现。
//! 各存储后端由同名 cargo feature 控制。

pub mod adapter;
pub mod factory;

#[cfg(any(feature = "mysql", feature = "postgres"))]
pub mod sql;

#[cfg(feature = "mongodb")]
pub mod mongodb;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "redis")]
pub mod redis;

pub use adapter::{DatabaseAdapter, Target};
pub use factory::StorageFactory;
