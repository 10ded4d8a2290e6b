//! Polyorm - 多存储统一映射层
//!
//! 在 MongoDB、MySQL、PostgreSQL 和 Redis 之上提供统一的 CRUD 契约，
//! 并通过编排器和模型 trait 把实体映射到表、集合或键前缀。

pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod orm;
pub mod storage;

pub use error::{OrmError, Result};
pub use models::{Criteria, KeyStrategy, PrimaryKey, Record, RecordId};
pub use orm::{Model, Orm};
pub use storage::{DatabaseAdapter, StorageFactory, Target};
