//! 数据模型模块
//!
//! 定义记录、查询条件、主键值与主键声明。

pub mod key;
pub mod record;

pub use key::{KeyStrategy, PrimaryKey};
pub use record::{Criteria, Record, RecordId};
