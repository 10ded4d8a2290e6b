//! 记录与查询条件
//!
//! 记录是字段名到值的无模式映射，本层不做模式校验。

use bson::oid::ObjectId;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{OrmError, Result};

/// 一条记录（行 / 文档 / 键值条目）
pub type Record = Map<String, Value>;

/// 精确匹配的合取查询条件
pub type Criteria = Map<String, Value>;

/// insert 返回的主键值
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    /// 数值主键（自增列）
    Int(i64),
    /// 字符串主键
    Text(String),
    /// 文档存储生成的对象标识
    Object(ObjectId),
}

impl RecordId {
    /// 从字段值解析主键
    pub fn from_value(value: &Value) -> Option<RecordId> {
        match value {
            Value::Number(n) => n.as_i64().map(RecordId::Int),
            Value::String(s) => Some(RecordId::Text(s.clone())),
            _ => None,
        }
    }

    /// 转换为记录字段值
    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Int(n) => Value::from(*n),
            RecordId::Text(s) => Value::String(s.clone()),
            RecordId::Object(oid) => Value::String(oid.to_hex()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
            RecordId::Object(oid) => write!(f, "{}", oid.to_hex()),
        }
    }
}

impl From<RecordId> for Value {
    fn from(id: RecordId) -> Self {
        id.to_value()
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId::Text(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Text(s.to_string())
    }
}

impl From<ObjectId> for RecordId {
    fn from(oid: ObjectId) -> Self {
        RecordId::Object(oid)
    }
}

/// 去除值为 `null` 的字段
pub fn strip_absent(record: Record) -> Record {
    record.into_iter().filter(|(_, v)| !v.is_null()).collect()
}

/// 记录是否满足全部条件
///
/// 字段必须存在且相等；数值按数值比较，`1` 与 `1.0` 相等。
pub fn matches(record: &Record, criteria: &Criteria) -> bool {
    criteria.iter().all(|(field, expected)| {
        record
            .get(field)
            .is_some_and(|actual| values_equal(actual, expected))
    })
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

/// JSON 值转换为记录，非对象时报错
pub fn into_record(value: Value) -> Result<Record> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(OrmError::Serialization(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// 序列化实体为记录
pub fn to_record<T: Serialize>(entity: &T) -> Result<Record> {
    into_record(serde_json::to_value(entity)?)
}

/// 从记录构造实体
pub fn from_record<T: DeserializeOwned>(record: Record) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn record(value: Value) -> Record {
        into_record(value).unwrap()
    }

    #[test]
    fn test_strip_absent() {
        let cleaned = strip_absent(record(json!({"name": "A", "note": null, "value": 0})));
        assert_eq!(cleaned.len(), 2);
        assert!(!cleaned.contains_key("note"));
    }

    #[test]
    fn test_matches_conjunction() {
        let item = record(json!({"name": "A", "value": 1, "tags": ["x"]}));

        assert!(matches(&item, &Criteria::new()));
        assert!(matches(&item, &record(json!({"name": "A"}))));
        assert!(matches(&item, &record(json!({"name": "A", "value": 1.0}))));
        assert!(!matches(&item, &record(json!({"name": "A", "value": 2}))));
        assert!(!matches(&item, &record(json!({"missing": null}))));
    }

    #[test]
    fn test_record_id_values() {
        assert_eq!(RecordId::from_value(&json!(42)), Some(RecordId::Int(42)));
        assert_eq!(
            RecordId::from_value(&json!("abc")),
            Some(RecordId::Text("abc".into()))
        );
        assert_eq!(RecordId::from_value(&json!(true)), None);

        let oid = ObjectId::new();
        assert_eq!(RecordId::Object(oid).to_value(), json!(oid.to_hex()));
        assert_eq!(RecordId::Int(3).to_string(), "3");
    }

    #[test]
    fn test_typed_round_trip() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Item {
            name: String,
            value: i64,
        }

        let item = Item {
            name: "A".into(),
            value: 1,
        };
        let rec = to_record(&item).unwrap();
        assert_eq!(rec["name"], json!("A"));
        assert_eq!(from_record::<Item>(rec).unwrap(), item);
    }

    #[test]
    fn test_into_record_rejects_scalars() {
        assert!(matches!(
            into_record(json!([1, 2])),
            Err(OrmError::Serialization(_))
        ));
    }
}
