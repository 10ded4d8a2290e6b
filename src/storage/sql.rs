//! 关系数据库语句构建
//!
//! MySQL 与 PostgreSQL 共用的参数化语句生成。值一律绑定为参数；
//! 表名和列名无法绑定，因此在拼接前做标识符校验。

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{OrmError, Result};
use crate::models::record::{Criteria, Record};

static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}(\.[A-Za-z_][A-Za-z0-9_]{0,62})?$")
        .expect("identifier pattern is valid")
});

/// 校验表名或列名，允许 `schema.table` 形式
pub fn validate_identifier(name: &str) -> Result<()> {
    if IDENTIFIER_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(OrmError::InvalidArgument(format!(
            "invalid SQL identifier: {:?}",
            name
        )))
    }
}

/// 占位符风格
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// MySQL: `?`
    Question,
    /// PostgreSQL: `$1`, `$2`, ...
    Numbered,
}

/// 已生成的语句及其参数
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// 语句构建器
pub struct SqlBuilder {
    style: Placeholder,
    params: Vec<Value>,
}

impl SqlBuilder {
    pub fn new(style: Placeholder) -> Self {
        Self {
            style,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        match self.style {
            Placeholder::Question => "?".to_string(),
            Placeholder::Numbered => format!("${}", self.params.len()),
        }
    }

    fn where_clause(&mut self, criteria: &Criteria) -> Result<String> {
        if criteria.is_empty() {
            return Ok(String::new());
        }
        let mut clauses = Vec::with_capacity(criteria.len());
        for (field, value) in criteria {
            validate_identifier(field)?;
            if value.is_null() {
                clauses.push(format!("{} IS NULL", field));
            } else {
                let placeholder = self.bind(value.clone());
                clauses.push(format!("{} = {}", field, placeholder));
            }
        }
        Ok(format!(" WHERE {}", clauses.join(" AND ")))
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            params: self.params,
        }
    }

    /// `INSERT INTO table (...) VALUES (...) [RETURNING key]`
    pub fn insert(mut self, table: &str, record: &Record, returning: Option<&str>) -> Result<Statement> {
        validate_identifier(table)?;

        let mut sql = if record.is_empty() {
            match self.style {
                Placeholder::Question => format!("INSERT INTO {} () VALUES ()", table),
                Placeholder::Numbered => format!("INSERT INTO {} DEFAULT VALUES", table),
            }
        } else {
            let mut columns = Vec::with_capacity(record.len());
            let mut placeholders = Vec::with_capacity(record.len());
            for (field, value) in record {
                validate_identifier(field)?;
                columns.push(field.as_str());
                placeholders.push(self.bind(value.clone()));
            }
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        if let Some(key) = returning {
            validate_identifier(key)?;
            sql.push_str(&format!(" RETURNING {}", key));
        }
        Ok(self.finish(sql))
    }

    /// `SELECT * FROM table [WHERE ...] [LIMIT 1]`
    pub fn select(mut self, table: &str, criteria: &Criteria, first_only: bool) -> Result<Statement> {
        validate_identifier(table)?;
        let mut sql = format!("SELECT * FROM {}", table);
        sql.push_str(&self.where_clause(criteria)?);
        if first_only {
            sql.push_str(" LIMIT 1");
        }
        Ok(self.finish(sql))
    }

    /// `UPDATE table SET ... [WHERE ...]`，SET 的参数先于 WHERE 编号
    pub fn update(mut self, table: &str, criteria: &Criteria, data: &Record) -> Result<Statement> {
        validate_identifier(table)?;
        if data.is_empty() {
            return Err(OrmError::InvalidArgument(format!(
                "update of {} has no fields to set",
                table
            )));
        }
        let mut assignments = Vec::with_capacity(data.len());
        for (field, value) in data {
            validate_identifier(field)?;
            let placeholder = self.bind(value.clone());
            assignments.push(format!("{} = {}", field, placeholder));
        }
        let mut sql = format!("UPDATE {} SET {}", table, assignments.join(", "));
        sql.push_str(&self.where_clause(criteria)?);
        Ok(self.finish(sql))
    }

    /// `DELETE FROM table [WHERE ...]`
    pub fn delete(mut self, table: &str, criteria: &Criteria) -> Result<Statement> {
        validate_identifier(table)?;
        let mut sql = format!("DELETE FROM {}", table);
        sql.push_str(&self.where_clause(criteria)?);
        Ok(self.finish(sql))
    }
}
