//! Query composition shared by the repositories.
//!
//! Statements are rendered with positional `$N` placeholders, which both the
//! PostgreSQL and SQLite drivers accept, and carry their bind values alongside.
//! Column and table names are `&'static str` so only literals from this crate
//! ever reach the SQL text.

use chrono::{DateTime, Utc};
use sqlx::any::{Any, AnyArguments};
use sqlx::query::Query;
use uuid::Uuid;

/// A bind value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(Option<String>),
    Int(i64),
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(Some(v.to_string()))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(Some(v))
    }
}

impl From<Option<String>> for Value {
    fn from(v: Option<String>) -> Self {
        Value::Text(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Text(Some(v.to_string()))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Int(crate::models::to_millis(v))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn as_sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
enum Condition {
    Compare {
        column: &'static str,
        op: &'static str,
        value: Value,
    },
    In {
        column: &'static str,
        values: Vec<Value>,
    },
}

/// Conjunction of column predicates.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    fn compare(mut self, column: &'static str, op: &'static str, value: Value) -> Self {
        self.conditions
            .push(Condition::Compare { column, op, value });
        self
    }

    pub fn eq(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.compare(column, "=", value.into())
    }

    pub fn gt(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.compare(column, ">", value.into())
    }

    pub fn gte(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.compare(column, ">=", value.into())
    }

    pub fn lt(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.compare(column, "<", value.into())
    }

    /// Membership test. An empty set matches no rows.
    pub fn is_in<V, I>(mut self, column: &'static str, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        self.conditions.push(Condition::In {
            column,
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Add `other`'s predicates when present.
    pub fn and_maybe(mut self, other: Option<Filter>) -> Self {
        if let Some(other) = other {
            self.conditions.extend(other.conditions);
        }
        self
    }

    fn render(&self, out: &mut Renderer) {
        if self.conditions.is_empty() {
            return;
        }
        out.sql.push_str(" WHERE ");
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                out.sql.push_str(" AND ");
            }
            match condition {
                Condition::Compare { column, op, value } => {
                    out.sql.push_str(column);
                    out.sql.push(' ');
                    out.sql.push_str(op);
                    out.sql.push(' ');
                    out.push_bind(value.clone());
                }
                Condition::In { values, .. } if values.is_empty() => {
                    out.sql.push_str("1 = 0");
                }
                Condition::In { column, values } => {
                    out.sql.push_str(column);
                    out.sql.push_str(" IN (");
                    for (j, value) in values.iter().enumerate() {
                        if j > 0 {
                            out.sql.push_str(", ");
                        }
                        out.push_bind(value.clone());
                    }
                    out.sql.push(')');
                }
            }
        }
    }
}

#[derive(Default)]
struct Renderer {
    sql: String,
    binds: Vec<Value>,
}

impl Renderer {
    fn push_bind(&mut self, value: Value) {
        self.binds.push(value);
        self.sql.push('$');
        self.sql.push_str(&self.binds.len().to_string());
    }

    fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            binds: self.binds,
        }
    }
}

/// Rendered SQL plus its bind values, ready to execute.
#[derive(Debug, Clone)]
pub struct Statement {
    sql: String,
    binds: Vec<Value>,
}

impl Statement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn binds(&self) -> &[Value] {
        &self.binds
    }

    /// Build an executable sqlx query borrowing this statement.
    pub fn query(&self) -> Query<'_, Any, AnyArguments<'_>> {
        let mut query = sqlx::query(&self.sql);
        for value in &self.binds {
            query = match value {
                Value::Text(text) => query.bind(text.as_deref()),
                Value::Int(int) => query.bind(*int),
            };
        }
        query
    }
}

/// `SELECT … FROM table [WHERE …] [ORDER BY …] [LIMIT n]`
#[derive(Debug, Clone)]
pub struct Select {
    table: &'static str,
    columns: &'static str,
    filter: Filter,
    order: Option<(&'static str, Order)>,
    limit: Option<u64>,
}

impl Select {
    pub fn from(table: &'static str) -> Self {
        Self {
            table,
            columns: "*",
            filter: Filter::new(),
            order: None,
            limit: None,
        }
    }

    pub fn columns(mut self, columns: &'static str) -> Self {
        self.columns = columns;
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_by(mut self, column: &'static str, order: Order) -> Self {
        self.order = Some((column, order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn build(&self) -> Statement {
        let mut out = Renderer::default();
        out.sql = format!("SELECT {} FROM {}", self.columns, self.table);
        self.filter.render(&mut out);
        if let Some((column, order)) = self.order {
            out.sql
                .push_str(&format!(" ORDER BY {column} {}", order.as_sql()));
        }
        if let Some(limit) = self.limit {
            out.sql.push_str(&format!(" LIMIT {limit}"));
        }
        out.finish()
    }
}

/// `UPDATE table SET … WHERE …`
#[derive(Debug, Clone)]
pub struct Update {
    table: &'static str,
    assignments: Vec<(&'static str, Value)>,
    filter: Filter,
}

impl Update {
    pub fn table(table: &'static str, filter: Filter) -> Self {
        Self {
            table,
            assignments: Vec::new(),
            filter,
        }
    }

    pub fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.assignments.push((column, value.into()));
        self
    }

    pub fn build(&self) -> Statement {
        let mut out = Renderer::default();
        out.sql = format!("UPDATE {} SET ", self.table);
        for (i, (column, value)) in self.assignments.iter().enumerate() {
            if i > 0 {
                out.sql.push_str(", ");
            }
            out.sql.push_str(column);
            out.sql.push_str(" = ");
            out.push_bind(value.clone());
        }
        self.filter.render(&mut out);
        out.finish()
    }
}

/// `DELETE FROM table WHERE … [RETURNING …]`
#[derive(Debug, Clone)]
pub struct Delete {
    table: &'static str,
    filter: Filter,
    returning: Option<&'static str>,
}

impl Delete {
    pub fn from(table: &'static str, filter: Filter) -> Self {
        Self {
            table,
            filter,
            returning: None,
        }
    }

    pub fn returning(mut self, columns: &'static str) -> Self {
        self.returning = Some(columns);
        self
    }

    pub fn build(&self) -> Statement {
        let mut out = Renderer::default();
        out.sql = format!("DELETE FROM {}", self.table);
        self.filter.render(&mut out);
        if let Some(columns) = self.returning {
            out.sql.push_str(" RETURNING ");
            out.sql.push_str(columns);
        }
        out.finish()
    }
}
