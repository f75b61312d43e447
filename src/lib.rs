#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

pub mod command;
pub mod condition;
#[cfg(feature = "mysql-sqlx")]
pub mod mysql;
pub mod request;
pub mod requests;
#[cfg(feature = "simulator")]
pub mod simulator;
pub mod value;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use command::Command;
pub use condition::ConditionSet;
pub use request::{ErrorListener, LogListener, Request, Statement};
pub use requests::{
    CustomCommand, CustomCommandNotRet, Delete, Insert, Replace, Select, SelectColumn,
    StoredProcedure, UnionInsertSelectFunc, Update,
};
pub use value::SqlValue;

/// Transactional visibility mode requested for a single statement's
/// execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// One decoded result row, column values paired with their names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub columns: Vec<(String, SqlValue)>,
}

impl Row {
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<SqlValue> {
        self.columns
            .iter()
            .find(|c| c.0 == column_name)
            .map(|c| c.1.clone())
    }

    #[must_use]
    pub fn value(&self, index: usize) -> Option<&SqlValue> {
        self.columns.get(index).map(|c| &c.1)
    }
}

/// One tabular result of a result-producing statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Full result of an adapter execution. Multi-statement batches produce one
/// `Table` per result-producing statement, in statement order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableSet {
    pub tables: Vec<Table>,
}

impl TableSet {
    #[must_use]
    pub fn last_table(&self) -> Option<&Table> {
        self.tables.last()
    }
}

/// Outcome of a non-query execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    pub last_insert_id: i64,
}

/// Row-major flattened text result of a reader execution. `column_count` is
/// the stride callers use to reshape the flat values back into rows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextRows {
    pub column_count: usize,
    pub values: Vec<String>,
}

impl TextRows {
    #[must_use]
    pub fn into_grid(self) -> Vec<Vec<String>> {
        if self.column_count == 0 {
            return vec![];
        }

        self.values
            .chunks(self.column_count)
            .map(<[String]>::to_vec)
            .collect()
    }
}

/// Failure raised by an `Engine` implementation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[cfg(feature = "mysql-sqlx")]
    #[error(transparent)]
    Mysql(mysql::MysqlEngineError),
    #[cfg(feature = "simulator")]
    #[error("{0}")]
    Simulated(String),
    #[error("Execution was cancelled")]
    Cancelled,
    #[error("No row")]
    NoRow,
    #[error("Unexpected result from operation")]
    UnexpectedResult,
}

/// Failure returned to the caller of a request. The driver failure type is
/// preserved through the transparent `Engine` variant so callers can match on
/// it; timeouts and cancellations are always classified as `Timeout`.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Connection is not open")]
    ConnectionClosed,
    #[error("Invalid request: {0}")]
    Precondition(String),
    #[error("Timed out after {timeout:?} running: {sql}")]
    Timeout { sql: String, timeout: Duration },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl RequestError {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// The external execution collaborator. Owns the connection state, the
/// process-wide shutdown token, and the three raw execute primitives. Each
/// primitive runs its statement(s) inside one engine-managed transaction at
/// the requested isolation level and rolls back best-effort on failure.
#[async_trait]
pub trait Engine: Send + Sync + std::fmt::Debug {
    fn is_open(&self) -> bool;

    fn shutdown_token(&self) -> &CancellationToken;

    fn default_timeout(&self) -> Duration;

    async fn execute_non_query(
        &self,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
    ) -> Result<ExecOutcome, EngineError>;

    async fn execute_reader(
        &self,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
    ) -> Result<TextRows, EngineError>;

    async fn execute_adapter(
        &self,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
    ) -> Result<TableSet, EngineError>;

    /// Engine-local error channel. Raised once per failed invocation, in
    /// addition to the request's own listener.
    fn report_error(&self, error: &RequestError);
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn text_rows_reshape_by_column_count() {
        let rows = TextRows {
            column_count: 2,
            values: vec!["1".into(), "a".into(), "2".into(), "b".into()],
        };

        assert_eq!(
            rows.into_grid(),
            vec![vec!["1".to_string(), "a".to_string()], vec![
                "2".to_string(),
                "b".to_string()
            ]]
        );
    }

    #[test]
    fn text_rows_with_no_columns_is_empty() {
        assert_eq!(TextRows::default().into_grid(), Vec::<Vec<String>>::new());
    }

    #[test]
    fn row_lookup_by_name_and_index() {
        let row = Row {
            columns: vec![
                ("id".into(), SqlValue::Number(3)),
                ("name".into(), SqlValue::String("bob".into())),
            ],
        };

        assert_eq!(row.get("id"), Some(SqlValue::Number(3)));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.value(1), Some(&SqlValue::String("bob".into())));
    }

    #[test]
    fn isolation_level_sql_keywords() {
        assert_eq!(IsolationLevel::default(), IsolationLevel::ReadCommitted);
        assert_eq!(IsolationLevel::Serializable.as_sql(), "SERIALIZABLE");
    }
}
