use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::require;
use crate::command::ParamBag;
use crate::condition::ConditionSet;
use crate::request::{Request, Statement};
use crate::value::SqlValue;
use crate::{Command, Engine, EngineError, IsolationLevel, RequestError};

/// Row window applied to a select. Normalization happens on a local copy at
/// build time: a start row of 0 or 1 both mean "begin at the first row", a
/// count of 0 means unbounded.
fn limit_clause(start_row: u64, count_rows: u64) -> String {
    let offset = start_row.saturating_sub(1);
    let count = if count_rows == 0 { u64::MAX } else { count_rows };

    format!("LIMIT {offset},{count}")
}

/// Multi-column select returning the matching rows as a text grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    table: String,
    columns: Vec<String>,
    conditions: ConditionSet,
    window: Option<(u64, u64)>,
}

impl Select {
    #[must_use]
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: vec![],
            conditions: ConditionSet::empty(),
            window: None,
        }
    }

    #[must_use]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn conditions(mut self, conditions: ConditionSet) -> Self {
        self.conditions = conditions;
        self
    }

    #[must_use]
    pub fn where_eq<V: Into<SqlValue>>(mut self, column: &str, value: V) -> Self {
        self.conditions = self.conditions.where_eq(column, value);
        self
    }

    /// Row window as `(start_row, count_rows)`.
    #[must_use]
    pub const fn window(mut self, start_row: u64, count_rows: u64) -> Self {
        self.window = Some((start_row, count_rows));
        self
    }

    #[must_use]
    pub fn into_request(self, engine: Arc<dyn Engine>) -> Request<Self> {
        Request::new(engine, self)
    }

    /// One-shot convenience: builds a request, executes it and discards it.
    ///
    /// # Errors
    ///
    /// * If the request fails to execute
    pub async fn execute(self, engine: Arc<dyn Engine>) -> Result<Vec<Vec<String>>, RequestError> {
        self.into_request(engine).execute().await
    }
}

#[async_trait]
impl Statement for Select {
    type Output = Vec<Vec<String>>;

    fn build(&self) -> Result<Command, RequestError> {
        require(&self.table, "table name")?;

        if self.columns.is_empty() {
            return Err(RequestError::Precondition("column list is required".into()));
        }

        let mut bag = ParamBag::new();
        let mut sql = format!("SELECT {} FROM {}", self.columns.join(", "), self.table);

        let where_clause = self.conditions.compile(&mut bag);
        if !where_clause.is_empty() {
            sql.push(' ');
            sql.push_str(&where_clause);
        }

        if let Some((start_row, count_rows)) = self.window {
            sql.push(' ');
            sql.push_str(&limit_clause(start_row, count_rows));
        }

        Ok(Command::new(sql, bag.into_params()))
    }

    async fn run(
        &self,
        engine: &dyn Engine,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
    ) -> Result<Self::Output, EngineError> {
        let rows = engine.execute_reader(command, token, isolation).await?;

        Ok(rows.into_grid())
    }
}

/// Single-column select returning the matching values as a flat list.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    table: String,
    column: String,
    conditions: ConditionSet,
    window: Option<(u64, u64)>,
}

impl SelectColumn {
    #[must_use]
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            conditions: ConditionSet::empty(),
            window: None,
        }
    }

    #[must_use]
    pub fn conditions(mut self, conditions: ConditionSet) -> Self {
        self.conditions = conditions;
        self
    }

    #[must_use]
    pub fn where_eq<V: Into<SqlValue>>(mut self, column: &str, value: V) -> Self {
        self.conditions = self.conditions.where_eq(column, value);
        self
    }

    #[must_use]
    pub const fn window(mut self, start_row: u64, count_rows: u64) -> Self {
        self.window = Some((start_row, count_rows));
        self
    }

    #[must_use]
    pub fn into_request(self, engine: Arc<dyn Engine>) -> Request<Self> {
        Request::new(engine, self)
    }

    /// One-shot convenience: builds a request, executes it and discards it.
    ///
    /// # Errors
    ///
    /// * If the request fails to execute
    pub async fn execute(self, engine: Arc<dyn Engine>) -> Result<Vec<String>, RequestError> {
        self.into_request(engine).execute().await
    }
}

#[async_trait]
impl Statement for SelectColumn {
    type Output = Vec<String>;

    fn build(&self) -> Result<Command, RequestError> {
        require(&self.table, "table name")?;
        require(&self.column, "column name")?;

        let mut bag = ParamBag::new();
        let mut sql = format!("SELECT {} FROM {}", self.column, self.table);

        let where_clause = self.conditions.compile(&mut bag);
        if !where_clause.is_empty() {
            sql.push(' ');
            sql.push_str(&where_clause);
        }

        if let Some((start_row, count_rows)) = self.window {
            sql.push(' ');
            sql.push_str(&limit_clause(start_row, count_rows));
        }

        Ok(Command::new(sql, bag.into_params()))
    }

    async fn run(
        &self,
        engine: &dyn Engine,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
    ) -> Result<Self::Output, EngineError> {
        let rows = engine.execute_reader(command, token, isolation).await?;

        Ok(rows.values)
    }
}
