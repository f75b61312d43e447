use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{require, row_statement};
use crate::command::ParamBag;
use crate::request::{Request, Statement};
use crate::value::SqlValue;
use crate::{Command, Engine, EngineError, IsolationLevel, RequestError};

/// Positional-values insert. Returns the new row's identifier as reported by
/// the engine's last-inserted-id.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    table: String,
    values: Vec<SqlValue>,
}

impl Insert {
    #[must_use]
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            values: vec![],
        }
    }

    #[must_use]
    pub fn value<V: Into<SqlValue>>(mut self, value: V) -> Self {
        self.values.push(value.into());
        self
    }

    #[must_use]
    pub fn values<V: Into<SqlValue>>(mut self, values: Vec<V>) -> Self {
        for value in values {
            self.values.push(value.into());
        }
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
    pub async fn execute(self, engine: Arc<dyn Engine>) -> Result<i64, RequestError> {
        self.into_request(engine).execute().await
    }
}

#[async_trait]
impl Statement for Insert {
    type Output = i64;

    fn build(&self) -> Result<Command, RequestError> {
        require(&self.table, "table name")?;

        let mut bag = ParamBag::new();
        let sql = row_statement("INSERT", &self.table, &self.values, &mut bag);

        Ok(Command::new(sql, bag.into_params()))
    }

    async fn run(
        &self,
        engine: &dyn Engine,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
    ) -> Result<Self::Output, EngineError> {
        let outcome = engine.execute_non_query(command, token, isolation).await?;

        Ok(outcome.last_insert_id)
    }
}

/// `REPLACE INTO` variant of [`Insert`]: deletes any conflicting row before
/// inserting. Same shape, same last-inserted-id result.
#[derive(Debug, Clone, PartialEq)]
pub struct Replace {
    table: String,
    values: Vec<SqlValue>,
}

impl Replace {
    #[must_use]
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            values: vec![],
        }
    }

    #[must_use]
    pub fn value<V: Into<SqlValue>>(mut self, value: V) -> Self {
        self.values.push(value.into());
        self
    }

    #[must_use]
    pub fn values<V: Into<SqlValue>>(mut self, values: Vec<V>) -> Self {
        for value in values {
            self.values.push(value.into());
        }
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
    pub async fn execute(self, engine: Arc<dyn Engine>) -> Result<i64, RequestError> {
        self.into_request(engine).execute().await
    }
}

#[async_trait]
impl Statement for Replace {
    type Output = i64;

    fn build(&self) -> Result<Command, RequestError> {
        require(&self.table, "table name")?;

        let mut bag = ParamBag::new();
        let sql = row_statement("REPLACE", &self.table, &self.values, &mut bag);

        Ok(Command::new(sql, bag.into_params()))
    }

    async fn run(
        &self,
        engine: &dyn Engine,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
    ) -> Result<Self::Output, EngineError> {
        let outcome = engine.execute_non_query(command, token, isolation).await?;

        Ok(outcome.last_insert_id)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::value::NULL_SENTINEL;

    #[test]
    fn renders_one_placeholder_per_value() {
        let command = Insert::new("t")
            .values(vec!["5", "hello"])
            .build()
            .unwrap();

        assert_eq!(command.sql, "INSERT INTO t VALUES (@param0, @param1)");
        assert_eq!(command.params, vec![
            ("@param0".to_string(), SqlValue::String("5".into())),
            ("@param1".to_string(), SqlValue::String("hello".into())),
        ]);
    }

    #[test]
    fn empty_value_list_renders_the_all_default_row() {
        let command = Insert::new("t").build().unwrap();

        assert_eq!(command.sql, "INSERT INTO t () VALUES ()");
        assert!(command.params.is_empty());
    }

    #[test]
    fn sentinel_and_function_values_normalize() {
        let command = Insert::new("t")
            .value(NULL_SENTINEL)
            .value(SqlValue::function("NOW()"))
            .value(2_i64)
            .build()
            .unwrap();

        assert_eq!(command.sql, "INSERT INTO t VALUES (@param0, NOW(), @param1)");
        assert_eq!(command.params, vec![
            ("@param0".to_string(), SqlValue::Null),
            ("@param1".to_string(), SqlValue::Number(2)),
        ]);
    }

    #[test]
    fn replace_renders_replace_into() {
        let command = Replace::new("t").value(1_i64).build().unwrap();

        assert_eq!(command.sql, "REPLACE INTO t VALUES (@param0)");
    }

    #[test]
    fn empty_table_name_is_a_precondition_failure() {
        assert!(matches!(
            Insert::new(" ").build().unwrap_err(),
            RequestError::Precondition(_)
        ));
    }
}
