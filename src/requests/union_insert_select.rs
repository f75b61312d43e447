use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{require, row_statement};
use crate::command::ParamBag;
use crate::request::{Request, Statement};
use crate::value::SqlValue;
use crate::{Command, Engine, EngineError, IsolationLevel, RequestError};

/// One multi-statement batch: an INSERT followed by a SELECT of a scalar
/// function call, optionally scoped `FROM` a table. Placeholder numbering
/// continues sequentially across both statements so the indices never
/// collide: insert values occupy the low indices, function arguments continue
/// from there.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionInsertSelectFunc {
    insert_table: String,
    insert_values: Vec<SqlValue>,
    function_name: String,
    function_args: Vec<SqlValue>,
    from_table: Option<String>,
}

impl UnionInsertSelectFunc {
    #[must_use]
    pub fn new(insert_table: &str, function_name: &str) -> Self {
        Self {
            insert_table: insert_table.to_string(),
            insert_values: vec![],
            function_name: function_name.to_string(),
            function_args: vec![],
            from_table: None,
        }
    }

    #[must_use]
    pub fn insert_value<V: Into<SqlValue>>(mut self, value: V) -> Self {
        self.insert_values.push(value.into());
        self
    }

    #[must_use]
    pub fn insert_values<V: Into<SqlValue>>(mut self, values: Vec<V>) -> Self {
        for value in values {
            self.insert_values.push(value.into());
        }
        self
    }

    #[must_use]
    pub fn function_arg<V: Into<SqlValue>>(mut self, value: V) -> Self {
        self.function_args.push(value.into());
        self
    }

    #[must_use]
    pub fn from_table(mut self, table: &str) -> Self {
        self.from_table = Some(table.to_string());
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
    pub async fn execute(self, engine: Arc<dyn Engine>) -> Result<String, RequestError> {
        self.into_request(engine).execute().await
    }
}

#[async_trait]
impl Statement for UnionInsertSelectFunc {
    /// The scalar function result, text-coerced.
    type Output = String;

    fn build(&self) -> Result<Command, RequestError> {
        require(&self.insert_table, "insert table name")?;
        require(&self.function_name, "function name")?;

        let mut bag = ParamBag::new();

        let insert = row_statement("INSERT", &self.insert_table, &self.insert_values, &mut bag);

        let args = self
            .function_args
            .iter()
            .map(|value| bag.push(value.clone()))
            .collect::<Vec<_>>()
            .join(", ");

        let mut select = format!("SELECT {}({args})", self.function_name);
        if let Some(from_table) = &self.from_table {
            select.push_str(" FROM ");
            select.push_str(from_table);
        }

        Ok(Command::new(format!("{insert}; {select}"), bag.into_params()))
    }

    async fn run(
        &self,
        engine: &dyn Engine,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
    ) -> Result<Self::Output, EngineError> {
        let set = engine.execute_adapter(command, token, isolation).await?;

        set.last_table()
            .and_then(|table| table.rows.first())
            .and_then(|row| row.value(0))
            .map(SqlValue::to_text)
            .ok_or(EngineError::NoRow)
    }
}
