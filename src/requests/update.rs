use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::require;
use crate::command::ParamBag;
use crate::request::{Request, Statement};
use crate::value::SqlValue;
use crate::{Command, Engine, EngineError, IsolationLevel, RequestError};

/// Single-column update. Conditions are `(column, value)` equality pairs,
/// implicitly AND-ed; OR and nesting are not supported here.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    table: String,
    column: String,
    value: SqlValue,
    conditions: Vec<(String, SqlValue)>,
}

impl Update {
    #[must_use]
    pub fn new<V: Into<SqlValue>>(table: &str, column: &str, value: V) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            value: value.into(),
            conditions: vec![],
        }
    }

    #[must_use]
    pub fn condition<V: Into<SqlValue>>(mut self, column: &str, value: V) -> Self {
        self.conditions.push((column.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn conditions<V: Into<SqlValue>>(mut self, conditions: Vec<(&str, V)>) -> Self {
        for (column, value) in conditions {
            self.conditions.push((column.to_string(), value.into()));
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
    pub async fn execute(self, engine: Arc<dyn Engine>) -> Result<u64, RequestError> {
        self.into_request(engine).execute().await
    }
}

#[async_trait]
impl Statement for Update {
    type Output = u64;

    fn build(&self) -> Result<Command, RequestError> {
        require(&self.table, "table name")?;
        require(&self.column, "column name")?;

        let mut bag = ParamBag::new();
        let mut sql = format!(
            "UPDATE {} SET {} = {}",
            self.table,
            self.column,
            bag.push(self.value.clone())
        );

        if !self.conditions.is_empty() {
            let props = self
                .conditions
                .iter()
                .map(|(column, value)| format!("{column} = {}", bag.push(value.clone())))
                .collect::<Vec<_>>();

            sql.push_str(" WHERE ");
            sql.push_str(&props.join(" AND "));
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
        let outcome = engine.execute_non_query(command, token, isolation).await?;

        Ok(outcome.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn renders_set_then_and_joined_conditions() {
        let command = Update::new("t", "x", "9")
            .condition("id", "3")
            .build()
            .unwrap();

        assert_eq!(command.sql, "UPDATE t SET x = @param0 WHERE id = @param1");
        assert_eq!(command.params, vec![
            ("@param0".to_string(), SqlValue::String("9".into())),
            ("@param1".to_string(), SqlValue::String("3".into())),
        ]);
    }

    #[test]
    fn multiple_conditions_continue_the_numbering() {
        let command = Update::new("t", "x", 1_i64)
            .conditions(vec![("a", 2_i64), ("b", 3_i64)])
            .build()
            .unwrap();

        assert_eq!(
            command.sql,
            "UPDATE t SET x = @param0 WHERE a = @param1 AND b = @param2"
        );
        assert_eq!(command.params.len(), 3);
    }

    #[test]
    fn no_conditions_renders_no_where() {
        let command = Update::new("t", "x", 1_i64).build().unwrap();

        assert_eq!(command.sql, "UPDATE t SET x = @param0");
    }

    #[test]
    fn missing_column_is_a_precondition_failure() {
        assert!(matches!(
            Update::new("t", "", 1_i64).build().unwrap_err(),
            RequestError::Precondition(_)
        ));
    }
}
