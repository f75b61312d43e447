use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::require;
use crate::command::ParamBag;
use crate::condition::ConditionSet;
use crate::request::{Request, Statement};
use crate::value::SqlValue;
use crate::{Command, Engine, EngineError, IsolationLevel, RequestError};

/// Conditional delete. An empty condition set deletes every row.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    table: String,
    conditions: ConditionSet,
}

impl Delete {
    #[must_use]
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            conditions: ConditionSet::empty(),
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
impl Statement for Delete {
    type Output = u64;

    fn build(&self) -> Result<Command, RequestError> {
        require(&self.table, "table name")?;

        let mut bag = ParamBag::new();
        let mut sql = format!("DELETE FROM {}", self.table);

        let where_clause = self.conditions.compile(&mut bag);
        if !where_clause.is_empty() {
            sql.push(' ');
            sql.push_str(&where_clause);
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
    fn renders_condition_fragment() {
        let command = Delete::new("sessions")
            .where_eq("user_id", 9_i64)
            .build()
            .unwrap();

        assert_eq!(
            command.sql,
            "DELETE FROM sessions WHERE (user_id = @param0)"
        );
        assert_eq!(command.params, vec![(
            "@param0".to_string(),
            SqlValue::Number(9)
        )]);
    }

    #[test]
    fn no_conditions_deletes_everything() {
        let command = Delete::new("sessions").build().unwrap();

        assert_eq!(command.sql, "DELETE FROM sessions");
        assert!(command.params.is_empty());
    }
}
