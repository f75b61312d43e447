use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::require;
use crate::request::{Request, Statement};
use crate::value::SqlValue;
use crate::{Command, Engine, EngineError, IsolationLevel, RequestError, TableSet};

fn prefixed(name: &str) -> String {
    if name.starts_with('@') {
        name.to_string()
    } else {
        format!("@{name}")
    }
}

/// Caller-supplied raw SQL executed verbatim with caller-supplied named
/// parameters. No placeholder renaming and no value normalization applies.
/// Returns the full tabular result set.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomCommand {
    sql: String,
    params: Vec<(String, SqlValue)>,
}

impl CustomCommand {
    #[must_use]
    pub fn new(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            params: vec![],
        }
    }

    /// Adds a named parameter. The `@` prefix is optional in `name`.
    #[must_use]
    pub fn param<V: Into<SqlValue>>(mut self, name: &str, value: V) -> Self {
        self.params.push((prefixed(name), value.into()));
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
    pub async fn execute(self, engine: Arc<dyn Engine>) -> Result<TableSet, RequestError> {
        self.into_request(engine).execute().await
    }
}

#[async_trait]
impl Statement for CustomCommand {
    type Output = TableSet;

    fn build(&self) -> Result<Command, RequestError> {
        require(&self.sql, "command text")?;

        Ok(Command::new(self.sql.clone(), self.params.clone()))
    }

    async fn run(
        &self,
        engine: &dyn Engine,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
    ) -> Result<Self::Output, EngineError> {
        engine.execute_adapter(command, token, isolation).await
    }
}

/// [`CustomCommand`] variant that discards any result.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomCommandNotRet {
    sql: String,
    params: Vec<(String, SqlValue)>,
}

impl CustomCommandNotRet {
    #[must_use]
    pub fn new(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            params: vec![],
        }
    }

    /// Adds a named parameter. The `@` prefix is optional in `name`.
    #[must_use]
    pub fn param<V: Into<SqlValue>>(mut self, name: &str, value: V) -> Self {
        self.params.push((prefixed(name), value.into()));
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
    pub async fn execute(self, engine: Arc<dyn Engine>) -> Result<(), RequestError> {
        self.into_request(engine).execute().await
    }
}

#[async_trait]
impl Statement for CustomCommandNotRet {
    type Output = ();

    fn build(&self) -> Result<Command, RequestError> {
        require(&self.sql, "command text")?;

        Ok(Command::new(self.sql.clone(), self.params.clone()))
    }

    async fn run(
        &self,
        engine: &dyn Engine,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
    ) -> Result<Self::Output, EngineError> {
        engine.execute_non_query(command, token, isolation).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::value::NULL_SENTINEL;

    #[test]
    fn sql_and_params_pass_through_verbatim() {
        let command = CustomCommand::new("SELECT * FROM logs WHERE level = @level")
            .param("level", "warn")
            .build()
            .unwrap();

        assert_eq!(command.sql, "SELECT * FROM logs WHERE level = @level");
        assert_eq!(command.params, vec![(
            "@level".to_string(),
            SqlValue::String("warn".into())
        )]);
    }

    #[test]
    fn no_normalization_applies() {
        let command = CustomCommand::new("SELECT @x")
            .param("@x", NULL_SENTINEL)
            .build()
            .unwrap();

        assert_eq!(command.params[0].1, SqlValue::String(NULL_SENTINEL.into()));
    }

    #[test]
    fn empty_sql_is_a_precondition_failure() {
        assert!(matches!(
            CustomCommandNotRet::new("").build().unwrap_err(),
            RequestError::Precondition(_)
        ));
    }
}
