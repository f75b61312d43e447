use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::require;
use crate::command::ParamBag;
use crate::request::{Request, Statement};
use crate::value::SqlValue;
use crate::{Command, Engine, EngineError, IsolationLevel, RequestError};

/// Session variable reserved for the procedure's return code. Procedures
/// signal a return code by assigning it; NULL maps to 0.
const RETURN_VARIABLE: &str = "@sp_ret";

/// CALL-style invocation: input values bound as parameters, output parameters
/// and the trailing return value carried in session variables and read back
/// by a second statement in the same batch.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProcedure {
    name: String,
    inputs: Vec<SqlValue>,
    outputs: Vec<String>,
}

impl StoredProcedure {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inputs: vec![],
            outputs: vec![],
        }
    }

    #[must_use]
    pub fn input<V: Into<SqlValue>>(mut self, value: V) -> Self {
        self.inputs.push(value.into());
        self
    }

    #[must_use]
    pub fn inputs<V: Into<SqlValue>>(mut self, values: Vec<V>) -> Self {
        for value in values {
            self.inputs.push(value.into());
        }
        self
    }

    #[must_use]
    pub fn output(mut self, name: &str) -> Self {
        self.outputs.push(name.to_string());
        self
    }

    fn output_variable(name: &str) -> String {
        format!("@sp_{name}")
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
    pub async fn execute(
        self,
        engine: Arc<dyn Engine>,
    ) -> Result<(i64, Vec<String>), RequestError> {
        self.into_request(engine).execute().await
    }
}

#[async_trait]
impl Statement for StoredProcedure {
    /// `(return value, output parameter values)` — outputs text-coerced in
    /// declaration order, empty string for NULL; return value 0 for NULL.
    type Output = (i64, Vec<String>);

    fn build(&self) -> Result<Command, RequestError> {
        require(&self.name, "procedure name")?;

        let mut bag = ParamBag::new();

        let mut args = self
            .inputs
            .iter()
            .map(|value| bag.push(value.clone()))
            .collect::<Vec<_>>();
        args.extend(self.outputs.iter().map(|name| Self::output_variable(name)));
        args.push(RETURN_VARIABLE.to_string());

        let mut readback = self
            .outputs
            .iter()
            .map(|name| Self::output_variable(name))
            .collect::<Vec<_>>();
        readback.push(RETURN_VARIABLE.to_string());

        let sql = format!(
            "CALL {}({}); SELECT {}",
            self.name,
            args.join(", "),
            readback.join(", ")
        );

        Ok(Command::new(sql, bag.into_params()))
    }

    async fn run(
        &self,
        engine: &dyn Engine,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
    ) -> Result<Self::Output, EngineError> {
        let set = engine.execute_adapter(command, token, isolation).await?;

        let row = set
            .last_table()
            .and_then(|table| table.rows.first())
            .ok_or(EngineError::NoRow)?;

        if row.columns.len() != self.outputs.len() + 1 {
            return Err(EngineError::UnexpectedResult);
        }

        let outputs = row.columns[..self.outputs.len()]
            .iter()
            .map(|(_, value)| value.to_text())
            .collect();
        let return_value = row.columns[self.outputs.len()].1.to_i64();

        Ok((return_value, outputs))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn renders_call_then_readback() {
        let command = StoredProcedure::new("sync_totals")
            .input("2024")
            .output("total")
            .build()
            .unwrap();

        assert_eq!(
            command.sql,
            "CALL sync_totals(@param0, @sp_total, @sp_ret); SELECT @sp_total, @sp_ret"
        );
        assert_eq!(command.params, vec![(
            "@param0".to_string(),
            SqlValue::String("2024".into())
        )]);
    }

    #[test]
    fn no_outputs_reads_back_only_the_return_variable() {
        let command = StoredProcedure::new("ping").build().unwrap();

        assert_eq!(command.sql, "CALL ping(@sp_ret); SELECT @sp_ret");
    }

    #[test]
    fn empty_name_is_a_precondition_failure() {
        assert!(matches!(
            StoredProcedure::new("").build().unwrap_err(),
            RequestError::Precondition(_)
        ));
    }
}
