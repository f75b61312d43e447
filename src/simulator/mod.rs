use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::value::SqlValue;
use crate::{
    Command, Engine, EngineError, ExecOutcome, IsolationLevel, RequestError, TableSet, TextRows,
};

/// One command observed by the simulator, with the isolation level and
/// primitive it was dispatched through.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedCommand {
    pub sql: String,
    pub params: Vec<(String, SqlValue)>,
    pub isolation: IsolationLevel,
    pub primitive: Primitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    NonQuery,
    Reader,
    Adapter,
}

#[derive(Debug, Default)]
struct SimulationState {
    closed: bool,
    delay: Option<Duration>,
    non_query: VecDeque<Result<ExecOutcome, String>>,
    reader: VecDeque<Result<TextRows, String>>,
    adapter: VecDeque<Result<TableSet, String>>,
    commands: Vec<DispatchedCommand>,
    reported: Vec<String>,
}

/// Deterministic in-process `Engine` for tests: records every dispatched
/// command, serves scripted results per primitive (defaulting to empty
/// results when nothing is queued), optionally delays before responding, and
/// counts engine-channel error reports.
#[derive(Debug)]
pub struct SimulationEngine {
    state: Mutex<SimulationState>,
    shutdown: CancellationToken,
    default_timeout: Duration,
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    #[must_use]
    pub fn with_timeout(default_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(SimulationState::default()),
            shutdown: CancellationToken::new(),
            default_timeout,
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SimulationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn close(&self) {
        self.state().closed = true;
    }

    pub fn reopen(&self) {
        self.state().closed = false;
    }

    /// Artificial delay applied before every primitive responds.
    pub fn delay(&self, delay: Duration) {
        self.state().delay = Some(delay);
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn queue_non_query(&self, result: Result<ExecOutcome, String>) {
        self.state().non_query.push_back(result);
    }

    pub fn queue_reader(&self, result: Result<TextRows, String>) {
        self.state().reader.push_back(result);
    }

    pub fn queue_adapter(&self, result: Result<TableSet, String>) {
        self.state().adapter.push_back(result);
    }

    #[must_use]
    pub fn commands(&self) -> Vec<DispatchedCommand> {
        self.state().commands.clone()
    }

    #[must_use]
    pub fn last_command(&self) -> Option<DispatchedCommand> {
        self.state().commands.last().cloned()
    }

    /// Errors raised on the engine-local channel, as display strings.
    #[must_use]
    pub fn reported_errors(&self) -> Vec<String> {
        self.state().reported.clone()
    }

    fn prologue(
        &self,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
        primitive: Primitive,
    ) -> Result<Option<Duration>, EngineError> {
        if token.is_cancelled() || self.shutdown.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let mut state = self.state();

        state.commands.push(DispatchedCommand {
            sql: command.sql.clone(),
            params: command.params.clone(),
            isolation,
            primitive,
        });

        Ok(state.delay)
    }
}

async fn wait(delay: Option<Duration>, token: &CancellationToken) -> Result<(), EngineError> {
    let Some(delay) = delay else {
        return Ok(());
    };

    tokio::select! {
        () = token.cancelled() => Err(EngineError::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

#[async_trait]
impl Engine for SimulationEngine {
    fn is_open(&self) -> bool {
        !self.state().closed
    }

    fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    async fn execute_non_query(
        &self,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
    ) -> Result<ExecOutcome, EngineError> {
        let delay = self.prologue(command, token, isolation, Primitive::NonQuery)?;
        wait(delay, token).await?;

        self.state()
            .non_query
            .pop_front()
            .unwrap_or_else(|| Ok(ExecOutcome::default()))
            .map_err(EngineError::Simulated)
    }

    async fn execute_reader(
        &self,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
    ) -> Result<TextRows, EngineError> {
        let delay = self.prologue(command, token, isolation, Primitive::Reader)?;
        wait(delay, token).await?;

        self.state()
            .reader
            .pop_front()
            .unwrap_or_else(|| Ok(TextRows::default()))
            .map_err(EngineError::Simulated)
    }

    async fn execute_adapter(
        &self,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
    ) -> Result<TableSet, EngineError> {
        let delay = self.prologue(command, token, isolation, Primitive::Adapter)?;
        wait(delay, token).await?;

        self.state()
            .adapter
            .pop_front()
            .unwrap_or_else(|| Ok(TableSet::default()))
            .map_err(EngineError::Simulated)
    }

    fn report_error(&self, error: &RequestError) {
        self.state().reported.push(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn records_commands_and_serves_queued_results() {
        let engine = SimulationEngine::new();
        engine.queue_non_query(Ok(ExecOutcome {
            rows_affected: 1,
            last_insert_id: 42,
        }));

        let command = Command::new("INSERT INTO t () VALUES ()".to_string(), vec![]);
        let token = CancellationToken::new();

        let outcome = engine
            .execute_non_query(&command, &token, IsolationLevel::default())
            .await
            .unwrap();

        assert_eq!(outcome.last_insert_id, 42);
        assert_eq!(engine.commands().len(), 1);
        assert_eq!(engine.last_command().unwrap().primitive, Primitive::NonQuery);
    }

    #[tokio::test]
    async fn empty_queue_serves_default_results() {
        let engine = SimulationEngine::new();
        let command = Command::new("SELECT a FROM t".to_string(), vec![]);
        let token = CancellationToken::new();

        let rows = engine
            .execute_reader(&command, &token, IsolationLevel::default())
            .await
            .unwrap();

        assert_eq!(rows, TextRows::default());
    }

    #[tokio::test]
    async fn cancelled_token_is_observed_before_dispatch() {
        let engine = SimulationEngine::new();
        let command = Command::new("SELECT 1".to_string(), vec![]);
        let token = CancellationToken::new();
        token.cancel();

        let error = engine
            .execute_reader(&command, &token, IsolationLevel::default())
            .await
            .unwrap_err();

        assert!(matches!(error, EngineError::Cancelled));
        assert!(engine.commands().is_empty());
    }
}
