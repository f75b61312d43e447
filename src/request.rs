use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{Command, Engine, EngineError, IsolationLevel, RequestError};

/// The per-kind strategy executed inside the shared request lifecycle: render
/// the SQL text and parameter bundle from the statement's fields, then
/// dispatch the command through one engine primitive and shape the raw result
/// into the statement's declared output.
#[async_trait]
pub trait Statement: Clone + Send + Sync {
    type Output: Send;

    /// Render the command. Field preconditions (empty table name, empty
    /// required list) fail here, before anything is dispatched. Build never
    /// mutates the statement; window defaults and value normalization apply
    /// to local copies only.
    fn build(&self) -> Result<Command, RequestError>;

    async fn run(
        &self,
        engine: &dyn Engine,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
    ) -> Result<Self::Output, EngineError>;
}

/// Listener for failed invocations. Injected into each request; the default
/// logs through the `log` facade.
pub trait ErrorListener: Send + Sync {
    fn on_error(&self, error: &RequestError);
}

/// Default `ErrorListener`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogListener;

impl ErrorListener for LogListener {
    fn on_error(&self, error: &RequestError) {
        log::error!("request failed: {error}");
    }
}

/// One configured, executable statement instance.
///
/// Holds the engine handle, the statement value, a timeout (defaulted from
/// the engine), an isolation level (defaulted to read-committed) and an owned
/// cancellation token. A request may be executed any number of times
/// sequentially; every execution builds a fresh command and derives a fresh
/// linked cancellation token.
pub struct Request<S: Statement> {
    engine: Arc<dyn Engine>,
    statement: S,
    timeout: Duration,
    isolation: IsolationLevel,
    cancel: CancellationToken,
    listener: Arc<dyn ErrorListener>,
}

impl<S: Statement> Request<S> {
    pub fn new(engine: Arc<dyn Engine>, statement: S) -> Self {
        let timeout = engine.default_timeout();

        Self {
            engine,
            statement,
            timeout,
            isolation: IsolationLevel::default(),
            cancel: CancellationToken::new(),
            listener: Arc::new(LogListener),
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn ErrorListener>) -> Self {
        self.listener = listener;
        self
    }

    #[must_use]
    pub fn statement(&self) -> &S {
        &self.statement
    }

    pub fn statement_mut(&mut self) -> &mut S {
        &mut self.statement
    }

    #[must_use]
    pub const fn configured_timeout(&self) -> Duration {
        self.timeout
    }

    /// Requests cancellation of this request's own token. In-flight
    /// executions surface the cancellation as a `Timeout`-classified error;
    /// the request stays cancelled for subsequent executions.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Clone of this request bound to the same engine: statement fields are
    /// duplicated by value, the cancellation token is fresh and independent.
    #[must_use]
    pub fn copy(&self) -> Self {
        self.copy_to(self.engine.clone())
    }

    /// Clone of this request bound to `engine`.
    #[must_use]
    pub fn copy_to(&self, engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            statement: self.statement.clone(),
            timeout: self.timeout,
            isolation: self.isolation,
            cancel: CancellationToken::new(),
            listener: self.listener.clone(),
        }
    }

    /// Executes the statement once.
    ///
    /// # Errors
    ///
    /// * `RequestError::ConnectionClosed` if the engine's connection is not
    ///   open (checked before anything is built)
    /// * `RequestError::Precondition` if the statement's fields are invalid
    /// * `RequestError::Timeout` when the configured deadline elapses or any
    ///   cancellation (request-local or engine-wide) is observed
    /// * `RequestError::Engine` with the original driver failure preserved
    ///
    /// Every failure is reported once to the request's listener and once to
    /// the engine-local error channel before it is returned.
    pub async fn execute(&self) -> Result<S::Output, RequestError> {
        match self.execute_inner().await {
            Ok(output) => Ok(output),
            Err(error) => {
                self.listener.on_error(&error);
                self.engine.report_error(&error);
                Err(error)
            }
        }
    }

    async fn execute_inner(&self) -> Result<S::Output, RequestError> {
        if !self.engine.is_open() {
            return Err(RequestError::ConnectionClosed);
        }

        let command = self.statement.build()?;

        log::trace!(
            "executing: {} with params: {:?} timeout: {:?} isolation: {:?}",
            command.sql,
            command.params,
            self.timeout,
            self.isolation
        );

        // Linked per-invocation token: a child of the request's own token,
        // cancelled unconditionally when this invocation ends. The engine's
        // shutdown token is observed alongside it below.
        let linked = self.cancel.child_token();
        let _guard = linked.clone().drop_guard();

        let timeout_error = || RequestError::Timeout {
            sql: command.sql.clone(),
            timeout: self.timeout,
        };

        tokio::select! {
            biased;
            () = linked.cancelled() => Err(timeout_error()),
            () = self.engine.shutdown_token().cancelled() => Err(timeout_error()),
            bounded = tokio::time::timeout(
                self.timeout,
                self.statement.run(self.engine.as_ref(), &command, &linked, self.isolation),
            ) => match bounded {
                Err(_elapsed) => Err(timeout_error()),
                Ok(Err(EngineError::Cancelled)) => Err(timeout_error()),
                Ok(Err(error)) => Err(RequestError::Engine(error)),
                Ok(Ok(output)) => Ok(output),
            },
        }
    }

    /// Blocks the calling thread until the request completes. This is an
    /// explicit convenience over [`Self::execute`], which is the primary API.
    /// Must not be called from inside an async runtime.
    ///
    /// # Errors
    ///
    /// * `RequestError::Precondition` when called from within a runtime or
    ///   when the blocking runtime cannot be started
    /// * Otherwise, everything [`Self::execute`] returns
    pub fn execute_blocking(&self) -> Result<S::Output, RequestError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            let error = RequestError::Precondition(
                "execute_blocking called from within an async runtime".to_string(),
            );
            self.listener.on_error(&error);
            self.engine.report_error(&error);
            return Err(error);
        }

        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                let error = RequestError::Precondition(format!(
                    "failed to start blocking runtime: {e}"
                ));
                self.listener.on_error(&error);
                self.engine.report_error(&error);
                return Err(error);
            }
        };

        runtime.block_on(self.execute())
    }
}

impl<S: Statement + std::fmt::Debug> std::fmt::Debug for Request<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("statement", &self.statement)
            .field("timeout", &self.timeout)
            .field("isolation", &self.isolation)
            .finish_non_exhaustive()
    }
}
