use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use sqlx::{
    Column, Connection, Executor, MySql, MySqlConnection, MySqlPool, Row as _, Statement as _,
    TypeInfo, Value, ValueRef,
    mysql::{MySqlArguments, MySqlRow, MySqlValueRef},
    query::Query,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::request::{ErrorListener, LogListener};
use crate::value::SqlValue;
use crate::{
    Command, Engine, EngineError, ExecOutcome, IsolationLevel, RequestError, Table, TableSet,
    TextRows,
};

#[derive(Debug, Error)]
pub enum MysqlEngineError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Invalid request")]
    InvalidRequest,
}

impl From<MysqlEngineError> for EngineError {
    fn from(value: MysqlEngineError) -> Self {
        Self::Mysql(value)
    }
}

/// `Engine` implementation over a `sqlx` MySQL pool.
///
/// Each execute primitive acquires one pooled connection, applies the
/// requested isolation level to the next transaction, begins it, runs the
/// command's statement(s) sequentially, and commits; on any failure the
/// transaction is rolled back best-effort and the original driver error is
/// returned. Cancellation is checked before dispatch and observed around
/// every driver await.
pub struct MysqlRequestEngine {
    pool: Arc<MySqlPool>,
    shutdown: CancellationToken,
    default_timeout: Duration,
    listener: Arc<dyn ErrorListener>,
}

impl std::fmt::Debug for MysqlRequestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlRequestEngine")
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl MysqlRequestEngine {
    #[must_use]
    pub fn new(pool: MySqlPool) -> Self {
        Self::with_timeout(pool, Duration::from_secs(30))
    }

    #[must_use]
    pub fn with_timeout(pool: MySqlPool, default_timeout: Duration) -> Self {
        Self {
            pool: Arc::new(pool),
            shutdown: CancellationToken::new(),
            default_timeout,
            listener: Arc::new(LogListener),
        }
    }

    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn ErrorListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Cancels the process-wide shutdown token; every in-flight and future
    /// request observes it.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn run_batch(
        &self,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
    ) -> Result<(Vec<Table>, ExecOutcome), EngineError> {
        if token.is_cancelled() || self.shutdown.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let mut conn = self.pool.acquire().await.map_err(MysqlEngineError::Sqlx)?;

        let set_isolation = format!("SET TRANSACTION ISOLATION LEVEL {}", isolation.as_sql());
        conn.execute(set_isolation.as_str())
            .await
            .map_err(MysqlEngineError::Sqlx)?;

        let mut tx = conn.begin().await.map_err(MysqlEngineError::Sqlx)?;

        let result = async {
            let mut tables = vec![];
            let mut outcome = ExecOutcome::default();

            for part in split_statements(&command.sql) {
                let (table, part_outcome) =
                    run_statement(&mut *tx, part, &command.params, token).await?;

                if let Some(table) = table {
                    tables.push(table);
                }

                outcome = ExecOutcome {
                    rows_affected: outcome.rows_affected + part_outcome.rows_affected,
                    last_insert_id: if part_outcome.last_insert_id == 0 {
                        outcome.last_insert_id
                    } else {
                        part_outcome.last_insert_id
                    },
                };
            }

            Ok::<_, EngineError>((tables, outcome))
        }
        .await;

        match result {
            Ok(ok) => {
                tx.commit().await.map_err(MysqlEngineError::Sqlx)?;
                Ok(ok)
            }
            Err(error) => {
                if let Err(rollback_error) = tx.rollback().await {
                    log::warn!("rollback failed: {rollback_error}");
                }
                Err(error)
            }
        }
    }
}

#[async_trait]
impl Engine for MysqlRequestEngine {
    fn is_open(&self) -> bool {
        !self.pool.is_closed()
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
        let (_, outcome) = self.run_batch(command, token, isolation).await?;

        Ok(outcome)
    }

    async fn execute_reader(
        &self,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
    ) -> Result<TextRows, EngineError> {
        let (tables, _) = self.run_batch(command, token, isolation).await?;

        let mut column_count = 0;
        let mut values = vec![];

        for table in tables {
            column_count = table.columns.len();
            for row in table.rows {
                for (_, value) in row.columns {
                    values.push(value.to_text());
                }
            }
        }

        Ok(TextRows {
            column_count,
            values,
        })
    }

    async fn execute_adapter(
        &self,
        command: &Command,
        token: &CancellationToken,
        isolation: IsolationLevel,
    ) -> Result<TableSet, EngineError> {
        let (tables, _) = self.run_batch(command, token, isolation).await?;

        Ok(TableSet { tables })
    }

    fn report_error(&self, error: &RequestError) {
        self.listener.on_error(error);
    }
}

fn param_token_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();

    REGEX.get_or_init(|| {
        Regex::new(r"@[A-Za-z_][A-Za-z0-9_]*").expect("valid placeholder pattern")
    })
}

// The split is textual; string literals containing ';' are not supported in
// batch commands.
fn split_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

/// Rewrites the named placeholders appearing in `part` to the driver's
/// positional `?`, returning the bind list in appearance order. Tokens with
/// no matching parameter (session variables such as `@sp_ret`) are left
/// verbatim.
fn positional(part: &str, params: &[(String, SqlValue)]) -> (String, Vec<SqlValue>) {
    let mut sql = String::with_capacity(part.len());
    let mut binds = vec![];
    let mut last = 0;

    for token in param_token_regex().find_iter(part) {
        if let Some((_, value)) = params.iter().find(|(name, _)| name == token.as_str()) {
            sql.push_str(&part[last..token.start()]);
            sql.push('?');
            binds.push(value.clone());
            last = token.end();
        }
    }

    sql.push_str(&part[last..]);

    (sql, binds)
}

fn bind_values<'a, 'b>(
    mut query: Query<'a, MySql, MySqlArguments>,
    values: &'b [SqlValue],
) -> Result<Query<'a, MySql, MySqlArguments>, MysqlEngineError>
where
    'b: 'a,
{
    for value in values {
        match value {
            SqlValue::String(value) | SqlValue::StringOpt(Some(value)) => {
                query = query.bind(value);
            }
            SqlValue::Null | SqlValue::StringOpt(None) => {
                query = query.bind(None::<String>);
            }
            SqlValue::Bool(value) => {
                query = query.bind(*value);
            }
            SqlValue::Number(value) => {
                query = query.bind(*value);
            }
            SqlValue::UNumber(value) => {
                query = query
                    .bind(i64::try_from(*value).map_err(|_| MysqlEngineError::InvalidRequest)?);
            }
            SqlValue::Real(value) => {
                query = query.bind(*value);
            }
            SqlValue::DateTime(value) => {
                query = query.bind(*value);
            }
            // Spliced into the SQL text, never bound
            SqlValue::Function(_) => (),
        }
    }

    Ok(query)
}

fn column_value(value: &MySqlValueRef<'_>) -> Result<SqlValue, sqlx::Error> {
    if ValueRef::is_null(value) {
        return Ok(SqlValue::Null);
    }

    let owned = ValueRef::to_owned(value);

    match value.type_info().name() {
        "BOOLEAN" => Ok(SqlValue::Bool(owned.try_decode()?)),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            Ok(SqlValue::Number(owned.try_decode()?))
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => Ok(SqlValue::UNumber(owned.try_decode()?)),
        "FLOAT" | "DOUBLE" => Ok(SqlValue::Real(owned.try_decode()?)),
        "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" => {
            Ok(SqlValue::String(owned.try_decode()?))
        }
        "DATETIME" | "TIMESTAMP" => Ok(SqlValue::DateTime(owned.try_decode()?)),
        _ => Err(sqlx::Error::TypeNotFound {
            type_name: value.type_info().name().to_string(),
        }),
    }
}

fn from_row(column_names: &[String], row: &MySqlRow) -> Result<crate::Row, MysqlEngineError> {
    let mut columns = vec![];

    for column in column_names {
        columns.push((
            column.to_string(),
            column_value(&row.try_get_raw(column.as_str())?)?,
        ));
    }

    Ok(crate::Row { columns })
}

async fn run_statement(
    conn: &mut MySqlConnection,
    part: &str,
    params: &[(String, SqlValue)],
    token: &CancellationToken,
) -> Result<(Option<Table>, ExecOutcome), EngineError> {
    let (sql, binds) = positional(part, params);

    log::trace!("running statement: {sql} with binds: {binds:?}");

    let statement = conn.prepare(&sql).await.map_err(MysqlEngineError::Sqlx)?;
    let column_names = statement
        .columns()
        .iter()
        .map(|x| x.name().to_string())
        .collect::<Vec<_>>();
    let query = bind_values(statement.query(), &binds)?;

    if column_names.is_empty() {
        let result = tokio::select! {
            () = token.cancelled() => return Err(EngineError::Cancelled),
            result = query.execute(&mut *conn) => result.map_err(MysqlEngineError::Sqlx)?,
        };

        let outcome = ExecOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: i64::try_from(result.last_insert_id()).unwrap_or(i64::MAX),
        };

        return Ok((None, outcome));
    }

    let mut rows = vec![];
    let mut stream = query.fetch(&mut *conn);

    loop {
        let next = tokio::select! {
            () = token.cancelled() => return Err(EngineError::Cancelled),
            next = stream.next() => next,
        };

        match next.transpose().map_err(MysqlEngineError::Sqlx)? {
            Some(row) => rows.push(from_row(&column_names, &row)?),
            None => break,
        }
    }

    drop(stream);

    Ok((
        Some(Table {
            columns: column_names,
            rows,
        }),
        ExecOutcome::default(),
    ))
}
