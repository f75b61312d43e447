use crate::value::SqlValue;

/// Transient `(sql, params)` bundle built fresh for every execution and
/// discarded afterwards. Parameters are ordered `(name, value)` pairs named
/// `@param0`, `@param1`, … bound positionally by the engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Command {
    pub sql: String,
    pub params: Vec<(String, SqlValue)>,
}

impl Command {
    #[must_use]
    pub const fn new(sql: String, params: Vec<(String, SqlValue)>) -> Self {
        Self { sql, params }
    }

    #[must_use]
    pub fn placeholder(index: usize) -> String {
        format!("@param{index}")
    }
}

/// Accumulates bound parameters while a statement renders its SQL text.
///
/// `push` applies both parameter normalization passes: the `"{null}"`
/// sentinel becomes a true NULL, and `Function` values are spliced into the
/// SQL verbatim instead of being bound, without consuming a placeholder
/// index.
#[derive(Debug, Default)]
pub(crate) struct ParamBag {
    params: Vec<(String, SqlValue)>,
}

impl ParamBag {
    pub(crate) const fn new() -> Self {
        Self { params: vec![] }
    }

    /// Returns the SQL token to splice where the value goes: either the
    /// placeholder that was allocated for it, or the raw function fragment.
    pub(crate) fn push(&mut self, value: SqlValue) -> String {
        match value.desentinel() {
            SqlValue::Function(fragment) => fragment,
            value => {
                let name = Command::placeholder(self.params.len());
                self.params.push((name.clone(), value));
                name
            }
        }
    }

    pub(crate) fn into_params(self) -> Vec<(String, SqlValue)> {
        self.params
    }
}
