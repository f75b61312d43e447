pub mod custom;
pub mod delete;
pub mod insert;
pub mod select;
pub mod stored_procedure;
pub mod union_insert_select;
pub mod update;

pub use custom::{CustomCommand, CustomCommandNotRet};
pub use delete::Delete;
pub use insert::{Insert, Replace};
pub use select::{Select, SelectColumn};
pub use stored_procedure::StoredProcedure;
pub use union_insert_select::UnionInsertSelectFunc;
pub use update::Update;

use crate::RequestError;
use crate::command::ParamBag;
use crate::value::SqlValue;

pub(crate) fn require(value: &str, what: &str) -> Result<(), RequestError> {
    if value.trim().is_empty() {
        return Err(RequestError::Precondition(format!("{what} is required")));
    }

    Ok(())
}

/// Renders a positional-values row statement (`INSERT INTO …` /
/// `REPLACE INTO …`). An empty value list renders the all-default row form.
pub(crate) fn row_statement(verb: &str, table: &str, values: &[SqlValue], bag: &mut ParamBag) -> String {
    if values.is_empty() {
        return format!("{verb} INTO {table} () VALUES ()");
    }

    let placeholders = values
        .iter()
        .map(|value| bag.push(value.clone()))
        .collect::<Vec<_>>()
        .join(", ");

    format!("{verb} INTO {table} VALUES ({placeholders})")
}
