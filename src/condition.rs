use crate::command::ParamBag;
use crate::value::SqlValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
}

impl Comparison {
    const fn operator(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Compare {
        column: String,
        comparison: Comparison,
        value: SqlValue,
    },
    In {
        column: String,
        values: Vec<SqlValue>,
    },
}

/// Accumulates predicate fragments and compiles them to a
/// `(sqlFragment, parameterList)` pair on demand. Predicates are AND-joined.
///
/// Conditions hold their values by ownership, so `Clone` yields a deep copy
/// with no aliasing between a request and its copies.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConditionSet {
    conditions: Vec<Condition>,
}

impl ConditionSet {
    #[must_use]
    pub const fn empty() -> Self {
        Self { conditions: vec![] }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    #[must_use]
    pub fn where_eq<C: Into<String>, V: Into<SqlValue>>(self, column: C, value: V) -> Self {
        self.compare(column, Comparison::Eq, value)
    }

    #[must_use]
    pub fn where_not_eq<C: Into<String>, V: Into<SqlValue>>(self, column: C, value: V) -> Self {
        self.compare(column, Comparison::NotEq, value)
    }

    #[must_use]
    pub fn where_gt<C: Into<String>, V: Into<SqlValue>>(self, column: C, value: V) -> Self {
        self.compare(column, Comparison::Gt, value)
    }

    #[must_use]
    pub fn where_gte<C: Into<String>, V: Into<SqlValue>>(self, column: C, value: V) -> Self {
        self.compare(column, Comparison::Gte, value)
    }

    #[must_use]
    pub fn where_lt<C: Into<String>, V: Into<SqlValue>>(self, column: C, value: V) -> Self {
        self.compare(column, Comparison::Lt, value)
    }

    #[must_use]
    pub fn where_lte<C: Into<String>, V: Into<SqlValue>>(self, column: C, value: V) -> Self {
        self.compare(column, Comparison::Lte, value)
    }

    #[must_use]
    pub fn where_like<C: Into<String>, V: Into<SqlValue>>(self, column: C, value: V) -> Self {
        self.compare(column, Comparison::Like, value)
    }

    #[must_use]
    pub fn where_in<C: Into<String>, V: Into<SqlValue>>(
        mut self,
        column: C,
        values: Vec<V>,
    ) -> Self {
        self.conditions.push(Condition::In {
            column: column.into(),
            values: values.into_iter().map(std::convert::Into::into).collect(),
        });
        self
    }

    fn compare<C: Into<String>, V: Into<SqlValue>>(
        mut self,
        column: C,
        comparison: Comparison,
        value: V,
    ) -> Self {
        self.conditions.push(Condition::Compare {
            column: column.into(),
            comparison,
            value: value.into(),
        });
        self
    }

    /// Compiles the accumulated predicates into a `WHERE …` fragment,
    /// allocating placeholders from `bag`. Returns an empty string when no
    /// predicates were added. NULL equality compiles to `IS NULL` /
    /// `IS NOT NULL` rather than a bound comparison.
    pub(crate) fn compile(&self, bag: &mut ParamBag) -> String {
        if self.conditions.is_empty() {
            return String::new();
        }

        let props = self
            .conditions
            .iter()
            .map(|condition| match condition {
                Condition::Compare {
                    column,
                    comparison,
                    value,
                } => {
                    if value.clone().desentinel().is_null() {
                        match comparison {
                            Comparison::NotEq => format!("({column} IS NOT NULL)"),
                            _ => format!("({column} IS NULL)"),
                        }
                    } else {
                        format!(
                            "({column} {} {})",
                            comparison.operator(),
                            bag.push(value.clone())
                        )
                    }
                }
                Condition::In { column, values } => {
                    let list = values
                        .iter()
                        .map(|value| bag.push(value.clone()))
                        .collect::<Vec<_>>()
                        .join(",");
                    format!("{column} IN ({list})")
                }
            })
            .collect::<Vec<_>>();

        format!("WHERE {}", props.join(" AND "))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::Command;

    #[test]
    fn empty_set_compiles_to_nothing() {
        let mut bag = ParamBag::new();

        assert_eq!(ConditionSet::empty().compile(&mut bag), "");
        assert!(bag.into_params().is_empty());
    }

    #[test]
    fn predicates_are_and_joined_with_sequential_placeholders() {
        let conditions = ConditionSet::empty()
            .where_eq("id", 3_i64)
            .where_gt("age", 21_i64);
        let mut bag = ParamBag::new();

        let fragment = conditions.compile(&mut bag);

        assert_eq!(fragment, "WHERE (id = @param0) AND (age > @param1)");
        assert_eq!(bag.into_params(), vec![
            (Command::placeholder(0), SqlValue::Number(3)),
            (Command::placeholder(1), SqlValue::Number(21)),
        ]);
    }

    #[test]
    fn null_equality_compiles_to_is_null() {
        let conditions = ConditionSet::empty()
            .where_eq("deleted_at", SqlValue::Null)
            .where_not_eq("name", SqlValue::Null);
        let mut bag = ParamBag::new();

        let fragment = conditions.compile(&mut bag);

        assert_eq!(
            fragment,
            "WHERE (deleted_at IS NULL) AND (name IS NOT NULL)"
        );
        assert!(bag.into_params().is_empty());
    }

    #[test]
    fn in_list_allocates_one_placeholder_per_value() {
        let conditions = ConditionSet::empty().where_in("id", vec![1_i64, 2, 3]);
        let mut bag = ParamBag::new();

        let fragment = conditions.compile(&mut bag);

        assert_eq!(fragment, "WHERE id IN (@param0,@param1,@param2)");
        assert_eq!(bag.into_params().len(), 3);
    }

    #[test]
    fn clone_is_deep() {
        let original = ConditionSet::empty().where_eq("id", 1_i64);
        let copy = original.clone().where_eq("name", "x");

        assert_eq!(original.len(), 1);
        assert_eq!(copy.len(), 2);
    }
}
