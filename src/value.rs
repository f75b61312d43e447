use chrono::NaiveDateTime;

/// Marker string the legacy callers pass to request a SQL NULL. Substituted
/// with a true NULL during command build, never sent to the server.
pub const NULL_SENTINEL: &str = "{null}";

/// A single statement parameter value.
///
/// `Function` carries a raw SQL fragment that is spliced into the command
/// text where the placeholder would have gone; it contributes no bound
/// parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    String(String),
    StringOpt(Option<String>),
    Bool(bool),
    Number(i64),
    UNumber(u64),
    Real(f64),
    DateTime(NaiveDateTime),
    Function(String),
}

impl SqlValue {
    #[must_use]
    pub fn function(fragment: &str) -> Self {
        Self::Function(fragment.to_string())
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::StringOpt(None))
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) | Self::StringOpt(Some(value)) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Text rendering used for reader output and stored-procedure output
    /// parameters. NULL renders as the empty string.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Null | Self::StringOpt(None) => String::new(),
            Self::String(value) | Self::StringOpt(Some(value)) | Self::Function(value) => {
                value.clone()
            }
            Self::Bool(value) => if *value { "1" } else { "0" }.to_string(),
            Self::Number(value) => value.to_string(),
            Self::UNumber(value) => value.to_string(),
            Self::Real(value) => value.to_string(),
            Self::DateTime(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Numeric coercion used for stored-procedure return values. NULL maps
    /// to 0; numeric text parses, anything else falls back to 0.
    #[must_use]
    pub fn to_i64(&self) -> i64 {
        match self {
            Self::Number(value) => *value,
            Self::UNumber(value) => i64::try_from(*value).unwrap_or(i64::MAX),
            Self::Bool(value) => i64::from(*value),
            Self::String(value) | Self::StringOpt(Some(value)) => {
                value.trim().parse().unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Sentinel normalization pass: the legacy `"{null}"` marker becomes a
    /// true NULL. Applied to the build-time copy of a value only.
    #[must_use]
    pub(crate) fn desentinel(self) -> Self {
        match self {
            Self::String(value) if value == NULL_SENTINEL => Self::Null,
            Self::StringOpt(Some(value)) if value == NULL_SENTINEL => Self::Null,
            value => value,
        }
    }
}

impl<T: Into<Self>> From<Option<T>> for SqlValue {
    fn from(val: Option<T>) -> Self {
        val.map_or(Self::Null, std::convert::Into::into)
    }
}

impl From<bool> for SqlValue {
    fn from(val: bool) -> Self {
        Self::Bool(val)
    }
}

impl From<&str> for SqlValue {
    fn from(val: &str) -> Self {
        Self::String(val.to_string())
    }
}

impl From<&String> for SqlValue {
    fn from(val: &String) -> Self {
        Self::String(val.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(val: String) -> Self {
        Self::String(val)
    }
}

impl From<f32> for SqlValue {
    fn from(val: f32) -> Self {
        Self::Real(f64::from(val))
    }
}

impl From<f64> for SqlValue {
    fn from(val: f64) -> Self {
        Self::Real(val)
    }
}

impl From<i8> for SqlValue {
    fn from(val: i8) -> Self {
        Self::Number(i64::from(val))
    }
}

impl From<i16> for SqlValue {
    fn from(val: i16) -> Self {
        Self::Number(i64::from(val))
    }
}

impl From<i32> for SqlValue {
    fn from(val: i32) -> Self {
        Self::Number(i64::from(val))
    }
}

impl From<i64> for SqlValue {
    fn from(val: i64) -> Self {
        Self::Number(val)
    }
}

impl From<u8> for SqlValue {
    fn from(val: u8) -> Self {
        Self::UNumber(u64::from(val))
    }
}

impl From<u16> for SqlValue {
    fn from(val: u16) -> Self {
        Self::UNumber(u64::from(val))
    }
}

impl From<u32> for SqlValue {
    fn from(val: u32) -> Self {
        Self::UNumber(u64::from(val))
    }
}

impl From<u64> for SqlValue {
    fn from(val: u64) -> Self {
        Self::UNumber(val)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(val: NaiveDateTime) -> Self {
        Self::DateTime(val)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn sentinel_becomes_null() {
        assert_eq!(
            SqlValue::String(NULL_SENTINEL.to_string()).desentinel(),
            SqlValue::Null
        );
        assert_eq!(
            SqlValue::StringOpt(Some(NULL_SENTINEL.to_string())).desentinel(),
            SqlValue::Null
        );
    }

    #[test]
    fn non_sentinel_values_pass_through() {
        assert_eq!(
            SqlValue::String("{not null}".to_string()).desentinel(),
            SqlValue::String("{not null}".to_string())
        );
        assert_eq!(SqlValue::Number(5).desentinel(), SqlValue::Number(5));
    }

    #[test]
    fn null_text_is_empty_string() {
        assert_eq!(SqlValue::Null.to_text(), "");
        assert_eq!(SqlValue::StringOpt(None).to_text(), "");
        assert_eq!(SqlValue::Number(-3).to_text(), "-3");
        assert_eq!(SqlValue::Bool(true).to_text(), "1");
    }

    #[test]
    fn return_code_coercion() {
        assert_eq!(SqlValue::Null.to_i64(), 0);
        assert_eq!(SqlValue::Number(7).to_i64(), 7);
        assert_eq!(SqlValue::String("42".into()).to_i64(), 42);
        assert_eq!(SqlValue::String("not a number".into()).to_i64(), 0);
    }

    #[test]
    fn from_option_maps_none_to_null() {
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(3_i64)), SqlValue::Number(3));
    }
}
