/// SQLパラメータおよび結果セルの型付き値
///
/// Data APIとの間でやり取りする値を、文字列・整数・真偽値・NULLの
/// 4種類のタグ付き共用体として表現する。
use std::fmt;

/// 型付きSQL値
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// 文字列値
    String(String),
    /// 64bit整数値
    Integer(i64),
    /// 真偽値
    Boolean(bool),
    /// NULL
    Null,
}

/// 結果セットのセル
///
/// バインドパラメータと同じ値の集合を持つため、同一の型を共有する。
pub type Cell = SqlValue;

impl SqlValue {
    /// 型名を取得（エラーメッセージ用）
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::String(_) => "string",
            SqlValue::Integer(_) => "integer",
            SqlValue::Boolean(_) => "boolean",
            SqlValue::Null => "null",
        }
    }

    /// NULLかどうか
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// 文字列値を取得
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// 整数値を取得
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// 真偽値を取得
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::String(value) => write!(f, "'{}'", value),
            SqlValue::Integer(value) => write!(f, "{}", value),
            SqlValue::Boolean(value) => write!(f, "{}", value),
            SqlValue::Null => write!(f, "NULL"),
        }
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::String(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::String(value.to_string())
    }
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        SqlValue::String(value.clone())
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Integer(i64::from(value))
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Boolean(value)
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_conversions() {
        assert_eq!(SqlValue::from("O-1"), SqlValue::String("O-1".to_string()));
        assert_eq!(SqlValue::from("O-1".to_string()), SqlValue::String("O-1".to_string()));
        assert_eq!(SqlValue::from(42i64), SqlValue::Integer(42));
        assert_eq!(SqlValue::from(7i32), SqlValue::Integer(7));
        assert_eq!(SqlValue::from(true), SqlValue::Boolean(true));
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(5i64)), SqlValue::Integer(5));
    }

    #[test]
    fn test_accessors_match_variant_only() {
        let value = SqlValue::Integer(42);
        assert_eq!(value.as_i64(), Some(42));
        assert_eq!(value.as_str(), None);
        assert_eq!(value.as_bool(), None);
        assert!(!value.is_null());

        assert!(SqlValue::Null.is_null());
        assert_eq!(SqlValue::Boolean(false).as_bool(), Some(false));
        assert_eq!(SqlValue::String("x".to_string()).as_str(), Some("x"));
    }

    #[test]
    fn test_type_name() {
        assert_eq!(SqlValue::String(String::new()).type_name(), "string");
        assert_eq!(SqlValue::Integer(0).type_name(), "integer");
        assert_eq!(SqlValue::Boolean(true).type_name(), "boolean");
        assert_eq!(SqlValue::Null.type_name(), "null");
    }

    #[test]
    fn test_display() {
        assert_eq!(SqlValue::String("a".to_string()).to_string(), "'a'");
        assert_eq!(SqlValue::Integer(-3).to_string(), "-3");
        assert_eq!(SqlValue::Boolean(true).to_string(), "true");
        assert_eq!(SqlValue::Null.to_string(), "NULL");
    }
}
