use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{postgres::PgRow, FromRow, Postgres, QueryBuilder, Row};
use time::OffsetDateTime;
use validator::Validate;

/// Who touched a row and when. `created_*` is written once at insert.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    pub created_by: String,
    pub updated_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A persisted row: identity, soft-delete flag and audit trail around the
/// entity's own columns. Serializes flat.
#[derive(Debug, Clone, Serialize)]
pub struct Record<T> {
    pub id: i64,
    pub deleted: bool,
    #[serde(flatten)]
    pub audit: Audit,
    #[serde(flatten)]
    pub data: T,
}

impl<'r, T> FromRow<'r, PgRow> for Record<T>
where
    T: FromRow<'r, PgRow>,
{
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            deleted: row.try_get("deleted")?,
            audit: Audit::from_row(row)?,
            data: T::from_row(row)?,
        })
    }
}

/// Columns every table carries besides the entity's own.
pub const BASE_COLUMNS: &[&str] = &[
    "id",
    "deleted",
    "created_by",
    "updated_by",
    "created_at",
    "updated_at",
];

/// A domain type stored in its own table with the base columns.
///
/// `values()` must yield one value per entry of `COLUMNS`, in order.
pub trait Entity:
    for<'r> FromRow<'r, PgRow> + Serialize + Validate + Clone + Send + Sync + Unpin + 'static
{
    const TABLE: &'static str;
    /// Human name used in error messages.
    const NAME: &'static str;
    const COLUMNS: &'static [&'static str];

    fn values(&self) -> Vec<Value>;

    fn field(&self, column: &str) -> Option<Value> {
        let idx = Self::COLUMNS.iter().position(|c| *c == column)?;
        self.values().into_iter().nth(idx)
    }

    fn select_list() -> String {
        let mut cols: Vec<&str> = BASE_COLUMNS.to_vec();
        cols.extend_from_slice(Self::COLUMNS);
        cols.join(", ")
    }

    fn is_sortable(column: &str) -> bool {
        BASE_COLUMNS.contains(&column) || Self::COLUMNS.contains(&column)
    }
}

/// A typed column value, used for binding and for filter comparisons.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Value {
    Int(Option<i64>),
    Int32(Option<i32>),
    Float(Option<f64>),
    Decimal(Option<Decimal>),
    Text(Option<String>),
    TextList(Vec<String>),
    Bool(Option<bool>),
    Time(Option<OffsetDateTime>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Int(v) => v.is_none(),
            Value::Int32(v) => v.is_none(),
            Value::Float(v) => v.is_none(),
            Value::Decimal(v) => v.is_none(),
            Value::Text(v) => v.is_none(),
            Value::TextList(_) => false,
            Value::Bool(v) => v.is_none(),
            Value::Time(v) => v.is_none(),
        }
    }

    pub fn push_bind(self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Value::Int(v) => qb.push_bind(v),
            Value::Int32(v) => qb.push_bind(v),
            Value::Float(v) => qb.push_bind(v),
            Value::Decimal(v) => qb.push_bind(v),
            Value::Text(v) => qb.push_bind(v),
            Value::TextList(v) => qb.push_bind(v),
            Value::Bool(v) => qb.push_bind(v),
            Value::Time(v) => qb.push_bind(v),
        };
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(Some(v))
    }
}

impl From<Option<i64>> for Value {
    fn from(v: Option<i64>) -> Self {
        Value::Int(v)
    }
}

impl From<Option<i32>> for Value {
    fn from(v: Option<i32>) -> Self {
        Value::Int32(v)
    }
}

impl From<Option<f64>> for Value {
    fn from(v: Option<f64>) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(Some(v))
    }
}

impl From<Option<Decimal>> for Value {
    fn from(v: Option<Decimal>) -> Self {
        Value::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(Some(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(Some(v.to_string()))
    }
}

impl From<Option<String>> for Value {
    fn from(v: Option<String>) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::TextList(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(Some(v))
    }
}

impl From<OffsetDateTime> for Value {
    fn from(v: OffsetDateTime) -> Self {
        Value::Time(Some(v))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a closed set of upper-case names stored in a TEXT column and
/// sent as the same strings over JSON.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::common::entity::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err($crate::common::entity::UnknownVariant {
                        kind: stringify!($name),
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let text = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                Ok(text.parse::<$name>()?)
            }
        }

        impl From<$name> for $crate::common::entity::Value {
            fn from(v: $name) -> Self {
                $crate::common::entity::Value::Text(Some(v.as_str().to_string()))
            }
        }

        impl From<Option<$name>> for $crate::common::entity::Value {
            fn from(v: Option<$name>) -> Self {
                $crate::common::entity::Value::Text(v.map(|v| v.as_str().to_string()))
            }
        }
    };
}

pub(crate) use text_enum;

#[cfg(test)]
mod tests {
    use super::*;

    text_enum!(Colour {
        Red => "RED",
        DarkBlue => "DARK_BLUE",
    });

    #[test]
    fn text_enum_parses_case_insensitively() {
        assert_eq!("dark_blue".parse::<Colour>().unwrap(), Colour::DarkBlue);
        assert_eq!(Colour::Red.to_string(), "RED");
        let err = "green".parse::<Colour>().unwrap_err();
        assert_eq!(err.to_string(), "unknown Colour value: green");
    }

    #[test]
    fn text_enum_serde_uses_stored_names() {
        let json = serde_json::to_string(&Colour::DarkBlue).unwrap();
        assert_eq!(json, "\"DARK_BLUE\"");
        assert_eq!(Value::from(Some(Colour::Red)), Value::Text(Some("RED".into())));
    }

    #[test]
    fn null_values_compare_below_present_ones() {
        assert!(Value::Int(None).is_null());
        assert!(Value::Decimal(Some(Decimal::new(5, 0))) > Value::Decimal(Some(Decimal::new(4, 0))));
        assert!(!Value::TextList(vec![]).is_null());
    }
}
