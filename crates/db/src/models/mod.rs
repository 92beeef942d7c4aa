//! Row models and their conversions into domain types.
//!
//! Ids and JSON-bearing columns are stored as TEXT; each row type owns the
//! conversion into its `margin-core` domain type, failing with a decode
//! error when a row no longer parses (a corrupt database, not a
//! recoverable condition).

pub mod annotation;
pub mod event;
pub mod session;

/// Wrap a conversion failure as a sqlx decode error.
pub(crate) fn decode_err<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}
