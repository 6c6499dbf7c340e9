//! The module contains the errors the ledger can return.
//!
//! Errors fall in three families:
//!
//! - configuration errors ([`InvalidOrderField`], [`InvalidFilter`], [`InvalidDateField`],
//!   [`InvalidCashFlowField`], [`InvalidSession`]) raised when a manager is built or a bad
//!   value is assigned to it;
//! - argument errors ([`InvalidAttribute`], [`InvalidArgumentType`], [`ImmutableField`],
//!   [`EmptyArguments`]) raised while resolving caller supplied fields;
//! - persistence outcomes ([`NotFound`], [`Duplicate`], [`ForeignKey`], [`Unavailable`],
//!   [`Database`]) derived from the backend.
//!
//!  [`InvalidOrderField`]: LedgerError::InvalidOrderField
//!  [`InvalidFilter`]: LedgerError::InvalidFilter
//!  [`InvalidDateField`]: LedgerError::InvalidDateField
//!  [`InvalidCashFlowField`]: LedgerError::InvalidCashFlowField
//!  [`InvalidSession`]: LedgerError::InvalidSession
//!  [`InvalidAttribute`]: LedgerError::InvalidAttribute
//!  [`InvalidArgumentType`]: LedgerError::InvalidArgumentType
//!  [`ImmutableField`]: LedgerError::ImmutableField
//!  [`EmptyArguments`]: LedgerError::EmptyArguments
//!  [`NotFound`]: LedgerError::NotFound
//!  [`Duplicate`]: LedgerError::Duplicate
//!  [`ForeignKey`]: LedgerError::ForeignKey
//!  [`Unavailable`]: LedgerError::Unavailable
//!  [`Database`]: LedgerError::Database
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

use crate::fields::FieldKind;

/// Ledger custom errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid order field(s): {}", .0.join(", "))]
    InvalidOrderField(Vec<String>),
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    #[error("Invalid date field: {0}")]
    InvalidDateField(String),
    #[error("Invalid cash flow field: {0}")]
    InvalidCashFlowField(String),
    #[error("Invalid session: {0}")]
    InvalidSession(String),
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),
    #[error("\"{0}\" has no primary key column")]
    MissingPrimaryKey(String),
    #[error("\"{field}\" is not a field of \"{table}\"")]
    InvalidAttribute { table: String, field: String },
    #[error("\"{table}.{field}\" expects {expected}, got {found}")]
    InvalidArgumentType {
        table: String,
        field: String,
        expected: FieldKind,
        found: String,
    },
    #[error("\"{table}.{field}\" cannot be changed")]
    ImmutableField { table: String, field: String },
    #[error("No fields given for \"{0}\"")]
    EmptyArguments(String),
    #[error("\"{table}\" has no row with id {id}")]
    NotFound { table: String, id: i64 },
    #[error("Duplicate record: {0}")]
    Duplicate(String),
    #[error("Foreign key violation: {0}")]
    ForeignKey(String),
    #[error("Backend unavailable: {0}")]
    Unavailable(DbErr),
    #[error(transparent)]
    Database(DbErr),
}

impl LedgerError {
    /// Whether the error comes from a wrong configuration of a manager, i.e. a programming
    /// error rather than an outcome of the data.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidOrderField(_)
                | Self::InvalidFilter(_)
                | Self::InvalidDateField(_)
                | Self::InvalidCashFlowField(_)
                | Self::InvalidSession(_)
                | Self::MissingPrimaryKey(_)
        )
    }

    /// Whether the error was raised while resolving caller supplied fields.
    pub(crate) fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::InvalidAttribute { .. }
                | Self::InvalidArgumentType { .. }
                | Self::ImmutableField { .. }
                | Self::EmptyArguments(_)
        )
    }
}

impl From<DbErr> for LedgerError {
    fn from(err: DbErr) -> Self {
        if matches!(err, DbErr::Conn(_) | DbErr::ConnectionAcquire(_)) {
            return Self::Unavailable(err);
        }
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) => Self::Duplicate(msg),
            Some(SqlErr::ForeignKeyConstraintViolation(msg)) => Self::ForeignKey(msg),
            _ => Self::Database(err),
        }
    }
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidOrderField(a), Self::InvalidOrderField(b)) => a == b,
            (Self::InvalidFilter(a), Self::InvalidFilter(b)) => a == b,
            (Self::InvalidDateField(a), Self::InvalidDateField(b)) => a == b,
            (Self::InvalidCashFlowField(a), Self::InvalidCashFlowField(b)) => a == b,
            (Self::InvalidSession(a), Self::InvalidSession(b)) => a == b,
            (Self::InvalidDateRange(a), Self::InvalidDateRange(b)) => a == b,
            (Self::MissingPrimaryKey(a), Self::MissingPrimaryKey(b)) => a == b,
            (
                Self::InvalidAttribute { table, field },
                Self::InvalidAttribute {
                    table: other_table,
                    field: other_field,
                },
            ) => table == other_table && field == other_field,
            (
                Self::InvalidArgumentType {
                    table,
                    field,
                    expected,
                    found,
                },
                Self::InvalidArgumentType {
                    table: other_table,
                    field: other_field,
                    expected: other_expected,
                    found: other_found,
                },
            ) => {
                table == other_table
                    && field == other_field
                    && expected == other_expected
                    && found == other_found
            }
            (
                Self::ImmutableField { table, field },
                Self::ImmutableField {
                    table: other_table,
                    field: other_field,
                },
            ) => table == other_table && field == other_field,
            (Self::EmptyArguments(a), Self::EmptyArguments(b)) => a == b,
            (
                Self::NotFound { table, id },
                Self::NotFound {
                    table: other_table,
                    id: other_id,
                },
            ) => table == other_table && id == other_id,
            (Self::Duplicate(a), Self::Duplicate(b)) => a == b,
            (Self::ForeignKey(a), Self::ForeignKey(b)) => a == b,
            (Self::Unavailable(a), Self::Unavailable(b)) => a.to_string() == b.to_string(),
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{DbErr, RuntimeErr};

    use super::*;

    #[test]
    fn connection_errors_are_unavailable() {
        let err = LedgerError::from(DbErr::Conn(RuntimeErr::Internal("refused".to_string())));
        assert!(matches!(err, LedgerError::Unavailable(_)));
    }

    #[test]
    fn other_errors_keep_their_source() {
        let err = LedgerError::from(DbErr::Custom("boom".to_string()));
        assert_eq!(err, LedgerError::Database(DbErr::Custom("boom".to_string())));
        assert!(!err.is_configuration());
    }

    #[test]
    fn order_field_message_lists_every_field() {
        let err = LedgerError::InvalidOrderField(vec!["foo".to_string(), "bar".to_string()]);
        assert_eq!(err.to_string(), "Invalid order field(s): foo, bar");
        assert!(err.is_configuration());
    }
}
