//! Generic, filterable and ordered data access for the budget records.
//!
//! A [`Manager`] fetches, counts and mutates any sea-orm entity through a uniform interface
//! driven by an [`OrderSpec`], textual [`FilterExpression`]s and, when the manager carries
//! the right capability, date windows and cash-flow sums. A [`Repository`] wraps a bound
//! manager with typed mutations and paged, peeked listings.
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, StreamTrait,
    TransactionTrait,
};

pub use calendar::{Calendar, DateSpan, Window};
pub use error::LedgerError;
pub use fields::{FieldCatalog, FieldDescriptor, FieldKind, catalog, fieldnames, fields};
pub use filter::{Filter, FilterExpression, Operator};
pub use manager::{
    Base, Capability, CashFlow, CashFlowField, CashFlowManager, DateField, DateRange,
    DateRangeManager, Dated, Manager, ManagerBuilder,
};
pub use order::{DEFAULT_ORDER_BY, Direction, OrderBy, OrderSpec};
pub use query::{CashFlowView, Query, RecordStream};
pub use repository::{NewEntry, Page, Repository, WrappedResult};

pub mod categories;
pub mod entries;
pub mod users;

mod calendar;
mod error;
mod fields;
mod filter;
mod manager;
mod order;
mod query;
mod repository;

pub type ResultLedger<T> = Result<T, LedgerError>;

/// Any persisted entity the managers can work on.
pub trait Record: EntityTrait + 'static {}

impl<E: EntityTrait + 'static> Record for E {}

/// A handle to the store: a connection or an open transaction.
///
/// Managers borrow the handle for the duration of a call and never close it.
pub trait Session: ConnectionTrait + TransactionTrait + StreamTrait + Send + Sync {
    /// Whether the handle can still run statements.
    fn is_active(&self) -> bool;
}

impl Session for DatabaseConnection {
    fn is_active(&self) -> bool {
        !matches!(self, DatabaseConnection::Disconnected)
    }
}

impl Session for DatabaseTransaction {
    fn is_active(&self) -> bool {
        true
    }
}

/// Runs `$body` inside a transaction begun on `$session`, committing on success.
///
/// Evaluates to a `Result<_, DbErr>`: failures to begin or commit are returned like
/// failures of the body, so the caller handles every outcome in one place. On a
/// [`DatabaseTransaction`] the nested `begin` opens a savepoint, so an enclosing unit of
/// work is reused rather than re-opened.
macro_rules! with_tx {
    ($session:expr, |$tx:ident| $body:expr) => {
        async {
            let $tx = $session.begin().await?;
            let value = $body?;
            $tx.commit().await?;
            Ok::<_, sea_orm::DbErr>(value)
        }
        .await
    };
}

pub(crate) use with_tx;

#[cfg(test)]
mod tests {
    use sea_orm::{DatabaseConnection, DbErr};

    use super::*;

    #[tokio::test]
    async fn failed_begin_is_returned_as_a_value() {
        let session = DatabaseConnection::Disconnected;
        let result = with_tx!(session, |_txn| Ok::<_, DbErr>(1));
        assert!(result.is_err());
        assert!(!session.is_active());
    }
}
