//! Repositories: typed mutations and paged listings on top of a bound manager.
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, DatabaseConnection, IntoActiveModel, Value,
};

use crate::{
    Base, Capability, LedgerError, Manager, Record, ResultLedger, Session, fields::catalog,
};

pub use records::NewEntry;
pub use wrapped::WrappedResult;

mod records;
mod wrapped;

/// Offset and size of a listing page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

impl Page {
    pub const DEFAULT_LIMIT: u64 = 10;

    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_LIMIT)
    }
}

pub struct Repository<'s, E: Record, S = DatabaseConnection, C = Base> {
    manager: Manager<'s, E, S, C>,
}

impl<'s, E, S, C> Repository<'s, E, S, C>
where
    E: Record,
    S: Session,
    C: Capability<E>,
{
    /// Wraps a manager, which must be bound to an active session.
    pub fn new(manager: Manager<'s, E, S, C>) -> ResultLedger<Self> {
        manager.session()?;
        Ok(Self { manager })
    }

    pub fn manager(&self) -> &Manager<'s, E, S, C> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut Manager<'s, E, S, C> {
        &mut self.manager
    }

    pub fn into_manager(self) -> Manager<'s, E, S, C> {
        self.manager
    }

    pub async fn get(&self, id: i64) -> ResultLedger<Option<E::Model>> {
        self.manager.get(id).await
    }

    pub async fn count(&self, filters: Option<&[&str]>) -> ResultLedger<u64> {
        self.manager.count(filters).await
    }

    pub async fn exists(&self, id: i64) -> ResultLedger<bool> {
        self.manager.exists(id).await
    }

    /// Updates a record, failing with [`LedgerError::NotFound`] when no row has `id`.
    pub async fn update<'f>(
        &self,
        id: i64,
        fields: impl IntoIterator<Item = (&'f str, Value)>,
    ) -> ResultLedger<()> {
        let fields: Vec<_> = fields.into_iter().collect();
        if fields.is_empty() {
            return Err(LedgerError::EmptyArguments(table::<E>()));
        }
        if self.manager.update(id, fields).await? {
            Ok(())
        } else {
            Err(LedgerError::NotFound {
                table: table::<E>(),
                id,
            })
        }
    }

    /// Deletes a record, failing with [`LedgerError::NotFound`] when no row has `id`.
    pub async fn delete(&self, id: i64) -> ResultLedger<()> {
        if self.manager.delete(id).await? {
            Ok(())
        } else {
            Err(LedgerError::NotFound {
                table: table::<E>(),
                id,
            })
        }
    }

    /// One page of records in manager order. The page is fetched in one round trip.
    pub async fn get_many(
        &self,
        filters: Option<&[&str]>,
        page: Page,
    ) -> ResultLedger<WrappedResult<'s, E::Model>> {
        let query = self
            .manager
            .query(self.manager.compile(filters, None, false)?)?
            .offset(page.offset)
            .limit(page.limit);
        Ok(WrappedResult::from_rows(query.all().await?))
    }
}

impl<'s, E, S, C> Repository<'s, E, S, C>
where
    E: Record,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    E::Model: IntoActiveModel<E::ActiveModel>,
    S: Session,
    C: Capability<E>,
{
    pub async fn create<'f>(
        &self,
        fields: impl IntoIterator<Item = (&'f str, Value)>,
    ) -> ResultLedger<E::Model> {
        let fields: Vec<_> = fields.into_iter().collect();
        if fields.is_empty() {
            return Err(LedgerError::EmptyArguments(table::<E>()));
        }
        self.manager.create(fields).await
    }
}

fn table<E: Record>() -> String {
    catalog::<E>().table().to_string()
}
