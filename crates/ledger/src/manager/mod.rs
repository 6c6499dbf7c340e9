//! Managers: ordered, filtered access to the records of one entity.
//!
//! A manager is configured once (order, default filters, capability) and then bound to a
//! session. Configuration is validated when it is assigned, so a bound manager only fails
//! on bad call arguments or on the store itself.
use chrono::Utc;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection,
    IntoActiveModel, QueryFilter, QuerySelect, Select, Value,
    sea_query::{Expr, SimpleExpr},
};

use crate::{
    Filter, LedgerError, OrderBy, OrderSpec, Query, Record, ResultLedger, Session,
    fields::{FieldDescriptor, catalog},
    filter::condition,
    with_tx,
};

pub use builder::ManagerBuilder;
pub use capability::{
    Base, Capability, CashFlow, CashFlowField, DEFAULT_AMOUNT_FIELD, DEFAULT_DATE_FIELD, DateField,
    DateRange, Dated,
};

mod builder;
mod capability;
mod date_range;

const CREATED_AT: &str = "created_at";
const UPDATED_AT: &str = "updated_at";

pub type DateRangeManager<'s, E, S = DatabaseConnection> = Manager<'s, E, S, DateRange<E>>;
pub type CashFlowManager<'s, E, S = DatabaseConnection> = Manager<'s, E, S, CashFlow<E>>;

/// Generic record manager.
///
/// `filters` arguments follow one convention: `None` applies the manager's default filters,
/// `Some(exprs)` replaces them for that call (`Some(&[])` means no filter at all).
pub struct Manager<'s, E: Record, S = DatabaseConnection, C = Base> {
    session: Option<&'s S>,
    order: OrderBy<E>,
    filters: Vec<Filter<E>>,
    capability: C,
}

impl<'s, E: Record, S: Session> Manager<'s, E, S, Base> {
    /// A manager with the default order and no filters.
    pub fn new() -> ResultLedger<Self> {
        ManagerBuilder::default().build()
    }
}

impl<'s, E, S, C> Manager<'s, E, S, C>
where
    E: Record,
    S: Session,
    C: Capability<E>,
{
    pub(crate) fn from_parts(order: OrderBy<E>, filters: Vec<Filter<E>>, capability: C) -> Self {
        Self {
            session: None,
            order,
            filters,
            capability,
        }
    }

    /// Binds the manager to `session`. Fails with [`LedgerError::InvalidSession`] if the
    /// session can no longer run statements.
    pub fn bind(mut self, session: &'s S) -> ResultLedger<Self> {
        if !session.is_active() {
            return Err(LedgerError::InvalidSession(
                "session is not active".to_string(),
            ));
        }
        self.session = Some(session);
        Ok(self)
    }

    pub fn is_bound(&self) -> bool {
        self.session.is_some()
    }

    pub(crate) fn session(&self) -> ResultLedger<&'s S> {
        match self.session {
            Some(session) if session.is_active() => Ok(session),
            Some(_) => Err(LedgerError::InvalidSession(
                "session is not active".to_string(),
            )),
            None => Err(LedgerError::InvalidSession(format!(
                "{} manager is not bound to a session",
                catalog::<E>().table()
            ))),
        }
    }

    pub fn order(&self) -> &OrderSpec {
        self.order.spec()
    }

    pub fn set_order_by<I, T>(&mut self, directives: I) -> ResultLedger<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.order = OrderBy::parse(directives)?;
        Ok(())
    }

    pub fn filters(&self) -> &[Filter<E>] {
        &self.filters
    }

    pub fn set_filters<I, T>(&mut self, exprs: I) -> ResultLedger<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.filters = Filter::parse_all(exprs)?;
        Ok(())
    }

    pub fn capability(&self) -> &C {
        &self.capability
    }

    fn resolve_filters(&self, filters: Option<&[&str]>) -> ResultLedger<Vec<Filter<E>>> {
        match filters {
            Some(exprs) => Filter::parse_all(exprs),
            None => Ok(self.filters.clone()),
        }
    }

    fn filtered(filters: &[Filter<E>]) -> Select<E> {
        if filters.is_empty() {
            E::find()
        } else {
            E::find().filter(condition(filters))
        }
    }

    pub(crate) fn compile(
        &self,
        filters: Option<&[&str]>,
        extra: Option<SimpleExpr>,
        reverse: bool,
    ) -> ResultLedger<Select<E>> {
        let mut select = Self::filtered(&self.resolve_filters(filters)?);
        if let Some(extra) = extra {
            select = select.filter(extra);
        }
        Ok(self.order.apply(select, reverse))
    }

    pub(crate) fn query(&self, select: Select<E>) -> ResultLedger<Query<'s, E, S>> {
        Ok(Query::new(
            select,
            self.session()?,
            self.capability.cash_flow().cloned(),
        ))
    }

    /// Every record matching the default filters, lazily.
    pub fn all(&self, reverse: bool) -> ResultLedger<Query<'s, E, S>> {
        self.query(self.compile(None, None, reverse)?)
    }

    /// Every record matching the default filters, materialized.
    pub async fn list(&self, reverse: bool) -> ResultLedger<Vec<E::Model>> {
        self.all(reverse)?.all().await
    }

    /// Records matching `filters`, which replace the default filters for this call.
    pub fn select(&self, filters: &[&str], reverse: bool) -> ResultLedger<Query<'s, E, S>> {
        self.query(self.compile(Some(filters), None, reverse)?)
    }

    pub async fn count(&self, filters: Option<&[&str]>) -> ResultLedger<u64> {
        let select = Self::filtered(&self.resolve_filters(filters)?);
        self.query(select)?.count().await
    }

    pub fn first_n(&self, n: u64, filters: Option<&[&str]>) -> ResultLedger<Query<'s, E, S>> {
        Ok(self.query(self.compile(filters, None, false)?)?.limit(n))
    }

    /// The last `n` records, latest first. Mirrors [`first_n`](Self::first_n).
    pub fn last_n(&self, n: u64, filters: Option<&[&str]>) -> ResultLedger<Query<'s, E, S>> {
        Ok(self.query(self.compile(filters, None, true)?)?.limit(n))
    }

    pub async fn first(&self, filters: Option<&[&str]>) -> ResultLedger<Option<E::Model>> {
        self.first_n(1, filters)?.one().await
    }

    pub async fn last(&self, filters: Option<&[&str]>) -> ResultLedger<Option<E::Model>> {
        self.last_n(1, filters)?.one().await
    }

    pub async fn get(&self, id: i64) -> ResultLedger<Option<E::Model>> {
        let session = self.session()?;
        let key = id_condition::<E>(id)?;
        Ok(E::find().filter(key).one(session).await?)
    }

    /// First record, in manager order, whose fields equal the given values.
    pub async fn get_by<'f>(
        &self,
        fields: impl IntoIterator<Item = (&'f str, Value)>,
    ) -> ResultLedger<Option<E::Model>> {
        let session = self.session()?;
        let criteria = criteria::<E>(fields)?;
        let select = self.order.apply(E::find().filter(criteria), false);
        Ok(select.one(session).await?)
    }

    pub async fn exists(&self, id: i64) -> ResultLedger<bool> {
        let key = match id_condition::<E>(id) {
            Ok(key) => key,
            Err(err) if err.is_resolution() => return Ok(false),
            Err(err) => return Err(err),
        };
        self.any(key).await
    }

    /// Whether a record has all the given field values. Unknown fields or values of the
    /// wrong type resolve to `false`.
    pub async fn exists_by<'f>(
        &self,
        fields: impl IntoIterator<Item = (&'f str, Value)>,
    ) -> ResultLedger<bool> {
        let criteria = match criteria::<E>(fields) {
            Ok(criteria) => criteria,
            Err(err) if err.is_resolution() => {
                tracing::debug!(error = %err, "exists lookup did not resolve");
                return Ok(false);
            }
            Err(err) => return Err(err),
        };
        self.any(criteria).await
    }

    pub(crate) async fn any(&self, condition: Condition) -> ResultLedger<bool> {
        let select = E::find().filter(condition).limit(1);
        Ok(self.query(select)?.count().await? > 0)
    }

    /// Applies a partial update. Returns whether a row was affected; an unknown id and an
    /// empty update are both `false`.
    pub async fn update<'f>(
        &self,
        id: i64,
        fields: impl IntoIterator<Item = (&'f str, Value)>,
    ) -> ResultLedger<bool> {
        let session = self.session()?;
        let catalog = catalog::<E>();
        let key = id_condition::<E>(id)?;

        let mut assignments = resolve::<E>(fields)?;
        if let Some(field) = assignments.iter().find(|(field, _)| field.is_primary_key()) {
            return Err(LedgerError::ImmutableField {
                table: catalog.table().to_string(),
                field: field.0.name().to_string(),
            });
        }
        if assignments.is_empty() {
            return Ok(false);
        }
        stamp::<E>(&mut assignments, &[UPDATED_AT])?;

        let update = assignments
            .into_iter()
            .fold(E::update_many().filter(key), |update, (field, value)| {
                update.col_expr(field.column(), field.column().save_as(Expr::val(value)))
            });
        let result = with_tx!(session, |txn| update.exec(&txn).await);
        match result {
            Ok(result) => {
                tracing::info!(
                    table = catalog.table(),
                    id,
                    rows = result.rows_affected,
                    "record updated"
                );
                Ok(result.rows_affected > 0)
            }
            Err(err) => {
                let err = LedgerError::from(err);
                tracing::warn!(table = catalog.table(), id, error = %err, "update failed");
                Err(err)
            }
        }
    }

    /// Deletes a record. Returns whether a row was affected.
    pub async fn delete(&self, id: i64) -> ResultLedger<bool> {
        let session = self.session()?;
        let catalog = catalog::<E>();
        let key = id_condition::<E>(id)?;

        let result = with_tx!(session, |txn| E::delete_many().filter(key).exec(&txn).await);
        match result {
            Ok(result) => {
                tracing::info!(
                    table = catalog.table(),
                    id,
                    rows = result.rows_affected,
                    "record deleted"
                );
                Ok(result.rows_affected > 0)
            }
            Err(err) => {
                let err = LedgerError::from(err);
                tracing::warn!(table = catalog.table(), id, error = %err, "delete failed");
                Err(err)
            }
        }
    }
}

impl<'s, E, S, C> Manager<'s, E, S, C>
where
    E: Record,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    E::Model: IntoActiveModel<E::ActiveModel>,
    S: Session,
    C: Capability<E>,
{
    /// Inserts a record and commits. `created_at` and `updated_at` are filled in when the
    /// record has them and they are not given.
    pub async fn create<'f>(
        &self,
        fields: impl IntoIterator<Item = (&'f str, Value)>,
    ) -> ResultLedger<E::Model> {
        let session = self.session()?;
        let catalog = catalog::<E>();

        let mut assignments = resolve::<E>(fields)?;
        stamp::<E>(&mut assignments, &[CREATED_AT, UPDATED_AT])?;

        let mut active = <E::ActiveModel as ActiveModelBehavior>::new();
        for (field, value) in assignments {
            active.set(field.column(), value);
        }

        let result = with_tx!(session, |txn| active.insert(&txn).await);
        match result {
            Ok(model) => {
                tracing::info!(table = catalog.table(), "record created");
                Ok(model)
            }
            Err(err) => {
                let err = LedgerError::from(err);
                tracing::warn!(table = catalog.table(), error = %err, "create failed");
                Err(err)
            }
        }
    }
}

type Assignment<E> = (&'static FieldDescriptor<E>, Value);

/// Resolves caller fields against the catalog, coercing every value to its column type.
fn resolve<'f, E: Record>(
    fields: impl IntoIterator<Item = (&'f str, Value)>,
) -> ResultLedger<Vec<Assignment<E>>> {
    let catalog = catalog::<E>();
    fields
        .into_iter()
        .map(|(name, value)| {
            let field = catalog.resolve(name)?;
            Ok((field, field.coerce(value)?))
        })
        .collect()
}

/// Adds the current time for each of `names` the record has and the caller did not give.
fn stamp<E: Record>(assignments: &mut Vec<Assignment<E>>, names: &[&str]) -> ResultLedger<()> {
    let catalog = catalog::<E>();
    let now = Utc::now();
    for name in names {
        let given = assignments.iter().any(|(field, _)| field.name() == *name);
        if let (Some(field), false) = (catalog.get(name), given) {
            assignments.push((field, field.coerce(Value::from(now))?));
        }
    }
    Ok(())
}

/// AND of equality conditions on the given fields.
fn criteria<'f, E: Record>(
    fields: impl IntoIterator<Item = (&'f str, Value)>,
) -> ResultLedger<Condition> {
    let assignments = resolve::<E>(fields)?;
    if assignments.is_empty() {
        return Err(LedgerError::EmptyArguments(
            catalog::<E>().table().to_string(),
        ));
    }
    Ok(assignments
        .into_iter()
        .fold(Condition::all(), |condition, (field, value)| {
            condition.add(ColumnTrait::eq(&field.column(), value))
        }))
}

fn id_condition<E: Record>(id: i64) -> ResultLedger<Condition> {
    let key = catalog::<E>().primary_key()?;
    let value = key.coerce(Value::from(id))?;
    Ok(Condition::all().add(ColumnTrait::eq(&key.column(), value)))
}
