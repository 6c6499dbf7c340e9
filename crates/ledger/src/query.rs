//! Lazy query results.
//!
//! A [`Query`] holds a compiled select and the session it runs on. Nothing touches the
//! store until it is streamed, counted or materialized.
use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use sea_orm::{
    ConnectionTrait, ModelTrait, QuerySelect, QueryTrait, Select, Value,
    sea_query::{Alias, Asterisk, Expr, Func, Query as SqlQuery, SelectStatement, SimpleExpr},
};

use crate::{
    LedgerError, Record, ResultLedger, Session, fields::integer_of, manager::CashFlowField,
};

const SUBQUERY: &str = "subquery";
const AGGREGATE: &str = "aggregate";

/// A forward-only stream of records. It is consumed once and cannot be restarted.
pub type RecordStream<'s, M> = BoxStream<'s, ResultLedger<M>>;

pub struct Query<'s, E: Record, S> {
    select: Select<E>,
    session: &'s S,
    cash_flow: Option<CashFlowField<E>>,
}

impl<'s, E: Record, S: Session> Query<'s, E, S> {
    pub(crate) fn new(select: Select<E>, session: &'s S, cash_flow: Option<CashFlowField<E>>) -> Self {
        Self {
            select,
            session,
            cash_flow,
        }
    }

    pub fn as_select(&self) -> &Select<E> {
        &self.select
    }

    pub fn into_select(self) -> Select<E> {
        self.select
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.select = self.select.limit(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.select = self.select.offset(offset);
        self
    }

    /// Materializes every matching record.
    pub async fn all(self) -> ResultLedger<Vec<E::Model>> {
        Ok(self.select.all(self.session).await?)
    }

    pub async fn one(self) -> ResultLedger<Option<E::Model>> {
        Ok(self.select.one(self.session).await?)
    }

    /// Number of rows the query yields, honouring its limit and offset.
    pub async fn count(&self) -> ResultLedger<u64> {
        let total = aggregate(
            self.session,
            self.select.clone().into_query(),
            Func::count(Expr::col(Asterisk)).into(),
            None,
        )
        .await?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    /// Streams the matching records.
    pub async fn stream(self) -> ResultLedger<RecordStream<'s, E::Model>> {
        tracing::debug!(
            sql = %self.select.build(self.session.get_database_backend()),
            "streaming query"
        );
        let stream = self.select.stream(self.session).await?;
        Ok(stream.map_err(LedgerError::from).boxed())
    }

    /// Income, expenses and sum helpers. Present only on queries built by a cash-flow
    /// manager.
    pub fn cash_flow(&self) -> Option<CashFlowView<'s, E, S>> {
        self.cash_flow.clone().map(|field| CashFlowView {
            select: self.select.clone(),
            session: self.session,
            field,
            sign: None,
        })
    }
}

/// Sign of the amounts a [`CashFlowView`] keeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Sign {
    Positive,
    Negative,
}

impl Sign {
    fn predicate(self, amount: Expr) -> SimpleExpr {
        match self {
            Self::Positive => amount.gt(0_i64),
            Self::Negative => amount.lt(0_i64),
        }
    }

    fn admits(self, amount: &Value) -> bool {
        integer_of(amount).is_some_and(|n| match self {
            Self::Positive => n > 0,
            Self::Negative => n < 0,
        })
    }
}

/// Signed-sum helpers over the amount field of a query.
///
/// The sign is applied to the rows the query yields, after its ordering, limit and offset,
/// so `income` and `expenses` always split `total_sum` of the same rows.
pub struct CashFlowView<'s, E: Record, S> {
    select: Select<E>,
    session: &'s S,
    field: CashFlowField<E>,
    sign: Option<Sign>,
}

impl<'s, E: Record, S: Session> CashFlowView<'s, E, S> {
    fn signed(&self, sign: Sign) -> Self {
        Self {
            select: self.select.clone(),
            session: self.session,
            field: self.field.clone(),
            sign: Some(sign),
        }
    }

    /// Rows with a positive amount.
    pub fn income(&self) -> Self {
        self.signed(Sign::Positive)
    }

    /// Rows with a negative amount.
    pub fn expenses(&self) -> Self {
        self.signed(Sign::Negative)
    }

    /// Sum of the amount field over the rows, `0` when nothing matches.
    pub async fn total_sum(&self) -> ResultLedger<i64> {
        let amount = || Expr::col((Alias::new(SUBQUERY), self.field.column()));
        let sum = Func::coalesce([SimpleExpr::from(Func::sum(amount())), Expr::val(0_i64).into()]);
        aggregate(
            self.session,
            self.select.clone().into_query(),
            Func::cast_as(sum, Alias::new("BIGINT")).into(),
            self.sign.map(|sign| sign.predicate(amount())),
        )
        .await
    }

    /// The rows of the query, in query order, keeping only those of the view's sign.
    pub async fn all(self) -> ResultLedger<Vec<E::Model>> {
        let column = self.field.column();
        let rows = self.select.all(self.session).await?;
        Ok(match self.sign {
            Some(sign) => rows
                .into_iter()
                .filter(|model| sign.admits(&model.get(column)))
                .collect(),
            None => rows,
        })
    }
}

/// Evaluates `expr` over the rows of `inner`, wrapping it as a subquery so ordering, limit
/// and offset keep their meaning.
async fn aggregate<C: ConnectionTrait>(
    session: &C,
    inner: SelectStatement,
    expr: SimpleExpr,
    outer: Option<SimpleExpr>,
) -> ResultLedger<i64> {
    let mut statement = SqlQuery::select()
        .expr_as(expr, Alias::new(AGGREGATE))
        .from_subquery(inner, Alias::new(SUBQUERY))
        .to_owned();
    if let Some(outer) = outer {
        statement.and_where(outer);
    }
    let backend = session.get_database_backend();
    let row = session.query_one(backend.build(&statement)).await?;
    match row {
        Some(row) => Ok(row.try_get::<Option<i64>>("", AGGREGATE)?.unwrap_or(0)),
        None => Ok(0),
    }
}
