//! Record specific helpers used by the bot handlers.
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Value, sea_query::Expr,
};

use crate::{
    Capability, LedgerError, Query, ResultLedger, Session, categories, entries, users,
};

use super::{Page, Repository, WrappedResult};

impl<'s, S, C> Repository<'s, users::Entity, S, C>
where
    S: Session,
    C: Capability<users::Entity>,
{
    pub async fn user_by_tg_id(&self, tg_id: i64) -> ResultLedger<Option<users::Model>> {
        self.manager.get_by([("tg_id", Value::from(tg_id))]).await
    }

    /// Whether a user matches either the id or the Telegram id.
    pub async fn user_exists(&self, id: Option<i64>, tg_id: Option<i64>) -> ResultLedger<bool> {
        let mut condition = Condition::any();
        if let Some(id) = id {
            condition = condition.add(users::Column::Id.eq(id));
        }
        if let Some(tg_id) = tg_id {
            condition = condition.add(users::Column::TgId.eq(tg_id));
        }
        if condition.is_empty() {
            return Ok(false);
        }
        self.manager.any(condition).await
    }

    /// Registers an active user, failing with [`LedgerError::Duplicate`] if the Telegram id
    /// is taken.
    pub async fn register_user(
        &self,
        tg_id: i64,
        budget_currency: &str,
    ) -> ResultLedger<users::Model> {
        if self.user_exists(None, Some(tg_id)).await? {
            return Err(LedgerError::Duplicate(format!("user with tg_id {tg_id}")));
        }
        self.create([
            ("tg_id", Value::from(tg_id)),
            ("budget_currency", Value::from(budget_currency)),
            ("is_active", Value::from(true)),
        ])
        .await
    }
}

impl<'s, S, C> Repository<'s, categories::Entity, S, C>
where
    S: Session,
    C: Capability<categories::Entity>,
{
    /// A page of the user's categories, most recently used first.
    pub async fn user_categories(
        &self,
        user_id: i64,
        page: Page,
    ) -> ResultLedger<WrappedResult<'s, categories::Model>> {
        let select = categories::Entity::find()
            .filter(categories::Column::UserId.eq(user_id))
            .order_by_desc(categories::Column::LastUsed)
            .order_by_desc(categories::Column::CreatedAt)
            .offset(page.offset)
            .limit(page.limit);
        let query = Query::new(select, self.manager.session()?, None);
        Ok(WrappedResult::from_rows(query.all().await?))
    }

    pub async fn count_user_categories(&self, user_id: i64) -> ResultLedger<u64> {
        let select = categories::Entity::find().filter(categories::Column::UserId.eq(user_id));
        Query::new(select, self.manager.session()?, None).count().await
    }

    pub async fn category_exists(&self, user_id: i64, name: &str) -> ResultLedger<bool> {
        self.manager
            .exists_by([("user_id", Value::from(user_id)), ("name", Value::from(name))])
            .await
    }

    pub async fn count_category_entries(&self, category_id: i64) -> ResultLedger<u64> {
        let select = entries::Entity::find().filter(entries::Column::CategoryId.eq(category_id));
        Query::new(select, self.manager.session()?, None).count().await
    }
}

/// Fields of an entry to book.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEntry {
    pub user_id: i64,
    pub category_id: i64,
    pub sum: i64,
    pub description: Option<String>,
    pub transaction_date: DateTime<Utc>,
}

impl<'s, S, C> Repository<'s, entries::Entity, S, C>
where
    S: Session,
    C: Capability<entries::Entity>,
{
    /// Books an entry and marks its category as used, in one transaction. Fails with
    /// [`LedgerError::NotFound`] when the category does not belong to the user.
    pub async fn record_entry(&self, entry: NewEntry) -> ResultLedger<entries::Model> {
        let txn = self.manager.session()?.begin().await?;

        let model = entries::managers()
            .build::<entries::Entity, DatabaseTransaction>()?
            .bind(&txn)?
            .create([
                ("user_id", Value::from(entry.user_id)),
                ("category_id", Value::from(entry.category_id)),
                ("sum", Value::from(entry.sum)),
                ("description", Value::from(entry.description)),
                ("transaction_date", Value::from(entry.transaction_date)),
            ])
            .await?;

        let now = Utc::now();
        let bumped = categories::Entity::update_many()
            .col_expr(
                categories::Column::NumEntries,
                Expr::col(categories::Column::NumEntries).add(1),
            )
            .col_expr(categories::Column::LastUsed, Expr::val(now).into())
            .col_expr(categories::Column::UpdatedAt, Expr::val(now).into())
            .filter(categories::Column::Id.eq(entry.category_id))
            .filter(categories::Column::UserId.eq(entry.user_id))
            .exec(&txn)
            .await?;
        if bumped.rows_affected == 0 {
            return Err(LedgerError::NotFound {
                table: "categories".to_string(),
                id: entry.category_id,
            });
        }

        txn.commit().await?;
        tracing::info!(
            user_id = entry.user_id,
            category_id = entry.category_id,
            id = model.id,
            "entry recorded"
        );
        Ok(model)
    }

    pub async fn count_user_entries(&self, user_id: i64) -> ResultLedger<u64> {
        let select = entries::Entity::find().filter(entries::Column::UserId.eq(user_id));
        Query::new(select, self.manager.session()?, None).count().await
    }
}
