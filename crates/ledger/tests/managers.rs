use chrono::{DateTime, TimeZone, Utc};
use futures::TryStreamExt;
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection, Value};

use ledger::{LedgerError, Manager, ManagerBuilder, categories, entries, users};

async fn connect() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

async fn seed(db: &DatabaseConnection) -> (users::Model, categories::Model) {
    let users: Manager<users::Entity> = Manager::new().unwrap().bind(db).unwrap();
    let user = users
        .create([
            ("tg_id", Value::from(42_i64)),
            ("budget_currency", Value::from("EUR")),
            ("is_active", Value::from(true)),
        ])
        .await
        .unwrap();

    let categories: Manager<categories::Entity> = Manager::new().unwrap().bind(db).unwrap();
    let category = categories
        .create([
            ("user_id", Value::from(user.id)),
            ("name", Value::from("Food")),
            ("kind", Value::from("expenses")),
            ("last_used", Value::from(Utc::now())),
        ])
        .await
        .unwrap();
    (user, category)
}

fn day(d: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, d, hour, 0, 0).unwrap()
}

async fn book(
    manager: &Manager<'_, entries::Entity>,
    category: &categories::Model,
    sum: i64,
    when: DateTime<Utc>,
) -> entries::Model {
    manager
        .create([
            ("user_id", Value::from(category.user_id)),
            ("category_id", Value::from(category.id)),
            ("sum", Value::from(sum)),
            ("transaction_date", Value::from(when)),
        ])
        .await
        .unwrap()
}

fn entry_manager(db: &DatabaseConnection) -> Manager<'_, entries::Entity> {
    entries::managers().build().unwrap().bind(db).unwrap()
}

fn sums(records: &[entries::Model]) -> Vec<i64> {
    records.iter().map(|entry| entry.sum).collect()
}

#[tokio::test]
async fn count_follows_creates() {
    let db = connect().await;
    let (_, category) = seed(&db).await;
    let manager = entry_manager(&db);

    assert_eq!(manager.count(None).await.unwrap(), 0);
    assert!(manager.list(false).await.unwrap().is_empty());
    assert_eq!(manager.first(None).await.unwrap(), None);

    for (i, sum) in [10, 20, 30].into_iter().enumerate() {
        book(&manager, &category, sum, day(1 + i as u32, 9)).await;
    }
    assert_eq!(manager.count(None).await.unwrap(), 3);
    assert_eq!(manager.list(false).await.unwrap().len(), 3);
}

#[tokio::test]
async fn last_n_mirrors_first_n() {
    let db = connect().await;
    let (_, category) = seed(&db).await;
    let manager = entry_manager(&db);
    for (i, sum) in [1, 2, 3, 4].into_iter().enumerate() {
        book(&manager, &category, sum, day(1 + i as u32, 9)).await;
    }

    let first = manager.first_n(2, None).unwrap().all().await.unwrap();
    assert_eq!(sums(&first), vec![1, 2]);
    let last = manager.last_n(2, None).unwrap().all().await.unwrap();
    assert_eq!(sums(&last), vec![4, 3]);

    let reversed = manager.list(true).await.unwrap();
    assert_eq!(sums(&reversed), vec![4, 3, 2, 1]);

    assert_eq!(manager.first(None).await.unwrap().unwrap().sum, 1);
    assert_eq!(manager.last(None).await.unwrap().unwrap().sum, 4);
    assert_eq!(manager.first_n(2, None).unwrap().count().await.unwrap(), 2);
}

#[tokio::test]
async fn ties_are_broken_by_the_next_key() {
    let db = connect().await;
    let (_, category) = seed(&db).await;
    let manager = entry_manager(&db);
    let a = book(&manager, &category, 1, day(5, 9)).await;
    let b = book(&manager, &category, 2, day(5, 9)).await;

    let ids: Vec<_> = manager.list(false).await.unwrap().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);
    let ids: Vec<_> = manager.list(true).await.unwrap().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![b.id, a.id]);
}

#[tokio::test]
async fn select_replaces_default_filters() {
    let db = connect().await;
    let (_, category) = seed(&db).await;
    let manager: Manager<entries::Entity> = entries::managers()
        .filters(["sum<0"])
        .build()
        .unwrap()
        .bind(&db)
        .unwrap();
    for (i, sum) in [100, -50, 200, -25].into_iter().enumerate() {
        book(&manager, &category, sum, day(1 + i as u32, 9)).await;
    }

    assert_eq!(manager.count(None).await.unwrap(), 2);
    assert_eq!(manager.count(Some(&[][..])).await.unwrap(), 4);
    assert_eq!(sums(&manager.list(false).await.unwrap()), vec![-50, -25]);

    let large = manager.select(&["sum>100"], false).unwrap().all().await.unwrap();
    assert_eq!(sums(&large), vec![200]);

    let both = manager
        .select(&["sum >= -50", "sum <= 100"], false)
        .unwrap()
        .all()
        .await
        .unwrap();
    assert_eq!(sums(&both), vec![100, -50, -25]);

    let err = manager.select(&["sum>>1"], false).err().unwrap();
    assert!(matches!(err, LedgerError::InvalidFilter(_)));
}

#[tokio::test]
async fn streaming_yields_records_in_order() {
    let db = connect().await;
    let (_, category) = seed(&db).await;
    let manager = entry_manager(&db);
    for (i, sum) in [5, 6, 7].into_iter().enumerate() {
        book(&manager, &category, sum, day(1 + i as u32, 9)).await;
    }

    let stream = manager.all(true).unwrap().stream().await.unwrap();
    let records: Vec<_> = stream.try_collect().await.unwrap();
    assert_eq!(sums(&records), vec![7, 6, 5]);
}

#[tokio::test]
async fn exists_tracks_create_and_delete() {
    let db = connect().await;
    let (_, category) = seed(&db).await;
    let manager = entry_manager(&db);
    let entry = book(&manager, &category, 12, day(3, 9)).await;

    assert!(manager.exists(entry.id).await.unwrap());
    assert_eq!(manager.get(entry.id).await.unwrap(), Some(entry.clone()));

    assert!(manager.delete(entry.id).await.unwrap());
    assert!(!manager.exists(entry.id).await.unwrap());
    assert_eq!(manager.get(entry.id).await.unwrap(), None);
    assert!(!manager.delete(entry.id).await.unwrap());
}

#[tokio::test]
async fn lookups_by_fields() {
    let db = connect().await;
    let (user, category) = seed(&db).await;
    let manager = entry_manager(&db);
    book(&manager, &category, 3, day(2, 9)).await;
    let second = book(&manager, &category, 3, day(1, 9)).await;

    let found = manager
        .get_by([("sum", Value::from(3_i64)), ("user_id", Value::from(user.id))])
        .await
        .unwrap();
    assert_eq!(found, Some(second));

    assert!(manager.exists_by([("sum", Value::from(3_i64))]).await.unwrap());
    assert!(!manager.exists_by([("sum", Value::from(4_i64))]).await.unwrap());
    assert!(!manager.exists_by([("missing", Value::from(1_i64))]).await.unwrap());
    assert!(!manager.exists_by([("sum", Value::from("three"))]).await.unwrap());

    let err = manager.get_by([("missing", Value::from(1_i64))]).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAttribute { .. }));
}

#[tokio::test]
async fn update_changes_only_given_fields() {
    let db = connect().await;
    let (_, category) = seed(&db).await;
    let manager = entry_manager(&db);
    let entry = book(&manager, &category, -40, day(4, 9)).await;

    let updated = manager
        .update(entry.id, [("description", Value::from("lunch"))])
        .await
        .unwrap();
    assert!(updated);
    let stored = manager.get(entry.id).await.unwrap().unwrap();
    assert_eq!(stored.description.as_deref(), Some("lunch"));
    assert_eq!(stored.sum, -40);
    assert!(stored.updated_at >= entry.updated_at);

    assert!(!manager.update(entry.id, []).await.unwrap());
    assert!(
        !manager
            .update(entry.id + 100, [("sum", Value::from(1_i64))])
            .await
            .unwrap()
    );

    let err = manager
        .update(entry.id, [("id", Value::from(7_i64))])
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ImmutableField { .. }));
}

#[tokio::test]
async fn create_validates_fields_before_writing() {
    let db = connect().await;
    let (_, category) = seed(&db).await;
    let manager = entry_manager(&db);

    let err = manager
        .create([("missing", Value::from(1_i64))])
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAttribute { .. }));

    let err = manager
        .create([
            ("user_id", Value::from(category.user_id)),
            ("category_id", Value::from(category.id)),
            ("sum", Value::from("twelve")),
            ("transaction_date", Value::from(day(1, 9))),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidArgumentType { .. }));
    assert_eq!(manager.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn constraint_violations_are_classified() {
    let db = connect().await;
    let (user, category) = seed(&db).await;

    let categories: Manager<categories::Entity> = Manager::new().unwrap().bind(&db).unwrap();
    let err = categories
        .create([
            ("user_id", Value::from(user.id)),
            ("name", Value::from(category.name.clone())),
            ("kind", Value::from("income")),
            ("last_used", Value::from(Utc::now())),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Duplicate(_)), "{err:?}");

    let err = categories
        .create([
            ("user_id", Value::from(user.id)),
            ("name", Value::from("Salary")),
            ("kind", Value::from("gifts")),
            ("last_used", Value::from(Utc::now())),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidArgumentType { .. }));

    let entries = entry_manager(&db);
    let err = entries
        .create([
            ("user_id", Value::from(user.id)),
            ("category_id", Value::from(category.id + 100)),
            ("sum", Value::from(5_i64)),
            ("transaction_date", Value::from(day(1, 9))),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ForeignKey(_)), "{err:?}");
    assert_eq!(entries.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn unbound_manager_reports_invalid_session() {
    let manager: Manager<entries::Entity> = Manager::new().unwrap();
    assert!(!manager.is_bound());

    let err = manager.count(None).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidSession(_)));
    assert!(matches!(
        manager.all(false).err().unwrap(),
        LedgerError::InvalidSession(_)
    ));
    assert!(matches!(
        manager.get(1).await.unwrap_err(),
        LedgerError::InvalidSession(_)
    ));
}

#[tokio::test]
async fn reconfiguring_a_bound_manager() {
    let db = connect().await;
    let (_, category) = seed(&db).await;
    let mut manager = entry_manager(&db);
    for (i, sum) in [1, 2, 3].into_iter().enumerate() {
        book(&manager, &category, sum, day(1 + i as u32, 9)).await;
    }

    manager.set_order_by(["-sum"]).unwrap();
    assert_eq!(sums(&manager.list(false).await.unwrap()), vec![3, 2, 1]);

    let err = manager.set_order_by(["-nope", "sum"]).unwrap_err();
    assert_eq!(err, LedgerError::InvalidOrderField(vec!["nope".to_string()]));
    assert_eq!(sums(&manager.list(false).await.unwrap()), vec![3, 2, 1]);

    manager.set_filters(["sum!=2"]).unwrap();
    assert_eq!(sums(&manager.list(false).await.unwrap()), vec![3, 1]);
}

#[tokio::test]
async fn builder_defaults_apply_to_every_capability() {
    let db = connect().await;
    let builder = ManagerBuilder::default().order_by(["-id"]).filters(["sum>0"]);
    let base: Manager<entries::Entity> = builder.build().unwrap().bind(&db).unwrap();
    let flow = builder
        .clone()
        .date_field("transaction_date")
        .build_cash_flow::<entries::Entity, DatabaseConnection>()
        .unwrap()
        .bind(&db)
        .unwrap();

    assert_eq!(base.order(), flow.order());
    assert_eq!(base.filters().len(), 1);
    assert_eq!(flow.filters().len(), 1);
    assert_eq!(flow.date_field().name(), "transaction_date");
}
