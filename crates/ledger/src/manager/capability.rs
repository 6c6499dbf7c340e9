//! Optional behaviours a manager can carry on top of the base operations.
//!
//! A capability is a type parameter of [`Manager`](super::Manager): [`Base`] adds nothing,
//! [`DateRange`] adds date windows over a temporal field and [`CashFlow`] adds the windows
//! plus income/expense sums over an integer amount field.
use chrono::{NaiveTime, TimeZone};
use sea_orm::Value;

use crate::{
    Calendar, DateSpan, LedgerError, Record, ResultLedger,
    calendar::end_of_day,
    fields::{FieldDescriptor, FieldKind, catalog},
};

/// Date field used when none is configured.
pub const DEFAULT_DATE_FIELD: &str = "created_at";
/// Amount field used when none is configured.
pub const DEFAULT_AMOUNT_FIELD: &str = "sum";

pub trait Capability<E: Record>: Clone {
    /// The amount field queries are summed over, if the capability has one.
    fn cash_flow(&self) -> Option<&CashFlowField<E>> {
        None
    }
}

/// Capabilities exposing a date field.
pub trait Dated<E: Record>: Capability<E> {
    fn date_field(&self) -> &DateField<E>;

    fn set_date_field(&mut self, field: DateField<E>);
}

/// No capability beyond the base operations.
#[derive(Clone, Copy, Debug, Default)]
pub struct Base;

impl<E: Record> Capability<E> for Base {}

#[derive(Clone, Debug)]
pub struct DateRange<E: Record> {
    date: DateField<E>,
}

impl<E: Record> DateRange<E> {
    pub fn new(date: DateField<E>) -> Self {
        Self { date }
    }
}

impl<E: Record> Capability<E> for DateRange<E> {}

impl<E: Record> Dated<E> for DateRange<E> {
    fn date_field(&self) -> &DateField<E> {
        &self.date
    }

    fn set_date_field(&mut self, field: DateField<E>) {
        self.date = field;
    }
}

#[derive(Clone, Debug)]
pub struct CashFlow<E: Record> {
    date: DateField<E>,
    amount: CashFlowField<E>,
}

impl<E: Record> CashFlow<E> {
    pub fn new(date: DateField<E>, amount: CashFlowField<E>) -> Self {
        Self { date, amount }
    }

    pub fn amount_field(&self) -> &CashFlowField<E> {
        &self.amount
    }
}

impl<E: Record> Capability<E> for CashFlow<E> {
    fn cash_flow(&self) -> Option<&CashFlowField<E>> {
        Some(&self.amount)
    }
}

impl<E: Record> Dated<E> for CashFlow<E> {
    fn date_field(&self) -> &DateField<E> {
        &self.date
    }

    fn set_date_field(&mut self, field: DateField<E>) {
        self.date = field;
    }
}

/// A timestamp or date field windows are computed on.
#[derive(Clone, Debug)]
pub struct DateField<E: Record> {
    field: FieldDescriptor<E>,
}

impl<E: Record> DateField<E> {
    pub fn new(name: &str) -> ResultLedger<Self> {
        let catalog = catalog::<E>();
        match catalog.get(name) {
            Some(field) if field.kind().is_temporal() => Ok(Self {
                field: field.clone(),
            }),
            Some(field) => Err(LedgerError::InvalidDateField(format!(
                "\"{}.{name}\" is a {} field",
                catalog.table(),
                field.kind()
            ))),
            None => Err(LedgerError::InvalidDateField(format!(
                "\"{name}\" is not a field of \"{}\"",
                catalog.table()
            ))),
        }
    }

    pub fn name(&self) -> &str {
        self.field.name()
    }

    pub fn column(&self) -> E::Column {
        self.field.column()
    }

    /// Converts a caller supplied bound to the column type.
    pub(crate) fn bound(&self, value: Value) -> ResultLedger<Value> {
        self.field.coerce(value)
    }

    /// Inclusive bounds of `span` as values of the column type. Timestamps span from the
    /// first to the last microsecond of the local days.
    pub(crate) fn span_bounds<Tz: TimeZone>(
        &self,
        calendar: &Calendar<Tz>,
        span: DateSpan,
    ) -> ResultLedger<(Value, Value)> {
        if self.field.is_date() {
            return Ok((Value::from(span.first), Value::from(span.last)));
        }
        if self.field.is_utc_timestamp() {
            return Ok((
                Value::from(calendar.start_of(span.first)),
                Value::from(calendar.end_of(span.last)?),
            ));
        }
        Ok((
            Value::from(span.first.and_time(NaiveTime::MIN)),
            Value::from(end_of_day(span.last)?),
        ))
    }
}

/// An integer amount field, in minor units, cash flows are summed over.
#[derive(Clone, Debug)]
pub struct CashFlowField<E: Record> {
    field: FieldDescriptor<E>,
}

impl<E: Record> CashFlowField<E> {
    pub fn new(name: &str) -> ResultLedger<Self> {
        let catalog = catalog::<E>();
        match catalog.get(name) {
            Some(field) if field.kind() == FieldKind::Integer => Ok(Self {
                field: field.clone(),
            }),
            Some(field) => Err(LedgerError::InvalidCashFlowField(format!(
                "\"{}.{name}\" is a {} field",
                catalog.table(),
                field.kind()
            ))),
            None => Err(LedgerError::InvalidCashFlowField(format!(
                "\"{name}\" is not a field of \"{}\"",
                catalog.table()
            ))),
        }
    }

    pub fn name(&self) -> &str {
        self.field.name()
    }

    pub fn column(&self) -> E::Column {
        self.field.column()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{categories, entries};

    #[test]
    fn date_field_must_be_temporal() {
        assert!(DateField::<entries::Entity>::new("transaction_date").is_ok());
        assert!(DateField::<entries::Entity>::new(DEFAULT_DATE_FIELD).is_ok());
        assert!(matches!(
            DateField::<entries::Entity>::new("sum"),
            Err(LedgerError::InvalidDateField(_))
        ));
        assert!(matches!(
            DateField::<entries::Entity>::new("missing"),
            Err(LedgerError::InvalidDateField(_))
        ));
    }

    #[test]
    fn cash_flow_field_must_be_integer() {
        assert!(CashFlowField::<entries::Entity>::new(DEFAULT_AMOUNT_FIELD).is_ok());
        assert!(matches!(
            CashFlowField::<entries::Entity>::new("description"),
            Err(LedgerError::InvalidCashFlowField(_))
        ));
        assert!(matches!(
            CashFlowField::<categories::Entity>::new("sum"),
            Err(LedgerError::InvalidCashFlowField(_))
        ));
    }

    #[test]
    fn only_cash_flow_exposes_an_amount() {
        let date = DateField::<entries::Entity>::new("transaction_date").unwrap();
        let amount = CashFlowField::<entries::Entity>::new("sum").unwrap();
        assert!(Capability::<entries::Entity>::cash_flow(&Base).is_none());
        assert!(DateRange::new(date.clone()).cash_flow().is_none());
        assert_eq!(
            CashFlow::new(date, amount).cash_flow().map(|field| field.name()),
            Some("sum")
        );
    }

    #[test]
    fn timestamp_bounds_cover_whole_days() {
        use chrono::{NaiveDate, TimeZone, Utc};

        let field = DateField::<entries::Entity>::new("transaction_date").unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let (start, end) = field
            .span_bounds(&Calendar::on(day), DateSpan::day(day))
            .unwrap();
        assert_eq!(
            start,
            Value::from(Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap())
        );
        let last = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap()
            + chrono::TimeDelta::microseconds(999_999);
        assert_eq!(end, Value::from(last));
    }
}
