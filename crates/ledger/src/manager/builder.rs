use crate::{Filter, OrderBy, Record, ResultLedger, Session, order::DEFAULT_ORDER_BY};

use super::{
    Base, CashFlow, CashFlowField, CashFlowManager, DEFAULT_AMOUNT_FIELD, DEFAULT_DATE_FIELD,
    DateField, DateRange, DateRangeManager, Manager,
};

/// Shared configuration for the managers of one record type.
///
/// The same builder produces a base, a date-range or a cash-flow manager, so a record type
/// can keep its defaults (order, filters, date and amount fields) in one place. Nothing is
/// validated until one of the `build` methods runs.
#[derive(Clone, Debug, Default)]
pub struct ManagerBuilder {
    order_by: Option<Vec<String>>,
    filters: Vec<String>,
    date_field: Option<String>,
    amount_field: Option<String>,
}

impl ManagerBuilder {
    pub fn order_by<I, T>(mut self, directives: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.order_by = Some(directives.into_iter().map(Into::into).collect());
        self
    }

    pub fn filters<I, T>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.filters = exprs.into_iter().map(Into::into).collect();
        self
    }

    pub fn date_field(mut self, name: impl Into<String>) -> Self {
        self.date_field = Some(name.into());
        self
    }

    pub fn amount_field(mut self, name: impl Into<String>) -> Self {
        self.amount_field = Some(name.into());
        self
    }

    fn with_capability<'s, E: Record, S: Session, C: super::Capability<E>>(
        &self,
        capability: C,
    ) -> ResultLedger<Manager<'s, E, S, C>> {
        let order = match &self.order_by {
            Some(directives) => OrderBy::parse(directives)?,
            None => OrderBy::parse(DEFAULT_ORDER_BY)?,
        };
        let filters = Filter::parse_all(&self.filters)?;
        Ok(Manager::from_parts(order, filters, capability))
    }

    fn date<E: Record>(&self) -> ResultLedger<DateField<E>> {
        DateField::new(self.date_field.as_deref().unwrap_or(DEFAULT_DATE_FIELD))
    }

    pub fn build<'s, E: Record, S: Session>(&self) -> ResultLedger<Manager<'s, E, S, Base>> {
        self.with_capability(Base)
    }

    pub fn build_date_range<'s, E: Record, S: Session>(
        &self,
    ) -> ResultLedger<DateRangeManager<'s, E, S>> {
        self.with_capability(DateRange::new(self.date()?))
    }

    pub fn build_cash_flow<'s, E: Record, S: Session>(
        &self,
    ) -> ResultLedger<CashFlowManager<'s, E, S>> {
        let amount =
            CashFlowField::new(self.amount_field.as_deref().unwrap_or(DEFAULT_AMOUNT_FIELD))?;
        self.with_capability(CashFlow::new(self.date()?, amount))
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::DatabaseConnection;

    use super::*;
    use crate::{Direction, LedgerError, entries, users};

    #[test]
    fn default_order_is_insertion_order() {
        let manager: Manager<entries::Entity> = ManagerBuilder::default().build().unwrap();
        let keys: Vec<_> = manager.order().iter().collect();
        assert_eq!(keys, vec![("created_at", Direction::Asc), ("id", Direction::Asc)]);
        assert!(manager.filters().is_empty());
        assert!(!manager.is_bound());
    }

    #[test]
    fn invalid_configuration_fails_at_build() {
        let order = ManagerBuilder::default()
            .order_by(["-missing"])
            .build::<entries::Entity, DatabaseConnection>();
        assert!(matches!(order, Err(LedgerError::InvalidOrderField(_))));

        let filters = ManagerBuilder::default()
            .filters(["missing>1"])
            .build::<entries::Entity, DatabaseConnection>();
        assert!(matches!(filters, Err(LedgerError::InvalidFilter(_))));

        let date = ManagerBuilder::default()
            .date_field("sum")
            .build_date_range::<entries::Entity, DatabaseConnection>();
        assert!(matches!(date, Err(LedgerError::InvalidDateField(_))));

        let amount = ManagerBuilder::default()
            .build_cash_flow::<users::Entity, DatabaseConnection>();
        assert!(matches!(amount, Err(LedgerError::InvalidCashFlowField(_))));
    }

    #[test]
    fn setters_validate_on_assignment() {
        let mut manager: Manager<entries::Entity> = Manager::new().unwrap();
        assert!(manager.set_order_by(["-sum", "id"]).is_ok());
        assert_eq!(manager.order().direction("sum"), Some(Direction::Desc));

        let err = manager.set_order_by(["nope"]).unwrap_err();
        assert_eq!(err, LedgerError::InvalidOrderField(vec!["nope".to_string()]));
        assert_eq!(manager.order().direction("sum"), Some(Direction::Desc));

        assert!(manager.set_filters(["sum != 0"]).is_ok());
        assert_eq!(manager.filters().len(), 1);
        assert!(manager.set_filters(["sum = 0"]).is_err());
    }
}
