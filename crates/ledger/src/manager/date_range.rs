//! Date windows for managers carrying a [`Dated`] capability.
use chrono::TimeZone;
use sea_orm::{ColumnTrait, Value};

use crate::{Calendar, Query, Record, ResultLedger, Session, Window};

use super::{DateField, Dated, Manager};

impl<'s, E, S, C> Manager<'s, E, S, C>
where
    E: Record,
    S: Session,
    C: Dated<E>,
{
    pub fn date_field(&self) -> &DateField<E> {
        self.capability.date_field()
    }

    pub fn set_date_field(&mut self, name: &str) -> ResultLedger<()> {
        let field = DateField::new(name)?;
        self.capability.set_date_field(field);
        Ok(())
    }

    /// Records whose date field lies in `[start, end]`. Bounds are converted to the column
    /// type, so an aware timestamp may bound a UTC column.
    pub fn between(
        &self,
        start: impl Into<Value>,
        end: impl Into<Value>,
        filters: Option<&[&str]>,
        reverse: bool,
    ) -> ResultLedger<Query<'s, E, S>> {
        let field = self.date_field();
        let start = field.bound(start.into())?;
        let end = field.bound(end.into())?;
        let range = field.column().between(start, end);
        self.query(self.compile(filters, Some(range), reverse)?)
    }

    /// Records whose date falls in `window` around the calendar's reference date.
    pub fn window<Tz: TimeZone>(
        &self,
        calendar: &Calendar<Tz>,
        window: Window,
        filters: Option<&[&str]>,
        reverse: bool,
    ) -> ResultLedger<Query<'s, E, S>> {
        let span = calendar.span(window)?;
        let (start, end) = self.date_field().span_bounds(calendar, span)?;
        tracing::debug!(
            field = self.date_field().name(),
            ?window,
            first = %span.first,
            last = %span.last,
            "date window"
        );
        self.between(start, end, filters, reverse)
    }

    pub fn today<Tz: TimeZone>(
        &self,
        calendar: &Calendar<Tz>,
        filters: Option<&[&str]>,
        reverse: bool,
    ) -> ResultLedger<Query<'s, E, S>> {
        self.window(calendar, Window::Today, filters, reverse)
    }

    pub fn yesterday<Tz: TimeZone>(
        &self,
        calendar: &Calendar<Tz>,
        filters: Option<&[&str]>,
        reverse: bool,
    ) -> ResultLedger<Query<'s, E, S>> {
        self.window(calendar, Window::Yesterday, filters, reverse)
    }

    /// Monday to Sunday of the reference week.
    pub fn this_week<Tz: TimeZone>(
        &self,
        calendar: &Calendar<Tz>,
        filters: Option<&[&str]>,
        reverse: bool,
    ) -> ResultLedger<Query<'s, E, S>> {
        self.window(calendar, Window::ThisWeek, filters, reverse)
    }

    pub fn this_month<Tz: TimeZone>(
        &self,
        calendar: &Calendar<Tz>,
        filters: Option<&[&str]>,
        reverse: bool,
    ) -> ResultLedger<Query<'s, E, S>> {
        self.window(calendar, Window::ThisMonth, filters, reverse)
    }

    pub fn this_year<Tz: TimeZone>(
        &self,
        calendar: &Calendar<Tz>,
        filters: Option<&[&str]>,
        reverse: bool,
    ) -> ResultLedger<Query<'s, E, S>> {
        self.window(calendar, Window::ThisYear, filters, reverse)
    }
}
