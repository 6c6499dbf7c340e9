//! Calendar windows computed from a caller supplied reference moment.
//!
//! Nothing here reads the system clock: the same reference always yields the same windows.
use chrono::{
    DateTime, Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};

use crate::{LedgerError, ResultLedger};

/// Named windows relative to the reference date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Window {
    Today,
    Yesterday,
    ThisWeek,
    ThisMonth,
    ThisYear,
}

/// An inclusive range of calendar days.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateSpan {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DateSpan {
    pub fn day(date: NaiveDate) -> Self {
        Self {
            first: date,
            last: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date <= self.last
    }
}

/// A reference moment: the local date it falls on and the timezone days are measured in.
#[derive(Clone, Debug)]
pub struct Calendar<Tz: TimeZone = Utc> {
    date: NaiveDate,
    tz: Tz,
}

impl<Tz: TimeZone> Calendar<Tz> {
    pub fn at(moment: &DateTime<Tz>) -> Self {
        Self {
            date: moment.date_naive(),
            tz: moment.timezone(),
        }
    }

    /// The local date of the reference moment.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn span(&self, window: Window) -> ResultLedger<DateSpan> {
        let date = self.date;
        match window {
            Window::Today => Ok(DateSpan::day(date)),
            Window::Yesterday => date
                .pred_opt()
                .map(DateSpan::day)
                .ok_or_else(|| out_of_range(date)),
            Window::ThisWeek => {
                let back = Days::new(u64::from(date.weekday().num_days_from_monday()));
                let first = date.checked_sub_days(back).ok_or_else(|| out_of_range(date))?;
                let last = first
                    .checked_add_days(Days::new(6))
                    .ok_or_else(|| out_of_range(date))?;
                Ok(DateSpan { first, last })
            }
            Window::ThisMonth => {
                let first = date.with_day(1).ok_or_else(|| out_of_range(date))?;
                let (year, month) = if date.month() == 12 {
                    (date.year() + 1, 1)
                } else {
                    (date.year(), date.month() + 1)
                };
                let last = NaiveDate::from_ymd_opt(year, month, 1)
                    .and_then(|next| next.pred_opt())
                    .ok_or_else(|| out_of_range(date))?;
                Ok(DateSpan { first, last })
            }
            Window::ThisYear => {
                let first = NaiveDate::from_ymd_opt(date.year(), 1, 1);
                let last = NaiveDate::from_ymd_opt(date.year(), 12, 31);
                match (first, last) {
                    (Some(first), Some(last)) => Ok(DateSpan { first, last }),
                    _ => Err(out_of_range(date)),
                }
            }
        }
    }

    /// First instant of `date` in the calendar's timezone.
    pub fn start_of(&self, date: NaiveDate) -> DateTime<Utc> {
        self.to_utc(date.and_time(NaiveTime::MIN))
    }

    /// Last microsecond of `date` in the calendar's timezone.
    pub fn end_of(&self, date: NaiveDate) -> ResultLedger<DateTime<Utc>> {
        Ok(self.to_utc(end_of_day(date)?))
    }

    fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        self.tz
            .from_local_datetime(&local)
            .earliest()
            .map(|moment| moment.with_timezone(&Utc))
            .unwrap_or_else(|| local.and_utc())
    }
}

impl Calendar<Utc> {
    /// A reference date with days measured in UTC.
    pub fn on(date: NaiveDate) -> Self {
        Self { date, tz: Utc }
    }
}

pub(crate) fn end_of_day(date: NaiveDate) -> ResultLedger<NaiveDateTime> {
    date.and_hms_micro_opt(23, 59, 59, 999_999)
        .ok_or_else(|| out_of_range(date))
}

fn out_of_range(date: NaiveDate) -> LedgerError {
    LedgerError::InvalidDateRange(format!("window around {date} is out of range"))
}
