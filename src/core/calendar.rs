//! Holiday-aware business day arithmetic.
//!
//! Holidays are configured as literal dates. A year of `9999` marks a
//! holiday that recurs on the same month and day every year; any other
//! year pins the holiday to that exact date. Saturdays and Sundays are
//! never business days.

use chrono::{Datelike, NaiveDate, Weekday};
use log::warn;
use std::collections::BTreeSet;
use thiserror::Error;

/// Year placeholder for holidays that recur annually.
pub const RECURRING_YEAR: i32 = 9999;

/// A leap year used to validate recurring entries such as Feb 29.
const LEAP_REFERENCE_YEAR: i32 = 2000;

/// Count of distinct month/day pairs, Feb 29 included.
const DAYS_IN_LEAP_YEAR: usize = 366;

/// A date string that could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid date '{input}': {reason}")]
pub struct InvalidDateError {
    pub input: String,
    pub reason: String,
}

impl InvalidDateError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors arising from calendar construction and date arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error(transparent)]
    InvalidDate(#[from] InvalidDateError),
    #[error("recurring holidays cover every day of the year")]
    NoBusinessDays,
    #[error("no business day reachable from {0} within the supported date range")]
    OutOfRange(NaiveDate),
}

/// Parse a ledger or configuration date.
///
/// Accepts ISO `YYYY-MM-DD` and SAP list format `DD.MM.YYYY`.
pub fn parse_date(input: &str) -> Result<NaiveDate, InvalidDateError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InvalidDateError::new(input, "empty date"));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d.%m.%Y"))
        .map_err(|e| InvalidDateError::new(input, e.to_string()))
}

/// A single configured holiday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Holiday {
    /// Applies only on this exact date.
    Fixed(NaiveDate),
    /// Applies on this month and day in every year.
    Recurring { month: u32, day: u32 },
}

impl Holiday {
    /// Parse a holiday entry, treating year `9999` as "every year".
    ///
    /// # Examples
    ///
    /// ```
    /// use gl_clearing::core::calendar::Holiday;
    ///
    /// assert_eq!(
    ///     Holiday::parse("9999-12-25").unwrap(),
    ///     Holiday::Recurring { month: 12, day: 25 },
    /// );
    /// assert!(matches!(Holiday::parse("29.03.2024").unwrap(), Holiday::Fixed(_)));
    /// ```
    pub fn parse(input: &str) -> Result<Self, InvalidDateError> {
        let trimmed = input.trim();
        let (year, month, day) = split_components(trimmed)
            .ok_or_else(|| InvalidDateError::new(input, "expected YYYY-MM-DD or DD.MM.YYYY"))?;

        if year == RECURRING_YEAR {
            NaiveDate::from_ymd_opt(LEAP_REFERENCE_YEAR, month, day)
                .ok_or_else(|| InvalidDateError::new(input, "no such month and day"))?;
            return Ok(Holiday::Recurring { month, day });
        }

        NaiveDate::from_ymd_opt(year, month, day)
            .map(Holiday::Fixed)
            .ok_or_else(|| InvalidDateError::new(input, "no such calendar date"))
    }
}

fn split_components(s: &str) -> Option<(i32, u32, u32)> {
    let parts: Vec<&str> = if s.contains('-') {
        s.split('-').collect()
    } else {
        s.split('.').collect()
    };
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    if s.contains('-') {
        Some((parts[0].parse().ok()?, parts[1].parse().ok()?, parts[2].parse().ok()?))
    } else {
        Some((parts[2].parse().ok()?, parts[1].parse().ok()?, parts[0].parse().ok()?))
    }
}

/// A weekend and holiday calendar.
///
/// Built once from configuration and shared read-only by every clearing
/// worker.
///
/// # Examples
///
/// ```
/// use gl_clearing::core::calendar::BusinessCalendar;
/// use chrono::NaiveDate;
///
/// let calendar = BusinessCalendar::from_entries(&["9999-12-25", "9999-12-26"]).unwrap();
/// let christmas_eve = NaiveDate::from_ymd_opt(2024, 12, 24).unwrap();
///
/// assert!(calendar.is_business_day(christmas_eve));
/// assert_eq!(
///     calendar.next_business_day(christmas_eve).unwrap(),
///     NaiveDate::from_ymd_opt(2024, 12, 27).unwrap(),
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct BusinessCalendar {
    fixed: BTreeSet<NaiveDate>,
    recurring: BTreeSet<(u32, u32)>,
}

impl BusinessCalendar {
    /// A calendar with weekends only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a calendar from already parsed holidays.
    pub fn from_holidays(
        holidays: impl IntoIterator<Item = Holiday>,
    ) -> Result<Self, CalendarError> {
        let mut calendar = Self::new();
        for holiday in holidays {
            match holiday {
                Holiday::Fixed(date) => {
                    calendar.fixed.insert(date);
                }
                Holiday::Recurring { month, day } => {
                    calendar.recurring.insert((month, day));
                }
            }
        }
        if calendar.recurring.len() >= DAYS_IN_LEAP_YEAR {
            return Err(CalendarError::NoBusinessDays);
        }
        for date in calendar.overlapping_holidays() {
            warn!(
                "Holiday {} is configured both as an exact date and as a recurring date",
                date
            );
        }
        Ok(calendar)
    }

    /// Build a calendar from configuration strings.
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Result<Self, CalendarError> {
        let holidays = entries
            .iter()
            .map(|e| Holiday::parse(e.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_holidays(holidays)
    }

    /// Number of configured holiday entries (exact plus recurring).
    pub fn holiday_count(&self) -> usize {
        self.fixed.len() + self.recurring.len()
    }

    pub fn is_weekend(&self, date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.fixed.contains(&date) || self.recurring.contains(&(date.month(), date.day()))
    }

    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !self.is_weekend(date) && !self.is_holiday(date)
    }

    /// The first business day strictly after `date`.
    pub fn next_business_day(&self, date: NaiveDate) -> Result<NaiveDate, CalendarError> {
        self.scan(date, true)
    }

    /// The last business day strictly before `date`.
    pub fn previous_business_day(&self, date: NaiveDate) -> Result<NaiveDate, CalendarError> {
        self.scan(date, false)
    }

    /// `date` itself when it is a business day, otherwise the next one.
    pub fn roll_forward(&self, date: NaiveDate) -> Result<NaiveDate, CalendarError> {
        if self.is_business_day(date) {
            Ok(date)
        } else {
            self.next_business_day(date)
        }
    }

    /// Move `n` business days from `date`; negative `n` moves backwards.
    /// `n == 0` rolls forward to a business day.
    pub fn add_business_days(&self, date: NaiveDate, n: i64) -> Result<NaiveDate, CalendarError> {
        if n == 0 {
            return self.roll_forward(date);
        }
        let forward = n > 0;
        let mut current = date;
        for _ in 0..n.unsigned_abs() {
            current = self.scan(current, forward)?;
        }
        Ok(current)
    }

    /// Business days in the half-open range `(start, end]`, negative when
    /// `end` precedes `start`.
    pub fn business_days_between(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        let (from, to, sign) = if start <= end {
            (start, end, 1)
        } else {
            (end, start, -1)
        };
        let mut count = 0;
        let mut current = from;
        while current < to {
            match current.succ_opt() {
                Some(next) => current = next,
                None => break,
            }
            if self.is_business_day(current) {
                count += 1;
            }
        }
        count * sign
    }

    /// First business day of the month containing `date` (ultimo + 1).
    pub fn first_business_day_of_month(&self, date: NaiveDate) -> Result<NaiveDate, CalendarError> {
        let first = date.with_day(1).ok_or(CalendarError::OutOfRange(date))?;
        self.roll_forward(first)
    }

    /// Last business day of the month containing `date` (ultimo).
    pub fn last_business_day_of_month(&self, date: NaiveDate) -> Result<NaiveDate, CalendarError> {
        let (year, month) = if date.month() == 12 {
            (date.year() + 1, 1)
        } else {
            (date.year(), date.month() + 1)
        };
        let last = NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|d| d.pred_opt())
            .ok_or(CalendarError::OutOfRange(date))?;
        if self.is_business_day(last) {
            Ok(last)
        } else {
            self.previous_business_day(last)
        }
    }

    /// Clearing date for a run executed on `as_of` under month-end rules.
    ///
    /// Runs up to and including the month's first business day still
    /// clear into the previous period at its ultimo. Runs after this
    /// month's ultimo clear at the ultimo. Otherwise the run date is used.
    pub fn period_clearing_date(&self, as_of: NaiveDate) -> Result<NaiveDate, CalendarError> {
        let ultimo_plus_one = self.first_business_day_of_month(as_of)?;
        let ultimo = self.last_business_day_of_month(as_of)?;

        if ultimo < as_of {
            Ok(ultimo)
        } else if as_of <= ultimo_plus_one {
            self.previous_business_day(ultimo_plus_one)
        } else {
            Ok(as_of)
        }
    }

    /// Exact holidays that fall on a recurring holiday's month and day.
    pub fn overlapping_holidays(&self) -> Vec<NaiveDate> {
        self.fixed
            .iter()
            .filter(|d| self.recurring.contains(&(d.month(), d.day())))
            .copied()
            .collect()
    }

    fn scan(&self, date: NaiveDate, forward: bool) -> Result<NaiveDate, CalendarError> {
        let mut current = date;
        loop {
            let next = if forward {
                current.succ_opt()
            } else {
                current.pred_opt()
            };
            current = next.ok_or(CalendarError::OutOfRange(date))?;
            if self.is_business_day(current) {
                return Ok(current);
            }
        }
    }
}
