//! date arithmetic used by schedules, fees and reports

use chrono::{Days, Months, NaiveDate};

use crate::errors::{LoanError, Result};
use crate::types::{RepaymentFrequency, TermUnit};

/// advance `date` by `n` repayment periods
///
/// months use calendar arithmetic, clamping to the last day of shorter months
pub fn add_periods(date: NaiveDate, frequency: RepaymentFrequency, n: u32) -> Result<NaiveDate> {
    let shifted = match frequency {
        RepaymentFrequency::Daily => date.checked_add_days(Days::new(n as u64)),
        RepaymentFrequency::Weekly => date.checked_add_days(Days::new(n as u64 * 7)),
        RepaymentFrequency::Monthly => date.checked_add_months(Months::new(n)),
    };
    shifted.ok_or_else(|| out_of_range(date, n))
}

/// advance `date` by a loan term
pub fn add_term(date: NaiveDate, unit: TermUnit, length: u32) -> Result<NaiveDate> {
    let shifted = match unit {
        TermUnit::Days => date.checked_add_days(Days::new(length as u64)),
        TermUnit::Weeks => date.checked_add_days(Days::new(length as u64 * 7)),
        TermUnit::Months => date.checked_add_months(Months::new(length)),
    };
    shifted.ok_or_else(|| out_of_range(date, length))
}

/// whole days from `from` to `to`, negative when `to` is earlier
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// `date` lies in the closed window `[start, start + days]`
pub fn within_days(date: NaiveDate, start: NaiveDate, days: u32) -> bool {
    match start.checked_add_days(Days::new(days as u64)) {
        Some(end) => date >= start && date <= end,
        None => date >= start,
    }
}

fn out_of_range(date: NaiveDate, n: u32) -> LoanError {
    LoanError::validation(format!("date {date} advanced by {n} periods is out of range"))
}
