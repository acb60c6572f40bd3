use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::dates;
use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};

/// late fee calculation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LateFeeCalculation {
    pub fee: Money,
    pub days_late: u32,
    pub fee_base: Money,
    pub rate_per_day: Rate,
}

impl LateFeeCalculation {
    pub fn is_late(&self) -> bool {
        self.days_late > 0
    }
}

/// preclosure fee calculation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreclosureFeeCalculation {
    pub fee: Money,
    pub remaining_principal: Money,
    pub rate: Rate,
}

/// fee rules; pure, no I/O
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeCalculator;

impl FeeCalculator {
    pub fn new() -> Self {
        Self
    }

    /// simple per-day penalty on the original amount due, never compounded
    ///
    /// fails with `Validation` when the fee is too large to represent.
    pub fn late_fee(
        &self,
        total_due: Money,
        rate_per_day: Rate,
        due_date: NaiveDate,
        payment_date: NaiveDate,
    ) -> Result<LateFeeCalculation> {
        let days = dates::days_between(due_date, payment_date);
        if days <= 0 {
            return Ok(LateFeeCalculation {
                fee: Money::ZERO,
                days_late: 0,
                fee_base: total_due,
                rate_per_day,
            });
        }

        let days_late = u32::try_from(days).unwrap_or(u32::MAX);
        let fee = total_due
            .as_decimal()
            .checked_mul(rate_per_day.as_fraction())
            .and_then(|daily| daily.checked_mul(Decimal::from(days_late)))
            .map(Money::from_decimal)
            .ok_or_else(|| {
                LoanError::validation(format!(
                    "late fee on {total_due} at {rate_per_day} per day for {days_late} days is out of range"
                ))
            })?;
        debug!(%total_due, days_late, %fee, "late fee assessed");

        Ok(LateFeeCalculation {
            fee,
            days_late,
            fee_base: total_due,
            rate_per_day,
        })
    }

    /// fee on the principal still scheduled when a loan is settled early
    pub fn preclosure_fee(&self, remaining_principal: Money, rate: Rate) -> Result<PreclosureFeeCalculation> {
        let fee = remaining_principal.checked_percentage(rate).ok_or_else(|| {
            LoanError::validation(format!("preclosure fee on {remaining_principal} at {rate} is out of range"))
        })?;
        debug!(%remaining_principal, %fee, "preclosure fee assessed");

        Ok(PreclosureFeeCalculation {
            fee,
            remaining_principal,
            rate,
        })
    }
}
