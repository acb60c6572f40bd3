use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::dates;
use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::model::{InstallmentDraft, LoanTerms};
use crate::types::{InstallmentStatus, InterestType, RepaymentFrequency, TermUnit};

/// largest schedule a single loan may carry (about 27 years of daily installments)
pub const MAX_INSTALLMENTS: u32 = 10_000;

/// number of installments for a term and frequency
///
/// the term is sized with 30-day months while due dates use calendar months,
/// so a 12-month monthly loan has 12 installments but a 31-day daily loan
/// does not line up with a 1-month term.
pub fn total_installments(
    term_length: u32,
    term_unit: TermUnit,
    frequency: RepaymentFrequency,
) -> Result<u32> {
    let total_days = term_unit.approx_days(term_length);
    let count = match frequency {
        RepaymentFrequency::Daily => total_days,
        _ => total_days.div_ceil(frequency.approx_period_days()),
    };

    if count == 0 {
        return Err(LoanError::validation("loan term must produce at least one installment"));
    }
    if count > u64::from(MAX_INSTALLMENTS) {
        return Err(LoanError::validation(format!(
            "{count} installments exceeds the maximum of {MAX_INSTALLMENTS}"
        )));
    }
    Ok(count as u32)
}

/// builds installment schedules from loan terms
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleGenerator;

impl ScheduleGenerator {
    pub fn new() -> Self {
        Self
    }

    /// generate the ordered installment drafts for a loan
    pub fn generate(&self, terms: &LoanTerms) -> Result<Vec<InstallmentDraft>> {
        let count = total_installments(terms.term_length, terms.term_unit, terms.repayment_frequency)?;
        let principal = terms.principal_amount.as_decimal();
        let principal_share = principal / Decimal::from(count);

        let mut drafts = Vec::with_capacity(count as usize);
        let mut remaining_principal = principal;

        for i in 1..=count {
            let due_date = dates::add_periods(terms.start_date, terms.repayment_frequency, i)?;
            let interest = match terms.interest_type {
                InterestType::Flat => flat_interest(principal, terms.interest_rate, count),
                InterestType::Reducing => {
                    reducing_interest(remaining_principal, terms.interest_rate, terms.repayment_frequency)
                }
            }
            .ok_or_else(|| interest_out_of_range(terms))?;

            let row = draft(i, due_date, principal_share, interest).ok_or_else(|| interest_out_of_range(terms))?;
            drafts.push(row);
            remaining_principal -= principal_share;
        }

        debug!(
            installments = count,
            interest_type = %terms.interest_type,
            frequency = %terms.repayment_frequency,
            "generated repayment schedule"
        );

        Ok(drafts)
    }
}

/// flat: interest on the original principal spread over every installment
fn flat_interest(principal: Decimal, rate: Rate, count: u32) -> Option<Decimal> {
    Some(principal.checked_mul(rate.as_fraction())? / Decimal::from(count))
}

/// reducing: annual rate on the opening balance, sliced to a month, then to a week or day
fn reducing_interest(balance: Decimal, rate: Rate, frequency: RepaymentFrequency) -> Option<Decimal> {
    let monthly = balance.checked_mul(rate.as_fraction())? / dec!(12);
    Some(match frequency {
        RepaymentFrequency::Daily => monthly / dec!(30),
        RepaymentFrequency::Weekly => monthly / dec!(4),
        RepaymentFrequency::Monthly => monthly,
    })
}

fn interest_out_of_range(terms: &LoanTerms) -> LoanError {
    LoanError::validation(format!(
        "interest on {} at {} is out of range",
        terms.principal_amount, terms.interest_rate
    ))
}

fn draft(number: u32, due_date: NaiveDate, principal: Decimal, interest: Decimal) -> Option<InstallmentDraft> {
    let principal_portion = Money::from_decimal(principal);
    let interest_portion = Money::from_decimal(interest);
    let total_due = principal_portion.checked_add(interest_portion)?;

    Some(InstallmentDraft {
        installment_number: number,
        due_date,
        principal_portion,
        interest_portion,
        total_due,
        remaining_amount: total_due,
        status: InstallmentStatus::Pending,
    })
}

/// full schedule with totals, for previews and statements
#[derive(Debug, Clone, PartialEq)]
pub struct AmortizationSchedule {
    pub installments: Vec<InstallmentDraft>,
    pub total_principal: Money,
    pub total_interest: Money,
    pub total_payable: Money,
}

impl AmortizationSchedule {
    pub fn generate(terms: &LoanTerms) -> Result<Self> {
        let installments = ScheduleGenerator::new().generate(terms)?;

        let total = |portion: fn(&InstallmentDraft) -> Money| {
            installments
                .iter()
                .try_fold(Money::ZERO, |acc, i| acc.checked_add(portion(i)))
                .ok_or_else(|| interest_out_of_range(terms))
        };
        let total_principal = total(|i| i.principal_portion)?;
        let total_interest = total(|i| i.interest_portion)?;
        let total_payable = total(|i| i.total_due)?;

        Ok(Self {
            installments,
            total_principal,
            total_interest,
            total_payable,
        })
    }

    /// get installment by its 1-based number
    pub fn get(&self, installment_number: u32) -> Option<&InstallmentDraft> {
        installment_number
            .checked_sub(1)
            .and_then(|idx| self.installments.get(idx as usize))
    }

    pub fn len(&self) -> usize {
        self.installments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installments.is_empty()
    }
}
