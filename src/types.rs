use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{LoanError, Result};

/// unique identifier for a client
pub type ClientId = Uuid;
/// unique identifier for a loan
pub type LoanId = Uuid;
/// unique identifier for an installment
pub type InstallmentId = Uuid;
/// unique identifier for a payment
pub type PaymentId = Uuid;

/// how interest is spread across installments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestType {
    /// computed once on the original principal, spread evenly
    Flat,
    /// recomputed each period on the declining principal
    Reducing,
}

/// unit the loan term is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermUnit {
    Days,
    Weeks,
    Months,
}

impl TermUnit {
    /// approximate day count used when sizing a schedule (30-day months)
    pub fn approx_days(&self, length: u32) -> u64 {
        let length = length as u64;
        match self {
            TermUnit::Days => length,
            TermUnit::Weeks => length * 7,
            TermUnit::Months => length * 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl RepaymentFrequency {
    /// approximate period length in days used when sizing a schedule
    pub fn approx_period_days(&self) -> u64 {
        match self {
            RepaymentFrequency::Daily => 1,
            RepaymentFrequency::Weekly => 7,
            RepaymentFrequency::Monthly => 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    /// settled in full (preclosure)
    Completed,
    /// written off manually
    Defaulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Regular,
    /// early full settlement of the loan
    Preclosure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Upi,
    Cheque,
}

macro_rules! string_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = LoanError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    other => Err(LoanError::unsupported($kind, other)),
                }
            }
        }
    };
}

string_enum!(InterestType, "interest type", { Flat => "flat", Reducing => "reducing" });
string_enum!(TermUnit, "term unit", { Days => "days", Weeks => "weeks", Months => "months" });
string_enum!(RepaymentFrequency, "repayment frequency", {
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
});
string_enum!(LoanStatus, "loan status", {
    Active => "active",
    Completed => "completed",
    Defaulted => "defaulted",
});
string_enum!(InstallmentStatus, "installment status", {
    Pending => "pending",
    Partial => "partial",
    Paid => "paid",
    Overdue => "overdue",
});
string_enum!(PaymentType, "payment type", { Regular => "regular", Preclosure => "preclosure" });
string_enum!(PaymentMethod, "payment method", {
    Cash => "cash",
    BankTransfer => "bank_transfer",
    Upi => "upi",
    Cheque => "cheque",
});

/// human-facing loan reference, `L-<year>-<sequence>`
///
/// ordered by prefix and year, then numerically by sequence, so
/// `L-2024-9999` sorts before `L-2024-10000`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanNumber(String);

impl LoanNumber {
    pub fn new(prefix: &str, year: i32, sequence: u64, min_digits: usize) -> Self {
        LoanNumber(format!("{prefix}-{year}-{sequence:0min_digits$}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// (prefix and year, sequence width, sequence digits)
    fn sort_key(&self) -> (&str, usize, &str) {
        match self.0.rsplit_once('-') {
            Some((head, seq)) => (head, seq.len(), seq),
            None => (self.0.as_str(), 0, ""),
        }
    }
}

impl Ord for LoanNumber {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for LoanNumber {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LoanNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LoanNumber {
    type Err = LoanError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, '-');
        let (prefix, year, seq) = match (parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(y), Some(n)) => (p, y, n),
            _ => return Err(LoanError::validation(format!("malformed loan number: {s}"))),
        };
        let well_formed = !prefix.is_empty()
            && year.len() == 4
            && year.chars().all(|c| c.is_ascii_digit())
            && seq.len() >= 4
            && seq.chars().all(|c| c.is_ascii_digit());
        if !well_formed {
            return Err(LoanError::validation(format!("malformed loan number: {s}")));
        }
        Ok(LoanNumber(s.to_string()))
    }
}
