//! persisted records and the drafts/patches used to create and change them

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::dates;
use crate::decimal::{Money, Rate};
use crate::types::{
    ClientId, InstallmentId, InstallmentStatus, InterestType, LoanId, LoanNumber, LoanStatus,
    PaymentId, PaymentMethod, PaymentType, RepaymentFrequency, TermUnit,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// client details as entered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: Option<String>,
}

/// editable client fields; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<Option<String>>,
}

impl ClientPatch {
    pub fn apply(&self, client: &mut Client) {
        if let Some(name) = &self.name {
            client.name = name.clone();
        }
        if let Some(phone) = &self.phone {
            client.phone = phone.clone();
        }
        if let Some(email) = &self.email {
            client.email = email.clone();
        }
        if let Some(address) = &self.address {
            client.address = address.clone();
        }
    }
}

/// contractual terms of a loan; everything the schedule depends on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub principal_amount: Money,
    pub start_date: NaiveDate,
    pub interest_rate: Rate,
    pub interest_type: InterestType,
    pub term_length: u32,
    pub term_unit: TermUnit,
    pub repayment_frequency: RepaymentFrequency,
    pub late_fee_rate_per_day: Rate,
    pub preclosure_fee_rate: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub loan_number: LoanNumber,
    pub client_id: ClientId,
    pub terms: LoanTerms,
    pub end_date: NaiveDate,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }
}

/// loan ready to be inserted; the store checks loan number uniqueness
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoan {
    pub id: LoanId,
    pub loan_number: LoanNumber,
    pub client_id: ClientId,
    pub terms: LoanTerms,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl NewLoan {
    pub fn into_loan(self) -> Loan {
        Loan {
            id: self.id,
            loan_number: self.loan_number,
            client_id: self.client_id,
            terms: self.terms,
            end_date: self.end_date,
            status: LoanStatus::Active,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoanPatch {
    pub status: Option<LoanStatus>,
}

impl LoanPatch {
    pub fn status(status: LoanStatus) -> Self {
        Self {
            status: Some(status),
        }
    }

    pub fn apply(&self, loan: &mut Loan) {
        if let Some(status) = self.status {
            loan.status = status;
        }
    }
}

/// one scheduled repayment before it is attached to a loan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentDraft {
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub principal_portion: Money,
    pub interest_portion: Money,
    pub total_due: Money,
    pub remaining_amount: Money,
    pub status: InstallmentStatus,
}

impl InstallmentDraft {
    pub fn into_installment(self, id: InstallmentId, loan_id: LoanId, created_at: DateTime<Utc>) -> Installment {
        Installment {
            id,
            loan_id,
            installment_number: self.installment_number,
            due_date: self.due_date,
            principal_portion: self.principal_portion,
            interest_portion: self.interest_portion,
            total_due: self.total_due,
            status: self.status,
            remaining_amount: self.remaining_amount,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub loan_id: LoanId,
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub principal_portion: Money,
    pub interest_portion: Money,
    pub total_due: Money,
    pub status: InstallmentStatus,
    pub remaining_amount: Money,
    pub created_at: DateTime<Utc>,
}

impl Installment {
    pub fn is_paid(&self) -> bool {
        self.status == InstallmentStatus::Paid
    }

    /// status as seen on `today`: unpaid installments past their due date read as overdue
    pub fn effective_status(&self, today: NaiveDate) -> InstallmentStatus {
        if self.is_overdue(today) {
            InstallmentStatus::Overdue
        } else {
            self.status
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.is_paid() && (self.status == InstallmentStatus::Overdue || self.due_date < today)
    }

    pub fn is_due_within(&self, today: NaiveDate, days: u32) -> bool {
        !self.is_paid() && dates::within_days(self.due_date, today, days)
    }

    /// status implied by the remaining amount; the current status is kept when nothing was paid yet
    pub fn status_for_remaining(&self, remaining: Money) -> InstallmentStatus {
        if remaining <= Money::ZERO {
            InstallmentStatus::Paid
        } else if remaining < self.total_due {
            InstallmentStatus::Partial
        } else {
            self.status
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallmentPatch {
    pub remaining_amount: Option<Money>,
    pub status: Option<InstallmentStatus>,
}

impl InstallmentPatch {
    pub fn settled() -> Self {
        Self {
            remaining_amount: Some(Money::ZERO),
            status: Some(InstallmentStatus::Paid),
        }
    }

    pub fn apply(&self, installment: &mut Installment) {
        if let Some(remaining) = self.remaining_amount {
            installment.remaining_amount = remaining;
        }
        if let Some(status) = self.status {
            installment.status = status;
        }
    }
}

/// append-only ledger line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub loan_id: LoanId,
    pub installment_id: Option<InstallmentId>,
    pub amount: Money,
    pub payment_date: NaiveDate,
    pub payment_type: PaymentType,
    pub payment_method: PaymentMethod,
    pub late_fee: Money,
    pub preclosure_fee: Money,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
