pub mod processor;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::types::{InstallmentId, LoanId, PaymentMethod, PaymentType};

pub use processor::{PaymentOutcome, PaymentProcessor};

/// payment request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub loan_id: LoanId,
    pub installment_id: Option<InstallmentId>,
    pub amount: Money,
    pub payment_date: NaiveDate,
    pub payment_type: PaymentType,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

impl PaymentRequest {
    /// regular payment against one installment
    pub fn installment(
        loan_id: LoanId,
        installment_id: InstallmentId,
        amount: Money,
        payment_date: NaiveDate,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            loan_id,
            installment_id: Some(installment_id),
            amount,
            payment_date,
            payment_type: PaymentType::Regular,
            payment_method,
            notes: None,
        }
    }

    /// settlement of everything still open on the loan
    pub fn preclosure(
        loan_id: LoanId,
        amount: Money,
        payment_date: NaiveDate,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            loan_id,
            installment_id: None,
            amount,
            payment_date,
            payment_type: PaymentType::Preclosure,
            payment_method,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn is_preclosure(&self) -> bool {
        self.payment_type == PaymentType::Preclosure
    }

    /// checks that need no store access
    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_positive() {
            return Err(LoanError::validation(format!(
                "payment amount must be greater than zero, got {}",
                self.amount
            )));
        }
        if let Some(notes) = &self.notes {
            if notes.len() > 1_000 {
                return Err(LoanError::validation("payment notes exceed 1000 characters"));
            }
        }
        Ok(())
    }
}
