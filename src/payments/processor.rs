use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{LateFeePolicy, ServicingConfig};
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::events::{Event, EventStore};
use crate::fees::{FeeCalculator, LateFeeCalculation, PreclosureFeeCalculation};
use crate::model::{Installment, InstallmentPatch, Loan, LoanPatch, Payment};
use crate::store::Repository;
use crate::types::{InstallmentStatus, LoanStatus, PaymentType};

use super::PaymentRequest;

/// result of applying one payment
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub loan: Loan,
    /// installments changed by this payment, after the change
    pub installments: Vec<Installment>,
    pub late_fee: Option<LateFeeCalculation>,
    pub preclosure: Option<PreclosureFeeCalculation>,
}

/// applies payments to loans and their installments
#[derive(Debug, Clone)]
pub struct PaymentProcessor {
    fees: FeeCalculator,
    late_fee_policy: LateFeePolicy,
    allow_closed_loans: bool,
}

impl PaymentProcessor {
    pub fn new(config: &ServicingConfig) -> Self {
        Self {
            fees: FeeCalculator::new(),
            late_fee_policy: config.late_fee_policy,
            allow_closed_loans: config.allow_payments_on_closed_loans,
        }
    }

    /// apply a payment inside an open unit of work
    ///
    /// every check runs before the first write, so a rejected request leaves
    /// `repo` untouched; the caller owns commit or rollback of the writes.
    pub fn apply(
        &self,
        repo: &mut dyn Repository,
        request: PaymentRequest,
        recorded_at: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<PaymentOutcome> {
        request.validate()?;

        let loan = repo
            .get_loan(request.loan_id)?
            .ok_or_else(|| LoanError::not_found("loan", request.loan_id))?;
        if !loan.is_active() && !self.allow_closed_loans {
            return Err(LoanError::validation(format!(
                "loan {} is {} and no longer accepts payments",
                loan.loan_number, loan.status
            )));
        }

        let target = match request.installment_id {
            Some(id) => {
                let installment = repo
                    .get_installment(id)?
                    .ok_or_else(|| LoanError::not_found("installment", id))?;
                if installment.loan_id != loan.id {
                    return Err(LoanError::invalid_reference(format!(
                        "installment {} does not belong to loan {}",
                        id, loan.loan_number
                    )));
                }
                Some(installment)
            }
            None => None,
        };

        let late_fee = match (&target, request.payment_type) {
            (Some(installment), PaymentType::Regular) => Some(self.fees.late_fee(
                installment.total_due,
                loan.terms.late_fee_rate_per_day,
                installment.due_date,
                request.payment_date,
            )?),
            _ => None,
        };

        let preclosure = if request.is_preclosure() {
            let remaining_principal: Money = repo
                .get_installments(loan.id)?
                .iter()
                .filter(|i| !i.is_paid())
                .map(|i| i.principal_portion)
                .sum();
            Some(self.fees.preclosure_fee(remaining_principal, loan.terms.preclosure_fee_rate)?)
        } else {
            None
        };

        let payment = repo.create_payment(Payment {
            id: Uuid::new_v4(),
            loan_id: loan.id,
            installment_id: request.installment_id,
            amount: request.amount,
            payment_date: request.payment_date,
            payment_type: request.payment_type,
            payment_method: request.payment_method,
            late_fee: late_fee.as_ref().map_or(Money::ZERO, |c| c.fee),
            preclosure_fee: preclosure.as_ref().map_or(Money::ZERO, |c| c.fee),
            notes: request.notes,
            created_at: recorded_at,
        })?;
        events.emit(Event::PaymentRecorded {
            loan_id: loan.id,
            payment_id: payment.id,
            installment_id: payment.installment_id,
            payment_type: payment.payment_type,
            amount: payment.amount,
            payment_date: payment.payment_date,
        });

        let mut touched = Vec::new();

        if let Some(installment) = target {
            if let Some(calc) = late_fee.as_ref().filter(|c| !c.fee.is_zero()) {
                events.emit(Event::LateFeeAssessed {
                    loan_id: loan.id,
                    installment_id: installment.id,
                    fee_amount: calc.fee,
                    days_late: calc.days_late,
                });
            }

            let applied = self.amount_applied_to_installment(&payment);
            let remaining = installment.remaining_amount - applied;
            let status = installment.status_for_remaining(remaining);
            let updated = repo.update_installment(
                installment.id,
                &InstallmentPatch {
                    remaining_amount: Some(remaining),
                    status: Some(status),
                },
            )?;
            debug!(
                installment = updated.installment_number,
                %applied,
                remaining = %updated.remaining_amount,
                status = %updated.status,
                "installment updated"
            );

            if status == InstallmentStatus::Paid && installment.status != InstallmentStatus::Paid {
                events.emit(Event::InstallmentSettled {
                    loan_id: loan.id,
                    installment_id: updated.id,
                    installment_number: updated.installment_number,
                });
            }
            touched.push(updated);
        }

        let loan = match &preclosure {
            Some(calc) => {
                let mut closed = 0u32;
                for open in repo.get_installments(loan.id)?.into_iter().filter(|i| !i.is_paid()) {
                    let settled = repo.update_installment(open.id, &InstallmentPatch::settled())?;
                    touched.retain(|i: &Installment| i.id != settled.id);
                    touched.push(settled);
                    closed += 1;
                }

                let old_status = loan.status;
                let loan = repo.update_loan(loan.id, &LoanPatch::status(LoanStatus::Completed))?;
                events.emit(Event::PreclosureSettled {
                    loan_id: loan.id,
                    remaining_principal: calc.remaining_principal,
                    preclosure_fee: calc.fee,
                    installments_closed: closed,
                });
                if old_status != LoanStatus::Completed {
                    events.emit(Event::StatusChanged {
                        loan_id: loan.id,
                        old_status,
                        new_status: LoanStatus::Completed,
                        reason: "preclosure settlement".to_string(),
                        timestamp: recorded_at,
                    });
                }
                info!(
                    loan_number = %loan.loan_number,
                    remaining_principal = %calc.remaining_principal,
                    fee = %calc.fee,
                    installments_closed = closed,
                    "loan preclosed"
                );
                loan
            }
            None => loan,
        };

        touched.sort_by_key(|i| i.installment_number);
        info!(
            loan_number = %loan.loan_number,
            payment_id = %payment.id,
            amount = %payment.amount,
            late_fee = %payment.late_fee,
            preclosure_fee = %payment.preclosure_fee,
            "payment applied"
        );

        Ok(PaymentOutcome {
            payment,
            loan,
            installments: touched,
            late_fee,
            preclosure,
        })
    }

    /// portion of a payment that reduces the installment balance
    fn amount_applied_to_installment(&self, payment: &Payment) -> Money {
        match self.late_fee_policy {
            LateFeePolicy::Informational => payment.amount,
            LateFeePolicy::CollectFromPayment => (payment.amount - payment.late_fee).max(Money::ZERO),
        }
    }
}
