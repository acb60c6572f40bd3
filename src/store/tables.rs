use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{LoanError, Result};
use crate::model::{
    Client, ClientPatch, Installment, InstallmentPatch, Loan, LoanPatch, NewLoan, Payment,
};
use crate::types::{ClientId, InstallmentId, LoanId, PaymentId};

use super::Repository;

/// the full record set, with the integrity rules a relational schema would enforce
#[derive(Debug, Clone, Default)]
pub struct Tables {
    clients: BTreeMap<ClientId, Client>,
    loans: BTreeMap<LoanId, Loan>,
    installments: BTreeMap<InstallmentId, Installment>,
    payments: BTreeMap<PaymentId, Payment>,
    loan_sequence: u64,
}

/// on-disk layout
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TablesSnapshot {
    pub loan_sequence: u64,
    pub clients: Vec<Client>,
    pub loans: Vec<Loan>,
    pub installments: Vec<Installment>,
    pub payments: Vec<Payment>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_snapshot(&self) -> TablesSnapshot {
        TablesSnapshot {
            loan_sequence: self.loan_sequence,
            clients: self.clients.values().cloned().collect(),
            loans: self.loans.values().cloned().collect(),
            installments: self.installments.values().cloned().collect(),
            payments: self.payments.values().cloned().collect(),
        }
    }

    /// rebuild from a snapshot, re-checking every integrity rule
    pub fn from_snapshot(snapshot: TablesSnapshot) -> Result<Self> {
        let mut tables = Tables::new();
        for client in snapshot.clients {
            tables.create_client(client)?;
        }
        for loan in snapshot.loans {
            let status = loan.status;
            let id = loan.id;
            tables.create_loan(NewLoan {
                id: loan.id,
                loan_number: loan.loan_number,
                client_id: loan.client_id,
                terms: loan.terms,
                end_date: loan.end_date,
                created_at: loan.created_at,
            })?;
            tables.update_loan(id, &LoanPatch::status(status))?;
        }
        for installment in snapshot.installments {
            tables.create_installment(installment)?;
        }
        for payment in snapshot.payments {
            tables.create_payment(payment)?;
        }
        tables.loan_sequence = snapshot.loan_sequence.max(tables.loans.len() as u64);
        Ok(tables)
    }

    fn require_loan(&self, id: LoanId) -> Result<&Loan> {
        self.loans.get(&id).ok_or_else(|| LoanError::not_found("loan", id))
    }
}

impl Repository for Tables {
    fn get_client(&self, id: ClientId) -> Result<Option<Client>> {
        Ok(self.clients.get(&id).cloned())
    }

    fn list_clients(&self) -> Result<Vec<Client>> {
        let mut clients: Vec<Client> = self.clients.values().cloned().collect();
        clients.sort_by_key(|c| c.created_at);
        Ok(clients)
    }

    fn create_client(&mut self, client: Client) -> Result<Client> {
        if self.clients.contains_key(&client.id) {
            return Err(LoanError::persistence(format!("duplicate client id {}", client.id)));
        }
        self.clients.insert(client.id, client.clone());
        Ok(client)
    }

    fn update_client(&mut self, id: ClientId, patch: &ClientPatch) -> Result<Client> {
        let client = self
            .clients
            .get_mut(&id)
            .ok_or_else(|| LoanError::not_found("client", id))?;
        patch.apply(client);
        Ok(client.clone())
    }

    fn get_loan(&self, id: LoanId) -> Result<Option<Loan>> {
        Ok(self.loans.get(&id).cloned())
    }

    fn list_loans(&self) -> Result<Vec<Loan>> {
        let mut loans: Vec<Loan> = self.loans.values().cloned().collect();
        loans.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.loan_number.cmp(&b.loan_number)));
        Ok(loans)
    }

    fn loans_for_client(&self, client_id: ClientId) -> Result<Vec<Loan>> {
        Ok(self
            .list_loans()?
            .into_iter()
            .filter(|loan| loan.client_id == client_id)
            .collect())
    }

    fn next_loan_sequence(&mut self) -> Result<u64> {
        self.loan_sequence += 1;
        Ok(self.loan_sequence)
    }

    fn create_loan(&mut self, loan: NewLoan) -> Result<Loan> {
        if !self.clients.contains_key(&loan.client_id) {
            return Err(LoanError::not_found("client", loan.client_id));
        }
        if self.loans.contains_key(&loan.id) {
            return Err(LoanError::persistence(format!("duplicate loan id {}", loan.id)));
        }
        if self.loans.values().any(|l| l.loan_number == loan.loan_number) {
            return Err(LoanError::persistence(format!(
                "loan number {} already exists",
                loan.loan_number
            )));
        }
        let loan = loan.into_loan();
        self.loans.insert(loan.id, loan.clone());
        Ok(loan)
    }

    fn update_loan(&mut self, id: LoanId, patch: &LoanPatch) -> Result<Loan> {
        let loan = self.loans.get_mut(&id).ok_or_else(|| LoanError::not_found("loan", id))?;
        patch.apply(loan);
        Ok(loan.clone())
    }

    fn get_installments(&self, loan_id: LoanId) -> Result<Vec<Installment>> {
        let mut installments: Vec<Installment> = self
            .installments
            .values()
            .filter(|i| i.loan_id == loan_id)
            .cloned()
            .collect();
        installments.sort_by_key(|i| i.installment_number);
        Ok(installments)
    }

    fn list_installments(&self) -> Result<Vec<Installment>> {
        let mut installments: Vec<Installment> = self.installments.values().cloned().collect();
        installments.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.installment_number.cmp(&b.installment_number)));
        Ok(installments)
    }

    fn get_installment(&self, id: InstallmentId) -> Result<Option<Installment>> {
        Ok(self.installments.get(&id).cloned())
    }

    fn create_installment(&mut self, installment: Installment) -> Result<Installment> {
        self.require_loan(installment.loan_id)?;
        if self.installments.contains_key(&installment.id) {
            return Err(LoanError::persistence(format!("duplicate installment id {}", installment.id)));
        }
        let clash = self.installments.values().any(|i| {
            i.loan_id == installment.loan_id && i.installment_number == installment.installment_number
        });
        if clash {
            return Err(LoanError::persistence(format!(
                "installment {} already exists for loan {}",
                installment.installment_number, installment.loan_id
            )));
        }
        self.installments.insert(installment.id, installment.clone());
        Ok(installment)
    }

    fn update_installment(&mut self, id: InstallmentId, patch: &InstallmentPatch) -> Result<Installment> {
        let installment = self
            .installments
            .get_mut(&id)
            .ok_or_else(|| LoanError::not_found("installment", id))?;
        patch.apply(installment);
        Ok(installment.clone())
    }

    fn get_payments(&self, loan_id: LoanId) -> Result<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .payments
            .values()
            .filter(|p| p.loan_id == loan_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| {
            b.payment_date
                .cmp(&a.payment_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(payments)
    }

    fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.payments.get(&id).cloned())
    }

    fn create_payment(&mut self, payment: Payment) -> Result<Payment> {
        self.require_loan(payment.loan_id)?;
        if let Some(installment_id) = payment.installment_id {
            if !self.installments.contains_key(&installment_id) {
                return Err(LoanError::not_found("installment", installment_id));
            }
        }
        if self.payments.contains_key(&payment.id) {
            return Err(LoanError::persistence(format!("duplicate payment id {}", payment.id)));
        }
        self.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::{Money, Rate};
    use crate::model::LoanTerms;
    use crate::types::{
        InterestType, LoanNumber, LoanStatus, PaymentMethod, PaymentType, RepaymentFrequency, TermUnit,
    };
    use chrono::{Duration, NaiveDate, Utc};
    use uuid::Uuid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn client() -> Client {
        Client {
            id: Uuid::new_v4(),
            name: "Sita".to_string(),
            phone: "555-0142".to_string(),
            email: "sita@example.com".to_string(),
            address: None,
            created_at: Utc::now(),
        }
    }

    fn new_loan(client_id: ClientId, sequence: u64) -> NewLoan {
        NewLoan {
            id: Uuid::new_v4(),
            loan_number: LoanNumber::new("L", 2024, sequence, 4),
            client_id,
            terms: LoanTerms {
                principal_amount: Money::from_major(2_000),
                start_date: d(2024, 1, 1),
                interest_rate: Rate::from_percentage(10),
                interest_type: InterestType::Flat,
                term_length: 2,
                term_unit: TermUnit::Months,
                repayment_frequency: RepaymentFrequency::Monthly,
                late_fee_rate_per_day: Rate::from_percentage(1),
                preclosure_fee_rate: Rate::from_percentage(2),
            },
            end_date: d(2024, 3, 1),
            created_at: Utc::now(),
        }
    }

    fn installment(loan_id: LoanId, number: u32) -> Installment {
        Installment {
            id: Uuid::new_v4(),
            loan_id,
            installment_number: number,
            due_date: d(2024, 1 + number, 1),
            principal_portion: Money::from_major(1_000),
            interest_portion: Money::from_major(100),
            total_due: Money::from_major(1_100),
            remaining_amount: Money::from_major(1_100),
            status: crate::types::InstallmentStatus::Pending,
            created_at: Utc::now(),
        }
    }

    fn payment(loan_id: LoanId, paid_on: NaiveDate, age_minutes: i64) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            loan_id,
            installment_id: None,
            amount: Money::from_major(100),
            payment_date: paid_on,
            payment_type: PaymentType::Regular,
            payment_method: PaymentMethod::Cash,
            late_fee: Money::ZERO,
            preclosure_fee: Money::ZERO,
            notes: None,
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    fn seeded() -> (Tables, Loan) {
        let mut tables = Tables::new();
        let owner = tables.create_client(client()).unwrap();
        let loan = tables.create_loan(new_loan(owner.id, 1)).unwrap();
        (tables, loan)
    }

    #[test]
    fn test_duplicate_loan_number_is_a_persistence_failure() {
        let (mut tables, loan) = seeded();

        let err = tables.create_loan(new_loan(loan.client_id, 1)).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(tables.list_loans().unwrap().len(), 1);
    }

    #[test]
    fn test_loan_needs_existing_client() {
        let mut tables = Tables::new();
        let err = tables.create_loan(new_loan(Uuid::new_v4(), 1)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_installment_numbers_are_unique_per_loan() {
        let (mut tables, loan) = seeded();
        tables.create_installment(installment(loan.id, 1)).unwrap();

        let err = tables.create_installment(installment(loan.id, 1)).unwrap_err();
        assert!(err.is_retryable());

        // the same number on another loan is fine
        let other = tables.create_loan(new_loan(loan.client_id, 2)).unwrap();
        tables.create_installment(installment(other.id, 1)).unwrap();
        assert_eq!(tables.get_installments(loan.id).unwrap().len(), 1);
    }

    #[test]
    fn test_records_must_reference_a_known_loan() {
        let (mut tables, loan) = seeded();

        assert!(tables.create_installment(installment(Uuid::new_v4(), 1)).unwrap_err().is_not_found());
        assert!(tables.create_payment(payment(Uuid::new_v4(), d(2024, 2, 1), 0)).unwrap_err().is_not_found());

        let mut stray = payment(loan.id, d(2024, 2, 1), 0);
        stray.installment_id = Some(Uuid::new_v4());
        assert!(tables.create_payment(stray).unwrap_err().is_not_found());
        assert!(tables.get_payments(loan.id).unwrap().is_empty());
    }

    #[test]
    fn test_payments_come_back_newest_first() {
        let (mut tables, loan) = seeded();
        let older = tables.create_payment(payment(loan.id, d(2024, 2, 1), 0)).unwrap();
        let newer = tables.create_payment(payment(loan.id, d(2024, 3, 1), 10)).unwrap();
        // same payment date, recorded later
        let later_same_day = tables.create_payment(payment(loan.id, d(2024, 3, 1), 0)).unwrap();

        let ids: Vec<_> = tables.get_payments(loan.id).unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![later_same_day.id, newer.id, older.id]);
    }

    #[test]
    fn test_snapshot_restores_sequence_and_status() {
        let (mut tables, loan) = seeded();
        tables.next_loan_sequence().unwrap();
        tables.create_installment(installment(loan.id, 1)).unwrap();
        tables.update_loan(loan.id, &LoanPatch::status(LoanStatus::Defaulted)).unwrap();

        let mut snapshot = tables.to_snapshot();
        snapshot.loan_sequence = 7;
        let mut restored = Tables::from_snapshot(snapshot).unwrap();
        assert_eq!(restored.get_loan(loan.id).unwrap().unwrap().status, LoanStatus::Defaulted);
        assert_eq!(restored.get_installments(loan.id).unwrap().len(), 1);
        assert_eq!(restored.next_loan_sequence().unwrap(), 8);

        // a sequence behind the stored loans is raised to the loan count
        let mut snapshot = tables.to_snapshot();
        snapshot.loan_sequence = 0;
        let mut restored = Tables::from_snapshot(snapshot).unwrap();
        assert_eq!(restored.next_loan_sequence().unwrap(), 2);
    }

    #[test]
    fn test_snapshot_is_revalidated() {
        let (tables, loan) = seeded();

        let mut orphaned = tables.to_snapshot();
        orphaned.installments.push(installment(Uuid::new_v4(), 1));
        assert!(Tables::from_snapshot(orphaned).unwrap_err().is_not_found());

        let mut doubled = tables.to_snapshot();
        doubled.installments.push(installment(loan.id, 1));
        doubled.installments.push(installment(loan.id, 1));
        assert!(Tables::from_snapshot(doubled).unwrap_err().is_retryable());
    }
}
