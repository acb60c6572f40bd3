//! persistence seam for the servicing core
//!
//! `Repository` is the record-level contract (the same for every backend);
//! `Store` hands out repositories for reads and for atomic write units.

pub mod json_file;
pub mod memory;
pub mod tables;

use std::sync::RwLock;

use tracing::warn;

use crate::errors::{LoanError, Result};
use crate::model::{
    Client, ClientPatch, Installment, InstallmentPatch, Loan, LoanPatch, NewLoan, Payment,
};
use crate::types::{ClientId, InstallmentId, LoanId, PaymentId};

pub use json_file::JsonFileStore;
pub use memory::InMemoryStore;
pub use tables::Tables;

/// record-level operations shared by all backends
pub trait Repository {
    // clients
    fn get_client(&self, id: ClientId) -> Result<Option<Client>>;
    fn list_clients(&self) -> Result<Vec<Client>>;
    fn create_client(&mut self, client: Client) -> Result<Client>;
    fn update_client(&mut self, id: ClientId, patch: &ClientPatch) -> Result<Client>;

    // loans
    fn get_loan(&self, id: LoanId) -> Result<Option<Loan>>;
    /// all loans, oldest first
    fn list_loans(&self) -> Result<Vec<Loan>>;
    fn loans_for_client(&self, client_id: ClientId) -> Result<Vec<Loan>>;
    /// reserve the next loan number sequence value
    fn next_loan_sequence(&mut self) -> Result<u64>;
    fn create_loan(&mut self, loan: NewLoan) -> Result<Loan>;
    fn update_loan(&mut self, id: LoanId, patch: &LoanPatch) -> Result<Loan>;

    // installments
    /// a loan's installments in installment-number order
    fn get_installments(&self, loan_id: LoanId) -> Result<Vec<Installment>>;
    fn list_installments(&self) -> Result<Vec<Installment>>;
    fn get_installment(&self, id: InstallmentId) -> Result<Option<Installment>>;
    fn create_installment(&mut self, installment: Installment) -> Result<Installment>;
    fn update_installment(&mut self, id: InstallmentId, patch: &InstallmentPatch) -> Result<Installment>;

    // payments
    /// a loan's payments, newest payment date first
    fn get_payments(&self, loan_id: LoanId) -> Result<Vec<Payment>>;
    fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>>;
    fn create_payment(&mut self, payment: Payment) -> Result<Payment>;
}

/// a backend that can run reads and all-or-nothing write units
pub trait Store: Send + Sync {
    fn read<R>(&self, f: impl FnOnce(&dyn Repository) -> Result<R>) -> Result<R>;

    /// run `f` as one unit; nothing it wrote is visible unless it returns `Ok`
    /// and the backend commits. writers are serialised.
    fn transaction<R>(&self, f: impl FnOnce(&mut dyn Repository) -> Result<R>) -> Result<R>;
}

fn poisoned() -> LoanError {
    LoanError::persistence("store lock poisoned by a panicked writer")
}

pub(crate) fn read_tables<R>(
    lock: &RwLock<Tables>,
    f: impl FnOnce(&dyn Repository) -> Result<R>,
) -> Result<R> {
    let guard = lock.read().map_err(|_| poisoned())?;
    f(&*guard)
}

/// copy-on-write unit of work: `f` runs on a working copy which replaces the
/// live tables only after `commit` accepts it
pub(crate) fn run_transaction<R>(
    lock: &RwLock<Tables>,
    f: impl FnOnce(&mut dyn Repository) -> Result<R>,
    commit: impl FnOnce(&Tables) -> Result<()>,
) -> Result<R> {
    let mut guard = lock.write().map_err(|_| poisoned())?;
    let mut working = guard.clone();

    let outcome = f(&mut working).and_then(|value| commit(&working).map(|_| value));
    match outcome {
        Ok(value) => {
            *guard = working;
            Ok(value)
        }
        Err(err) => {
            warn!(error = %err, "transaction rolled back");
            Err(err)
        }
    }
}
