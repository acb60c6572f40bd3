use std::sync::{Mutex, PoisonError};

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::ServicingConfig;
use crate::dates;
use crate::errors::{LoanError, Result};
use crate::events::{Event, EventStore};
use crate::model::{Client, ClientPatch, Installment, Loan, LoanPatch, LoanTerms, NewClient, NewLoan, Payment};
use crate::payments::{PaymentOutcome, PaymentProcessor, PaymentRequest};
use crate::reports::{Dashboard, ReportAggregator};
use crate::schedule::{total_installments, AmortizationSchedule, ScheduleGenerator};
use crate::store::Store;
use crate::types::{ClientId, LoanId, LoanNumber, LoanStatus, PaymentId};

/// request to open a loan for an existing client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub client_id: ClientId,
    pub terms: LoanTerms,
}

/// largest principal accepted for a single loan
pub const MAX_PRINCIPAL: Decimal = dec!(1000000000000000);

impl LoanApplication {
    /// check the terms and return the loan's end date
    pub fn validate(&self) -> Result<NaiveDate> {
        validate_terms(&self.terms)
    }
}

fn validate_terms(terms: &LoanTerms) -> Result<NaiveDate> {
    if !terms.principal_amount.is_positive() {
        return Err(LoanError::validation("principal amount must be greater than zero"));
    }
    if terms.principal_amount.as_decimal() > MAX_PRINCIPAL {
        return Err(LoanError::validation(format!(
            "principal amount {} exceeds the maximum of {MAX_PRINCIPAL}",
            terms.principal_amount
        )));
    }
    if terms.term_length == 0 {
        return Err(LoanError::validation("term length must be at least 1"));
    }
    if terms.interest_rate.is_negative() {
        return Err(LoanError::validation("interest rate cannot be negative"));
    }
    if terms.late_fee_rate_per_day.is_negative() {
        return Err(LoanError::validation("late fee rate cannot be negative"));
    }
    if terms.preclosure_fee_rate.is_negative() {
        return Err(LoanError::validation("preclosure fee rate cannot be negative"));
    }
    total_installments(terms.term_length, terms.term_unit, terms.repayment_frequency)?;
    dates::add_term(terms.start_date, terms.term_unit, terms.term_length)
}

/// a newly originated loan with its schedule as stored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanBooking {
    pub loan: Loan,
    pub installments: Vec<Installment>,
}

/// entry point for servicing: clients, origination, payments and reports
/// over one store
pub struct LoanServicer<S: Store, C: Clock> {
    store: S,
    clock: C,
    config: ServicingConfig,
    schedule: ScheduleGenerator,
    processor: PaymentProcessor,
    events: Mutex<EventStore>,
}

impl<S: Store, C: Clock> LoanServicer<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        let config = ServicingConfig::default();
        Self {
            processor: PaymentProcessor::new(&config),
            store,
            clock,
            config,
            schedule: ScheduleGenerator::new(),
            events: Mutex::new(EventStore::new()),
        }
    }

    pub fn with_config(store: S, clock: C, config: ServicingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            processor: PaymentProcessor::new(&config),
            store,
            clock,
            config,
            schedule: ScheduleGenerator::new(),
            events: Mutex::new(EventStore::new()),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ServicingConfig {
        &self.config
    }

    // clients

    #[instrument(skip(self, client), fields(name = %client.name))]
    pub fn create_client(&self, client: NewClient) -> Result<Client> {
        validate_name(&client.name)?;
        validate_phone(&client.phone)?;
        validate_email(&client.email)?;

        let now = self.clock.now();
        let created = self.store.transaction(|repo| {
            repo.create_client(Client {
                id: Uuid::new_v4(),
                name: client.name.trim().to_string(),
                phone: client.phone.trim().to_string(),
                email: client.email.trim().to_string(),
                address: client.address,
                created_at: now,
            })
        })?;

        self.publish([Event::ClientRegistered {
            client_id: created.id,
            timestamp: now,
        }]);
        info!(client_id = %created.id, "client registered");
        Ok(created)
    }

    #[instrument(skip(self, patch), fields(client_id = %id))]
    pub fn update_client(&self, id: ClientId, patch: ClientPatch) -> Result<Client> {
        if let Some(name) = &patch.name {
            validate_name(name)?;
        }
        if let Some(phone) = &patch.phone {
            validate_phone(phone)?;
        }
        if let Some(email) = &patch.email {
            validate_email(email)?;
        }

        let updated = self.store.transaction(|repo| repo.update_client(id, &patch))?;
        self.publish([Event::ClientUpdated {
            client_id: id,
            timestamp: self.clock.now(),
        }]);
        Ok(updated)
    }

    pub fn get_client(&self, id: ClientId) -> Result<Client> {
        self.store
            .read(|repo| repo.get_client(id))?
            .ok_or_else(|| LoanError::not_found("client", id))
    }

    pub fn list_clients(&self) -> Result<Vec<Client>> {
        self.store.read(|repo| repo.list_clients())
    }

    // loans

    /// schedule preview for a set of terms, nothing is stored
    pub fn preview_schedule(&self, terms: &LoanTerms) -> Result<AmortizationSchedule> {
        validate_terms(terms)?;
        AmortizationSchedule::generate(terms)
    }

    /// create the loan and its full schedule in one unit
    #[instrument(skip(self, application), fields(client_id = %application.client_id))]
    pub fn originate_loan(&self, application: LoanApplication) -> Result<LoanBooking> {
        let end_date = application.validate()?;
        let LoanApplication { client_id, terms } = application;

        let drafts = self.schedule.generate(&terms)?;
        let now = self.clock.now();
        let prefix = &self.config.loan_number_prefix;
        let min_digits = self.config.loan_number_min_digits;

        let booking = self.store.transaction(|repo| {
            if repo.get_client(client_id)?.is_none() {
                return Err(LoanError::not_found("client", client_id));
            }

            let sequence = repo.next_loan_sequence()?;
            let loan = repo.create_loan(NewLoan {
                id: Uuid::new_v4(),
                loan_number: LoanNumber::new(prefix, now.year(), sequence, min_digits),
                client_id,
                terms,
                end_date,
                created_at: now,
            })?;

            let installments = drafts
                .into_iter()
                .map(|draft| repo.create_installment(draft.into_installment(Uuid::new_v4(), loan.id, now)))
                .collect::<Result<Vec<_>>>()?;

            Ok(LoanBooking { loan, installments })
        })?;

        let loan = &booking.loan;
        self.publish([Event::LoanOriginated {
            loan_id: loan.id,
            loan_number: loan.loan_number.clone(),
            client_id: loan.client_id,
            principal: loan.terms.principal_amount,
            installments: booking.installments.len() as u32,
            timestamp: now,
        }]);
        info!(
            loan_id = %loan.id,
            loan_number = %loan.loan_number,
            principal = %loan.terms.principal_amount,
            installments = booking.installments.len(),
            end_date = %loan.end_date,
            "loan originated"
        );
        Ok(booking)
    }

    pub fn get_loan(&self, id: LoanId) -> Result<Loan> {
        self.store
            .read(|repo| repo.get_loan(id))?
            .ok_or_else(|| LoanError::not_found("loan", id))
    }

    pub fn list_loans(&self) -> Result<Vec<Loan>> {
        self.store.read(|repo| repo.list_loans())
    }

    pub fn loans_for_client(&self, client_id: ClientId) -> Result<Vec<Loan>> {
        self.store.read(|repo| {
            if repo.get_client(client_id)?.is_none() {
                return Err(LoanError::not_found("client", client_id));
            }
            repo.loans_for_client(client_id)
        })
    }

    /// the loan's schedule in installment order
    pub fn installments(&self, loan_id: LoanId) -> Result<Vec<Installment>> {
        self.store.read(|repo| {
            if repo.get_loan(loan_id)?.is_none() {
                return Err(LoanError::not_found("loan", loan_id));
            }
            repo.get_installments(loan_id)
        })
    }

    /// the loan's payments, newest first
    pub fn payments(&self, loan_id: LoanId) -> Result<Vec<Payment>> {
        self.store.read(|repo| {
            if repo.get_loan(loan_id)?.is_none() {
                return Err(LoanError::not_found("loan", loan_id));
            }
            repo.get_payments(loan_id)
        })
    }

    pub fn get_payment(&self, id: PaymentId) -> Result<Payment> {
        self.store
            .read(|repo| repo.get_payment(id))?
            .ok_or_else(|| LoanError::not_found("payment", id))
    }

    // payments

    #[instrument(
        skip(self, request),
        fields(loan_id = %request.loan_id, payment_type = %request.payment_type, amount = %request.amount)
    )]
    pub fn record_payment(&self, request: PaymentRequest) -> Result<PaymentOutcome> {
        let now = self.clock.now();
        let mut pending = EventStore::new();

        let outcome = self
            .store
            .transaction(|repo| self.processor.apply(repo, request, now, &mut pending))
            .inspect_err(|err| warn!(error = %err, "payment rejected"))?;

        self.publish(pending.take_events());
        Ok(outcome)
    }

    /// manual active -> defaulted transition
    #[instrument(skip(self, reason), fields(loan_id = %loan_id))]
    pub fn mark_defaulted(&self, loan_id: LoanId, reason: impl Into<String>) -> Result<Loan> {
        let reason = reason.into();
        let loan = self.store.transaction(|repo| {
            let loan = repo
                .get_loan(loan_id)?
                .ok_or_else(|| LoanError::not_found("loan", loan_id))?;
            if !loan.is_active() {
                return Err(LoanError::validation(format!(
                    "only active loans can be defaulted, {} is {}",
                    loan.loan_number, loan.status
                )));
            }
            repo.update_loan(loan_id, &LoanPatch::status(LoanStatus::Defaulted))
        })?;

        self.publish([Event::StatusChanged {
            loan_id,
            old_status: LoanStatus::Active,
            new_status: LoanStatus::Defaulted,
            reason,
            timestamp: self.clock.now(),
        }]);
        warn!(loan_number = %loan.loan_number, "loan marked defaulted");
        Ok(loan)
    }

    // reports

    /// report queries as of the clock's current date
    pub fn reports(&self) -> ReportAggregator<'_, S> {
        ReportAggregator::new(&self.store, self.clock.today())
    }

    pub fn dashboard(&self) -> Result<Dashboard> {
        self.reports().dashboard(&self.config.dashboard)
    }

    // events

    /// drain everything published since the last call
    pub fn take_events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take_events()
    }

    fn publish(&self, events: impl IntoIterator<Item = Event>) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(events);
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(LoanError::validation("client name is required"));
    }
    Ok(())
}

fn validate_phone(phone: &str) -> Result<()> {
    if phone.trim().is_empty() {
        return Err(LoanError::validation("client phone is required"));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    if !email.contains('@') {
        return Err(LoanError::validation(format!("invalid email address: {email:?}")));
    }
    Ok(())
}
