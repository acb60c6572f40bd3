use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{ClientId, InstallmentId, LoanId, LoanNumber, LoanStatus, PaymentId, PaymentType};

/// all events emitted while servicing loans
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // client events
    ClientRegistered {
        client_id: ClientId,
        timestamp: DateTime<Utc>,
    },
    ClientUpdated {
        client_id: ClientId,
        timestamp: DateTime<Utc>,
    },

    // lifecycle events
    LoanOriginated {
        loan_id: LoanId,
        loan_number: LoanNumber,
        client_id: ClientId,
        principal: Money,
        installments: u32,
        timestamp: DateTime<Utc>,
    },
    StatusChanged {
        loan_id: LoanId,
        old_status: LoanStatus,
        new_status: LoanStatus,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentRecorded {
        loan_id: LoanId,
        payment_id: PaymentId,
        installment_id: Option<InstallmentId>,
        payment_type: PaymentType,
        amount: Money,
        payment_date: NaiveDate,
    },
    LateFeeAssessed {
        loan_id: LoanId,
        installment_id: InstallmentId,
        fee_amount: Money,
        days_late: u32,
    },
    InstallmentSettled {
        loan_id: LoanId,
        installment_id: InstallmentId,
        installment_number: u32,
    },
    PreclosureSettled {
        loan_id: LoanId,
        remaining_principal: Money,
        preclosure_fee: Money,
        installments_closed: u32,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
