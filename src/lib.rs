pub mod clock;
pub mod config;
pub mod dates;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod fees;
pub mod model;
pub mod payments;
pub mod reports;
pub mod schedule;
pub mod servicing;
pub mod store;
pub mod types;

// re-export key types
pub use clock::Clock;
pub use config::{DashboardConfig, LateFeePolicy, ServicingConfig};
pub use decimal::{Money, Rate};
pub use errors::{LoanError, Result};
pub use events::{Event, EventStore};
pub use fees::{FeeCalculator, LateFeeCalculation, PreclosureFeeCalculation};
pub use model::{
    Client, ClientPatch, Installment, InstallmentDraft, Loan, LoanTerms, NewClient, Payment,
};
pub use payments::{PaymentOutcome, PaymentProcessor, PaymentRequest};
pub use reports::{Dashboard, InstallmentAlert, LoanSummary, ReportAggregator};
pub use schedule::{total_installments, AmortizationSchedule, ScheduleGenerator, MAX_INSTALLMENTS};
pub use servicing::{LoanApplication, LoanBooking, LoanServicer, MAX_PRINCIPAL};
pub use store::{InMemoryStore, JsonFileStore, Repository, Store};
pub use types::{
    ClientId, InstallmentId, InstallmentStatus, InterestType, LoanId, LoanNumber, LoanStatus,
    PaymentId, PaymentMethod, PaymentType, RepaymentFrequency, TermUnit,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
