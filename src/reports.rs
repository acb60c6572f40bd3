use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::config::DashboardConfig;
use crate::dates;
use crate::decimal::Money;
use crate::errors::Result;
use crate::model::{Installment, Loan};
use crate::store::{Repository, Store};
use crate::types::{ClientId, InstallmentStatus, LoanId};

/// client name shown when a joined client record is absent
pub const UNKNOWN_CLIENT: &str = "Unknown Client";

/// loan joined with its client's name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanSummary {
    #[serde(flatten)]
    pub loan: Loan,
    pub client_name: String,
}

/// installment needing attention, joined with its loan and client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallmentAlert {
    pub installment: Installment,
    /// status as of the report date
    pub effective_status: InstallmentStatus,
    /// days past the due date, zero when not yet due
    pub days_overdue: i64,
    pub loan: Loan,
    pub client_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub active_loans: usize,
    pub disbursed_amount: Money,
    pub overdue_payments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardAlerts {
    pub overdue_installments: Vec<InstallmentAlert>,
    pub upcoming_installments: Vec<InstallmentAlert>,
    pub loans_ending_soon: Vec<LoanSummary>,
}

/// everything the portfolio dashboard shows, read from one consistent snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub as_of: NaiveDate,
    pub stats: DashboardStats,
    pub recent_loans: Vec<LoanSummary>,
    pub alerts: DashboardAlerts,
}

impl Dashboard {
    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// read-only portfolio queries as of a fixed date
pub struct ReportAggregator<'a, S: Store> {
    store: &'a S,
    today: NaiveDate,
}

impl<'a, S: Store> ReportAggregator<'a, S> {
    pub fn new(store: &'a S, today: NaiveDate) -> Self {
        Self { store, today }
    }

    pub fn as_of(&self) -> NaiveDate {
        self.today
    }

    pub fn active_loan_count(&self) -> Result<usize> {
        self.scan(|scan| scan.active_loan_count())
    }

    /// principal of every loan ever originated, whatever its status
    pub fn total_disbursed_amount(&self) -> Result<Money> {
        self.scan(|scan| scan.total_disbursed_amount())
    }

    /// installments that read as overdue today
    pub fn overdue_payments_count(&self) -> Result<usize> {
        self.scan(|scan| scan.overdue_payments_count())
    }

    /// latest `limit` loans by creation time, newest first
    pub fn recent_loans(&self, limit: usize) -> Result<Vec<LoanSummary>> {
        self.scan(|scan| scan.recent_loans(limit))
    }

    /// active loans whose end date falls within `[today, today + days]`
    pub fn loans_ending_soon(&self, days: u32) -> Result<Vec<LoanSummary>> {
        self.scan(|scan| scan.loans_ending_soon(days))
    }

    pub fn overdue_installments(&self) -> Result<Vec<InstallmentAlert>> {
        self.scan(|scan| scan.overdue_installments())
    }

    /// unpaid installments due within `[today, today + days]`
    pub fn upcoming_installments(&self, days: u32) -> Result<Vec<InstallmentAlert>> {
        self.scan(|scan| scan.upcoming_installments(days))
    }

    pub fn dashboard(&self, config: &DashboardConfig) -> Result<Dashboard> {
        self.scan(|scan| {
            let dashboard = Dashboard {
                as_of: scan.today,
                stats: DashboardStats {
                    active_loans: scan.active_loan_count()?,
                    disbursed_amount: scan.total_disbursed_amount()?,
                    overdue_payments: scan.overdue_payments_count()?,
                },
                recent_loans: scan.recent_loans(config.recent_loans_limit)?,
                alerts: DashboardAlerts {
                    overdue_installments: scan.overdue_installments()?,
                    upcoming_installments: scan.upcoming_installments(config.upcoming_window_days)?,
                    loans_ending_soon: scan.loans_ending_soon(config.ending_soon_window_days)?,
                },
            };
            debug!(
                as_of = %dashboard.as_of,
                active_loans = dashboard.stats.active_loans,
                overdue = dashboard.stats.overdue_payments,
                "dashboard built"
            );
            Ok(dashboard)
        })
    }

    fn scan<R>(&self, f: impl FnOnce(&Scan<'_>) -> Result<R>) -> Result<R> {
        let today = self.today;
        self.store.read(|repo| f(&Scan { repo, today }))
    }
}

struct Scan<'r> {
    repo: &'r dyn Repository,
    today: NaiveDate,
}

impl Scan<'_> {
    fn active_loan_count(&self) -> Result<usize> {
        Ok(self.repo.list_loans()?.iter().filter(|l| l.is_active()).count())
    }

    fn total_disbursed_amount(&self) -> Result<Money> {
        Ok(self.repo.list_loans()?.iter().map(|l| l.terms.principal_amount).sum())
    }

    fn overdue_payments_count(&self) -> Result<usize> {
        Ok(self
            .repo
            .list_installments()?
            .iter()
            .filter(|i| i.is_overdue(self.today))
            .count())
    }

    fn recent_loans(&self, limit: usize) -> Result<Vec<LoanSummary>> {
        let mut loans = self.repo.list_loans()?;
        loans.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.loan_number.cmp(&a.loan_number))
        });
        loans.truncate(limit);
        self.summarise(loans)
    }

    fn loans_ending_soon(&self, days: u32) -> Result<Vec<LoanSummary>> {
        let mut loans: Vec<Loan> = self
            .repo
            .list_loans()?
            .into_iter()
            .filter(|l| l.is_active() && dates::within_days(l.end_date, self.today, days))
            .collect();
        loans.sort_by(|a, b| a.end_date.cmp(&b.end_date).then_with(|| a.loan_number.cmp(&b.loan_number)));
        self.summarise(loans)
    }

    fn overdue_installments(&self) -> Result<Vec<InstallmentAlert>> {
        self.alerts(|i| i.is_overdue(self.today))
    }

    fn upcoming_installments(&self, days: u32) -> Result<Vec<InstallmentAlert>> {
        self.alerts(|i| i.is_due_within(self.today, days))
    }

    fn alerts(&self, keep: impl Fn(&Installment) -> bool) -> Result<Vec<InstallmentAlert>> {
        let loans: BTreeMap<LoanId, Loan> = self
            .repo
            .list_loans()?
            .into_iter()
            .map(|l| (l.id, l))
            .collect();
        let names = self.client_names()?;

        // list_installments is ordered by due date then number
        Ok(self
            .repo
            .list_installments()?
            .into_iter()
            .filter(|i| keep(i))
            .filter_map(|installment| {
                let loan = loans.get(&installment.loan_id)?.clone();
                Some(InstallmentAlert {
                    effective_status: installment.effective_status(self.today),
                    days_overdue: dates::days_between(installment.due_date, self.today).max(0),
                    client_name: client_name(&names, loan.client_id),
                    installment,
                    loan,
                })
            })
            .collect())
    }

    fn summarise(&self, loans: Vec<Loan>) -> Result<Vec<LoanSummary>> {
        let names = self.client_names()?;
        Ok(loans
            .into_iter()
            .map(|loan| LoanSummary {
                client_name: client_name(&names, loan.client_id),
                loan,
            })
            .collect())
    }

    fn client_names(&self) -> Result<BTreeMap<ClientId, String>> {
        Ok(self
            .repo
            .list_clients()?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect())
    }
}

fn client_name(names: &BTreeMap<ClientId, String>, id: ClientId) -> String {
    names
        .get(&id)
        .cloned()
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use crate::model::{Client, InstallmentPatch, LoanPatch, LoanTerms, NewLoan};
    use crate::schedule::ScheduleGenerator;
    use crate::store::InMemoryStore;
    use crate::types::{InterestType, LoanNumber, LoanStatus, RepaymentFrequency, TermUnit};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn book_loan(store: &InMemoryStore, client_id: ClientId, principal: i64, start: NaiveDate, months: u32, age_hours: i64) -> Loan {
        let terms = LoanTerms {
            principal_amount: Money::from_major(principal),
            start_date: start,
            interest_rate: Rate::from_percentage(12),
            interest_type: InterestType::Flat,
            term_length: months,
            term_unit: TermUnit::Months,
            repayment_frequency: RepaymentFrequency::Monthly,
            late_fee_rate_per_day: Rate::from_percentage(1),
            preclosure_fee_rate: Rate::from_percentage(3),
        };
        let end_date = dates::add_term(start, TermUnit::Months, months).unwrap();
        let drafts = ScheduleGenerator::new().generate(&terms).unwrap();
        let created_at = Utc::now() - Duration::hours(age_hours);

        store
            .transaction(|repo| {
                let seq = repo.next_loan_sequence()?;
                let loan = repo.create_loan(NewLoan {
                    id: Uuid::new_v4(),
                    loan_number: LoanNumber::new("L", 2024, seq, 4),
                    client_id,
                    terms,
                    end_date,
                    created_at,
                })?;
                for draft in drafts {
                    repo.create_installment(draft.into_installment(Uuid::new_v4(), loan.id, created_at))?;
                }
                Ok(loan)
            })
            .unwrap()
    }

    fn portfolio() -> (InMemoryStore, Vec<Loan>) {
        let store = InMemoryStore::new();
        let client = Client {
            id: Uuid::new_v4(),
            name: "Asha Traders".to_string(),
            phone: "555-0190".to_string(),
            email: "asha@example.com".to_string(),
            address: None,
            created_at: Utc::now(),
        };
        let client_id = client.id;
        store.transaction(|repo| repo.create_client(client)).unwrap();

        let loans = vec![
            // due Feb 1 .. Apr 1, ends Apr 1
            book_loan(&store, client_id, 3_000, d(2024, 1, 1), 3, 30),
            // due Mar 5, ends Mar 5
            book_loan(&store, client_id, 1_200, d(2024, 2, 5), 1, 20),
            // due Mar 1 .. Jun 1
            book_loan(&store, client_id, 6_000, d(2024, 2, 1), 4, 10),
        ];
        (store, loans)
    }

    #[test]
    fn test_headline_figures() {
        let (store, loans) = portfolio();
        store
            .transaction(|repo| repo.update_loan(loans[2].id, &LoanPatch::status(LoanStatus::Defaulted)))
            .unwrap();

        let reports = ReportAggregator::new(&store, d(2024, 3, 2));
        assert_eq!(reports.active_loan_count().unwrap(), 2);
        assert_eq!(reports.total_disbursed_amount().unwrap(), Money::from_major(10_200));
        // loan 0 installments 1 and 2 (Feb 1, Mar 1) plus loan 2 installment 1 (Mar 1)
        assert_eq!(reports.overdue_payments_count().unwrap(), 3);
    }

    #[test]
    fn test_overdue_is_derived_from_date() {
        let (store, loans) = portfolio();
        let first = store.read(|repo| repo.get_installments(loans[0].id)).unwrap().remove(0);
        store
            .transaction(|repo| repo.update_installment(first.id, &InstallmentPatch::settled()))
            .unwrap();

        let reports = ReportAggregator::new(&store, d(2024, 3, 2));
        let overdue = reports.overdue_installments().unwrap();
        assert_eq!(overdue.len(), 2);
        assert!(overdue.iter().all(|a| a.effective_status == InstallmentStatus::Overdue));
        assert!(overdue.iter().all(|a| a.installment.status == InstallmentStatus::Pending));
        assert_eq!(overdue[0].days_overdue, 1);
        assert_eq!(overdue[0].client_name, "Asha Traders");

        // nothing is overdue on its due date
        let early = ReportAggregator::new(&store, d(2024, 3, 1));
        assert_eq!(early.overdue_payments_count().unwrap(), 0);
    }

    #[test]
    fn test_windows_are_closed_intervals() {
        let (store, loans) = portfolio();
        let reports = ReportAggregator::new(&store, d(2024, 2, 27));

        let upcoming = reports.upcoming_installments(7).unwrap();
        let numbers: Vec<_> = upcoming.iter().map(|a| (a.loan.id, a.installment.installment_number)).collect();
        // Mar 1 (loan 0 #2, loan 2 #1) and Mar 5 (loan 1 #1) are all inside [Feb 27, Mar 5]
        assert_eq!(numbers.len(), 3);
        assert!(numbers.contains(&(loans[1].id, 1)));
        assert!(upcoming.iter().all(|a| a.days_overdue == 0));

        let ending = reports.loans_ending_soon(7).unwrap();
        assert_eq!(ending.len(), 1);
        assert_eq!(ending[0].loan.id, loans[1].id);
    }

    #[test]
    fn test_recent_loans_newest_first_with_fallback_name() {
        let (store, loans) = portfolio();
        let second = Client {
            id: Uuid::new_v4(),
            name: "Ravi".to_string(),
            phone: "555-0000".to_string(),
            email: "ravi@example.com".to_string(),
            address: None,
            created_at: Utc::now(),
        };
        let second_id = second.id;
        store.transaction(|repo| repo.create_client(second)).unwrap();
        let newest = book_loan(&store, second_id, 500, d(2024, 2, 1), 1, 1);

        let reports = ReportAggregator::new(&store, d(2024, 3, 1));
        let recent = reports.recent_loans(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].loan.id, newest.id);
        assert_eq!(recent[0].client_name, "Ravi");
        assert_eq!(recent[1].loan.id, loans[2].id);

        let mut names = BTreeMap::new();
        names.insert(loans[0].client_id, "Asha Traders".to_string());
        assert_eq!(client_name(&names, second_id), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_recent_loans_tie_breaks_on_sequence_value() {
        let (store, loans) = portfolio();
        let created_at = Utc::now();
        let booked = store
            .transaction(|repo| {
                [9_999, 10_000]
                    .into_iter()
                    .map(|seq| {
                        repo.create_loan(NewLoan {
                            id: Uuid::new_v4(),
                            loan_number: LoanNumber::new("L", 2024, seq, 4),
                            client_id: loans[0].client_id,
                            terms: loans[0].terms.clone(),
                            end_date: loans[0].end_date,
                            created_at,
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .unwrap();

        let recent = ReportAggregator::new(&store, d(2024, 3, 1)).recent_loans(2).unwrap();
        assert_eq!(recent[0].loan.loan_number.as_str(), "L-2024-10000");
        assert_eq!(recent[1].loan.id, booked[0].id);
    }

    #[test]
    fn test_dashboard_uses_configured_windows() {
        let (store, _) = portfolio();
        let reports = ReportAggregator::new(&store, d(2024, 2, 27));

        let dashboard = reports
            .dashboard(&DashboardConfig {
                recent_loans_limit: 1,
                upcoming_window_days: 2,
                // Feb 27 + 35 days = Apr 2, which takes in loans ending Mar 5 and Apr 1
                ending_soon_window_days: 35,
            })
            .unwrap();

        assert_eq!(dashboard.stats.active_loans, 3);
        assert_eq!(dashboard.stats.disbursed_amount, Money::from_major(10_200));
        assert_eq!(dashboard.recent_loans.len(), 1);
        assert_eq!(dashboard.alerts.upcoming_installments.len(), 2);
        assert_eq!(dashboard.alerts.loans_ending_soon.len(), 2);

        let json = dashboard.to_json_pretty().unwrap();
        assert!(json.contains("\"disbursed_amount\": \"10200.00\""));
        assert!(json.contains("\"client_name\": \"Asha Traders\""));
    }
}
