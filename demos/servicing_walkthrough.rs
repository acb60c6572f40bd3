/// servicing walkthrough - client, origination, payments, reports and preclosure
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use loan_servicing_rs::{
    InMemoryStore, InterestType, LoanApplication, LoanServicer, LoanTerms, Money, NewClient,
    PaymentMethod, PaymentRequest, Rate, RepaymentFrequency, SafeTimeProvider, TermUnit,
    TimeSource,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    println!("=== loan servicing walkthrough ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();
    let servicer = LoanServicer::new(InMemoryStore::new(), &time);

    // 1. client
    println!("1. client");
    println!("---------");
    let client = servicer.create_client(NewClient {
        name: "Sunita Rao".to_string(),
        phone: "555-0147".to_string(),
        email: "sunita@example.com".to_string(),
        address: Some("7 Temple Street".to_string()),
    })?;
    println!("  registered: {} ({})", client.name, client.id);

    // 2. origination
    println!("\n2. origination");
    println!("--------------");
    let booking = servicer.originate_loan(LoanApplication {
        client_id: client.id,
        terms: LoanTerms {
            principal_amount: Money::from_major(12_000),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            interest_rate: Rate::from_percentage(12),
            interest_type: InterestType::Flat,
            term_length: 12,
            term_unit: TermUnit::Months,
            repayment_frequency: RepaymentFrequency::Monthly,
            late_fee_rate_per_day: Rate::from_percentage(2),
            preclosure_fee_rate: Rate::from_percentage(5),
        },
    })?;
    println!("  loan number: {}", booking.loan.loan_number);
    println!("  end date: {}", booking.loan.end_date);
    for installment in booking.installments.iter().take(3) {
        println!(
            "    #{:<2} due {}  principal {}  interest {}  total {}",
            installment.installment_number,
            installment.due_date,
            installment.principal_portion,
            installment.interest_portion,
            installment.total_due
        );
    }
    println!("    ... {} installments in total", booking.installments.len());

    // 3. on-time payment
    println!("\n3. on-time payment");
    println!("------------------");
    controller.advance(Duration::days(31));
    let first = &booking.installments[0];
    let outcome = servicer.record_payment(PaymentRequest::installment(
        booking.loan.id,
        first.id,
        first.total_due,
        first.due_date,
        PaymentMethod::Upi,
    ))?;
    println!(
        "  installment #{} now {} (remaining {})",
        outcome.installments[0].installment_number,
        outcome.installments[0].status,
        outcome.installments[0].remaining_amount
    );

    // 4. late partial payment
    println!("\n4. late partial payment");
    println!("-----------------------");
    controller.advance(Duration::days(34));
    let second = &booking.installments[1];
    let outcome = servicer.record_payment(
        PaymentRequest::installment(
            booking.loan.id,
            second.id,
            Money::from_major(600),
            NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(),
            PaymentMethod::Cash,
        )
        .with_notes("paid at branch"),
    )?;
    println!("  late fee on ledger: {}", outcome.payment.late_fee);
    println!(
        "  installment #{} now {} (remaining {})",
        outcome.installments[0].installment_number,
        outcome.installments[0].status,
        outcome.installments[0].remaining_amount
    );

    // 5. dashboard
    println!("\n5. dashboard as of {}", servicer.reports().as_of());
    println!("-----------------------------");
    let dashboard = servicer.dashboard()?;
    println!("  active loans: {}", dashboard.stats.active_loans);
    println!("  disbursed: {}", dashboard.stats.disbursed_amount);
    println!("  overdue installments: {}", dashboard.stats.overdue_payments);
    println!("  upcoming in window: {}", dashboard.alerts.upcoming_installments.len());

    // 6. preclosure
    println!("\n6. preclosure");
    println!("-------------");
    let outcome = servicer.record_payment(PaymentRequest::preclosure(
        booking.loan.id,
        Money::from_major(10_500),
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
        PaymentMethod::BankTransfer,
    ))?;
    if let Some(preclosure) = &outcome.preclosure {
        println!("  remaining principal: {}", preclosure.remaining_principal);
        println!("  preclosure fee: {}", preclosure.fee);
    }
    println!("  installments closed: {}", outcome.installments.len());
    println!("  loan status: {}", outcome.loan.status);

    // 7. events
    println!("\n7. events");
    println!("---------");
    for event in servicer.take_events() {
        println!("  {}", serde_json::to_string(&event)?);
    }

    println!("\n=== walkthrough complete ===");
    Ok(())
}
