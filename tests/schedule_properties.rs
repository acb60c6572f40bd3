//! property tests for schedule generation and fee rules

use chrono::{Days, NaiveDate};
use loan_servicing_rs::{
    total_installments, FeeCalculator, InterestType, LoanTerms, Money, Rate, RepaymentFrequency,
    ScheduleGenerator, TermUnit,
};
use proptest::prelude::*;

fn arb_interest_type() -> impl Strategy<Value = InterestType> {
    prop_oneof![Just(InterestType::Flat), Just(InterestType::Reducing)]
}

fn arb_frequency() -> impl Strategy<Value = RepaymentFrequency> {
    prop_oneof![
        Just(RepaymentFrequency::Daily),
        Just(RepaymentFrequency::Weekly),
        Just(RepaymentFrequency::Monthly),
    ]
}

/// term unit with a length that keeps daily schedules to a few hundred rows
fn arb_term() -> impl Strategy<Value = (TermUnit, u32)> {
    prop_oneof![
        (Just(TermUnit::Days), 1u32..400),
        (Just(TermUnit::Weeks), 1u32..60),
        (Just(TermUnit::Months), 1u32..14),
    ]
}

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (0u64..3_650).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .checked_add_days(Days::new(offset))
            .unwrap()
    })
}

fn arb_terms() -> impl Strategy<Value = LoanTerms> {
    (
        1i64..100_000_000, // principal in cents
        arb_date(),
        0u32..5_000, // interest rate in bps
        arb_interest_type(),
        arb_term(),
        arb_frequency(),
    )
        .prop_map(|(cents, start_date, bps, interest_type, (term_unit, term_length), frequency)| LoanTerms {
            principal_amount: Money::from_minor(cents),
            start_date,
            interest_rate: Rate::from_bps(bps),
            interest_type,
            term_length,
            term_unit,
            repayment_frequency: frequency,
            late_fee_rate_per_day: Rate::from_percentage(1),
            preclosure_fee_rate: Rate::from_percentage(2),
        })
}

proptest! {
    #[test]
    fn principal_portions_add_up_to_principal(terms in arb_terms()) {
        let drafts = ScheduleGenerator::new().generate(&terms).unwrap();

        let total: Money = drafts.iter().map(|d| d.principal_portion).sum();
        let drift = (total - terms.principal_amount).abs();
        let tolerance = Money::from_minor(drafts.len() as i64);
        prop_assert!(drift <= tolerance, "drift {} over {} installments", drift, drafts.len());
    }

    #[test]
    fn schedule_length_matches_installment_count(terms in arb_terms()) {
        let drafts = ScheduleGenerator::new().generate(&terms).unwrap();
        let expected = total_installments(terms.term_length, terms.term_unit, terms.repayment_frequency).unwrap();
        prop_assert_eq!(drafts.len(), expected as usize);
    }

    #[test]
    fn drafts_are_consistent_and_ordered(terms in arb_terms()) {
        let drafts = ScheduleGenerator::new().generate(&terms).unwrap();

        for (idx, draft) in drafts.iter().enumerate() {
            prop_assert_eq!(draft.installment_number as usize, idx + 1);
            prop_assert_eq!(draft.total_due, draft.principal_portion + draft.interest_portion);
            prop_assert_eq!(draft.remaining_amount, draft.total_due);
            prop_assert!(draft.due_date > terms.start_date);
        }
        for pair in drafts.windows(2) {
            prop_assert!(pair[0].due_date < pair[1].due_date);
        }
    }

    #[test]
    fn generation_is_repeatable(terms in arb_terms()) {
        let generator = ScheduleGenerator::new();
        let first = serde_json::to_string(&generator.generate(&terms).unwrap()).unwrap();
        let second = serde_json::to_string(&generator.generate(&terms).unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn no_late_fee_on_or_before_due_date(
        cents in 0i64..100_000_000,
        bps in 0u32..10_000,
        due in arb_date(),
        early_by in 0u64..400,
    ) {
        let paid_on = due.checked_sub_days(Days::new(early_by)).unwrap();
        let calc = FeeCalculator::new().late_fee(Money::from_minor(cents), Rate::from_bps(bps), due, paid_on).unwrap();
        prop_assert_eq!(calc.fee, Money::ZERO);
        prop_assert_eq!(calc.days_late, 0);
    }

    #[test]
    fn late_fee_grows_with_days_late(
        cents in 1i64..10_000_000,
        due in arb_date(),
        late_by in 1u64..200,
    ) {
        let fees = FeeCalculator::new();
        let rate = Rate::from_percentage(1);
        let earlier = fees
            .late_fee(Money::from_minor(cents), rate, due, due.checked_add_days(Days::new(late_by)).unwrap())
            .unwrap();
        let later = fees
            .late_fee(Money::from_minor(cents), rate, due, due.checked_add_days(Days::new(late_by + 1)).unwrap())
            .unwrap();
        prop_assert!(later.fee >= earlier.fee);
        prop_assert_eq!(earlier.days_late as u64, late_by);
    }
}
