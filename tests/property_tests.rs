/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs
use phone_osint::models::{RiskLevel, RiskSignal};
use phone_osint::normalizer::{keypad_to_digits, NumberNormalizer, ValidationMode};
use phone_osint::risk::{RiskScorer, RiskWeights};
use proptest::prelude::*;

fn weights_strategy() -> impl Strategy<Value = RiskWeights> {
    (0u32..=60, 0u32..=60, 0u32..=60, 0u32..=60, 0u32..=60, 0u32..=60).prop_map(
        |(voip, prepaid, country, spam, scam, breach)| RiskWeights {
            voip_line: voip,
            prepaid_carrier: prepaid,
            high_risk_country: country,
            spam_listing: spam,
            scam_pattern: scam,
            breach_exposure: breach,
        },
    )
}

// Property: Normalization should never panic
proptest! {
    #[test]
    fn strict_normalization_never_panics(raw in "\\PC*") {
        let _ = NumberNormalizer::new(ValidationMode::Strict).normalize(&raw, None);
    }

    #[test]
    fn lenient_normalization_never_panics(raw in "[0-9+() .-]{0,24}", hint in "[A-Z]{0,2}") {
        let _ = NumberNormalizer::new(ValidationMode::Lenient).normalize(&raw, Some(&hint));
    }

    #[test]
    fn keypad_conversion_preserves_length(raw in "[0-9A-Za-z+ -]{0,20}") {
        prop_assert_eq!(keypad_to_digits(&raw).chars().count(), raw.chars().count());
    }
}

// Property: Normalization is idempotent on its own output
proptest! {
    #[test]
    fn br_mobiles_are_fixed_points(ddd in 11u8..=99u8, subscriber in 0u32..=99_999_999u32) {
        let raw = format!("({}) 9{:08}", ddd, subscriber);
        let normalizer = NumberNormalizer::default();
        if let Ok(first) = normalizer.normalize(&raw, Some("BR")) {
            prop_assert!(first.e164().starts_with("+55"));
            let again = normalizer.normalize(first.e164(), None).unwrap();
            prop_assert_eq!(first, again);
        }
    }
}

// Property: Score is bounded, monotonic and banded
proptest! {
    #[test]
    fn score_is_bounded_and_banded(
        weights in weights_strategy(),
        signals in prop::sample::subsequence(RiskSignal::ALL.to_vec(), 0..=RiskSignal::ALL.len()),
    ) {
        let assessment = RiskScorer::new(weights).score_signals(&signals);
        prop_assert!(assessment.score <= 100);
        prop_assert_eq!(assessment.level, RiskLevel::from_score(assessment.score));
        prop_assert_eq!(assessment.factors.len(), signals.len());
    }

    #[test]
    fn adding_a_signal_never_lowers_the_score(
        weights in weights_strategy(),
        signals in prop::sample::subsequence(RiskSignal::ALL.to_vec(), 0..RiskSignal::ALL.len()),
        extra in prop::sample::select(RiskSignal::ALL.to_vec()),
    ) {
        let scorer = RiskScorer::new(weights);
        let before = scorer.score_signals(&signals);

        let mut more = signals.clone();
        if !more.contains(&extra) {
            more.push(extra);
        }
        let after = scorer.score_signals(&more);

        prop_assert!(after.score >= before.score);
    }

    #[test]
    fn duplicate_signals_count_once(
        weights in weights_strategy(),
        signal in prop::sample::select(RiskSignal::ALL.to_vec()),
    ) {
        let scorer = RiskScorer::new(weights);
        prop_assert_eq!(
            scorer.score_signals(&[signal, signal]),
            scorer.score_signals(&[signal])
        );
    }
}

fn only_voip(weight: u32) -> RiskScorer {
    RiskScorer::new(RiskWeights {
        voip_line: weight,
        ..RiskWeights::default()
    })
}

#[test]
fn level_band_boundaries() {
    let cases = [
        (0, RiskLevel::Low),
        (30, RiskLevel::Low),
        (31, RiskLevel::Medium),
        (60, RiskLevel::Medium),
        (61, RiskLevel::High),
        (100, RiskLevel::High),
    ];
    for (weight, level) in cases {
        let assessment = only_voip(weight).score_signals(&[RiskSignal::VoipLine]);
        assert_eq!(u32::from(assessment.score), weight);
        assert_eq!(assessment.level, level, "score {}", weight);
    }
}

#[test]
fn score_is_clamped_at_100() {
    let assessment = only_voip(150).score_signals(&[RiskSignal::VoipLine]);
    assert_eq!(assessment.score, 100);
    assert_eq!(assessment.level, RiskLevel::High);
}
