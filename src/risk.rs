use crate::models::{
    CanonicalNumber, LineType, PatternMatch, PatternTag, ProbeId, ProbeResult, ProbeStatus,
    RiskAssessment, RiskFactor, RiskLevel, RiskSignal,
};
use serde::{Deserialize, Serialize};

/// Calling codes treated as high-risk regions.
pub const HIGH_RISK_COUNTRY_CODES: [u16; 5] = [7, 91, 92, 375, 380];

/// Points contributed by each signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskWeights {
    pub voip_line: u32,
    pub prepaid_carrier: u32,
    pub high_risk_country: u32,
    pub spam_listing: u32,
    pub scam_pattern: u32,
    pub breach_exposure: u32,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            voip_line: 30,
            prepaid_carrier: 20,
            high_risk_country: 15,
            spam_listing: 25,
            scam_pattern: 20,
            breach_exposure: 35,
        }
    }
}

impl RiskWeights {
    pub fn weight(&self, signal: RiskSignal) -> u32 {
        match signal {
            RiskSignal::VoipLine => self.voip_line,
            RiskSignal::PrepaidCarrier => self.prepaid_carrier,
            RiskSignal::HighRiskCountry => self.high_risk_country,
            RiskSignal::SpamListing => self.spam_listing,
            RiskSignal::ScamPattern => self.scam_pattern,
            RiskSignal::BreachExposure => self.breach_exposure,
        }
    }
}

/// Pure scoring over probe outcomes and pattern matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskScorer {
    weights: RiskWeights,
}

impl RiskScorer {
    pub fn new(weights: RiskWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &RiskWeights {
        &self.weights
    }

    pub fn score(
        &self,
        number: &CanonicalNumber,
        results: &[ProbeResult],
        patterns: &[PatternMatch],
    ) -> RiskAssessment {
        let signals = detect_signals(number, results, patterns);
        self.score_signals(&signals)
    }

    /// Sums the weights of `signals` (each counted once), clamped to 100.
    pub fn score_signals(&self, signals: &[RiskSignal]) -> RiskAssessment {
        let factors: Vec<RiskFactor> = RiskSignal::ALL
            .into_iter()
            .filter(|s| signals.contains(s))
            .map(|tag| RiskFactor {
                tag,
                weight: self.weights.weight(tag),
                description: tag.description().to_string(),
            })
            .collect();

        let total: u32 = factors.iter().map(|f| f.weight).sum();
        let score = total.min(100) as u8;

        RiskAssessment {
            score,
            level: RiskLevel::from_score(score),
            factors,
        }
    }
}

/// Signals present for a number, in fixed signal order.
///
/// Only `found` results contribute; `not_found`, `unknown` and `failed`
/// results add nothing.
pub fn detect_signals(
    number: &CanonicalNumber,
    results: &[ProbeResult],
    patterns: &[PatternMatch],
) -> Vec<RiskSignal> {
    let found = |probe: ProbeId| {
        results
            .iter()
            .find(|r| r.probe == probe && r.status == ProbeStatus::Found)
    };
    let carrier = found(ProbeId::CarrierLookup).map(|r| &r.payload);

    let carrier_says_voip = carrier
        .and_then(|p| p.get("line_type"))
        .and_then(|v| v.as_str())
        .is_some_and(|t| t.eq_ignore_ascii_case("voip"));

    let prepaid = carrier.is_some_and(|p| {
        p.get("prepaid").and_then(|v| v.as_bool()).unwrap_or(false)
            || p.get("carrier")
                .and_then(|v| v.as_str())
                .is_some_and(|c| c.to_ascii_lowercase().contains("prepaid"))
    });

    let spam_listed = found(ProbeId::ReputationLookup).is_some();

    let mut signals = Vec::new();
    if number.line_type() == LineType::Voip || carrier_says_voip {
        signals.push(RiskSignal::VoipLine);
    }
    if prepaid {
        signals.push(RiskSignal::PrepaidCarrier);
    }
    if HIGH_RISK_COUNTRY_CODES.contains(&number.country_code()) {
        signals.push(RiskSignal::HighRiskCountry);
    }
    if spam_listed {
        signals.push(RiskSignal::SpamListing);
    }
    if patterns.iter().any(|m| m.tag == PatternTag::KnownScamPrefix) {
        signals.push(RiskSignal::ScamPattern);
    }
    if found(ProbeId::BreachCheck).is_some() {
        signals.push(RiskSignal::BreachExposure);
    }
    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn number(cc: u16, line_type: LineType) -> CanonicalNumber {
        CanonicalNumber::new(
            format!("+{}5550100", cc),
            format!("+{} 5550100", cc),
            cc,
            "5550100".to_string(),
            None,
            line_type,
            Vec::new(),
        )
    }

    fn carrier(payload: serde_json::Value) -> ProbeResult {
        ProbeResult::fetched(ProbeId::CarrierLookup, ProbeStatus::Found, payload, 0.9)
    }

    #[test]
    fn voip_counts_once_from_either_source() {
        let results = vec![carrier(json!({"line_type": "voip", "prepaid": false}))];
        let signals = detect_signals(&number(44, LineType::Voip), &results, &[]);
        assert_eq!(signals, vec![RiskSignal::VoipLine]);
        assert_eq!(RiskScorer::default().score_signals(&signals).score, 30);
    }

    #[test]
    fn prepaid_from_flag_or_carrier_name() {
        let by_flag = vec![carrier(json!({"carrier": "Vivo", "prepaid": true}))];
        let by_name = vec![carrier(json!({"carrier": "Lyca Prepaid"}))];
        let n = number(44, LineType::Mobile);
        assert_eq!(detect_signals(&n, &by_flag, &[]), vec![RiskSignal::PrepaidCarrier]);
        assert_eq!(detect_signals(&n, &by_name, &[]), vec![RiskSignal::PrepaidCarrier]);
    }

    #[test]
    fn degraded_results_contribute_nothing() {
        let results = vec![
            ProbeResult::degraded(ProbeId::BreachCheck, ProbeStatus::Failed, "timeout"),
            ProbeResult::degraded(ProbeId::ReputationLookup, ProbeStatus::Unknown, "missing_credentials"),
            ProbeResult::fetched(ProbeId::CarrierLookup, ProbeStatus::NotFound, json!({"valid": false}), 0.8),
        ];
        assert!(detect_signals(&number(44, LineType::Mobile), &results, &[]).is_empty());
    }

    #[test]
    fn all_signals_clamp_to_100() {
        let assessment = RiskScorer::default().score_signals(&RiskSignal::ALL);
        assert_eq!(assessment.score, 100);
        assert_eq!(assessment.level, RiskLevel::High);
        assert_eq!(assessment.factors.len(), 6);
    }

    #[test]
    fn factors_follow_signal_order() {
        let assessment = RiskScorer::default()
            .score_signals(&[RiskSignal::BreachExposure, RiskSignal::HighRiskCountry]);
        let tags: Vec<RiskSignal> = assessment.factors.iter().map(|f| f.tag).collect();
        assert_eq!(tags, vec![RiskSignal::HighRiskCountry, RiskSignal::BreachExposure]);
        assert_eq!(assessment.score, 50);
        assert_eq!(assessment.level, RiskLevel::Medium);
    }

    #[test]
    fn scam_prefix_and_high_risk_country() {
        let patterns = vec![PatternMatch {
            tag: PatternTag::KnownScamPrefix,
            matched: "876".to_string(),
        }];
        let signals = detect_signals(&number(380, LineType::Mobile), &[], &patterns);
        assert_eq!(signals, vec![RiskSignal::HighRiskCountry, RiskSignal::ScamPattern]);
    }
}
