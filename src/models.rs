use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

// ============ Canonical Number ============

/// Line type inferred from the numbering plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineType {
    Mobile,
    Landline,
    Voip,
    Unknown,
}

/// Normalized, validated phone number. Used as the cache and lookup key.
///
/// Only `NumberNormalizer` constructs these; every field is derived from the
/// E.164 form and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalNumber {
    e164: String,
    international: String,
    country_code: u16,
    national_number: String,
    region: Option<String>,
    line_type: LineType,
    timezones: Vec<String>,
}

impl CanonicalNumber {
    pub(crate) fn new(
        e164: String,
        international: String,
        country_code: u16,
        national_number: String,
        region: Option<String>,
        line_type: LineType,
        mut timezones: Vec<String>,
    ) -> Self {
        timezones.sort();
        timezones.dedup();
        Self {
            e164,
            international,
            country_code,
            national_number,
            region,
            line_type,
            timezones,
        }
    }

    /// E.164 form, e.g. `+5511987654321`.
    pub fn e164(&self) -> &str {
        &self.e164
    }

    /// International display form, e.g. `+55 11 98765-4321`.
    pub fn international(&self) -> &str {
        &self.international
    }

    pub fn country_code(&self) -> u16 {
        self.country_code
    }

    /// National significant number as a digit string.
    pub fn national_number(&self) -> &str {
        &self.national_number
    }

    /// ISO 3166 region when the numbering plan identifies one.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn line_type(&self) -> LineType {
        self.line_type
    }

    /// IANA timezone names, sorted.
    pub fn timezones(&self) -> &[String] {
        &self.timezones
    }
}

impl fmt::Display for CanonicalNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.e164)
    }
}

// ============ Patterns ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternTag {
    TollFree,
    KnownScamPrefix,
    BusinessLine,
    RepeatingDigits,
    SequentialDigits,
    VanityNumber,
}

/// A structural anomaly found in a number, with the digits that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub tag: PatternTag,
    pub matched: String,
}

// ============ Probes ============

/// Identifier of one external capability.
///
/// Declaration order is alphabetical so the derived `Ord` matches the
/// serialized id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeId {
    BreachCheck,
    CarrierLookup,
    MessagingPresence,
    PeopleSearch,
    ReputationLookup,
    SocialPresence,
}

impl ProbeId {
    pub const ALL: [ProbeId; 6] = [
        ProbeId::BreachCheck,
        ProbeId::CarrierLookup,
        ProbeId::MessagingPresence,
        ProbeId::PeopleSearch,
        ProbeId::ReputationLookup,
        ProbeId::SocialPresence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeId::BreachCheck => "breach_check",
            ProbeId::CarrierLookup => "carrier_lookup",
            ProbeId::MessagingPresence => "messaging_presence",
            ProbeId::PeopleSearch => "people_search",
            ProbeId::ReputationLookup => "reputation_lookup",
            ProbeId::SocialPresence => "social_presence",
        }
    }

    /// Whether the probe talks to a keyed API.
    pub fn requires_credentials(&self) -> bool {
        !matches!(
            self,
            ProbeId::MessagingPresence | ProbeId::SocialPresence
        )
    }

    /// Freshness class used to pick the cache TTL.
    pub fn class(&self) -> ProbeClass {
        match self {
            ProbeId::SocialPresence | ProbeId::MessagingPresence => ProbeClass::Presence,
            ProbeId::PeopleSearch => ProbeClass::Records,
            ProbeId::BreachCheck => ProbeClass::Breach,
            ProbeId::CarrierLookup => ProbeClass::Carrier,
            ProbeId::ReputationLookup => ProbeClass::Reputation,
        }
    }
}

impl fmt::Display for ProbeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProbeId::ALL
            .into_iter()
            .find(|id| id.as_str() == s.trim())
            .ok_or_else(|| format!("unknown probe id '{}'", s.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeClass {
    Presence,
    Records,
    Breach,
    Carrier,
    Reputation,
}

impl ProbeClass {
    pub const ALL: [ProbeClass; 5] = [
        ProbeClass::Presence,
        ProbeClass::Records,
        ProbeClass::Breach,
        ProbeClass::Carrier,
        ProbeClass::Reputation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeClass::Presence => "presence",
            ProbeClass::Records => "records",
            ProbeClass::Breach => "breach",
            ProbeClass::Carrier => "carrier",
            ProbeClass::Reputation => "reputation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Found,
    NotFound,
    Unknown,
    Failed,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Found => "found",
            ProbeStatus::NotFound => "not_found",
            ProbeStatus::Unknown => "unknown",
            ProbeStatus::Failed => "failed",
        }
    }

    /// Only conclusive answers are persisted.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, ProbeStatus::Found | ProbeStatus::NotFound)
    }
}

impl FromStr for ProbeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "found" => Ok(ProbeStatus::Found),
            "not_found" => Ok(ProbeStatus::NotFound),
            "unknown" => Ok(ProbeStatus::Unknown),
            "failed" => Ok(ProbeStatus::Failed),
            other => Err(format!("unknown probe status '{}'", other)),
        }
    }
}

/// Outcome of one probe for one number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub probe: ProbeId,
    pub status: ProbeStatus,
    pub payload: Value,
    /// Absent when no fetch completed (missing credentials, timeout, open circuit).
    pub fetched_at: Option<DateTime<Utc>>,
    /// Source confidence in `[0, 1]`.
    pub confidence: f64,
}

impl ProbeResult {
    /// A conclusive answer fetched just now. Timestamps are kept at millisecond
    /// precision so a result survives a round trip through the cache unchanged.
    pub fn fetched(probe: ProbeId, status: ProbeStatus, payload: Value, confidence: f64) -> Self {
        Self {
            probe,
            status,
            payload,
            fetched_at: Some(Utc::now().trunc_subsecs(3)),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// A degraded outcome carrying only the reason it is degraded.
    pub fn degraded(probe: ProbeId, status: ProbeStatus, reason: &str) -> Self {
        Self {
            probe,
            status,
            payload: json!({ "reason": reason }),
            fetched_at: None,
            confidence: 0.0,
        }
    }

    pub fn is_found(&self) -> bool {
        self.status == ProbeStatus::Found
    }

    /// Reason string of a degraded result, if any.
    pub fn reason(&self) -> Option<&str> {
        self.payload.get("reason").and_then(|v| v.as_str())
    }
}

// ============ Risk ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSignal {
    VoipLine,
    PrepaidCarrier,
    HighRiskCountry,
    SpamListing,
    ScamPattern,
    BreachExposure,
}

impl RiskSignal {
    pub const ALL: [RiskSignal; 6] = [
        RiskSignal::VoipLine,
        RiskSignal::PrepaidCarrier,
        RiskSignal::HighRiskCountry,
        RiskSignal::SpamListing,
        RiskSignal::ScamPattern,
        RiskSignal::BreachExposure,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            RiskSignal::VoipLine => "VoIP number - potentially disposable/temporary",
            RiskSignal::PrepaidCarrier => "Prepaid number - lower accountability",
            RiskSignal::HighRiskCountry => "Number from high-risk region",
            RiskSignal::SpamListing => "Listed in a spam/reputation database",
            RiskSignal::ScamPattern => "Matches a known scam prefix",
            RiskSignal::BreachExposure => "Appears in a known data breach",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub tag: RiskSignal,
    pub weight: u32,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// `0–30 → LOW`, `31–60 → MEDIUM`, `61–100 → HIGH`.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=30 => RiskLevel::Low,
            31..=60 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }

    pub fn recommendations(&self) -> Vec<String> {
        let lines: &[&str] = match self {
            RiskLevel::Low => &[
                "Standard verification sufficient",
                "No special precautions needed",
            ],
            RiskLevel::Medium => &[
                "Additional verification recommended",
                "Consider alternative contact methods",
            ],
            RiskLevel::High => &[
                "Exercise extreme caution",
                "Verify identity through multiple channels",
                "Document all interactions",
            ],
        };
        lines.iter().map(|s| s.to_string()).collect()
    }
}

/// Scorer output before it is folded into a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u8,
    pub level: RiskLevel,
    pub factors: Vec<RiskFactor>,
}

// ============ Intelligence Record ============

/// Everything known about one number after one analysis pass.
///
/// Report renderers and presentation layers consume this shape as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceRecord {
    pub number: CanonicalNumber,
    pub patterns: Vec<PatternMatch>,
    /// One entry per enabled probe, ordered by probe id.
    pub results: Vec<ProbeResult>,
    pub factors: Vec<RiskFactor>,
    pub score: u8,
    pub level: RiskLevel,
    pub recommendations: Vec<String>,
}

impl IntelligenceRecord {
    pub fn result(&self, probe: ProbeId) -> Option<&ProbeResult> {
        self.results.iter().find(|r| r.probe == probe)
    }
}

// ============ API Payloads ============

/// Body of `POST /api/v1/analyze`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyzeRequest {
    pub number: String,
    /// ISO 3166 alpha-2 hint for numbers without an international prefix.
    #[serde(default)]
    pub country: Option<String>,
}

/// Body of `POST /api/v1/analyze/batch`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchAnalyzeRequest {
    pub numbers: Vec<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Per-input outcome of a batch; exactly one of `record` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<IntelligenceRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAnalyzeResponse {
    pub results: Vec<BatchItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_ids_sort_like_their_names() {
        let mut by_name: Vec<&str> = ProbeId::ALL.iter().map(|p| p.as_str()).collect();
        by_name.sort();
        let by_ord: Vec<&str> = ProbeId::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(by_name, by_ord);
    }

    #[test]
    fn probe_id_parses_from_name() {
        for id in ProbeId::ALL {
            assert_eq!(id.as_str().parse::<ProbeId>().unwrap(), id);
        }
        assert!("whois".parse::<ProbeId>().is_err());
    }

    #[test]
    fn level_bands_are_inclusive_on_lower_bound() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(30), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(31), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(60), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(61), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(100), RiskLevel::High);
    }

    #[test]
    fn degraded_result_has_no_timestamp() {
        let r = ProbeResult::degraded(ProbeId::BreachCheck, ProbeStatus::Unknown, "missing_credentials");
        assert_eq!(r.reason(), Some("missing_credentials"));
        assert!(r.fetched_at.is_none());
        assert!(!r.status.is_cacheable());
    }

    #[test]
    fn level_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&RiskLevel::Medium).unwrap(), "\"MEDIUM\"");
    }
}
