use crate::errors::OsintError;
use crate::models::{ProbeClass, ProbeId};
use crate::normalizer::ValidationMode;
use crate::risk::RiskWeights;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const HOUR: u64 = 3600;

/// Freshness window per probe class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    pub presence: Duration,
    pub records: Duration,
    pub breach: Duration,
    pub carrier: Duration,
    pub reputation: Duration,
}

impl CacheTtl {
    pub fn for_class(&self, class: ProbeClass) -> Duration {
        match class {
            ProbeClass::Presence => self.presence,
            ProbeClass::Records => self.records,
            ProbeClass::Breach => self.breach,
            ProbeClass::Carrier => self.carrier,
            ProbeClass::Reputation => self.reputation,
        }
    }

    pub fn for_probe(&self, probe: ProbeId) -> Duration {
        self.for_class(probe.class())
    }
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            presence: Duration::from_secs(24 * HOUR),
            records: Duration::from_secs(72 * HOUR),
            breach: Duration::from_secs(24 * HOUR),
            carrier: Duration::from_secs(7 * 24 * HOUR),
            reputation: Duration::from_secs(12 * HOUR),
        }
    }
}

/// Source of API credentials, consulted once when the configuration is built.
pub trait CredentialProvider: Send + Sync {
    fn credential(&self, probe: ProbeId) -> Option<String>;
}

/// Reads `OSINT_KEY_<PROBE_ID>` (e.g. `OSINT_KEY_BREACH_CHECK`).
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentialProvider;

impl EnvCredentialProvider {
    pub fn var_name(probe: ProbeId) -> String {
        format!("OSINT_KEY_{}", probe.as_str().to_ascii_uppercase())
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn credential(&self, probe: ProbeId) -> Option<String> {
        std::env::var(Self::var_name(probe))
            .ok()
            .filter(|s| !s.trim().is_empty())
    }
}

/// Probe id → API key. Keys never appear in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    keys: HashMap<ProbeId, String>,
}

impl Credentials {
    pub fn from_provider(provider: &dyn CredentialProvider) -> Self {
        let keys = ProbeId::ALL
            .into_iter()
            .filter_map(|id| provider.credential(id).map(|key| (id, key)))
            .collect();
        Self { keys }
    }

    pub fn with(mut self, probe: ProbeId, key: impl Into<String>) -> Self {
        self.keys.insert(probe, key.into());
        self
    }

    pub fn get(&self, probe: ProbeId) -> Option<&str> {
        self.keys.get(&probe).map(String::as_str)
    }

    pub fn has(&self, probe: ProbeId) -> bool {
        self.keys.contains_key(&probe)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut present: Vec<&str> = self.keys.keys().map(|id| id.as_str()).collect();
        present.sort();
        f.debug_struct("Credentials")
            .field("configured", &present)
            .finish()
    }
}

/// Base URLs of the external sources.
///
/// Presence probes hit well-known platform URLs unless a base URL is set, in
/// which case every platform is addressed as `{base}/{platform}/{digits}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEndpoints {
    pub carrier_url: String,
    pub breach_url: String,
    pub reputation_url: String,
    pub people_search_url: String,
    pub social_url: Option<String>,
    pub messaging_url: Option<String>,
}

impl Default for ProbeEndpoints {
    fn default() -> Self {
        Self {
            carrier_url: "http://apilayer.net/api".to_string(),
            breach_url: "https://haveibeenpwned.com/api/v3".to_string(),
            reputation_url: "https://www.ipqualityscore.com/api/json/phone".to_string(),
            people_search_url: "https://api.peopledatalabs.com/v5".to_string(),
            social_url: None,
            messaging_url: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub max_concurrent_probes: usize,
    pub max_concurrent_numbers: usize,
    /// Largest batch accepted by the HTTP batch endpoint.
    pub max_batch_size: usize,
    pub per_probe_timeout: Duration,
    pub cache_ttl: CacheTtl,
    pub enabled_probes: Vec<ProbeId>,
    pub credentials: Credentials,
    pub endpoints: ProbeEndpoints,
    pub validation_mode: ValidationMode,
    pub risk_weights: RiskWeights,
    pub hot_cache_capacity: u64,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            port: 3000,
            max_concurrent_probes: 8,
            max_concurrent_numbers: 4,
            max_batch_size: 100,
            per_probe_timeout: Duration::from_secs(10),
            cache_ttl: CacheTtl::default(),
            enabled_probes: ProbeId::ALL.to_vec(),
            credentials: Credentials::default(),
            endpoints: ProbeEndpoints::default(),
            validation_mode: ValidationMode::Strict,
            risk_weights: RiskWeights::default(),
            hot_cache_capacity: 10_000,
            user_agent: format!("phone-osint/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, OsintError> {
        Self::from_env_with(&EnvCredentialProvider)
    }

    /// Like [`Config::from_env`], with credentials taken from `provider`.
    pub fn from_env_with(provider: &dyn CredentialProvider) -> Result<Self, OsintError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let ttl = defaults.cache_ttl;
        let weights = defaults.risk_weights;

        let config = Self {
            database_url: env_or("OSINT_DB_URL", "sqlite://phone_osint.db?mode=rwc"),
            port: env_parse("OSINT_PORT", defaults.port)?,
            max_concurrent_probes: env_parse(
                "OSINT_MAX_CONCURRENT_PROBES",
                defaults.max_concurrent_probes,
            )?,
            max_concurrent_numbers: env_parse(
                "OSINT_MAX_CONCURRENT_NUMBERS",
                defaults.max_concurrent_numbers,
            )?,
            max_batch_size: env_parse("OSINT_MAX_BATCH_SIZE", defaults.max_batch_size)?,
            per_probe_timeout: Duration::from_millis(env_parse(
                "OSINT_PROBE_TIMEOUT_MS",
                defaults.per_probe_timeout.as_millis() as u64,
            )?),
            cache_ttl: CacheTtl {
                presence: env_secs("OSINT_TTL_PRESENCE_SECS", ttl.presence)?,
                records: env_secs("OSINT_TTL_RECORDS_SECS", ttl.records)?,
                breach: env_secs("OSINT_TTL_BREACH_SECS", ttl.breach)?,
                carrier: env_secs("OSINT_TTL_CARRIER_SECS", ttl.carrier)?,
                reputation: env_secs("OSINT_TTL_REPUTATION_SECS", ttl.reputation)?,
            },
            enabled_probes: match std::env::var("OSINT_ENABLED_PROBES") {
                Ok(list) if !list.trim().is_empty() => parse_probe_list(&list)?,
                _ => defaults.enabled_probes,
            },
            credentials: Credentials::from_provider(provider),
            endpoints: ProbeEndpoints {
                carrier_url: env_or("OSINT_CARRIER_URL", &defaults.endpoints.carrier_url),
                breach_url: env_or("OSINT_BREACH_URL", &defaults.endpoints.breach_url),
                reputation_url: env_or(
                    "OSINT_REPUTATION_URL",
                    &defaults.endpoints.reputation_url,
                ),
                people_search_url: env_or(
                    "OSINT_PEOPLE_SEARCH_URL",
                    &defaults.endpoints.people_search_url,
                ),
                social_url: env_opt("OSINT_SOCIAL_URL"),
                messaging_url: env_opt("OSINT_MESSAGING_URL"),
            },
            validation_mode: env_parse("OSINT_VALIDATION_MODE", defaults.validation_mode)?,
            risk_weights: RiskWeights {
                voip_line: env_parse("OSINT_WEIGHT_VOIP", weights.voip_line)?,
                prepaid_carrier: env_parse("OSINT_WEIGHT_PREPAID", weights.prepaid_carrier)?,
                high_risk_country: env_parse(
                    "OSINT_WEIGHT_HIGH_RISK_COUNTRY",
                    weights.high_risk_country,
                )?,
                spam_listing: env_parse("OSINT_WEIGHT_SPAM", weights.spam_listing)?,
                scam_pattern: env_parse("OSINT_WEIGHT_SCAM_PATTERN", weights.scam_pattern)?,
                breach_exposure: env_parse("OSINT_WEIGHT_BREACH", weights.breach_exposure)?,
            },
            hot_cache_capacity: env_parse("OSINT_HOT_CACHE_CAPACITY", defaults.hot_cache_capacity)?,
            user_agent: env_or("OSINT_USER_AGENT", &defaults.user_agent),
        };

        config.validate()?;

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!(
            "Probes enabled: {:?}, max concurrent: {}, timeout: {:?}",
            config.enabled_probes,
            config.max_concurrent_probes,
            config.per_probe_timeout
        );
        tracing::debug!("Credentials: {:?}", config.credentials);

        Ok(config)
    }

    /// Checks limits, URLs and the probe list.
    pub fn validate(&self) -> Result<(), OsintError> {
        if !self.database_url.starts_with("sqlite:") {
            return Err(OsintError::Configuration(
                "OSINT_DB_URL must start with sqlite:".to_string(),
            ));
        }
        if self.max_concurrent_probes == 0 {
            return Err(OsintError::Configuration(
                "OSINT_MAX_CONCURRENT_PROBES must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_numbers == 0 {
            return Err(OsintError::Configuration(
                "OSINT_MAX_CONCURRENT_NUMBERS must be at least 1".to_string(),
            ));
        }
        if self.max_batch_size == 0 {
            return Err(OsintError::Configuration(
                "OSINT_MAX_BATCH_SIZE must be at least 1".to_string(),
            ));
        }
        if self.per_probe_timeout.is_zero() {
            return Err(OsintError::Configuration(
                "OSINT_PROBE_TIMEOUT_MS must be at least 1".to_string(),
            ));
        }
        for class in ProbeClass::ALL {
            if self.cache_ttl.for_class(class).is_zero() {
                return Err(OsintError::Configuration(format!(
                    "cache TTL for {} probes must be at least 1 second",
                    class.as_str()
                )));
            }
        }

        let mut seen = self.enabled_probes.clone();
        seen.sort();
        seen.dedup();
        if seen.len() != self.enabled_probes.len() {
            return Err(OsintError::Configuration(
                "OSINT_ENABLED_PROBES lists a probe more than once".to_string(),
            ));
        }

        let endpoints = &self.endpoints;
        check_url("OSINT_CARRIER_URL", &endpoints.carrier_url)?;
        check_url("OSINT_BREACH_URL", &endpoints.breach_url)?;
        check_url("OSINT_REPUTATION_URL", &endpoints.reputation_url)?;
        check_url("OSINT_PEOPLE_SEARCH_URL", &endpoints.people_search_url)?;
        if let Some(ref url) = endpoints.social_url {
            check_url("OSINT_SOCIAL_URL", url)?;
        }
        if let Some(ref url) = endpoints.messaging_url {
            check_url("OSINT_MESSAGING_URL", url)?;
        }

        Ok(())
    }

    pub fn is_enabled(&self, probe: ProbeId) -> bool {
        self.enabled_probes.contains(&probe)
    }
}

fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T>(name: &str, default: T) -> Result<T, OsintError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env_opt(name) {
        Some(raw) => raw.parse().map_err(|e| {
            OsintError::Configuration(format!("{} has invalid value '{}': {}", name, raw, e))
        }),
        None => Ok(default),
    }
}

fn env_secs(name: &str, default: Duration) -> Result<Duration, OsintError> {
    env_parse(name, default.as_secs()).map(Duration::from_secs)
}

/// Parses a comma-separated list of probe ids.
pub fn parse_probe_list(list: &str) -> Result<Vec<ProbeId>, OsintError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<ProbeId>().map_err(OsintError::Configuration))
        .collect()
}

fn check_url(name: &str, raw: &str) -> Result<(), OsintError> {
    if !raw.starts_with("http://") && !raw.starts_with("https://") {
        return Err(OsintError::Configuration(format!(
            "{} must start with http:// or https://",
            name
        )));
    }
    url::Url::parse(raw)
        .map(|_| ())
        .map_err(|e| OsintError::Configuration(format!("{} is not a valid URL: {}", name, e)))
}
