use crate::config::{Config, ProbeEndpoints};
use crate::errors::OsintError;
use crate::models::{CanonicalNumber, ProbeId, ProbeResult, ProbeStatus};
use crate::probes::{ProbeFailure, SourceProbe};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Builds the shared HTTP client used by every probe.
pub fn build_http_client(config: &Config) -> Result<Client, OsintError> {
    Ok(Client::builder()
        .user_agent(config.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?)
}

/// Instantiates the enabled probes, in probe id order.
pub fn default_probes(config: &Config, client: Client) -> Vec<Arc<dyn SourceProbe>> {
    let endpoints = &config.endpoints;
    let mut enabled = config.enabled_probes.clone();
    enabled.sort();

    enabled
        .into_iter()
        .map(|id| -> Arc<dyn SourceProbe> {
            match id {
                ProbeId::BreachCheck => Arc::new(BreachCheckProbe::new(client.clone(), endpoints)),
                ProbeId::CarrierLookup => {
                    Arc::new(CarrierLookupProbe::new(client.clone(), endpoints))
                }
                ProbeId::MessagingPresence => {
                    Arc::new(MessagingPresenceProbe::new(client.clone(), endpoints))
                }
                ProbeId::PeopleSearch => Arc::new(PeopleSearchProbe::new(client.clone(), endpoints)),
                ProbeId::ReputationLookup => {
                    Arc::new(ReputationLookupProbe::new(client.clone(), endpoints))
                }
                ProbeId::SocialPresence => {
                    Arc::new(SocialPresenceProbe::new(client.clone(), endpoints))
                }
            }
        })
        .collect()
}

fn require(credential: Option<&str>) -> Result<&str, ProbeFailure> {
    credential
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(ProbeFailure::MissingCredentials)
}

/// Fails on any non-success status, logging the start of the body.
async fn check_status(probe: ProbeId, response: Response) -> Result<Response, ProbeFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    tracing::warn!(
        "{} returned error {}: {}",
        probe,
        status,
        error_text.chars().take(200).collect::<String>()
    );
    Err(ProbeFailure::Http {
        status: status.as_u16(),
    })
}

fn digits(number: &CanonicalNumber) -> String {
    number.e164().trim_start_matches('+').to_string()
}

// ============ Carrier Lookup ============

#[derive(Debug, Deserialize)]
struct CarrierResponse {
    #[serde(default)]
    valid: Option<bool>,
    #[serde(default)]
    carrier: Option<String>,
    #[serde(default)]
    line_type: Option<String>,
    #[serde(default)]
    prepaid: Option<bool>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<Value>,
}

/// numverify-style validation API: carrier name and line type.
pub struct CarrierLookupProbe {
    client: Client,
    base_url: String,
}

impl CarrierLookupProbe {
    pub fn new(client: Client, endpoints: &ProbeEndpoints) -> Self {
        Self {
            client,
            base_url: endpoints.carrier_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SourceProbe for CarrierLookupProbe {
    fn id(&self) -> ProbeId {
        ProbeId::CarrierLookup
    }

    async fn execute(
        &self,
        number: &CanonicalNumber,
        credential: Option<&str>,
    ) -> Result<ProbeResult, ProbeFailure> {
        let key = require(credential)?;
        let digits = digits(number);

        // Build URL with proper parameter encoding
        let url = reqwest::Url::parse_with_params(
            &format!("{}/validate", self.base_url),
            &[("access_key", key), ("number", digits.as_str()), ("format", "1")],
        )
        .map_err(|e| ProbeFailure::Api(format!("Failed to build URL: {}", e)))?;

        // Redact key from logs to prevent credential exposure
        tracing::debug!(
            "Carrier lookup URL: {}/validate?access_key=[REDACTED]&number={}",
            self.base_url,
            digits
        );

        let response = self.client.get(url).send().await?;
        let response = check_status(self.id(), response).await?;
        let body: CarrierResponse = response.json().await?;

        if body.success == Some(false) || body.error.is_some() {
            let detail = body
                .error
                .as_ref()
                .and_then(|e| e.get("type").or_else(|| e.get("info")))
                .and_then(|v| v.as_str())
                .unwrap_or("unspecified")
                .to_string();
            return Err(ProbeFailure::Api(detail));
        }

        if !body.valid.unwrap_or(false) {
            return Ok(ProbeResult::fetched(
                self.id(),
                ProbeStatus::NotFound,
                json!({ "valid": false }),
                0.8,
            ));
        }

        let carrier = body.carrier.filter(|c| !c.trim().is_empty());
        let line_type = body
            .line_type
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty());
        let prepaid = body.prepaid.unwrap_or_else(|| {
            carrier
                .as_deref()
                .map(|c| c.to_ascii_lowercase().contains("prepaid"))
                .unwrap_or(false)
        });

        tracing::info!(
            "Carrier lookup for {}: {:?} ({:?})",
            number,
            carrier,
            line_type
        );

        Ok(ProbeResult::fetched(
            self.id(),
            ProbeStatus::Found,
            json!({
                "carrier": carrier,
                "line_type": line_type,
                "prepaid": prepaid,
                "country_code": body.country_code,
                "location": body.location.filter(|l| !l.is_empty()),
            }),
            0.9,
        ))
    }
}

// ============ Breach Check ============

#[derive(Debug, Deserialize)]
struct BreachEntry {
    #[serde(rename = "Name", alias = "name")]
    name: String,
}

/// haveibeenpwned-style breached-account API. `404` means no breach.
pub struct BreachCheckProbe {
    client: Client,
    base_url: String,
}

impl BreachCheckProbe {
    pub fn new(client: Client, endpoints: &ProbeEndpoints) -> Self {
        Self {
            client,
            base_url: endpoints.breach_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SourceProbe for BreachCheckProbe {
    fn id(&self) -> ProbeId {
        ProbeId::BreachCheck
    }

    async fn execute(
        &self,
        number: &CanonicalNumber,
        credential: Option<&str>,
    ) -> Result<ProbeResult, ProbeFailure> {
        let key = require(credential)?;
        let account = number.e164();
        let url = reqwest::Url::parse_with_params(
            &format!("{}/breachedaccount/{}", self.base_url, digits(number)),
            &[("truncateResponse", "true")],
        )
        .map_err(|e| ProbeFailure::Api(format!("Failed to build URL: {}", e)))?;

        tracing::debug!("Breach check URL: {}", url);

        let response = self
            .client
            .get(url)
            .header("hibp-api-key", key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::info!("No breaches recorded for {}", account);
            return Ok(ProbeResult::fetched(
                self.id(),
                ProbeStatus::NotFound,
                json!({ "breaches": [], "count": 0 }),
                0.8,
            ));
        }

        let response = check_status(self.id(), response).await?;
        let entries: Vec<BreachEntry> = response.json().await?;
        let mut names: Vec<String> = entries.into_iter().map(|e| e.name).collect();
        names.sort();
        names.dedup();

        tracing::info!("{} appears in {} breach(es)", account, names.len());

        let status = if names.is_empty() {
            ProbeStatus::NotFound
        } else {
            ProbeStatus::Found
        };
        Ok(ProbeResult::fetched(
            self.id(),
            status,
            json!({ "count": names.len(), "breaches": names }),
            0.95,
        ))
    }
}

// ============ Reputation Lookup ============

#[derive(Debug, Deserialize)]
struct ReputationResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, alias = "fraud_score")]
    spam_score: Option<u32>,
    #[serde(default)]
    reports: Option<u32>,
    #[serde(default, alias = "spammer")]
    listed: Option<bool>,
}

/// Spam-reputation API (IPQualityScore-style path key).
pub struct ReputationLookupProbe {
    client: Client,
    base_url: String,
}

impl ReputationLookupProbe {
    /// Scores above this count as a listing.
    pub const SPAM_THRESHOLD: u32 = 50;

    pub fn new(client: Client, endpoints: &ProbeEndpoints) -> Self {
        Self {
            client,
            base_url: endpoints.reputation_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SourceProbe for ReputationLookupProbe {
    fn id(&self) -> ProbeId {
        ProbeId::ReputationLookup
    }

    async fn execute(
        &self,
        number: &CanonicalNumber,
        credential: Option<&str>,
    ) -> Result<ProbeResult, ProbeFailure> {
        let key = require(credential)?;
        let digits = digits(number);
        let url = reqwest::Url::parse_with_params(
            &format!("{}/{}/{}", self.base_url, key, digits),
            &[("strictness", "1")],
        )
        .map_err(|e| ProbeFailure::Api(format!("Failed to build URL: {}", e)))?;

        tracing::debug!(
            "Reputation URL: {}/[REDACTED]/{}?strictness=1",
            self.base_url,
            digits
        );

        let response = self.client.get(url).send().await?;
        let response = check_status(self.id(), response).await?;
        let body: ReputationResponse = response.json().await?;

        if body.success == Some(false) {
            return Err(ProbeFailure::Api(
                body.message.unwrap_or_else(|| "unspecified".to_string()),
            ));
        }

        let spam_score = body.spam_score.unwrap_or(0).min(100);
        let reports = body.reports.unwrap_or(0);
        let listed = body.listed.unwrap_or(false) || spam_score > Self::SPAM_THRESHOLD;

        tracing::info!(
            "Reputation for {}: score {}, {} report(s), listed: {}",
            number,
            spam_score,
            reports,
            listed
        );

        Ok(ProbeResult::fetched(
            self.id(),
            if listed {
                ProbeStatus::Found
            } else {
                ProbeStatus::NotFound
            },
            json!({ "spam_score": spam_score, "reports": reports, "listed": listed }),
            0.85,
        ))
    }
}

// ============ People Search ============

#[derive(Debug, Deserialize)]
struct PeopleSearchResponse {
    #[serde(default)]
    likelihood: Option<u32>,
    #[serde(default)]
    data: Option<Value>,
}

/// Public-records enrichment API (People Data Labs-style).
pub struct PeopleSearchProbe {
    client: Client,
    base_url: String,
}

impl PeopleSearchProbe {
    pub fn new(client: Client, endpoints: &ProbeEndpoints) -> Self {
        Self {
            client,
            base_url: endpoints.people_search_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SourceProbe for PeopleSearchProbe {
    fn id(&self) -> ProbeId {
        ProbeId::PeopleSearch
    }

    async fn execute(
        &self,
        number: &CanonicalNumber,
        credential: Option<&str>,
    ) -> Result<ProbeResult, ProbeFailure> {
        let key = require(credential)?;
        let url = reqwest::Url::parse_with_params(
            &format!("{}/person/enrich", self.base_url),
            &[("phone", number.e164())],
        )
        .map_err(|e| ProbeFailure::Api(format!("Failed to build URL: {}", e)))?;

        tracing::debug!("People search URL: {}", url);

        let response = self
            .client
            .get(url)
            .header("X-Api-Key", key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(ProbeResult::fetched(
                self.id(),
                ProbeStatus::NotFound,
                json!({ "records": 0 }),
                0.7,
            ));
        }

        let response = check_status(self.id(), response).await?;
        let body: PeopleSearchResponse = response.json().await?;

        let Some(data) = body.data.filter(|d| d.as_object().is_some_and(|o| !o.is_empty()))
        else {
            return Ok(ProbeResult::fetched(
                self.id(),
                ProbeStatus::NotFound,
                json!({ "records": 0 }),
                0.7,
            ));
        };

        let likelihood = body.likelihood.unwrap_or(5).min(10);
        let field = |name: &str| data.get(name).cloned().unwrap_or(Value::Null);

        tracing::info!("People search matched a record for {}", number);

        Ok(ProbeResult::fetched(
            self.id(),
            ProbeStatus::Found,
            json!({
                "records": 1,
                "likelihood": likelihood,
                "full_name": field("full_name"),
                "location": field("location_name"),
                "job_title": field("job_title"),
                "emails": field("emails"),
            }),
            f64::from(likelihood) / 10.0,
        ))
    }
}

// ============ Presence checks ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verification {
    /// `200` and the page does not contain the marker text.
    PageWithout(&'static str),
    /// `200` is enough.
    Reachable,
    /// Deep link only; cannot be checked over HTTP.
    Unverifiable,
}

struct Platform {
    name: &'static str,
    slug: &'static str,
    template: &'static str,
    verification: Verification,
}

impl Platform {
    /// `{cc}` and `{national}` are substituted; a base URL override replaces the
    /// whole template with `{base}/{slug}/{cc}{national}`.
    fn url(&self, number: &CanonicalNumber, base: Option<&str>) -> String {
        let cc = number.country_code().to_string();
        let national = number.national_number();
        match base {
            Some(base) => format!("{}/{}/{}{}", base.trim_end_matches('/'), self.slug, cc, national),
            None => self
                .template
                .replace("{cc}", &cc)
                .replace("{national}", national),
        }
    }
}

const SOCIAL_PLATFORMS: &[Platform] = &[
    Platform {
        name: "Facebook",
        slug: "facebook",
        template: "https://www.facebook.com/search/top?q={national}",
        verification: Verification::PageWithout("not found"),
    },
    Platform {
        name: "Twitter",
        slug: "twitter",
        template: "https://twitter.com/search?q={national}",
        verification: Verification::PageWithout("not found"),
    },
    Platform {
        name: "Instagram",
        slug: "instagram",
        template: "https://www.instagram.com/accounts/account_recovery/?phone_number={national}",
        verification: Verification::PageWithout("not found"),
    },
    Platform {
        name: "LinkedIn",
        slug: "linkedin",
        template: "https://www.linkedin.com/search/results/all/?keywords={national}",
        verification: Verification::PageWithout("not found"),
    },
    Platform {
        name: "TikTok",
        slug: "tiktok",
        template: "https://www.tiktok.com/search?q={national}",
        verification: Verification::PageWithout("not found"),
    },
    Platform {
        name: "Reddit",
        slug: "reddit",
        template: "https://www.reddit.com/search/?q={national}",
        verification: Verification::PageWithout("not found"),
    },
];

const MESSAGING_PLATFORMS: &[Platform] = &[
    Platform {
        name: "WhatsApp",
        slug: "whatsapp",
        template: "https://wa.me/{cc}{national}",
        verification: Verification::PageWithout("invalid"),
    },
    Platform {
        name: "Telegram",
        slug: "telegram",
        template: "https://t.me/+{cc}{national}",
        verification: Verification::Reachable,
    },
    Platform {
        name: "Signal",
        slug: "signal",
        template: "https://signal.me/#p/+{cc}{national}",
        verification: Verification::Unverifiable,
    },
    Platform {
        name: "Viber",
        slug: "viber",
        template: "viber://add?number={cc}{national}",
        verification: Verification::Unverifiable,
    },
];

/// Checks every platform concurrently; one slot of the scheduler's budget.
async fn check_platforms(
    client: &Client,
    probe: ProbeId,
    platforms: &[Platform],
    number: &CanonicalNumber,
    base: Option<&str>,
) -> Result<ProbeResult, ProbeFailure> {
    let checks = platforms.iter().map(|platform| {
        let url = platform.url(number, base);
        async move {
            let verified = match platform.verification {
                Verification::Unverifiable => Ok(false),
                verification => verify_page(client, &url, verification).await,
            };
            (platform, url, verified)
        }
    });
    let outcomes = join_all(checks).await;

    let checkable = platforms
        .iter()
        .filter(|p| p.verification != Verification::Unverifiable)
        .count();
    let mut errors = Vec::new();
    let mut entries = Vec::with_capacity(outcomes.len());
    let mut any_verified = false;

    for (platform, url, verified) in outcomes {
        let verified = match verified {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!("{} check for {} failed: {}", platform.name, number, e);
                errors.push(e);
                false
            }
        };
        any_verified |= verified;
        entries.push(json!({
            "name": platform.name,
            "url": url,
            "verified": verified,
            "checked": platform.verification != Verification::Unverifiable,
        }));
    }

    if checkable > 0 && errors.len() == checkable {
        // Nothing could be checked: report the first failure rather than "absent".
        return Err(errors.swap_remove(0));
    }

    tracing::info!(
        "{} for {}: {} platform(s) verified",
        probe,
        number,
        entries.iter().filter(|e| e["verified"] == json!(true)).count()
    );

    Ok(ProbeResult::fetched(
        probe,
        if any_verified {
            ProbeStatus::Found
        } else {
            ProbeStatus::NotFound
        },
        json!({ "platforms": entries }),
        if any_verified { 0.6 } else { 0.4 },
    ))
}

async fn verify_page(
    client: &Client,
    url: &str,
    verification: Verification,
) -> Result<bool, ProbeFailure> {
    let response = client.get(url).send().await?;
    if response.status() != StatusCode::OK {
        return Ok(false);
    }
    match verification {
        Verification::PageWithout(marker) => {
            let body = response.text().await?;
            Ok(!body.to_lowercase().contains(marker))
        }
        Verification::Reachable => Ok(true),
        Verification::Unverifiable => Ok(false),
    }
}

/// Public profile/search pages on social networks. No credential.
pub struct SocialPresenceProbe {
    client: Client,
    base_url: Option<String>,
}

impl SocialPresenceProbe {
    pub fn new(client: Client, endpoints: &ProbeEndpoints) -> Self {
        Self {
            client,
            base_url: endpoints.social_url.clone(),
        }
    }
}

#[async_trait]
impl SourceProbe for SocialPresenceProbe {
    fn id(&self) -> ProbeId {
        ProbeId::SocialPresence
    }

    async fn execute(
        &self,
        number: &CanonicalNumber,
        _credential: Option<&str>,
    ) -> Result<ProbeResult, ProbeFailure> {
        check_platforms(
            &self.client,
            self.id(),
            SOCIAL_PLATFORMS,
            number,
            self.base_url.as_deref(),
        )
        .await
    }
}

/// WhatsApp and Telegram click-to-chat links, plus unverified deep links.
pub struct MessagingPresenceProbe {
    client: Client,
    base_url: Option<String>,
}

impl MessagingPresenceProbe {
    pub fn new(client: Client, endpoints: &ProbeEndpoints) -> Self {
        Self {
            client,
            base_url: endpoints.messaging_url.clone(),
        }
    }
}

#[async_trait]
impl SourceProbe for MessagingPresenceProbe {
    fn id(&self) -> ProbeId {
        ProbeId::MessagingPresence
    }

    async fn execute(
        &self,
        number: &CanonicalNumber,
        _credential: Option<&str>,
    ) -> Result<ProbeResult, ProbeFailure> {
        check_platforms(
            &self.client,
            self.id(),
            MESSAGING_PLATFORMS,
            number,
            self.base_url.as_deref(),
        )
        .await
    }
}
