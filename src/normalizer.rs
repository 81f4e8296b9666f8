use crate::errors::OsintError;
use crate::models::{CanonicalNumber, LineType};
use phonenumber::{country, Mode, PhoneNumber};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Digits, spaces, `+ ( ) . - /` and keypad letters.
static ALLOWED_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Za-z \t+().\-/]+$").expect("static pattern compiles")
});

/// How strictly parsed numbers are checked against the numbering plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// The number must be valid for its numbering plan.
    #[default]
    Strict,
    /// Any parseable number with a 4–14 digit national number is accepted.
    Lenient,
}

impl FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ValidationMode::Strict),
            "lenient" => Ok(ValidationMode::Lenient),
            other => Err(format!("expected 'strict' or 'lenient', got '{}'", other)),
        }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationMode::Strict => f.write_str("strict"),
            ValidationMode::Lenient => f.write_str("lenient"),
        }
    }
}

/// Turns raw user input into a [`CanonicalNumber`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberNormalizer {
    mode: ValidationMode,
}

impl NumberNormalizer {
    pub fn new(mode: ValidationMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Parses `raw`, using `country_hint` (ISO 3166 alpha-2) for numbers
    /// written without an international prefix.
    ///
    /// Candidates are tried in order: the input as written under the hint, then
    /// the input read as international. The first candidate that passes
    /// validation wins.
    pub fn normalize(
        &self,
        raw: &str,
        country_hint: Option<&str>,
    ) -> Result<CanonicalNumber, OsintError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(OsintError::InvalidNumber("empty input".to_string()));
        }
        if !ALLOWED_INPUT.is_match(trimmed) || !trimmed.chars().any(|c| c.is_ascii_digit()) {
            return Err(OsintError::InvalidNumber(format!(
                "'{}' contains characters that cannot appear in a phone number",
                trimmed
            )));
        }

        let hint = match country_hint.map(str::trim).filter(|h| !h.is_empty()) {
            Some(code) => Some(
                code.to_ascii_uppercase()
                    .parse::<country::Id>()
                    .map_err(|_| {
                        OsintError::InvalidNumber(format!("unknown country hint '{}'", code))
                    })?,
            ),
            None => None,
        };

        let dialable = keypad_to_digits(trimmed);
        let international = to_international(&dialable);

        let mut candidates: Vec<(Option<country::Id>, String)> = Vec::new();
        if let Some(ref intl) = international {
            candidates.push((None, intl.clone()));
        } else {
            if hint.is_some() {
                candidates.push((hint, dialable.clone()));
            }
            candidates.push((None, format!("+{}", digits_only(&dialable))));
        }

        let mut last_error = String::from("no candidate country");
        for (region, text) in candidates {
            match phonenumber::parse(region, &text) {
                Ok(number) => match self.accept(&number) {
                    Ok(canonical) => {
                        tracing::debug!("Normalized '{}' → {}", raw, canonical.e164());
                        return Ok(canonical);
                    }
                    Err(reason) => last_error = reason,
                },
                Err(e) => last_error = format!("parse error: {:?}", e),
            }
        }

        tracing::debug!("Rejected '{}': {}", raw, last_error);
        Err(OsintError::InvalidNumber(format!("'{}': {}", trimmed, last_error)))
    }

    fn accept(&self, number: &PhoneNumber) -> Result<CanonicalNumber, String> {
        let valid = phonenumber::is_valid(number);
        let e164 = number.format().mode(Mode::E164).to_string();
        let country_code = number.code().value();
        let national_number = e164
            .strip_prefix(&format!("+{}", country_code))
            .unwrap_or_default()
            .to_string();

        match self.mode {
            ValidationMode::Strict if !valid => {
                return Err("not a valid number for its numbering plan".to_string())
            }
            ValidationMode::Lenient if !valid => {
                if !(4..=14).contains(&national_number.len()) {
                    return Err(format!(
                        "national number must have 4-14 digits, got {}",
                        national_number.len()
                    ));
                }
            }
            _ => {}
        }

        let line_type = if valid {
            classify_line(number)
        } else {
            LineType::Unknown
        };
        let region = number.country().id().map(|id| format!("{:?}", id));
        let international = number.format().mode(Mode::International).to_string();

        Ok(CanonicalNumber::new(
            e164,
            international,
            country_code,
            national_number,
            region.clone(),
            line_type,
            timezones_for(country_code, region.as_deref()),
        ))
    }
}

fn classify_line(number: &PhoneNumber) -> LineType {
    use phonenumber::Type;

    match number.number_type(&phonenumber::metadata::DATABASE) {
        Type::Mobile => LineType::Mobile,
        Type::FixedLine => LineType::Landline,
        Type::Voip => LineType::Voip,
        _ => LineType::Unknown,
    }
}

/// Maps keypad letters to their digits (`1-800-FLOWERS` → `1-800-3569377`).
pub fn keypad_to_digits(input: &str) -> String {
    input
        .chars()
        .map(|c| keypad_digit(c).unwrap_or(c))
        .collect()
}

pub(crate) fn keypad_digit(c: char) -> Option<char> {
    let digit = match c.to_ascii_uppercase() {
        'A' | 'B' | 'C' => '2',
        'D' | 'E' | 'F' => '3',
        'G' | 'H' | 'I' => '4',
        'J' | 'K' | 'L' => '5',
        'M' | 'N' | 'O' => '6',
        'P' | 'Q' | 'R' | 'S' => '7',
        'T' | 'U' | 'V' => '8',
        'W' | 'X' | 'Y' | 'Z' => '9',
        _ => return None,
    };
    Some(digit)
}

fn digits_only(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// `+…` and `00…` inputs are international; everything else is national.
fn to_international(input: &str) -> Option<String> {
    if input.starts_with('+') {
        return Some(format!("+{}", digits_only(input)));
    }
    let digits = digits_only(input);
    digits
        .strip_prefix("00")
        .filter(|rest| !rest.is_empty() && input.trim_start().starts_with("00"))
        .map(|rest| format!("+{}", rest))
}

/// Timezones by region, falling back to the calling code for shared plans.
fn timezones_for(country_code: u16, region: Option<&str>) -> Vec<String> {
    let zones: &[&str] = match (region, country_code) {
        (Some("US"), _) => &[
            "America/Chicago",
            "America/Denver",
            "America/Los_Angeles",
            "America/New_York",
            "Pacific/Honolulu",
        ],
        (Some("CA"), _) => &[
            "America/Edmonton",
            "America/Halifax",
            "America/Toronto",
            "America/Vancouver",
        ],
        (Some("KZ"), _) => &["Asia/Almaty"],
        (_, 7) => &["Europe/Moscow", "Asia/Yekaterinburg", "Asia/Novosibirsk", "Asia/Vladivostok"],
        (_, 1) => &["America/New_York"],
        (_, 20) => &["Africa/Cairo"],
        (_, 27) => &["Africa/Johannesburg"],
        (_, 31) => &["Europe/Amsterdam"],
        (_, 32) => &["Europe/Brussels"],
        (_, 33) => &["Europe/Paris"],
        (_, 34) => &["Europe/Madrid"],
        (_, 39) => &["Europe/Rome"],
        (_, 41) => &["Europe/Zurich"],
        (_, 44) => &["Europe/London"],
        (_, 48) => &["Europe/Warsaw"],
        (_, 49) => &["Europe/Berlin"],
        (_, 52) => &["America/Mexico_City"],
        (_, 54) => &["America/Argentina/Buenos_Aires"],
        (_, 55) => &["America/Sao_Paulo", "America/Manaus", "America/Noronha"],
        (_, 61) => &["Australia/Sydney", "Australia/Perth", "Australia/Adelaide"],
        (_, 62) => &["Asia/Jakarta"],
        (_, 63) => &["Asia/Manila"],
        (_, 81) => &["Asia/Tokyo"],
        (_, 82) => &["Asia/Seoul"],
        (_, 86) => &["Asia/Shanghai"],
        (_, 90) => &["Europe/Istanbul"],
        (_, 91) => &["Asia/Kolkata"],
        (_, 92) => &["Asia/Karachi"],
        (_, 234) => &["Africa/Lagos"],
        (_, 351) => &["Europe/Lisbon"],
        (_, 375) => &["Europe/Minsk"],
        (_, 380) => &["Europe/Kyiv"],
        (_, 972) => &["Asia/Jerusalem"],
        _ => &[],
    };
    zones.iter().map(|z| z.to_string()).collect()
}
