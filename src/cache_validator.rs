use crate::models::{ProbeId, ProbeStatus};
use sha2::{Digest, Sha256};

/// Integrity checksums for persisted probe results.
///
/// A checksum is computed when a result is written and recomputed on read;
/// a mismatch means the row was corrupted or edited out-of-band and the entry
/// is treated as a cache miss.
///
/// The digest covers the key, the status, the confidence, the stored timestamp
/// and the payload, so neither a payload moved to another number or probe nor
/// a rewritten `fetched_at` passes.
pub struct CacheChecksum;

impl CacheChecksum {
    /// SHA-256 over `number|probe|status|confidence|fetched_at|payload`, hex encoded.
    ///
    /// `fetched_at` is the RFC 3339 string exactly as stored.
    pub fn compute(
        canonical_number: &str,
        probe: ProbeId,
        status: ProbeStatus,
        confidence: f64,
        fetched_at: &str,
        payload: &str,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(canonical_number.as_bytes());
        hasher.update(b"|");
        hasher.update(probe.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(status.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(confidence.to_bits().to_be_bytes());
        hasher.update(b"|");
        hasher.update(fetched_at.as_bytes());
        hasher.update(b"|");
        hasher.update(payload.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Returns true if `checksum` matches the recomputed digest.
    pub fn verify(
        checksum: &str,
        canonical_number: &str,
        probe: ProbeId,
        status: ProbeStatus,
        confidence: f64,
        fetched_at: &str,
        payload: &str,
    ) -> bool {
        let computed =
            Self::compute(canonical_number, probe, status, confidence, fetched_at, payload);
        if computed != checksum {
            tracing::warn!(
                "Cache validation failed for {}/{}: checksum mismatch (payload length {})",
                canonical_number,
                probe,
                payload.len()
            );
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUMBER: &str = "+5511987654321";
    const PAYLOAD: &str = r#"{"carrier":"Vivo"}"#;
    const AT: &str = "2026-10-16T12:00:00.000Z";

    #[test]
    fn test_checksum_roundtrip() {
        let sum = CacheChecksum::compute(NUMBER, ProbeId::CarrierLookup, ProbeStatus::Found, 0.9, AT, PAYLOAD);
        assert_eq!(sum.len(), 64);
        assert!(CacheChecksum::verify(&sum, NUMBER, ProbeId::CarrierLookup, ProbeStatus::Found, 0.9, AT, PAYLOAD));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let sum = CacheChecksum::compute(NUMBER, ProbeId::CarrierLookup, ProbeStatus::Found, 0.9, AT, PAYLOAD);
        assert!(!CacheChecksum::verify(
            &sum,
            NUMBER,
            ProbeId::CarrierLookup,
            ProbeStatus::Found,
            0.9,
            AT,
            r#"{"carrier":"Claro"}"#
        ));
    }

    #[test]
    fn test_payload_bound_to_key() {
        let sum = CacheChecksum::compute(NUMBER, ProbeId::CarrierLookup, ProbeStatus::Found, 0.9, AT, PAYLOAD);
        assert!(!CacheChecksum::verify(&sum, "+5511900000000", ProbeId::CarrierLookup, ProbeStatus::Found, 0.9, AT, PAYLOAD));
        assert!(!CacheChecksum::verify(&sum, NUMBER, ProbeId::PeopleSearch, ProbeStatus::Found, 0.9, AT, PAYLOAD));
        assert!(!CacheChecksum::verify(&sum, NUMBER, ProbeId::CarrierLookup, ProbeStatus::NotFound, 0.9, AT, PAYLOAD));
    }

    #[test]
    fn test_rewritten_timestamp_rejected() {
        let sum = CacheChecksum::compute(NUMBER, ProbeId::CarrierLookup, ProbeStatus::Found, 0.9, AT, PAYLOAD);
        assert!(!CacheChecksum::verify(
            &sum,
            NUMBER,
            ProbeId::CarrierLookup,
            ProbeStatus::Found,
            0.9,
            "2099-01-01T00:00:00.000Z",
            PAYLOAD
        ));
    }

    #[test]
    fn test_checksum_consistency() {
        let a = CacheChecksum::compute(NUMBER, ProbeId::BreachCheck, ProbeStatus::NotFound, 0.5, AT, "{}");
        let b = CacheChecksum::compute(NUMBER, ProbeId::BreachCheck, ProbeStatus::NotFound, 0.5, AT, "{}");
        assert_eq!(a, b);
    }
}
