//! Webhook signature verification.
//!
//! The sender signs `"{t}.{body}"` with HMAC-SHA256 and delivers
//! `t=<unix seconds>,v1=<base64url digest>` in a request header.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing webhook signature")]
    Missing,
    #[error("malformed webhook signature")]
    Malformed,
    #[error("webhook signature does not match")]
    Mismatch,
    #[error("webhook signature timestamp outside tolerance")]
    Expired,
    #[error("webhook secret cannot be used as an HMAC key")]
    InvalidKey,
}

#[derive(Debug, PartialEq, Eq)]
struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

#[derive(Clone)]
pub struct SignatureVerifier {
    mac: HmacSha256,
    tolerance: Option<Duration>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(secret: &[u8], tolerance: Option<Duration>) -> Result<Self, SignatureError> {
        let mac = <HmacSha256 as KeyInit>::new_from_slice(secret)
            .map_err(|_| SignatureError::InvalidKey)?;
        Ok(Self { mac, tolerance })
    }

    pub fn verify(&self, header: Option<&str>, body: &[u8]) -> Result<(), SignatureError> {
        self.verify_at(header, body, OffsetDateTime::now_utc())
    }

    pub fn verify_at(
        &self,
        header: Option<&str>,
        body: &[u8],
        now: OffsetDateTime,
    ) -> Result<(), SignatureError> {
        let header = header
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(SignatureError::Missing)?;
        let parsed = parse_header(header).ok_or(SignatureError::Malformed)?;

        if let Some(tolerance) = self.tolerance {
            let skew = now.unix_timestamp().abs_diff(parsed.timestamp);
            if skew > tolerance.as_secs() {
                return Err(SignatureError::Expired);
            }
        }

        let expected = self.digest(parsed.timestamp, body);
        let matched = parsed
            .signatures
            .iter()
            .any(|candidate| expected.as_slice().ct_eq(candidate.as_slice()).unwrap_u8() == 1);
        if !matched {
            return Err(SignatureError::Mismatch);
        }
        Ok(())
    }

    /// Header value a sender would deliver for `body` at `timestamp`.
    pub fn sign(&self, timestamp: i64, body: &[u8]) -> String {
        let digest = self.digest(timestamp, body);
        format!("t={timestamp},v1={}", URL_SAFE_NO_PAD.encode(digest))
    }

    fn digest(&self, timestamp: i64, body: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        mac.finalize().into_bytes().to_vec()
    }
}

fn parse_header(header: &str) -> Option<ParsedHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let (key, value) = part.split_once('=')?;
        match key.trim() {
            "t" => timestamp = Some(value.trim().parse::<i64>().ok()?),
            "v1" => {
                let encoded = value.trim().trim_end_matches('=');
                signatures.push(URL_SAFE_NO_PAD.decode(encoded).ok()?);
            }
            _ => {}
        }
    }

    if signatures.is_empty() {
        return None;
    }
    Some(ParsedHeader {
        timestamp: timestamp?,
        signatures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"_id":"post-1","_type":"post"}"#;

    fn verifier(tolerance: Option<Duration>) -> SignatureVerifier {
        SignatureVerifier::new(b"top-secret", tolerance).expect("verifier")
    }

    fn at(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(seconds).expect("timestamp")
    }

    #[test]
    fn signed_body_verifies() {
        let verifier = verifier(None);
        let header = verifier.sign(1_700_000_000, BODY);
        assert_eq!(verifier.verify_at(Some(&header), BODY, at(1_700_000_000)), Ok(()));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let verifier = verifier(None);
        let header = verifier.sign(1_700_000_000, BODY);
        let err = verifier
            .verify_at(Some(&header), br#"{"_id":"post-2"}"#, at(1_700_000_000))
            .expect_err("tampered");
        assert_eq!(err, SignatureError::Mismatch);
    }

    #[test]
    fn other_secret_is_rejected() {
        let header = SignatureVerifier::new(b"someone-else", None)
            .expect("verifier")
            .sign(1_700_000_000, BODY);
        assert_eq!(
            verifier(None).verify_at(Some(&header), BODY, at(1_700_000_000)),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn missing_and_malformed_headers() {
        let verifier = verifier(None);
        assert_eq!(verifier.verify(None, BODY), Err(SignatureError::Missing));
        assert_eq!(verifier.verify(Some("  "), BODY), Err(SignatureError::Missing));
        assert_eq!(
            verifier.verify(Some("v1=abc"), BODY),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verifier.verify(Some("t=12,v1=***"), BODY),
            Err(SignatureError::Malformed)
        );
        assert_eq!(verifier.verify(Some("garbage"), BODY), Err(SignatureError::Malformed));
    }

    #[test]
    fn tolerance_rejects_stale_signatures() {
        let verifier = verifier(Some(Duration::from_secs(300)));
        let header = verifier.sign(1_700_000_000, BODY);

        assert_eq!(verifier.verify_at(Some(&header), BODY, at(1_700_000_200)), Ok(()));
        assert_eq!(
            verifier.verify_at(Some(&header), BODY, at(1_700_000_301)),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn any_matching_v1_is_accepted() {
        let verifier = verifier(None);
        let good = verifier.sign(42, BODY);
        let good_sig = good.split_once("v1=").map(|(_, sig)| sig).expect("sig");
        let header = format!("t=42,v1=AAAA,v1={good_sig}");
        assert_eq!(verifier.verify_at(Some(&header), BODY, at(42)), Ok(()));
    }
}
