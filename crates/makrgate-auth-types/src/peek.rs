//! Unverified JWT segment decoding, for logging context and expiry
//! checks only. Never a substitute for signature validation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};

fn segments(token: &str) -> Option<[&str; 3]> {
    let mut parts = token.split('.');
    let header = parts.next()?;
    let payload = parts.next()?;
    let signature = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some([header, payload, signature])
}

fn decode_segment(segment: &str) -> Option<Map<String, Value>> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Decode the JOSE header without verifying the signature.
pub fn unverified_header(token: &str) -> Option<Map<String, Value>> {
    decode_segment(segments(token)?[0])
}

/// Decode the claims payload without verifying the signature.
pub fn unverified_claims(token: &str) -> Option<Map<String, Value>> {
    decode_segment(segments(token)?[1])
}
