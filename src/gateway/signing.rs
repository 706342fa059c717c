//! Canonical parameter signing shared by the outbound request builder and
//! the inbound callback verifier.
//!
//! The gateway signs the lexicographically sorted, non-empty parameters,
//! serialized as `name=form_encode(value)` joined with `&`, and HMACs the
//! result with SHA-512. The form profile encodes a space as `+`; the
//! outbound query string itself uses conventional percent-encoding where a
//! space is `%20`. The two profiles differ and must not be mixed up.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha512;
use subtle::ConstantTimeEq;

type HmacSha512 = Hmac<Sha512>;

/// Classic form encoding: percent-encode, then fold `%20` back to `+`.
pub fn form_encode(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}

/// Conventional UTF-8 percent-encoding for the redirect query string.
pub fn query_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Serializes the canonical byte string to be signed. Parameters with
/// empty values are excluded; `BTreeMap` iteration gives the byte-wise
/// lexicographic name order the gateway expects.
pub fn canonical_payload(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| format!("{}={}", name, form_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// HMAC-SHA512 over the canonical payload, rendered as lowercase hex.
pub fn sign(params: &BTreeMap<String, String>, secret: &str) -> String {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(canonical_payload(params).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Recomputes the signature and compares it to the supplied one in
/// constant time (length mismatch short-circuits to false, which leaks
/// nothing useful here).
pub fn verify(params: &BTreeMap<String, String>, secret: &str, supplied: &str) -> bool {
    let computed = sign(params, secret);
    computed.as_bytes().ct_eq(supplied.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn payload_is_sorted_and_skips_empty_values() {
        let p = params(&[
            ("vnp_TxnRef", "12345678"),
            ("vnp_Amount", "20000"),
            ("vnp_Locale", ""),
        ]);
        assert_eq!(canonical_payload(&p), "vnp_Amount=20000&vnp_TxnRef=12345678");
    }

    #[test]
    fn form_encoding_uses_plus_for_space() {
        assert_eq!(form_encode("Payment for booking 42"), "Payment+for+booking+42");
        // The query-string profile keeps %20.
        assert_eq!(query_encode("Payment for booking 42"), "Payment%20for%20booking%2042");
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let p = params(&[
            ("vnp_Amount", "20000"),
            ("vnp_Command", "pay"),
            ("vnp_TxnRef", "12345678"),
        ]);
        let sig = sign(&p, "test-secret");
        assert!(verify(&p, "test-secret", &sig));
    }

    #[test]
    fn single_character_mutation_flips_verification() {
        let p = params(&[("vnp_Amount", "20000"), ("vnp_TxnRef", "12345678")]);
        let sig = sign(&p, "test-secret");

        let mut tampered = p.clone();
        tampered.insert("vnp_Amount".to_string(), "20001".to_string());
        assert!(!verify(&tampered, "test-secret", &sig));

        // Mutating the signature itself fails too.
        let mut bad_sig = sig.clone();
        let last = bad_sig.pop().unwrap();
        bad_sig.push(if last == '0' { '1' } else { '0' });
        assert!(!verify(&p, "test-secret", &bad_sig));
    }

    #[test]
    fn wrong_secret_does_not_verify() {
        let p = params(&[("vnp_TxnRef", "12345678")]);
        let sig = sign(&p, "secret-a");
        assert!(!verify(&p, "secret-b", &sig));
    }

    #[test]
    fn signature_is_lowercase_hex_sha512() {
        let p = params(&[("vnp_TxnRef", "12345678")]);
        let sig = sign(&p, "test-secret");
        assert_eq!(sig.len(), 128); // 64 bytes of SHA-512 output
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
