use std::collections::{BTreeMap, HashMap};

use crate::{
    config::GatewaySettings,
    error::{AppError, Result},
    gateway::{request, signing},
};

/// Gateway response code meaning the payment went through.
pub const SUCCESS_CODE: &str = "00";

/// Legacy companion field some gateways send alongside the signature;
/// never part of the signed set.
const SIGNATURE_TYPE_PARAM: &str = "vnp_SecureHashType";

const TXN_REF_PARAM: &str = "vnp_TxnRef";
const RESPONSE_CODE_PARAM: &str = "vnp_ResponseCode";

/// Authenticates inbound gateway callbacks. Pure computation: a failed
/// verification mutates nothing and the caller never learns which check
/// failed.
pub struct GatewayCallbackVerifier {
    settings: GatewaySettings,
}

#[derive(Debug, Clone)]
pub struct VerifiedCallback {
    pub txn_ref: String,
    pub response_code: String,
}

impl VerifiedCallback {
    pub fn is_success(&self) -> bool {
        self.response_code == SUCCESS_CODE
    }
}

impl GatewayCallbackVerifier {
    pub fn new(settings: GatewaySettings) -> Self {
        Self { settings }
    }

    /// Recomputes the canonical signature over the inbound parameters and
    /// compares it to the supplied one. The signature field, its type
    /// companion, and our own booking-id echo are transport-local and get
    /// stripped first: the gateway never signed them.
    pub fn verify(&self, query: &HashMap<String, String>) -> Result<VerifiedCallback> {
        let supplied = match query.get(request::SIGNATURE_PARAM) {
            Some(sig) if !sig.is_empty() => sig,
            _ => {
                tracing::warn!("payment callback without signature rejected");
                return Err(AppError::InvalidSignature);
            }
        };

        let fields: BTreeMap<String, String> = query
            .iter()
            .filter(|(name, value)| {
                name.as_str() != request::SIGNATURE_PARAM
                    && name.as_str() != SIGNATURE_TYPE_PARAM
                    && name.as_str() != request::BOOKING_ID_PARAM
                    && !value.is_empty()
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        if !signing::verify(&fields, &self.settings.hash_secret, supplied) {
            tracing::warn!("payment callback signature mismatch, possible forgery attempt");
            return Err(AppError::InvalidSignature);
        }

        let txn_ref = fields
            .get(TXN_REF_PARAM)
            .ok_or_else(|| AppError::BadRequest("Missing transaction reference".to_string()))?
            .clone();
        let response_code = fields
            .get(RESPONSE_CODE_PARAM)
            .ok_or_else(|| AppError::BadRequest("Missing response code".to_string()))?
            .clone();

        Ok(VerifiedCallback { txn_ref, response_code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> GatewaySettings {
        GatewaySettings {
            merchant_code: "TESTCODE".to_string(),
            hash_secret: "test-secret".to_string(),
            pay_url: "https://gateway.example/pay".to_string(),
            return_url: "http://localhost:8080/payment/result".to_string(),
            currency: "VND".to_string(),
            locale: "vn".to_string(),
            validity_minutes: 15,
        }
    }

    fn signed_query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        let fields: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let signature = signing::sign(&fields, "test-secret");

        let mut query: HashMap<String, String> = fields.into_iter().collect();
        query.insert(request::SIGNATURE_PARAM.to_string(), signature);
        query
    }

    #[test]
    fn valid_callback_passes() {
        let query = signed_query(&[
            ("vnp_TxnRef", "12345678"),
            ("vnp_ResponseCode", "00"),
            ("vnp_Amount", "20000"),
        ]);

        let verifier = GatewayCallbackVerifier::new(test_settings());
        let callback = verifier.verify(&query).unwrap();
        assert_eq!(callback.txn_ref, "12345678");
        assert!(callback.is_success());
    }

    #[test]
    fn internal_params_are_stripped_before_recomputation() {
        // The gateway signed its own fields; our bookingId echo and the
        // hash-type field arrive on top and must not break verification.
        let mut query = signed_query(&[
            ("vnp_TxnRef", "12345678"),
            ("vnp_ResponseCode", "24"),
        ]);
        query.insert("bookingId".to_string(), uuid::Uuid::new_v4().to_string());
        query.insert("vnp_SecureHashType".to_string(), "HmacSHA512".to_string());

        let verifier = GatewayCallbackVerifier::new(test_settings());
        let callback = verifier.verify(&query).unwrap();
        assert!(!callback.is_success());
        assert_eq!(callback.response_code, "24");
    }

    #[test]
    fn tampered_value_is_rejected() {
        let mut query = signed_query(&[
            ("vnp_TxnRef", "12345678"),
            ("vnp_ResponseCode", "24"),
        ]);
        query.insert("vnp_ResponseCode".to_string(), "00".to_string());

        let verifier = GatewayCallbackVerifier::new(test_settings());
        assert!(matches!(
            verifier.verify(&query),
            Err(AppError::InvalidSignature)
        ));
    }

    #[test]
    fn missing_signature_is_rejected() {
        let mut query = signed_query(&[("vnp_TxnRef", "12345678"), ("vnp_ResponseCode", "00")]);
        query.remove(request::SIGNATURE_PARAM);

        let verifier = GatewayCallbackVerifier::new(test_settings());
        assert!(matches!(
            verifier.verify(&query),
            Err(AppError::InvalidSignature)
        ));
    }
}
