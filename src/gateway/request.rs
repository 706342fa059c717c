use std::collections::BTreeMap;

use chrono::{DateTime, Duration, FixedOffset, Utc};

use crate::{config::GatewaySettings, domain::Booking, gateway::signing};

/// The gateway expects timestamps in Vietnam time (UTC+7).
const GATEWAY_UTC_OFFSET_SECS: i32 = 7 * 3600;
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

pub const PROTOCOL_VERSION: &str = "2.1.0";
pub const COMMAND_PAY: &str = "pay";
pub const ORDER_TYPE: &str = "other";

/// Query parameter carrying the booking id back to us on the callback.
/// It is ours, not the gateway's, so the verifier strips it before
/// recomputing the signature.
pub const BOOKING_ID_PARAM: &str = "bookingId";

pub const SIGNATURE_PARAM: &str = "vnp_SecureHash";

/// Builds the signed redirect URL that sends the user to the payment
/// gateway. Holds an immutable copy of the gateway settings; the secret
/// cannot be swapped out after construction.
pub struct GatewayRequestBuilder {
    settings: GatewaySettings,
}

#[derive(Debug, Clone)]
pub struct GatewayRedirect {
    pub url: String,
    /// The signed parameter set, without the signature itself.
    pub params: BTreeMap<String, String>,
    pub signature: String,
}

impl GatewayRequestBuilder {
    pub fn new(settings: GatewaySettings) -> Self {
        Self { settings }
    }

    pub fn build(
        &self,
        booking: &Booking,
        txn_ref: &str,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> GatewayRedirect {
        let offset = FixedOffset::east_opt(GATEWAY_UTC_OFFSET_SECS)
            .expect("offset is in range");
        let create_date = now.with_timezone(&offset);
        let expire_date = create_date + Duration::minutes(self.settings.validity_minutes);

        // The callback self-locates the booking through this echo.
        let return_url = format!(
            "{}?{}={}",
            self.settings.return_url, BOOKING_ID_PARAM, booking.id
        );

        let mut params = BTreeMap::new();
        params.insert("vnp_Version".to_string(), PROTOCOL_VERSION.to_string());
        params.insert("vnp_Command".to_string(), COMMAND_PAY.to_string());
        params.insert("vnp_TmnCode".to_string(), self.settings.merchant_code.clone());
        // Minor units: the stored cents value already is totalPrice x 100.
        params.insert("vnp_Amount".to_string(), booking.total_price_cents.to_string());
        params.insert("vnp_CurrCode".to_string(), self.settings.currency.clone());
        params.insert("vnp_TxnRef".to_string(), txn_ref.to_string());
        params.insert(
            "vnp_OrderInfo".to_string(),
            format!("Payment for booking {}", booking.id),
        );
        params.insert("vnp_OrderType".to_string(), ORDER_TYPE.to_string());
        params.insert("vnp_Locale".to_string(), self.settings.locale.clone());
        params.insert("vnp_ReturnUrl".to_string(), return_url);
        params.insert("vnp_IpAddr".to_string(), client_ip.to_string());
        params.insert(
            "vnp_CreateDate".to_string(),
            create_date.format(TIMESTAMP_FORMAT).to_string(),
        );
        params.insert(
            "vnp_ExpireDate".to_string(),
            expire_date.format(TIMESTAMP_FORMAT).to_string(),
        );

        // The signature covers the set above and is never signed itself.
        let signature = signing::sign(&params, &self.settings.hash_secret);

        let query = params
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| {
                format!("{}={}", signing::query_encode(name), signing::query_encode(value))
            })
            .collect::<Vec<_>>()
            .join("&");

        let url = format!(
            "{}?{}&{}={}",
            self.settings.pay_url,
            query,
            SIGNATURE_PARAM,
            signing::query_encode(&signature)
        );

        GatewayRedirect { url, params, signature }
    }
}
