use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::warn;

use super::error::MarketError;

type HmacSha256 = Hmac<Sha256>;

/// Gateway callback payload confirming a checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PaymentConfirmation {
    #[serde(default, rename = "razorpay_order_id")]
    pub order_id: String,
    #[serde(default, rename = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(default, rename = "razorpay_signature")]
    pub signature: String,
}

/// Checks gateway signatures: hex HMAC-SHA256 of `"<order_id>|<payment_id>"`.
#[derive(Clone)]
pub struct PaymentVerifier {
    secret: Vec<u8>,
}

impl PaymentVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn sign(&self, order_id: &str, payment_id: &str) -> Result<String, MarketError> {
        let mac = self.mac(order_id, payment_id)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn verify(&self, confirmation: &PaymentConfirmation) -> Result<(), MarketError> {
        let PaymentConfirmation {
            order_id,
            payment_id,
            signature,
        } = confirmation;
        if order_id.is_empty() || payment_id.is_empty() || signature.is_empty() {
            return Err(MarketError::validation(
                "razorpay_payment_id, razorpay_order_id, and razorpay_signature are required",
            ));
        }

        let expected = hex::decode(signature.trim()).map_err(|_| MarketError::InvalidSignature)?;
        self.mac(order_id, payment_id)?
            .verify_slice(&expected)
            .map_err(|_| {
                warn!(%order_id, %payment_id, "payment signature mismatch");
                MarketError::InvalidSignature
            })
    }

    fn mac(&self, order_id: &str, payment_id: &str) -> Result<HmacSha256, MarketError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| MarketError::validation("payment secret is not usable as an HMAC key"))?;
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        Ok(mac)
    }
}

impl std::fmt::Debug for PaymentVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentVerifier").finish_non_exhaustive()
    }
}
