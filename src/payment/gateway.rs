//! Card payment gateway
//!
//! Intents are created through the Stripe REST API. Confirmation arrives
//! asynchronously through the signed webhook, see [`verify_signature`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use crate::config::PaymentConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Payment gateway is not configured")]
    NotConfigured,

    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    #[error("Gateway request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Gateway rejected the request: {0}")]
    Rejected(String),
}

/// Parameters for a new payment intent
#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub amount: Decimal,
    pub currency: String,
    pub metadata: HashMap<String, String>,
}

/// Intent as returned by the gateway
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Creates card payment intents
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, GatewayError>;
}

/// Convert a major-unit amount into integer minor units (paise, cents)
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED).round().to_i64()
}

/// Convert gateway minor units back into a major-unit amount
pub fn from_minor_units(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}

/// Stripe REST client
pub struct StripeGateway {
    client: Client,
    api_base: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, GatewayError> {
        if self.secret_key.is_empty() {
            return Err(GatewayError::NotConfigured);
        }

        let minor = to_minor_units(request.amount)
            .filter(|m| *m > 0)
            .ok_or(GatewayError::InvalidAmount(request.amount))?;

        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), minor.to_string()),
            ("currency".to_string(), request.currency.clone()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(GatewayError::Rejected(message));
        }

        Ok(response.json::<PaymentIntent>().await?)
    }
}

/// Webhook signature failures
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing signature header")]
    Missing,

    #[error("Malformed signature header")]
    Malformed,

    #[error("Signature timestamp outside tolerance")]
    Expired,

    #[error("Signature mismatch")]
    Mismatch,
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`
pub fn compute_signature(payload: &[u8], timestamp: i64, secret: &str) -> Option<String> {
    mac_for(payload, timestamp, secret).map(|mac| hex::encode(mac.finalize().into_bytes()))
}

fn mac_for(payload: &[u8], timestamp: i64, secret: &str) -> Option<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Some(mac)
}

/// Verify a `t=<unix>,v1=<hex>[,v1=<hex>...]` signature header
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_seconds: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?)
            }
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }

    if tolerance_seconds > 0 && now.abs_diff(timestamp) > tolerance_seconds.unsigned_abs() {
        return Err(SignatureError::Expired);
    }

    let matched = signatures.into_iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        mac_for(payload, timestamp, secret)
            .is_some_and(|mac| mac.verify_slice(&expected).is_ok())
    });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const PAYLOAD: &[u8] = br#"{"type":"payment_intent.succeeded"}"#;

    #[test]
    fn test_valid_signature() {
        let sig = compute_signature(PAYLOAD, 1_700_000_000, SECRET).unwrap();
        let header = format!("t=1700000000,v1={}", sig);
        assert_eq!(
            verify_signature(PAYLOAD, &header, SECRET, 300, 1_700_000_100),
            Ok(())
        );
    }

    #[test]
    fn test_any_matching_v1_is_accepted() {
        let sig = compute_signature(PAYLOAD, 1_700_000_000, SECRET).unwrap();
        let header = format!("t=1700000000,v1={},v1={}", "00".repeat(32), sig);
        assert!(verify_signature(PAYLOAD, &header, SECRET, 300, 1_700_000_000).is_ok());
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let sig = compute_signature(PAYLOAD, 1_700_000_000, SECRET).unwrap();
        let header = format!("t=1700000000,v1={}", sig);
        assert_eq!(
            verify_signature(b"{}", &header, SECRET, 300, 1_700_000_000),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let sig = compute_signature(PAYLOAD, 1_700_000_000, "other").unwrap();
        let header = format!("t=1700000000,v1={}", sig);
        assert_eq!(
            verify_signature(PAYLOAD, &header, SECRET, 300, 1_700_000_000),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let sig = compute_signature(PAYLOAD, 1_700_000_000, SECRET).unwrap();
        let header = format!("t=1700000000,v1={}", sig);
        assert_eq!(
            verify_signature(PAYLOAD, &header, SECRET, 300, 1_700_001_000),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_extreme_timestamps_are_expired() {
        let header = format!("t={},v1={}", i64::MIN, "00".repeat(32));
        assert_eq!(
            verify_signature(PAYLOAD, &header, SECRET, 300, 1_700_000_000),
            Err(SignatureError::Expired)
        );

        let header = format!("t={},v1={}", i64::MAX, "00".repeat(32));
        assert_eq!(
            verify_signature(PAYLOAD, &header, SECRET, 300, -1_700_000_000),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_malformed_headers() {
        assert_eq!(
            verify_signature(PAYLOAD, "v1=abcd", SECRET, 300, 0),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(PAYLOAD, "t=123", SECRET, 300, 123),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(PAYLOAD, "t=abc,v1=00", SECRET, 300, 0),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn test_minor_unit_conversion() {
        assert_eq!(to_minor_units(Decimal::new(5000, 2)), Some(5000));
        assert_eq!(to_minor_units(Decimal::new(12345, 2)), Some(12345));
        assert_eq!(to_minor_units(Decimal::new(200, 0)), Some(20000));
        assert_eq!(from_minor_units(5000), Decimal::new(50, 0));
    }
}
