// service/payment_provider.rs
use std::collections::HashMap;

use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::Config,
    models::paymentmodel::{PaymentProvider, ProviderOutcome},
};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe's default replay window for webhook signatures.
pub const STRIPE_SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error: {message}")]
    Api {
        provider: &'static str,
        message: String,
    },

    #[error("Unexpected response from {provider}: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Malformed Stripe-Signature header")]
    Malformed,
    #[error("Webhook timestamp is outside the allowed window")]
    Stale,
    #[error("Webhook signature does not match")]
    Mismatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub latest_charge: Option<String>,
    pub last_payment_error: Option<Value>,
}

impl StripePaymentIntent {
    pub fn job_id(&self) -> Option<Uuid> {
        self.metadata
            .get("job_id")
            .and_then(|id| Uuid::parse_str(id).ok())
    }

    /// The intent id doubles as the transaction id: it is what both the client
    /// confirmation and the webhook carry.
    pub fn outcome(&self) -> ProviderOutcome {
        match self.status.as_str() {
            "succeeded" => ProviderOutcome::Succeeded {
                transaction_id: self.id.clone(),
                amount_minor: self.amount,
            },
            "canceled" => ProviderOutcome::Failed("payment was canceled".to_string()),
            "requires_payment_method" => match &self.last_payment_error {
                Some(error) => ProviderOutcome::Failed(
                    error["message"]
                        .as_str()
                        .unwrap_or("payment method was declined")
                        .to_string(),
                ),
                None => ProviderOutcome::Pending,
            },
            _ => ProviderOutcome::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeRefund {
    pub id: String,
    pub status: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KhaltiInitiation {
    pub pidx: String,
    pub payment_url: String,
    pub expires_at: Option<String>,
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KhaltiLookup {
    pub pidx: String,
    pub total_amount: i64,
    pub status: String,
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub fee: i64,
    #[serde(default)]
    pub refunded: bool,
}

impl KhaltiLookup {
    pub fn outcome(&self) -> ProviderOutcome {
        match self.status.as_str() {
            "Completed" => ProviderOutcome::Succeeded {
                transaction_id: self
                    .transaction_id
                    .clone()
                    .unwrap_or_else(|| self.pidx.clone()),
                amount_minor: self.total_amount,
            },
            "Pending" | "Initiated" => ProviderOutcome::Pending,
            other => ProviderOutcome::Failed(format!("Khalti reported status {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentProviderService {
    http: reqwest::Client,
    stripe_secret_key: String,
    stripe_currency: String,
    khalti_secret_key: String,
    khalti_base_url: String,
    khalti_return_url: String,
    website_url: String,
}

impl PaymentProviderService {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            http,
            stripe_secret_key: config.stripe_secret_key.clone(),
            stripe_currency: config.stripe_currency.clone(),
            khalti_secret_key: config.khalti_secret_key.clone(),
            khalti_base_url: config.khalti_base_url.trim_end_matches('/').to_string(),
            khalti_return_url: config.khalti_return_url.clone(),
            website_url: config.app_url.clone(),
        }
    }

    pub fn is_enabled(&self, provider: PaymentProvider) -> bool {
        match provider {
            PaymentProvider::Stripe => !self.stripe_secret_key.is_empty(),
            PaymentProvider::Khalti => !self.khalti_secret_key.is_empty(),
        }
    }

    pub fn stripe_currency(&self) -> &str {
        &self.stripe_currency
    }

    // Stripe: create a PaymentIntent for the quoted total
    pub async fn create_stripe_intent(
        &self,
        job_id: Uuid,
        amount_minor: i64,
        description: &str,
    ) -> Result<StripePaymentIntent, ProviderError> {
        let form = [
            ("amount", amount_minor.to_string()),
            ("currency", self.stripe_currency.clone()),
            ("description", description.to_string()),
            ("metadata[job_id]", job_id.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];

        let response = self
            .http
            .post(format!("{}/payment_intents", STRIPE_API_BASE))
            .bearer_auth(&self.stripe_secret_key)
            // Repeated clicks for the same job and amount reuse one intent.
            .header("Idempotency-Key", format!("job-{}-{}", job_id, amount_minor))
            .form(&form)
            .send()
            .await?;

        read_provider_json("stripe", response).await
    }

    pub async fn retrieve_stripe_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<StripePaymentIntent, ProviderError> {
        let response = self
            .http
            .get(format!("{}/payment_intents/{}", STRIPE_API_BASE, payment_intent_id))
            .bearer_auth(&self.stripe_secret_key)
            .send()
            .await?;

        read_provider_json("stripe", response).await
    }

    pub async fn refund_stripe_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<StripeRefund, ProviderError> {
        let response = self
            .http
            .post(format!("{}/refunds", STRIPE_API_BASE))
            .bearer_auth(&self.stripe_secret_key)
            .header("Idempotency-Key", format!("refund-{}", payment_intent_id))
            .form(&[("payment_intent", payment_intent_id)])
            .send()
            .await?;

        read_provider_json("stripe", response).await
    }

    // Khalti ePayment: amount is in paisa
    pub async fn initiate_khalti(
        &self,
        job_id: Uuid,
        amount_minor: i64,
        purchase_order_name: &str,
        customer_name: &str,
        customer_email: &str,
    ) -> Result<KhaltiInitiation, ProviderError> {
        let payload = serde_json::json!({
            "return_url": self.khalti_return_url,
            "website_url": self.website_url,
            "amount": amount_minor,
            "purchase_order_id": job_id.to_string(),
            "purchase_order_name": purchase_order_name,
            "customer_info": {
                "name": customer_name,
                "email": customer_email,
            },
        });

        let response = self
            .http
            .post(format!("{}/epayment/initiate/", self.khalti_base_url))
            .header("Authorization", format!("Key {}", self.khalti_secret_key))
            .json(&payload)
            .send()
            .await?;

        read_provider_json("khalti", response).await
    }

    pub async fn lookup_khalti(&self, pidx: &str) -> Result<KhaltiLookup, ProviderError> {
        let response = self
            .http
            .post(format!("{}/epayment/lookup/", self.khalti_base_url))
            .header("Authorization", format!("Key {}", self.khalti_secret_key))
            .json(&serde_json::json!({ "pidx": pidx }))
            .send()
            .await?;

        read_provider_json("khalti", response).await
    }

    /// Asks the provider where a checkout stands, keyed by our stored reference.
    pub async fn check_outcome(
        &self,
        provider: PaymentProvider,
        provider_reference: &str,
    ) -> Result<ProviderOutcome, ProviderError> {
        match provider {
            PaymentProvider::Stripe => Ok(self
                .retrieve_stripe_intent(provider_reference)
                .await?
                .outcome()),
            PaymentProvider::Khalti => Ok(self.lookup_khalti(provider_reference).await?.outcome()),
        }
    }
}

pub(crate) async fn read_provider_json<T: DeserializeOwned>(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ProviderError::Api {
            provider,
            message: api_error_message(status, &body),
        });
    }

    serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse {
        provider,
        message: e.to_string(),
    })
}

/// Pulls a human readable message out of a provider error body.
fn api_error_message(status: StatusCode, body: &str) -> String {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);

    if let Some(message) = parsed["error"]["message"].as_str() {
        return message.to_string();
    }
    if let Some(detail) = parsed["detail"].as_str() {
        return detail.to_string();
    }
    // Khalti validation errors: {"amount": ["..."], "error_key": "validation_error"}
    if let Some(fields) = parsed.as_object() {
        let messages: Vec<String> = fields
            .iter()
            .filter_map(|(field, value)| {
                value
                    .as_array()
                    .and_then(|items| items.first())
                    .and_then(Value::as_str)
                    .map(|message| format!("{}: {}", field, message))
            })
            .collect();
        if !messages.is_empty() {
            return messages.join("; ");
        }
    }

    let snippet: String = body.chars().take(200).collect();
    format!("HTTP {} {}", status.as_u16(), snippet).trim().to_string()
}

pub fn stripe_signature(
    payload: &[u8],
    timestamp: i64,
    secret: &str,
) -> Result<String, SignatureError> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a `Stripe-Signature` header (`t=...,v1=...[,v1=...]`) against the raw body.
pub fn verify_stripe_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=').ok_or(SignatureError::Malformed)?;
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }

    if (now - timestamp).abs() > STRIPE_SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Stale);
    }

    let expected = stripe_signature(payload, timestamp, secret)?;
    let matched = signatures
        .iter()
        .any(|candidate| bool::from(candidate.as_bytes().ct_eq(expected.as_bytes())));

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
    const BODY: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;

    fn header_for(timestamp: i64, secret: &str) -> String {
        format!("t={},v1={}", timestamp, stripe_signature(BODY, timestamp, secret).unwrap())
    }

    #[test]
    fn accepts_a_fresh_valid_signature() {
        let now = 1_700_000_000;
        let header = header_for(now - 10, SECRET);
        assert_eq!(verify_stripe_signature(BODY, &header, SECRET, now), Ok(()));
    }

    #[test]
    fn accepts_when_any_v1_matches() {
        let now = 1_700_000_000;
        let good = stripe_signature(BODY, now, SECRET).unwrap();
        let header = format!("t={},v1=deadbeef,v0=ignored,v1={}", now, good);
        assert_eq!(verify_stripe_signature(BODY, &header, SECRET, now), Ok(()));
    }

    #[test]
    fn rejects_a_signature_from_another_secret() {
        let now = 1_700_000_000;
        let header = header_for(now, "whsec_other");
        assert_eq!(
            verify_stripe_signature(BODY, &header, SECRET, now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_a_tampered_body() {
        let now = 1_700_000_000;
        let header = header_for(now, SECRET);
        assert_eq!(
            verify_stripe_signature(br#"{"id":"evt_2"}"#, &header, SECRET, now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_timestamps() {
        let now = 1_700_000_000;
        let header = header_for(now - STRIPE_SIGNATURE_TOLERANCE_SECS - 1, SECRET);
        assert_eq!(
            verify_stripe_signature(BODY, &header, SECRET, now),
            Err(SignatureError::Stale)
        );
    }

    #[test]
    fn rejects_malformed_headers() {
        let now = 1_700_000_000;
        for header in ["", "garbage", "t=abc,v1=00", "v1=00", "t=1700000000"] {
            assert_eq!(
                verify_stripe_signature(BODY, header, SECRET, now),
                Err(SignatureError::Malformed),
                "header {:?}",
                header
            );
        }
    }

    #[test]
    fn stripe_intent_outcomes() {
        let mut intent = StripePaymentIntent {
            id: "pi_123".into(),
            amount: 8250,
            currency: "usd".into(),
            status: "succeeded".into(),
            client_secret: None,
            metadata: HashMap::from([("job_id".to_string(), Uuid::nil().to_string())]),
            latest_charge: Some("ch_1".into()),
            last_payment_error: None,
        };
        assert_eq!(
            intent.outcome(),
            ProviderOutcome::Succeeded {
                transaction_id: "pi_123".into(),
                amount_minor: 8250
            }
        );
        assert_eq!(intent.job_id(), Some(Uuid::nil()));

        intent.status = "processing".into();
        assert_eq!(intent.outcome(), ProviderOutcome::Pending);

        intent.status = "requires_payment_method".into();
        intent.last_payment_error = Some(serde_json::json!({"message": "Your card was declined."}));
        assert_eq!(
            intent.outcome(),
            ProviderOutcome::Failed("Your card was declined.".into())
        );
    }

    #[test]
    fn khalti_lookup_outcomes() {
        let lookup: KhaltiLookup = serde_json::from_value(serde_json::json!({
            "pidx": "HT6o6PEZRWFJ5ygavzHWd5",
            "total_amount": 1000,
            "status": "Completed",
            "transaction_id": "GFq9PFS7b2iYvL8Lir9oXe",
            "fee": 0,
            "refunded": false
        }))
        .unwrap();
        assert_eq!(
            lookup.outcome(),
            ProviderOutcome::Succeeded {
                transaction_id: "GFq9PFS7b2iYvL8Lir9oXe".into(),
                amount_minor: 1000
            }
        );

        let expired = KhaltiLookup {
            status: "Expired".into(),
            ..lookup.clone()
        };
        assert!(matches!(expired.outcome(), ProviderOutcome::Failed(_)));

        let pending = KhaltiLookup {
            status: "Pending".into(),
            ..lookup
        };
        assert_eq!(pending.outcome(), ProviderOutcome::Pending);
    }

    #[test]
    fn extracts_provider_error_messages() {
        assert_eq!(
            api_error_message(
                StatusCode::PAYMENT_REQUIRED,
                r#"{"error":{"message":"No such payment_intent"}}"#
            ),
            "No such payment_intent"
        );
        assert_eq!(
            api_error_message(StatusCode::UNAUTHORIZED, r#"{"detail":"Invalid token."}"#),
            "Invalid token."
        );
        assert_eq!(
            api_error_message(
                StatusCode::BAD_REQUEST,
                r#"{"amount":["Amount should be greater than Rs. 10"],"error_key":"validation_error"}"#
            ),
            "amount: Amount should be greater than Rs. 10"
        );
        assert_eq!(
            api_error_message(StatusCode::BAD_GATEWAY, "upstream down"),
            "HTTP 502 upstream down"
        );
    }
}
