// service/firebase_auth.rs
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const DEFAULT_KEY_TTL: Duration = Duration::from_secs(3600);
/// An unknown `kid` only forces a refetch once the cached set is at least this old.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Could not fetch Firebase signing keys: {0}")]
    KeyFetch(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseClaims {
    pub sub: String,
    pub aud: String,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
    pub auth_time: Option<i64>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct FirebasePublicKey {
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct FirebaseKeySet {
    keys: Vec<FirebasePublicKey>,
}

#[derive(Debug)]
struct CachedKeys {
    keys: HashMap<String, FirebasePublicKey>,
    fetched_at: Instant,
    expires_at: Instant,
}

/// Verifies Firebase ID tokens against Google's securetoken keys.
#[derive(Debug)]
pub struct FirebaseAuth {
    project_id: String,
    http: reqwest::Client,
    cached_keys: RwLock<Option<CachedKeys>>,
}

impl FirebaseAuth {
    pub fn new(project_id: String, http: reqwest::Client) -> Self {
        Self {
            project_id,
            http,
            cached_keys: RwLock::new(None),
        }
    }

    pub async fn verify_id_token(&self, id_token: &str) -> Result<FirebaseClaims, AuthError> {
        let header = decode_header(id_token)
            .map_err(|e| AuthError::InvalidToken(format!("invalid token header: {}", e)))?;

        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidToken(format!(
                "unexpected signing algorithm {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("missing key id in token header".to_string()))?;

        let public_key = self.public_key(&kid).await?;

        let decoding_key = DecodingKey::from_rsa_components(&public_key.n, &public_key.e)
            .map_err(|e| AuthError::InvalidToken(format!("bad signing key: {}", e)))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[format!("https://securetoken.google.com/{}", self.project_id)]);
        validation.set_required_spec_claims(&["exp", "sub", "aud", "iss"]);

        let token_data = decode::<FirebaseClaims>(id_token, &decoding_key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        if token_data.claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken("empty subject".to_string()));
        }

        Ok(token_data.claims)
    }

    async fn public_key(&self, kid: &str) -> Result<FirebasePublicKey, AuthError> {
        {
            let cache = self.cached_keys.read().await;
            if let Some(cached) = cache.as_ref() {
                let now = Instant::now();
                if cached.expires_at > now {
                    if let Some(key) = cached.keys.get(kid) {
                        return Ok(key.clone());
                    }
                    if now.duration_since(cached.fetched_at) < MIN_REFRESH_INTERVAL {
                        return Err(AuthError::InvalidToken(format!("unknown key id {}", kid)));
                    }
                }
            }
        }

        // Expired, or Google rotated keys since the last fetch.
        let fresh = self.fetch_keys().await?;
        let key = fresh.keys.get(kid).cloned();
        *self.cached_keys.write().await = Some(fresh);

        key.ok_or_else(|| AuthError::InvalidToken(format!("unknown key id {}", kid)))
    }

    async fn fetch_keys(&self) -> Result<CachedKeys, AuthError> {
        let response = self
            .http
            .get(FIREBASE_JWKS_URL)
            .send()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeyFetch(format!("HTTP {}", response.status())));
        }

        let ttl = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_max_age)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_KEY_TTL);

        let key_set: FirebaseKeySet = response
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        tracing::debug!("Fetched {} Firebase signing keys, cached for {:?}", key_set.keys.len(), ttl);

        let now = Instant::now();
        Ok(CachedKeys {
            keys: key_set
                .keys
                .into_iter()
                .map(|key| (key.kid.clone(), key))
                .collect(),
            fetched_at: now,
            expires_at: now + ttl,
        })
    }
}

/// `max-age` seconds from a Cache-Control header value.
fn parse_max_age(cache_control: &str) -> Option<u64> {
    cache_control
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|seconds| seconds.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> FirebaseAuth {
        FirebaseAuth::new("servicehub-test".to_string(), reqwest::Client::new())
    }

    #[test]
    fn test_parse_max_age() {
        assert_eq!(parse_max_age("public, max-age=19302, must-revalidate, no-transform"), Some(19302));
        assert_eq!(parse_max_age("max-age=60"), Some(60));
        assert_eq!(parse_max_age("no-cache"), None);
        assert_eq!(parse_max_age("max-age=soon"), None);
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected_without_fetching_keys() {
        let result = auth().verify_id_token("not-a-jwt").await;
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_symmetric_tokens_are_rejected() {
        // {"alg":"HS256","typ":"JWT"}
        let token = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.e30.c2lnbmF0dXJl";
        let result = auth().verify_id_token(token).await;
        match result {
            Err(AuthError::InvalidToken(message)) => assert!(message.contains("algorithm")),
            other => panic!("expected invalid token, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_token_without_key_id_is_rejected() {
        // {"alg":"RS256","typ":"JWT"}
        let token = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.e30.c2lnbmF0dXJl";
        let result = auth().verify_id_token(token).await;
        match result {
            Err(AuthError::InvalidToken(message)) => assert!(message.contains("key id")),
            other => panic!("expected invalid token, got {:?}", other),
        }
    }
}
