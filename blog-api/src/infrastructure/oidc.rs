//! Bearer-token validation against the identity provider's published keys.
//!
//! The validator is built from the tenant's OpenID discovery document and
//! keeps the JWKS in memory keyed by `kid`. The set is refetched when it is
//! older than the configured refresh interval or when a token names a key we
//! have not seen (the provider rotated its keys). Forced refetches are spaced
//! at least `min_refresh_gap` apart.

use crate::domain::DomainError;
use crate::infrastructure::config::IdentityConfig;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, PublicKeyUse};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const MIN_REFRESH_GAP: Duration = Duration::from_secs(30);

const RSA_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];
const EC_ALGORITHMS: &[Algorithm] = &[Algorithm::ES256, Algorithm::ES384];
const HMAC_ALGORITHMS: &[Algorithm] = &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
const EDDSA_ALGORITHMS: &[Algorithm] = &[Algorithm::EdDSA];

/// The authenticated caller, attached to the request once its token validates.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub subject: String,
    pub object_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub scopes: Vec<String>,
    pub roles: Vec<String>,
    #[serde(skip)]
    pub claims: Map<String, Value>,
    /// Raw bearer token, kept for on-behalf-of exchange. Never serialized.
    #[serde(skip)]
    pub access_token: String,
}

impl Principal {
    fn from_claims(claims: Map<String, Value>, access_token: &str) -> Result<Self, DomainError> {
        let text = |key: &str| {
            claims
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let subject = text("sub")
            .ok_or_else(|| DomainError::Unauthorized("Token has no subject".to_string()))?;
        let object_id = text("oid");
        let email = text("email")
            .or_else(|| text("preferred_username"))
            .or_else(|| text("upn"));
        let name = text("name");
        let scopes = text("scp")
            .map(|scp| scp.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let roles = claims
            .get("roles")
            .and_then(Value::as_array)
            .map(|roles| {
                roles
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            subject,
            object_id,
            email,
            name,
            scopes,
            roles,
            claims,
            access_token: access_token.to_string(),
        })
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

#[derive(Debug, Deserialize)]
struct OpenIdConfiguration {
    issuer: String,
    jwks_uri: String,
}

/// JWKS document with each key left unparsed, so one unsupported key does
/// not make the whole set unusable.
#[derive(Debug, Deserialize)]
struct RawKeySet {
    keys: Vec<Value>,
}

#[derive(Clone)]
struct SigningKey {
    key: DecodingKey,
    algorithms: &'static [Algorithm],
}

#[derive(Default)]
struct KeyCache {
    keys: HashMap<String, SigningKey>,
    fetched_at: Option<Instant>,
    attempted_at: Option<Instant>,
}

impl KeyCache {
    fn fresh_key(&self, kid: &str, max_age: Duration) -> Option<SigningKey> {
        let fresh = self.fetched_at.is_some_and(|at| at.elapsed() < max_age);
        if fresh {
            self.keys.get(kid).cloned()
        } else {
            None
        }
    }
}

fn algorithms_for(params: &AlgorithmParameters) -> &'static [Algorithm] {
    match params {
        AlgorithmParameters::RSA(_) => RSA_ALGORITHMS,
        AlgorithmParameters::EllipticCurve(_) => EC_ALGORITHMS,
        AlgorithmParameters::OctetKey(_) => HMAC_ALGORITHMS,
        AlgorithmParameters::OctetKeyPair(_) => EDDSA_ALGORITHMS,
    }
}

fn parse_key_set(set: RawKeySet) -> HashMap<String, SigningKey> {
    let mut keys = HashMap::new();

    for raw in set.keys {
        let jwk: Jwk = match serde_json::from_value(raw) {
            Ok(jwk) => jwk,
            Err(e) => {
                tracing::warn!("Skipping unsupported JWK: {}", e);
                continue;
            }
        };
        if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
            continue;
        }
        let Some(kid) = jwk.common.key_id.clone() else {
            tracing::warn!("Skipping JWK without key id");
            continue;
        };
        match DecodingKey::from_jwk(&jwk) {
            Ok(key) => {
                keys.insert(
                    kid,
                    SigningKey {
                        key,
                        algorithms: algorithms_for(&jwk.algorithm),
                    },
                );
            }
            Err(e) => tracing::warn!("Skipping unusable JWK {}: {}", kid, e),
        }
    }

    keys
}

fn upstream(what: &'static str) -> impl Fn(reqwest::Error) -> DomainError {
    move |e| DomainError::UpstreamUnavailable(format!("{} request failed: {}", what, e))
}

pub struct TokenValidator {
    http: reqwest::Client,
    issuer: String,
    jwks_uri: String,
    audiences: Vec<String>,
    required_scope: Option<String>,
    refresh_interval: Duration,
    min_refresh_gap: Duration,
    cache: RwLock<KeyCache>,
}

impl TokenValidator {
    /// Loads the tenant's discovery document and the initial key set.
    pub async fn discover(
        http: reqwest::Client,
        config: &IdentityConfig,
    ) -> Result<Self, DomainError> {
        let url = config.discovery_url();
        tracing::info!("Loading OpenID configuration from {}", url);

        let metadata: OpenIdConfiguration = http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(upstream("OpenID discovery"))?
            .json()
            .await
            .map_err(upstream("OpenID discovery"))?;

        let validator = Self {
            http,
            issuer: metadata.issuer,
            jwks_uri: metadata.jwks_uri,
            audiences: config.audiences(),
            required_scope: config.required_scope.clone(),
            refresh_interval: config.jwks_refresh,
            min_refresh_gap: MIN_REFRESH_GAP,
            cache: RwLock::new(KeyCache::default()),
        };

        let keys = validator.fetch_keys().await?;
        tracing::info!(
            "Loaded {} signing keys for issuer {}",
            keys.len(),
            validator.issuer
        );
        {
            let mut cache = validator.cache.write().await;
            let now = Instant::now();
            cache.keys = keys;
            cache.fetched_at = Some(now);
            cache.attempted_at = Some(now);
        }

        Ok(validator)
    }

    #[cfg(test)]
    pub(crate) fn with_min_refresh_gap(mut self, gap: Duration) -> Self {
        self.min_refresh_gap = gap;
        self
    }

    async fn fetch_keys(&self) -> Result<HashMap<String, SigningKey>, DomainError> {
        let set: RawKeySet = self
            .http
            .get(&self.jwks_uri)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(upstream("JWKS"))?
            .json()
            .await
            .map_err(upstream("JWKS"))?;

        Ok(parse_key_set(set))
    }

    async fn signing_key(&self, kid: &str) -> Result<SigningKey, DomainError> {
        {
            let cache = self.cache.read().await;
            if let Some(key) = cache.fresh_key(kid, self.refresh_interval) {
                return Ok(key);
            }
        }

        // Claim the refresh under the lock, fetch without holding it
        let refresh_due = {
            let mut cache = self.cache.write().await;
            if let Some(key) = cache.fresh_key(kid, self.refresh_interval) {
                return Ok(key);
            }
            let due = cache
                .attempted_at
                .map_or(true, |at| at.elapsed() >= self.min_refresh_gap);
            if due {
                cache.attempted_at = Some(Instant::now());
            }
            due
        };

        if refresh_due {
            match self.fetch_keys().await {
                Ok(keys) => {
                    tracing::info!("Refreshed signing keys ({} keys)", keys.len());
                    let mut cache = self.cache.write().await;
                    cache.keys = keys;
                    cache.fetched_at = Some(Instant::now());
                }
                // Keep serving the keys we already have
                Err(e) => tracing::warn!("Signing key refresh failed: {}", e),
            }
        }

        self.cache
            .read()
            .await
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| DomainError::Unauthorized(format!("Unknown signing key {}", kid)))
    }

    pub async fn validate(&self, token: &str) -> Result<Principal, DomainError> {
        let header = decode_header(token)
            .map_err(|e| DomainError::Unauthorized(format!("Malformed token: {}", e)))?;
        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| DomainError::Unauthorized("Token has no key id".to_string()))?;

        let signing_key = self.signing_key(kid).await?;
        if !signing_key.algorithms.contains(&header.alg) {
            return Err(DomainError::Unauthorized(format!(
                "Algorithm {:?} does not match signing key {}",
                header.alg, kid
            )));
        }

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&self.audiences);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);
        validation.validate_nbf = true;

        let data = decode::<Map<String, Value>>(token, &signing_key.key, &validation)
            .map_err(|e| DomainError::Unauthorized(format!("Invalid token: {}", e)))?;

        let principal = Principal::from_claims(data.claims, token)?;

        if let Some(scope) = &self.required_scope {
            if !principal.has_scope(scope) {
                return Err(DomainError::Unauthorized(format!(
                    "Token lacks required scope {}",
                    scope
                )));
            }
        }

        tracing::debug!("Token validated for subject {}", principal.subject);
        Ok(principal)
    }
}
