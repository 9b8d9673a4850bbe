//! Shared fixtures: a mock identity provider and a fully wired app state.

use crate::application::{PostService, UserService};
use crate::data::memory::MemoryDatabase;
use crate::domain::user::UserDeletePolicy;
use crate::infrastructure::config::{AppConfig, IdentityConfig};
use crate::infrastructure::obo::OnBehalfOfClient;
use crate::infrastructure::oidc::{Principal, TokenValidator};
use crate::presentation::routes::AppState;
use actix_web::web;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

pub const TENANT_ID: &str = "test-tenant";
pub const CLIENT_ID: &str = "test-client";
pub const KEY_ID: &str = "test-key";
pub const KEY_SECRET: &[u8] = b"blog-api-test-signing-key-0001";
/// `KEY_SECRET` in base64url, as published in the JWKS.
pub const KEY_SECRET_B64: &str = "YmxvZy1hcGktdGVzdC1zaWduaW5nLWtleS0wMDAx";

/// Signs `claims` with HS256 under the given key id.
pub fn sign(kid: &str, secret: &[u8], claims: &Value) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_secret(secret)).unwrap()
}

/// A JWKS publishing the test secret under each of `kids`.
pub fn jwks(kids: &[&str]) -> Value {
    let keys: Vec<Value> = kids
        .iter()
        .map(|kid| json!({"kty": "oct", "kid": kid, "use": "sig", "k": KEY_SECRET_B64}))
        .collect();
    json!({ "keys": keys })
}

/// A principal as the validator would produce it, carrying `access_token`.
pub fn principal(access_token: &str) -> Principal {
    Principal {
        subject: "user-subject".to_string(),
        object_id: Some("user-object-id".to_string()),
        email: Some("ada@example.com".to_string()),
        name: Some("Ada Lovelace".to_string()),
        scopes: vec!["user_impersonation".to_string()],
        roles: Vec::new(),
        claims: Map::new(),
        access_token: access_token.to_string(),
    }
}

pub struct MockIdentityProvider {
    pub server: MockServer,
    pub app_config: AppConfig,
    pub config: IdentityConfig,
}

impl MockIdentityProvider {
    pub const JWKS_PATH: &'static str = "/test-tenant/discovery/v2.0/keys";
    pub const TOKEN_PATH: &'static str = "/test-tenant/oauth2/v2.0/token";

    /// Serves discovery plus a JWKS holding `KEY_ID`.
    pub async fn start() -> Self {
        let idp = Self::on(MockServer::start().await).await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path(Self::JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks(&[KEY_ID])))
            .mount(&idp.server)
            .await;
        idp
    }

    /// Serves discovery only; the caller mounts the JWKS.
    pub async fn on(server: MockServer) -> Self {
        let uri = server.uri();
        Mock::given(matchers::method("GET"))
            .and(matchers::path(
                "/test-tenant/v2.0/.well-known/openid-configuration",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": format!("{}/{}/v2.0", uri, TENANT_ID),
                "jwks_uri": format!("{}{}", uri, Self::JWKS_PATH),
                "token_endpoint": format!("{}{}", uri, Self::TOKEN_PATH),
            })))
            .mount(&server)
            .await;

        let vars = HashMap::from([
            ("POSTGRES_SERVER", "localhost".to_string()),
            ("POSTGRES_USER", "blog".to_string()),
            ("POSTGRES_PASSWORD", "pg-s3cret".to_string()),
            ("POSTGRES_DB", "blog".to_string()),
            ("TENANT_ID", TENANT_ID.to_string()),
            ("APP_CLIENT_ID", CLIENT_ID.to_string()),
            ("GRAPH_SECRET", "graph-secret".to_string()),
            ("AUTH_URL", uri.clone()),
            ("GRAPH_URL", uri),
        ]);
        let app_config = AppConfig::from_lookup(|name| vars.get(name).cloned()).unwrap();
        let config = app_config.identity.clone();

        Self {
            server,
            app_config,
            config,
        }
    }

    pub fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    pub fn issuer(&self) -> String {
        format!("{}/{}/v2.0", self.server.uri(), TENANT_ID)
    }

    pub fn claims(&self) -> Value {
        json!({
            "sub": "user-subject",
            "oid": "user-object-id",
            "aud": CLIENT_ID,
            "iss": self.issuer(),
            "iat": Self::now(),
            "exp": Self::now() + 3600,
            "scp": "user_impersonation",
            "roles": ["Writer"],
            "preferred_username": "ada@example.com",
            "name": "Ada Lovelace",
        })
    }

    pub fn token(&self) -> String {
        self.token_with(&self.claims())
    }

    pub fn token_with(&self, claims: &Value) -> String {
        sign(KEY_ID, KEY_SECRET, claims)
    }

    pub async fn validator(&self) -> TokenValidator {
        TokenValidator::discover(reqwest::Client::new(), &self.config)
            .await
            .unwrap()
    }
}

/// App state backed by `db`, trusting tokens minted by `idp`.
pub async fn test_state(
    idp: &MockIdentityProvider,
    db: MemoryDatabase,
    delete_policy: UserDeletePolicy,
) -> AppState {
    let http = reqwest::Client::new();
    let config = idp.app_config.clone();

    AppState {
        token_validator: Arc::new(idp.validator().await),
        obo_client: Arc::new(OnBehalfOfClient::new(http, &config.identity)),
        user_service: Arc::new(UserService::new(delete_policy, config.max_page_size)),
        post_service: Arc::new(PostService::new(config.max_page_size)),
        db: Arc::new(db),
        config: web::Data::new(config),
    }
}
