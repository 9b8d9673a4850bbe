//! Process configuration, read once at start-up.
//!
//! Everything comes from the environment (a `.env` file is loaded first by
//! `main`). The resulting [`AppConfig`] is immutable and handed to the
//! components that need it; nothing reads the environment afterwards.

use crate::domain::user::UserDeletePolicy;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {0} must be set")]
    Missing(&'static str),

    #[error("Environment variable {name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "expected `local`, `staging` or `production`, got `{}`",
                other
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Local => "local",
            Self::Staging => "staging",
            Self::Production => "production",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Connection descriptor that is safe to log or return to clients.
    pub fn masked_url(&self) -> String {
        format!(
            "postgresql://{}:****@{}:{}/{}",
            self.user, self.host, self.port, self.name
        )
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.masked_url())
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Clone)]
pub struct IdentityConfig {
    pub authority: String,
    pub tenant_id: String,
    pub app_client_id: String,
    pub openapi_client_id: Option<String>,
    pub graph_secret: String,
    pub graph_url: String,
    pub graph_scope: String,
    pub required_scope: Option<String>,
    pub jwks_refresh: Duration,
}

impl IdentityConfig {
    fn tenant_base(&self) -> String {
        format!("{}/{}", self.authority.trim_end_matches('/'), self.tenant_id)
    }

    pub fn discovery_url(&self) -> String {
        format!(
            "{}/v2.0/.well-known/openid-configuration",
            self.tenant_base()
        )
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.tenant_base())
    }

    pub fn graph_me_url(&self) -> String {
        format!("{}/v1.0/me", self.graph_url.trim_end_matches('/'))
    }

    /// Tokens for this API carry either the bare client id or its App ID URI.
    pub fn audiences(&self) -> Vec<String> {
        vec![
            self.app_client_id.clone(),
            format!("api://{}", self.app_client_id),
        ]
    }
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("authority", &self.authority)
            .field("tenant_id", &self.tenant_id)
            .field("app_client_id", &self.app_client_id)
            .field("openapi_client_id", &self.openapi_client_id)
            .field("graph_secret", &"****")
            .field("graph_url", &self.graph_url)
            .field("graph_scope", &self.graph_scope)
            .field("required_scope", &self.required_scope)
            .field("jwks_refresh", &self.jwks_refresh)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub project_name: String,
    pub http_host: String,
    pub http_port: u16,
    pub api_prefix: String,
    pub cors_allowed_origins: Vec<String>,
    pub database: DatabaseConfig,
    pub identity: IdentityConfig,
    pub http_client_timeout: Duration,
    pub user_delete_policy: UserDeletePolicy,
    pub max_page_size: i64,
}

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:8080";
const DEFAULT_REQUIRED_SCOPE: &str = "user_impersonation";

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Empty values count as unset.
    fn optional(&self, name: &'static str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn or(&self, name: &'static str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let database = DatabaseConfig {
            host: vars.required("POSTGRES_SERVER")?,
            port: vars.parsed("POSTGRES_PORT", 5432)?,
            user: vars.required("POSTGRES_USER")?,
            password: vars.required("POSTGRES_PASSWORD")?,
            name: vars.required("POSTGRES_DB")?,
            max_connections: vars.parsed("DATABASE_MAX_CONNECTIONS", 5)?,
        };

        // Unlike other variables, an explicitly empty REQUIRED_SCOPE disables the check
        let required_scope = match (vars.lookup)("REQUIRED_SCOPE") {
            None => Some(DEFAULT_REQUIRED_SCOPE.to_string()),
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(raw.trim().to_string()),
        };

        let identity = IdentityConfig {
            authority: vars.or("AUTH_URL", "https://login.microsoftonline.com"),
            tenant_id: vars.required("TENANT_ID")?,
            app_client_id: vars.required("APP_CLIENT_ID")?,
            openapi_client_id: vars.optional("OPENAPI_CLIENT_ID"),
            graph_secret: vars.required("GRAPH_SECRET")?,
            graph_url: vars.or("GRAPH_URL", "https://graph.microsoft.com"),
            graph_scope: vars.or("GRAPH_SCOPE", "https://graph.microsoft.com/user.read"),
            required_scope,
            jwks_refresh: Duration::from_secs(vars.parsed("JWKS_REFRESH_SECS", 3600)?),
        };

        let max_page_size: i64 = vars.parsed("PAGE_SIZE_MAX", 100)?;
        if max_page_size < 1 {
            return Err(ConfigError::Invalid {
                name: "PAGE_SIZE_MAX",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            environment: vars.parsed("ENVIRONMENT", Environment::Local)?,
            project_name: vars.or("PROJECT_NAME", "blog-api"),
            http_host: vars.or("HTTP_HOST", "0.0.0.0"),
            http_port: vars.parsed("HTTP_PORT", 8000)?,
            api_prefix: normalize_prefix(&vars.or("API_PREFIX", "/api")),
            cors_allowed_origins: vars
                .or("BACKEND_CORS_ORIGINS", DEFAULT_CORS_ORIGINS)
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            database,
            identity,
            http_client_timeout: Duration::from_secs(vars.parsed("HTTP_CLIENT_TIMEOUT_SECS", 10)?),
            user_delete_policy: vars.parsed("USER_DELETE_POLICY", UserDeletePolicy::Reject)?,
            max_page_size,
        })
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}
