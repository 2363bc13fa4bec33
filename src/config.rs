//! Application configuration.
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file, using the same variable names as the other Kinde starter kits.

use std::str::FromStr;
use std::time::Duration;

use crate::KindeError;

pub const DEFAULT_SCOPE: &str = "openid profile email offline";
const DEFAULT_CLIENT_IDLE_TIMEOUT_SECS: u64 = 8 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrantType {
    #[default]
    AuthorizationCode,
    AuthorizationCodeWithPkce,
}

impl GrantType {
    pub fn uses_pkce(self) -> bool {
        matches!(self, Self::AuthorizationCodeWithPkce)
    }
}

impl FromStr for GrantType {
    type Err = KindeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "authorization_code_with_pkce" => Ok(Self::AuthorizationCodeWithPkce),
            other => Err(KindeError::InvalidConfig {
                name: "GRANT_TYPE".to_string(),
                message: format!("unsupported grant type {other:?}"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub site_host: String,
    pub site_port: u16,
    pub site_url: String,
    pub callback_url: String,
    pub logout_redirect_url: String,
    pub issuer_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub grant_type: GrantType,
    pub scope: String,
    pub secret_key: String,
    pub client_idle_timeout: Duration,
    mgmt_client_id: Option<String>,
    mgmt_client_secret: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, KindeError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, KindeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let mut missing = Vec::new();
        let mut require = |name: &str| {
            let value = read(name);
            if value.is_none() {
                missing.push(name.to_string());
            }
            value.unwrap_or_default()
        };
        let issuer_url = require("KINDE_ISSUER_URL");
        let client_id = require("CLIENT_ID");
        let secret_key = require("SECRET_KEY");

        let grant_type = match read("GRANT_TYPE") {
            Some(value) => value.parse()?,
            None => GrantType::default(),
        };

        let client_secret = read("CLIENT_SECRET");
        if client_secret.is_none() && grant_type == GrantType::AuthorizationCode {
            missing.push("CLIENT_SECRET".to_string());
        }

        if !missing.is_empty() {
            return Err(KindeError::MissingConfig { names: missing });
        }

        let site_host = read("SITE_HOST").unwrap_or_else(|| "localhost".to_string());
        let site_port = match read("SITE_PORT") {
            Some(port) => port.parse().map_err(|_| KindeError::InvalidConfig {
                name: "SITE_PORT".to_string(),
                message: format!("{port:?} is not a port number"),
            })?,
            None => 5000,
        };
        let site_url = read("SITE_URL").unwrap_or_else(|| format!("http://{site_host}:{site_port}"));
        let callback_url = read("KINDE_CALLBACK_URL")
            .unwrap_or_else(|| format!("{}/api/auth/kinde_callback", site_url.trim_end_matches('/')));
        let logout_redirect_url = read("LOGOUT_REDIRECT_URL").unwrap_or_else(|| site_url.clone());

        let client_idle_timeout = match read("CLIENT_IDLE_TIMEOUT_SECS") {
            Some(secs) => match secs.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(KindeError::InvalidConfig {
                        name: "CLIENT_IDLE_TIMEOUT_SECS".to_string(),
                        message: format!("{secs:?} is not a positive number of seconds"),
                    });
                }
            },
            None => Duration::from_secs(DEFAULT_CLIENT_IDLE_TIMEOUT_SECS),
        };

        Ok(Self {
            site_host,
            site_port,
            site_url,
            callback_url,
            logout_redirect_url,
            issuer_url: issuer_url.trim_end_matches('/').to_string(),
            client_id,
            client_secret,
            grant_type,
            scope: read("SCOPE").unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
            secret_key,
            client_idle_timeout,
            mgmt_client_id: read("MGMT_API_CLIENT_ID"),
            mgmt_client_secret: read("MGMT_API_CLIENT_SECRET"),
        })
    }

    pub fn management(&self) -> Result<ManagementCredentials, KindeError> {
        match (&self.mgmt_client_id, &self.mgmt_client_secret) {
            (Some(client_id), Some(client_secret)) => Ok(ManagementCredentials {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
            }),
            (id, secret) => {
                let mut names = Vec::new();
                if id.is_none() {
                    names.push("MGMT_API_CLIENT_ID".to_string());
                }
                if secret.is_none() {
                    names.push("MGMT_API_CLIENT_SECRET".to_string());
                }
                Err(KindeError::MissingConfig { names })
            }
        }
    }

    pub fn secure_cookies(&self) -> bool {
        self.site_url.starts_with("https://")
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.site_host, self.site_port)
    }
}
