//! Kinde management API access for the demo page.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::ManagementCredentials;
use crate::{KindeError, TokenResponse};

const TOKEN_PATH: &str = "/oauth2/token";
const USERS_PATH: &str = "/api/v1/users";
const ORGANIZATIONS_PATH: &str = "/api/v1/organizations";
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub total_sign_ins: Option<u64>,
    #[serde(default)]
    pub failed_sign_ins: Option<u64>,
    #[serde(default)]
    pub is_suspended: Option<bool>,
    #[serde(default)]
    pub last_signed_in: Option<String>,
    #[serde(default)]
    pub created_on: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedOrganization {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_default: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct UsersPage {
    #[serde(default)]
    users: Option<Vec<ManagedUser>>,
}

#[derive(Debug, Deserialize)]
struct OrganizationsPage {
    #[serde(default)]
    organizations: Option<Vec<ManagedOrganization>>,
}

#[async_trait]
pub trait ManagementApi: Send + Sync {
    async fn get_users(&self) -> Result<Vec<ManagedUser>, KindeError>;

    async fn get_organizations(&self) -> Result<Vec<ManagedOrganization>, KindeError>;
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

#[derive(Debug)]
pub struct KindeManagement {
    issuer_url: String,
    credentials: ManagementCredentials,
    http: Client,
    token: Mutex<Option<CachedToken>>,
}

impl KindeManagement {
    pub fn new(
        issuer_url: impl Into<String>,
        credentials: ManagementCredentials,
    ) -> Result<Self, KindeError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self::with_http_client(issuer_url, credentials, http))
    }

    pub fn with_http_client(
        issuer_url: impl Into<String>,
        credentials: ManagementCredentials,
        http: Client,
    ) -> Self {
        Self {
            issuer_url: issuer_url.into().trim_end_matches('/').to_string(),
            credentials,
            http,
            token: Mutex::new(None),
        }
    }

    pub fn audience(&self) -> String {
        format!("{}/api", self.issuer_url)
    }

    async fn access_token(&self) -> Result<String, KindeError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.request_token().await?;
        let lifetime = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let access_token = token.access_token;
        *cached = Some(CachedToken {
            access_token: access_token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        });
        debug!(lifetime_secs = lifetime.as_secs(), "cached management api token");
        Ok(access_token)
    }

    async fn request_token(&self) -> Result<TokenResponse, KindeError> {
        let mut payload = HashMap::new();
        payload.insert("grant_type", "client_credentials".to_string());
        payload.insert("client_id", self.credentials.client_id.clone());
        payload.insert("client_secret", self.credentials.client_secret.clone());
        payload.insert("audience", self.audience());

        let response = self
            .http
            .post(format!("{}{}", self.issuer_url, TOKEN_PATH))
            .form(&payload)
            .send()
            .await?;
        read_json(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, KindeError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(format!("{}{}", self.issuer_url, path))
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        read_json(response).await
    }
}

#[async_trait]
impl ManagementApi for KindeManagement {
    async fn get_users(&self) -> Result<Vec<ManagedUser>, KindeError> {
        let page: UsersPage = self.get(USERS_PATH).await?;
        Ok(page.users.unwrap_or_default())
    }

    async fn get_organizations(&self) -> Result<Vec<ManagedOrganization>, KindeError> {
        let page: OrganizationsPage = self.get(ORGANIZATIONS_PATH).await?;
        Ok(page.organizations.unwrap_or_default())
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, KindeError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(KindeError::HttpStatus {
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|err| KindeError::InvalidResponse {
        message: err.to_string(),
        body,
    })
}
