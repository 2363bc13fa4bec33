use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::config::{AppConfig, DEFAULT_SCOPE, GrantType};
use crate::pkce::{PkcePair, generate_state};
use crate::{
    AuthStart, AuthorizationRequest, AuthorizationResponse, IdentityProvider, KindeClient,
    KindeError, PendingLogin, TokenResponse,
};

const AUTHORIZE_PATH: &str = "/oauth2/auth";
const TOKEN_PATH: &str = "/oauth2/token";
const LOGOUT_PATH: &str = "/logout";

#[derive(Debug, Clone)]
pub struct KindeAuthConfig {
    pub issuer_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub grant_type: GrantType,
    pub scope: String,
    pub timeout: Option<Duration>,
}

impl KindeAuthConfig {
    pub fn new(
        issuer_url: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            issuer_url: issuer_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            grant_type: GrantType::AuthorizationCode,
            scope: DEFAULT_SCOPE.to_string(),
            timeout: None,
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        let mut auth = Self::new(&config.issuer_url, &config.client_id, &config.callback_url)
            .with_grant_type(config.grant_type)
            .with_scope(&config.scope);
        if let Some(secret) = &config.client_secret {
            auth = auth.with_client_secret(secret);
        }
        auth
    }

    pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn with_grant_type(mut self, grant_type: GrantType) -> Self {
        self.grant_type = grant_type;
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.issuer_url, path)
    }
}

#[derive(Debug, Clone)]
pub struct KindeAuth {
    config: KindeAuthConfig,
    http: Client,
}

impl KindeAuth {
    pub fn new(config: KindeAuthConfig) -> Result<Self, KindeError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self { config, http })
    }

    pub fn authorization_url(&self, start: AuthStart) -> Result<AuthorizationRequest, KindeError> {
        let state = generate_state()?;
        let pkce = if self.config.grant_type.uses_pkce() {
            Some(PkcePair::generate()?)
        } else {
            None
        };

        let mut params: Vec<(String, String)> = vec![
            ("response_type".to_string(), "code".to_string()),
            ("client_id".to_string(), self.config.client_id.clone()),
            ("redirect_uri".to_string(), self.config.redirect_uri.clone()),
            ("scope".to_string(), self.config.scope.clone()),
            ("state".to_string(), state.clone()),
        ];
        if let Some(pkce) = &pkce {
            params.push(("code_challenge".to_string(), pkce.code_challenge.clone()));
            params.push(("code_challenge_method".to_string(), "S256".to_string()));
        }
        if start == AuthStart::Register {
            params.push(("start_page".to_string(), "registration".to_string()));
        }

        let mut url = Url::parse(&self.config.endpoint(AUTHORIZE_PATH))?;
        url.query_pairs_mut().extend_pairs(params);

        Ok(AuthorizationRequest {
            authorization_url: url.to_string(),
            pending: PendingLogin {
                state,
                code_verifier: pkce.map(|pkce| pkce.code_verifier),
            },
        })
    }

    pub async fn exchange_code(
        &self,
        response: AuthorizationResponse,
        pending: &PendingLogin,
    ) -> Result<TokenResponse, KindeError> {
        let AuthorizationResponse { code, state } = response;
        let returned = state.unwrap_or_default();
        if returned != pending.state {
            return Err(KindeError::StateMismatch {
                expected: pending.state.clone(),
                received: returned,
            });
        }

        let mut payload = HashMap::new();
        payload.insert("grant_type".to_string(), "authorization_code".to_string());
        payload.insert("code".to_string(), code);
        payload.insert("redirect_uri".to_string(), self.config.redirect_uri.clone());
        if let Some(verifier) = &pending.code_verifier {
            payload.insert("code_verifier".to_string(), verifier.clone());
        }

        self.send_token_request(payload).await
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, KindeError> {
        let mut payload = HashMap::new();
        payload.insert("grant_type".to_string(), "refresh_token".to_string());
        payload.insert("refresh_token".to_string(), refresh_token.to_string());

        self.send_token_request(payload).await
    }

    pub fn logout_url(&self, redirect_to: &str) -> Result<String, KindeError> {
        let mut url = Url::parse(&self.config.endpoint(LOGOUT_PATH))?;
        url.query_pairs_mut().append_pair("redirect", redirect_to);
        Ok(url.to_string())
    }

    async fn send_token_request(
        &self,
        mut payload: HashMap<String, String>,
    ) -> Result<TokenResponse, KindeError> {
        payload.insert("client_id".to_string(), self.config.client_id.clone());
        if let Some(secret) = &self.config.client_secret {
            payload.insert("client_secret".to_string(), secret.clone());
        }

        let response = self
            .http
            .post(self.config.endpoint(TOKEN_PATH))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), "token endpoint responded");

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
}

#[async_trait]
impl IdentityProvider for KindeAuth {
    fn authorization_request(&self, start: AuthStart) -> Result<AuthorizationRequest, KindeError> {
        self.authorization_url(start)
    }

    async fn fetch_token(
        &self,
        callback_url: &str,
        pending: &PendingLogin,
    ) -> Result<KindeClient, KindeError> {
        let response = AuthorizationResponse::from_url(callback_url)?;
        let tokens = self.exchange_code(response, pending).await?;
        KindeClient::from_tokens(tokens)
    }

    async fn refresh(&self, client: &KindeClient) -> Result<KindeClient, KindeError> {
        let refresh_token = client
            .refresh_token()
            .ok_or(KindeError::MissingRefreshToken)?;
        let mut tokens = self.refresh_token(refresh_token).await?;
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }
        if tokens.id_token.is_none() {
            tokens.id_token = client.tokens().id_token.clone();
        }
        KindeClient::from_tokens(tokens)
    }

    fn logout_url(&self, redirect_to: &str) -> Result<String, KindeError> {
        KindeAuth::logout_url(self, redirect_to)
    }
}
