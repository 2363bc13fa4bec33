#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use serde_json::{Value, json};

use kinde_starter_kit::web::{AppState, ManagementAccess, create_router};
use kinde_starter_kit::{
    AppConfig, AuthStart, AuthorizationRequest, AuthorizationResponse, ClientRegistry,
    IdentityProvider, KindeClient, KindeError, ManagedOrganization, ManagedUser, ManagementApi,
    PendingLogin, TokenResponse,
};

pub const STATE: &str = "fixed-state";
pub const AUTH_HOST: &str = "https://auth.test";
pub const REFRESH_TOKEN: &str = "refresh-ok";

pub fn jwt(payload: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    format!("{header}.{}.signature", URL_SAFE_NO_PAD.encode(payload.to_string()))
}

pub fn token_response(access: Value, id: Value) -> TokenResponse {
    TokenResponse {
        access_token: jwt(access),
        id_token: Some(jwt(id)),
        refresh_token: None,
        token_type: Some("bearer".to_string()),
        scope: Some("openid profile email offline".to_string()),
        expires_in: Some(3600),
        extra: HashMap::new(),
    }
}

pub fn test_config() -> AppConfig {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("KINDE_ISSUER_URL", AUTH_HOST),
        ("CLIENT_ID", "client-id"),
        ("CLIENT_SECRET", "client-secret"),
        ("SECRET_KEY", "test-secret"),
    ]);
    AppConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap()
}

/// Stands in for Kinde: any callback carrying `code=good` and the fixed
/// state signs in Ada with the given access-token claims.
pub struct FakeProvider {
    pub access_claims: Value,
}

impl FakeProvider {
    pub fn with_flags(feature_flags: Value) -> Self {
        Self {
            access_claims: json!({
                "iss": AUTH_HOST,
                "org_code": "org_123",
                "permissions": ["create:todos"],
                "feature_flags": feature_flags,
            }),
        }
    }

    /// Ada's client as the token endpoint would hand it out.
    pub fn signed_in(
        &self,
        exp: i64,
        refresh_token: Option<&str>,
    ) -> Result<KindeClient, KindeError> {
        let mut access = self.access_claims.clone();
        access["sub"] = json!("kp_ada");
        access["exp"] = json!(exp);
        let id = json!({
            "sub": "kp_ada",
            "given_name": "Ada",
            "family_name": "Lovelace",
            "email": "ada@example.com",
            "org_codes": ["org_123"]
        });
        let mut tokens = token_response(access, id);
        tokens.refresh_token = refresh_token.map(str::to_string);
        KindeClient::from_tokens(tokens)
    }
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::with_flags(json!({
            "theme": {"t": "s", "v": "pink"},
            "is_dark_mode": {"t": "b", "v": true},
            "competitions_limit": {"t": "i", "v": 5}
        }))
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn authorization_request(&self, start: AuthStart) -> Result<AuthorizationRequest, KindeError> {
        let page = match start {
            AuthStart::Login => "login",
            AuthStart::Register => "registration",
        };
        Ok(AuthorizationRequest {
            authorization_url: format!("{AUTH_HOST}/oauth2/auth?state={STATE}&start_page={page}"),
            pending: PendingLogin {
                state: STATE.to_string(),
                code_verifier: None,
            },
        })
    }

    async fn fetch_token(
        &self,
        callback_url: &str,
        pending: &PendingLogin,
    ) -> Result<KindeClient, KindeError> {
        let response = AuthorizationResponse::from_url(callback_url)?;
        let received = response.state.unwrap_or_default();
        if received != pending.state {
            return Err(KindeError::StateMismatch {
                expected: pending.state.clone(),
                received,
            });
        }
        if response.code != "good" {
            return Err(KindeError::HttpStatus {
                status: 400,
                body: r#"{"error":"invalid_grant"}"#.to_string(),
            });
        }

        self.signed_in(Utc::now().timestamp() + 3600, None)
    }

    async fn refresh(&self, client: &KindeClient) -> Result<KindeClient, KindeError> {
        match client.refresh_token() {
            Some(REFRESH_TOKEN) => {
                self.signed_in(Utc::now().timestamp() + 3600, Some("rotated-refresh"))
            }
            _ => Err(KindeError::HttpStatus {
                status: 400,
                body: r#"{"error":"invalid_grant"}"#.to_string(),
            }),
        }
    }

    fn logout_url(&self, redirect_to: &str) -> Result<String, KindeError> {
        Ok(format!("{AUTH_HOST}/logout?redirect={redirect_to}"))
    }
}

pub struct FakeManagement {
    pub fail: bool,
}

#[async_trait]
impl ManagementApi for FakeManagement {
    async fn get_users(&self) -> Result<Vec<ManagedUser>, KindeError> {
        if self.fail {
            return Err(KindeError::HttpStatus {
                status: 403,
                body: "forbidden".to_string(),
            });
        }
        Ok(vec![ManagedUser {
            id: "kp_grace".to_string(),
            email: Some("grace@example.com".to_string()),
            first_name: Some("Grace".to_string()),
            last_name: Some("Hopper".to_string()),
            total_sign_ins: Some(42),
            failed_sign_ins: None,
            is_suspended: Some(false),
            last_signed_in: None,
            created_on: None,
        }])
    }

    async fn get_organizations(&self) -> Result<Vec<ManagedOrganization>, KindeError> {
        Ok(vec![ManagedOrganization {
            code: "org_123".to_string(),
            name: Some("Analytical Engines".to_string()),
            is_default: Some(true),
        }])
    }
}

pub struct TestServer {
    pub base_url: String,
    pub registry: Arc<ClientRegistry>,
    pub http: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn(provider: FakeProvider, management: ManagementAccess) -> Self {
        let state = AppState::new(&test_config(), Arc::new(provider), management);
        let registry = state.registry().clone();
        let app = create_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let http = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        Self {
            base_url,
            registry,
            http,
            handle,
        }
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap()
    }

    pub async fn page(&self, path: &str) -> String {
        let response = self.get(path).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK, "GET {path}");
        response.text().await.unwrap()
    }

    pub async fn sign_in(&self) {
        let login = self.get("/api/auth/login").await;
        assert_eq!(login.status(), reqwest::StatusCode::SEE_OTHER);
        let callback = self
            .get(&format!("/api/auth/kinde_callback?code=good&state={STATE}"))
            .await;
        assert_eq!(location(&callback), "/");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .expect("redirect without location")
        .to_str()
        .unwrap()
        .to_string()
}

pub const LOGGED_OUT_MARKER: &str = "start authenticating";
pub const SIGNED_IN_MARKER: &str = "Woohoo!";
