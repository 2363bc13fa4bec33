//! The starter kit's HTTP surface.

mod handlers;
mod pages;
mod viewer;

use std::sync::Arc;

use axum::{Router, routing::get};
use sha2::{Digest, Sha512};
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use tracing::warn;

use crate::{
    AppConfig, ClientRegistry, IdentityProvider, KindeManagement, ManagementApi, SessionRouter,
};

pub use viewer::Viewer;

pub const SESSION_COOKIE: &str = "kinde_session";

pub mod paths {
    pub const INDEX: &str = "/";
    pub const LOGIN: &str = "/api/auth/login";
    pub const REGISTER: &str = "/api/auth/register";
    pub const CALLBACK: &str = "/api/auth/kinde_callback";
    pub const LOGOUT: &str = "/api/auth/logout";
    pub const DETAILS: &str = "/details";
    pub const HELPERS: &str = "/helpers";
    pub const API_DEMO: &str = "/api_demo";
}

#[derive(Clone)]
pub enum ManagementAccess {
    Ready(Arc<dyn ManagementApi>),
    Unconfigured(String),
}

impl ManagementAccess {
    pub fn from_config(config: &AppConfig) -> Self {
        let credentials = match config.management() {
            Ok(credentials) => credentials,
            Err(err) => {
                warn!(error = %err, "management api demo disabled");
                return Self::Unconfigured(err.to_string());
            }
        };
        match KindeManagement::new(&config.issuer_url, credentials) {
            Ok(management) => Self::Ready(Arc::new(management)),
            Err(err) => {
                warn!(error = %err, "management api client could not be built");
                Self::Unconfigured(err.to_string())
            }
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<SessionRouter>,
    pub management: ManagementAccess,
    pub callback_url: String,
    pub logout_redirect_url: String,
    session_key: Key,
    secure_cookies: bool,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        provider: Arc<dyn IdentityProvider>,
        management: ManagementAccess,
    ) -> Self {
        let registry = Arc::new(ClientRegistry::new(config.client_idle_timeout));
        Self {
            router: Arc::new(SessionRouter::new(provider, registry)),
            management,
            callback_url: config.callback_url.clone(),
            logout_redirect_url: config.logout_redirect_url.clone(),
            session_key: session_key(&config.secret_key),
            secure_cookies: config.secure_cookies(),
        }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        self.router.registry()
    }
}

fn session_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

pub fn create_router(state: AppState) -> Router {
    let sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE)
        .with_same_site(SameSite::Lax)
        .with_secure(state.secure_cookies)
        .with_expiry(Expiry::OnSessionEnd)
        .with_signed(state.session_key.clone());

    Router::new()
        .route(paths::INDEX, get(handlers::index))
        .route(paths::LOGIN, get(handlers::login))
        .route(paths::REGISTER, get(handlers::register))
        .route(paths::CALLBACK, get(handlers::callback))
        .route(paths::LOGOUT, get(handlers::logout))
        .route(paths::DETAILS, get(handlers::details))
        .route(paths::HELPERS, get(handlers::helpers))
        .route(paths::API_DEMO, get(handlers::api_demo))
        .with_state(state)
        .layer(sessions)
        .layer(TraceLayer::new_for_http())
}
