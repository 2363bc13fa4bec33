//! Kinde authentication starter kit.
//!
//! An axum site that signs users in through Kinde's hosted pages, keeps each
//! signed-in user's tokens server-side, and shows what the tokens carry:
//! profile fields, claims, permissions, organizations and feature flags. A
//! separate page lists users and organizations through the management API.

pub mod claims;
mod client;
mod config;
mod error;
pub mod guard;
mod management;
mod pkce;
mod provider;
mod registry;
mod server;
mod session;
mod types;
mod user_client;
pub mod web;

pub use client::{KindeAuth, KindeAuthConfig};
pub use config::{AppConfig, GrantType, ManagementCredentials};
pub use error::KindeError;
pub use management::{KindeManagement, ManagedOrganization, ManagedUser, ManagementApi};
pub use pkce::PkcePair;
pub use provider::IdentityProvider;
pub use registry::ClientRegistry;
pub use server::serve;
pub use session::SessionRouter;
pub use types::{
    AuthStart, AuthorizationRequest, AuthorizationResponse, PendingLogin, TokenResponse,
    UserProfile,
};
pub use user_client::KindeClient;
