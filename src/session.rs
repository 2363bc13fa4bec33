//! Ties a browser session to the signed-in user's client.
//!
//! The cookie session only holds the user id (and, mid-login, the pending
//! state/verifier). Token state stays server-side in the [`ClientRegistry`].

use std::sync::Arc;

use tower_sessions::Session;
use tracing::{info, warn};

use crate::{
    AuthStart, ClientRegistry, IdentityProvider, KindeClient, KindeError, PendingLogin,
    UserProfile,
};

pub const USER_KEY: &str = "user";
pub const PENDING_LOGIN_KEY: &str = "pending_login";

pub struct SessionRouter {
    provider: Arc<dyn IdentityProvider>,
    registry: Arc<ClientRegistry>,
}

impl SessionRouter {
    pub fn new(provider: Arc<dyn IdentityProvider>, registry: Arc<ClientRegistry>) -> Self {
        Self { provider, registry }
    }

    pub fn provider(&self) -> &dyn IdentityProvider {
        self.provider.as_ref()
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub async fn begin_login(
        &self,
        session: &Session,
        start: AuthStart,
    ) -> Result<String, KindeError> {
        let request = self.provider.authorization_request(start)?;
        session
            .insert(PENDING_LOGIN_KEY, &request.pending)
            .await?;
        Ok(request.authorization_url)
    }

    pub async fn session_user(&self, session: &Session) -> Option<String> {
        match session.get::<String>(USER_KEY).await {
            Ok(user_id) => user_id,
            Err(err) => {
                warn!(error = %err, "could not read session user");
                None
            }
        }
    }

    /// Expired clients are refreshed once per user at a time; a failed
    /// refresh drops the client and the session reads as signed out.
    pub async fn resolve_client(&self, session: &Session) -> Option<Arc<KindeClient>> {
        let user_id = self.session_user(session).await?;
        let client = self.registry.get(&user_id)?;
        if !needs_refresh(&client) {
            return Some(client);
        }

        let lock = self.registry.refresh_lock(&user_id)?;
        let _refreshing = lock.lock().await;
        let client = self.registry.get(&user_id)?;
        if !needs_refresh(&client) {
            return Some(client);
        }

        match self.provider.refresh(&client).await {
            Ok(refreshed) if refreshed.user_id() == user_id => {
                let refreshed = Arc::new(refreshed);
                self.registry.insert(refreshed.clone());
                info!(user_id = %user_id, "refreshed access token");
                Some(refreshed)
            }
            Ok(refreshed) => {
                warn!(
                    user_id = %user_id,
                    refreshed_user = refreshed.user_id(),
                    "refresh returned a different user"
                );
                self.registry.remove_if_same(&user_id, &client);
                None
            }
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "token refresh failed");
                self.registry.remove_if_same(&user_id, &client);
                None
            }
        }
    }

    pub async fn on_callback(
        &self,
        session: &Session,
        callback_url: &str,
    ) -> Result<(UserProfile, Arc<KindeClient>), KindeError> {
        let pending: PendingLogin = session
            .remove(PENDING_LOGIN_KEY)
            .await?
            .ok_or(KindeError::NoPendingLogin)?;

        let client = Arc::new(self.provider.fetch_token(callback_url, &pending).await?);
        let profile = client.user_details();

        session.cycle_id().await?;
        session.insert(USER_KEY, &profile.id).await?;
        self.registry.insert(client.clone());
        info!(user_id = %profile.id, "user signed in");

        Ok((profile, client))
    }

    pub async fn on_logout(&self, session: &Session) {
        if let Some(user_id) = self.session_user(session).await {
            self.registry.remove(&user_id);
            info!(user_id = %user_id, "user signed out");
        }
        if let Err(err) = session.flush().await {
            warn!(error = %err, "could not clear session");
        }
    }
}

fn needs_refresh(client: &KindeClient) -> bool {
    !client.is_authenticated() && client.refresh_token().is_some()
}
