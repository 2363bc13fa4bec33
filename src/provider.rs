use async_trait::async_trait;

use crate::{AuthStart, AuthorizationRequest, KindeClient, KindeError, PendingLogin};

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn authorization_request(&self, start: AuthStart) -> Result<AuthorizationRequest, KindeError>;

    async fn fetch_token(
        &self,
        callback_url: &str,
        pending: &PendingLogin,
    ) -> Result<KindeClient, KindeError>;

    async fn refresh(&self, client: &KindeClient) -> Result<KindeClient, KindeError>;

    fn logout_url(&self, redirect_to: &str) -> Result<String, KindeError>;
}
