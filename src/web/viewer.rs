use std::convert::Infallible;
use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use tower_sessions::Session;
use tracing::warn;

use crate::guard::{Access, check_access};
use crate::KindeClient;

use super::AppState;

pub enum Viewer {
    SignedIn(Arc<KindeClient>),
    Anonymous,
}

impl FromRequestParts<AppState> for Viewer {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Ok(session) = Session::from_request_parts(parts, state).await else {
            warn!("no session on request");
            return Ok(Self::Anonymous);
        };

        let user_id = state.router.session_user(&session).await;
        let client = match user_id {
            Some(_) => state.router.resolve_client(&session).await,
            None => None,
        };

        Ok(
            match check_access(user_id.as_deref(), client, Utc::now().timestamp()) {
                Access::Allowed(client) => Self::SignedIn(client),
                Access::LoggedOut => Self::Anonymous,
            },
        )
    }
}
