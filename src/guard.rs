use std::sync::Arc;

use crate::KindeClient;

#[derive(Debug, Clone)]
pub enum Access {
    Allowed(Arc<KindeClient>),
    LoggedOut,
}

pub fn check_access(user_id: Option<&str>, client: Option<Arc<KindeClient>>, now: i64) -> Access {
    match (user_id, client) {
        (Some(user_id), Some(client))
            if client.user_id() == user_id && client.is_authenticated_at(now) =>
        {
            Access::Allowed(client)
        }
        _ => Access::LoggedOut,
    }
}
