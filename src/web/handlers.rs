use axum::{
    extract::{RawQuery, State},
    response::{Redirect, Response},
};
use serde::Serialize;
use tower_sessions::Session;
use tracing::warn;

use crate::claims::{FeatureFlag, FlagKind, FlagValue, TokenKind};
use crate::{AuthStart, KindeClient, KindeError};

use super::pages::{
    ApiDemoPage, DetailsPage, HelpersPage, HomePage, LoggedOutPage, OrganizationRow, UserRow,
    current_year, render,
};
use super::{AppState, ManagementAccess, Viewer, paths};

const DEFAULT_THEME: &str = "red";
const DEFAULT_DARK_MODE: bool = false;
const DEFAULT_COMPETITIONS_LIMIT: i64 = 10;

fn logged_out() -> Response {
    render(LoggedOutPage {
        current_year: current_year(),
    })
}

pub(super) async fn index(viewer: Viewer) -> Response {
    match viewer {
        Viewer::Anonymous => logged_out(),
        Viewer::SignedIn(client) => render(HomePage {
            current_year: current_year(),
            user: client.user_details().into(),
        }),
    }
}

pub(super) async fn login(State(state): State<AppState>, session: Session) -> Redirect {
    start_auth(&state, &session, AuthStart::Login).await
}

pub(super) async fn register(State(state): State<AppState>, session: Session) -> Redirect {
    start_auth(&state, &session, AuthStart::Register).await
}

async fn start_auth(state: &AppState, session: &Session, start: AuthStart) -> Redirect {
    match state.router.begin_login(session, start).await {
        Ok(url) => Redirect::to(&url),
        Err(err) => {
            warn!(error = %err, ?start, "could not start authentication");
            Redirect::to(paths::INDEX)
        }
    }
}

pub(super) async fn callback(
    State(state): State<AppState>,
    session: Session,
    RawQuery(query): RawQuery,
) -> Redirect {
    let query = query.unwrap_or_default();
    let callback_url = format!("{}?{}", state.callback_url, query);
    if let Err(err) = state.router.on_callback(&session, &callback_url).await {
        warn!(error = %err, "sign in did not complete");
    }
    Redirect::to(paths::INDEX)
}

pub(super) async fn logout(State(state): State<AppState>, session: Session) -> Redirect {
    state.router.on_logout(&session).await;
    match state
        .router
        .provider()
        .logout_url(&state.logout_redirect_url)
    {
        Ok(url) => Redirect::to(&url),
        Err(err) => {
            warn!(error = %err, "could not build logout url");
            Redirect::to(paths::INDEX)
        }
    }
}

pub(super) async fn details(viewer: Viewer) -> Response {
    let Viewer::SignedIn(client) = viewer else {
        return logged_out();
    };
    render(DetailsPage {
        current_year: current_year(),
        user_id: client.user_id().to_string(),
        user: client.user_details().into(),
        access_token: client.access_token().to_string(),
    })
}

pub(super) async fn helpers(viewer: Viewer) -> Response {
    let Viewer::SignedIn(client) = viewer else {
        return logged_out();
    };

    let flag = client
        .flag("theme", Some(DEFAULT_THEME.into()), None)
        .unwrap_or_else(|err| {
            warn!(error = %err, "theme flag unavailable");
            FeatureFlag {
                code: "theme".to_string(),
                kind: FlagKind::String,
                value: FlagValue::Str(DEFAULT_THEME.to_string()),
                is_default: true,
            }
        });

    render(HelpersPage {
        current_year: current_year(),
        is_authenticated: client.is_authenticated(),
        user_details: pretty(&client.user_details()),
        claim: pretty(&client.claim("iss", TokenKind::Access)),
        permissions: pretty(&client.permissions()),
        permission: pretty(&client.permission("create:todos")),
        organization: pretty(&client.organization()),
        user_organizations: pretty(&client.user_organizations()),
        flag: pretty(&flag),
        bool_flag: or_default(
            client.boolean_flag("is_dark_mode", DEFAULT_DARK_MODE),
            DEFAULT_DARK_MODE,
        ),
        string_flag: or_default(
            client.string_flag("theme", DEFAULT_THEME),
            DEFAULT_THEME.to_string(),
        ),
        int_flag: or_default(
            client.integer_flag("competitions_limit", DEFAULT_COMPETITIONS_LIMIT),
            DEFAULT_COMPETITIONS_LIMIT,
        ),
        user: client.user_details().into(),
    })
}

pub(super) async fn api_demo(State(state): State<AppState>, viewer: Viewer) -> Response {
    let Viewer::SignedIn(client) = viewer else {
        return logged_out();
    };
    render(api_demo_page(&state.management, &client).await)
}

async fn api_demo_page(management: &ManagementAccess, client: &KindeClient) -> ApiDemoPage {
    let mut page = ApiDemoPage {
        current_year: current_year(),
        user: client.user_details().into(),
        is_api_call: false,
        error: String::new(),
        users: Vec::new(),
        organizations: Vec::new(),
    };

    let api = match management {
        ManagementAccess::Ready(api) => api,
        ManagementAccess::Unconfigured(reason) => {
            page.error = reason.clone();
            return page;
        }
    };

    let (users, organizations) = tokio::join!(api.get_users(), api.get_organizations());
    let (users, organizations) = match (users, organizations) {
        (Ok(users), Ok(organizations)) => (users, organizations),
        (Err(err), _) | (_, Err(err)) => {
            warn!(error = %err, "management api call failed");
            page.error = err.to_string();
            return page;
        }
    };

    page.users = users
        .into_iter()
        .map(|user| UserRow {
            first_name: user.first_name.unwrap_or_default(),
            last_name: user.last_name.unwrap_or_default(),
            total_sign_ins: user.total_sign_ins.unwrap_or_default(),
        })
        .collect();
    page.organizations = organizations
        .into_iter()
        .map(|org| OrganizationRow {
            name: org.name.unwrap_or_else(|| org.code.clone()),
            code: org.code,
        })
        .collect();
    page.is_api_call = true;
    page
}

fn or_default<T>(result: Result<T, KindeError>, default: T) -> T {
    result.unwrap_or_else(|err| {
        warn!(error = %err, "helper fell back to default");
        default
    })
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}
