use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use chrono::{Datelike, Utc};
use tracing::error;

use crate::UserProfile;

pub(super) fn current_year() -> i32 {
    Utc::now().year()
}

pub(super) fn render<T: Template>(page: T) -> Response {
    match page.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            error!(error = %err, "template rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "template error").into_response()
        }
    }
}

pub(super) struct UserView {
    pub given_name: String,
    pub family_name: String,
    pub email: String,
    pub picture: Option<String>,
    pub initials: String,
}

impl From<UserProfile> for UserView {
    fn from(profile: UserProfile) -> Self {
        let given_name = profile.given_name.unwrap_or_default();
        let family_name = profile.family_name.unwrap_or_default();
        let initials = [&given_name, &family_name]
            .iter()
            .filter_map(|name| name.chars().next())
            .collect();
        Self {
            given_name,
            family_name,
            email: profile.email.unwrap_or_default(),
            picture: profile.picture,
            initials,
        }
    }
}

pub(super) struct UserRow {
    pub first_name: String,
    pub last_name: String,
    pub total_sign_ins: u64,
}

pub(super) struct OrganizationRow {
    pub code: String,
    pub name: String,
}

#[derive(Template)]
#[template(path = "logged_out.html")]
pub(super) struct LoggedOutPage {
    pub current_year: i32,
}

#[derive(Template)]
#[template(path = "home.html")]
pub(super) struct HomePage {
    pub current_year: i32,
    pub user: UserView,
}

#[derive(Template)]
#[template(path = "details.html")]
pub(super) struct DetailsPage {
    pub current_year: i32,
    pub user: UserView,
    pub user_id: String,
    pub access_token: String,
}

#[derive(Template)]
#[template(path = "helpers.html")]
pub(super) struct HelpersPage {
    pub current_year: i32,
    pub user: UserView,
    pub is_authenticated: bool,
    pub user_details: String,
    pub claim: String,
    pub permissions: String,
    pub permission: String,
    pub organization: String,
    pub user_organizations: String,
    pub flag: String,
    pub bool_flag: bool,
    pub string_flag: String,
    pub int_flag: i64,
}

#[derive(Template)]
#[template(path = "api_demo.html")]
pub(super) struct ApiDemoPage {
    pub current_year: i32,
    pub user: UserView,
    pub is_api_call: bool,
    pub error: String,
    pub users: Vec<UserRow>,
    pub organizations: Vec<OrganizationRow>,
}
