mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use common::{jwt, token_response};
use kinde_starter_kit::{
    AuthStart, GrantType, IdentityProvider, KindeAuth, KindeAuthConfig, KindeError,
    KindeManagement, ManagementApi, ManagementCredentials,
};

const CALLBACK: &str = "http://localhost:5000/api/auth/kinde_callback";

#[derive(Clone, Default)]
struct FakeKinde {
    token_requests: Arc<AtomicUsize>,
}

async fn token(State(kinde): State<FakeKinde>, Form(form): Form<HashMap<String, String>>) -> Response {
    kinde.token_requests.fetch_add(1, Ordering::SeqCst);
    let field = |name: &str| form.get(name).map(String::as_str);

    match field("grant_type") {
        Some("authorization_code") => {
            if field("code") != Some("abc") || field("client_id") != Some("client-id") {
                return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"})))
                    .into_response();
            }
            let mut tokens = token_response(
                json!({"sub": "kp_ada", "exp": 4102444800_i64, "verifier": field("code_verifier")}),
                json!({"sub": "kp_ada", "given_name": "Ada"}),
            );
            tokens.refresh_token = Some("refresh-1".to_string());
            Json(tokens).into_response()
        }
        Some("refresh_token") if field("refresh_token") == Some("refresh-1") => Json(json!({
            "access_token": jwt(json!({"sub": "kp_ada", "exp": 4102444800_i64, "refreshed": true})),
            "token_type": "bearer",
            "expires_in": 3600
        }))
        .into_response(),
        Some("client_credentials")
            if field("audience").is_some_and(|aud| aud.ends_with("/api"))
                && field("client_secret") == Some("m2m-secret") =>
        {
            Json(json!({"access_token": "m2m-token", "token_type": "bearer", "expires_in": 86400}))
                .into_response()
        }
        _ => (StatusCode::BAD_REQUEST, Json(json!({"error": "unsupported_grant_type"})))
            .into_response(),
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some("Bearer m2m-token")
}

async fn users(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "code": "OK",
        "message": "Success",
        "users": [
            {"id": "kp_1", "first_name": "Grace", "last_name": "Hopper", "total_sign_ins": 7},
            {"id": "kp_2", "email": "anon@example.com"}
        ],
        "next_token": null
    }))
    .into_response()
}

async fn organizations(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "code": "OK",
        "message": "Success",
        "organizations": [{"code": "org_123", "name": "Analytical Engines", "is_default": true}]
    }))
    .into_response()
}

async fn spawn_kinde() -> (String, FakeKinde) {
    let kinde = FakeKinde::default();
    let app = Router::new()
        .route("/oauth2/token", post(token))
        .route("/api/v1/users", get(users))
        .route("/api/v1/organizations", get(organizations))
        .with_state(kinde.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (base_url, kinde)
}

fn auth(issuer: &str, grant_type: GrantType) -> KindeAuth {
    KindeAuth::new(
        KindeAuthConfig::new(issuer, "client-id", CALLBACK)
            .with_client_secret("client-secret")
            .with_grant_type(grant_type),
    )
    .unwrap()
}

#[tokio::test]
async fn exchanges_code_for_a_signed_in_client() {
    let (issuer, _) = spawn_kinde().await;
    let auth = auth(&issuer, GrantType::AuthorizationCodeWithPkce);

    let request = auth.authorization_request(AuthStart::Login).unwrap();
    let callback = format!("{CALLBACK}?code=abc&state={}", request.pending.state);
    let client = auth.fetch_token(&callback, &request.pending).await.unwrap();

    assert_eq!(client.user_id(), "kp_ada");
    assert!(client.is_authenticated());
    assert_eq!(client.user_details().given_name.as_deref(), Some("Ada"));
    let verifier = client.claim("verifier", Default::default()).value;
    assert_eq!(verifier, json!(request.pending.code_verifier.unwrap()));
}

#[tokio::test]
async fn rejected_code_surfaces_http_status() {
    let (issuer, _) = spawn_kinde().await;
    let auth = auth(&issuer, GrantType::AuthorizationCode);

    let request = auth.authorization_request(AuthStart::Login).unwrap();
    let callback = format!("{CALLBACK}?code=wrong&state={}", request.pending.state);
    let result = auth.fetch_token(&callback, &request.pending).await;
    assert!(matches!(result, Err(KindeError::HttpStatus { status: 400, .. })));
}

#[tokio::test]
async fn refresh_keeps_refresh_and_id_tokens() {
    let (issuer, _) = spawn_kinde().await;
    let auth = auth(&issuer, GrantType::AuthorizationCode);

    let request = auth.authorization_request(AuthStart::Login).unwrap();
    let callback = format!("{CALLBACK}?code=abc&state={}", request.pending.state);
    let client = auth.fetch_token(&callback, &request.pending).await.unwrap();

    let refreshed = auth.refresh(&client).await.unwrap();
    assert_eq!(refreshed.user_id(), "kp_ada");
    assert_eq!(refreshed.refresh_token(), Some("refresh-1"));
    assert_eq!(refreshed.user_details().given_name.as_deref(), Some("Ada"));
    assert_eq!(refreshed.claim("refreshed", Default::default()).value, json!(true));
}

#[tokio::test]
async fn management_client_caches_its_token() {
    let (issuer, kinde) = spawn_kinde().await;
    let management = KindeManagement::new(
        &issuer,
        ManagementCredentials {
            client_id: "m2m".to_string(),
            client_secret: "m2m-secret".to_string(),
        },
    )
    .unwrap();

    let users = management.get_users().await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].first_name.as_deref(), Some("Grace"));
    assert_eq!(users[1].total_sign_ins, None);

    let organizations = management.get_organizations().await.unwrap();
    assert_eq!(organizations[0].code, "org_123");

    assert_eq!(kinde.token_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn management_client_reports_bad_credentials() {
    let (issuer, _) = spawn_kinde().await;
    let management = KindeManagement::new(
        &issuer,
        ManagementCredentials {
            client_id: "m2m".to_string(),
            client_secret: "wrong".to_string(),
        },
    )
    .unwrap();

    let result = management.get_users().await;
    assert!(matches!(result, Err(KindeError::HttpStatus { status: 400, .. })));
}
