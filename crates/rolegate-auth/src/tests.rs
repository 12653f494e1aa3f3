//! End-to-end tests: the real router in front of a mock Discord API.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use mock_discord::{MockDiscord, MockRole, REJECTED_CODE};
use reqwest::Url;

use crate::config::AppConfig;
use crate::permissions::PermissionBits;
use crate::state_token::StateToken;
use crate::{AppState, router};

const CLIENT_ID: &str = "client-1";
const CLIENT_SECRET: &str = "secret-1";
const BOT_TOKEN: &str = "bot-token-1";
const REDIRECT_URI: &str = "http://localhost:8787/callback";

const GUILD: &str = "456";
const ROLE: &str = "123";
const ADMIN_ROLE: &str = "999";
const MEMBER: &str = "4242";
const STRANGER: &str = "5151";

fn config(api_base: Url) -> AppConfig {
    AppConfig {
        client_id: CLIENT_ID.into(),
        client_secret: CLIENT_SECRET.into(),
        redirect_uri: REDIRECT_URI.into(),
        bot_token: BOT_TOKEN.into(),
        api_base,
        listen_port: 0,
        verify_role_permissions: false,
        http_timeout: Duration::from_secs(5),
    }
}

fn discord() -> MockDiscord {
    MockDiscord::new(CLIENT_ID, CLIENT_SECRET, BOT_TOKEN)
        .with_role(GUILD, MockRole::new(ROLE, "Verified", 0))
        .with_role(
            GUILD,
            MockRole::new(ADMIN_ROLE, "Staff", PermissionBits::ADMINISTRATOR),
        )
        .with_member(GUILD, MEMBER)
}

/// Serve `mock` on an ephemeral local port and return its API base URL.
async fn spawn_discord(mock: &MockDiscord) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = mock.router();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/api")).unwrap()
}

async fn gate(mock: &MockDiscord, tweak: impl FnOnce(&mut AppConfig)) -> TestServer {
    let mut cfg = config(spawn_discord(mock).await);
    tweak(&mut cfg);
    let state = Arc::new(AppState::new(cfg).unwrap());
    TestServer::new(router(state)).unwrap()
}

/// Gate whose Discord base points at a closed local port.
async fn offline_gate() -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let cfg = config(Url::parse(&format!("http://{addr}/api")).unwrap());
    let state = Arc::new(AppState::new(cfg).unwrap());
    TestServer::new(router(state)).unwrap()
}

/// Pull the authorization link out of the login page.
fn login_link(page: &str) -> Url {
    let marker = "<a href=\"";
    let rest = &page[page.find(marker).unwrap() + marker.len()..];
    let end = rest.find('"').unwrap();
    Url::parse(&rest[..end].replace("&amp;", "&")).unwrap()
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let server = offline_gate().await;
    for path in ["/", "/logout", "/login/extra", "/api/oauth2/token"] {
        let res = server.get(path).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND, "{path}");
        assert_eq!(res.text(), "Not Found");
    }
}

#[tokio::test]
async fn non_get_methods_are_refused() {
    let server = offline_gate().await;
    let res = server.post("/login").await;
    assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
}

// ---------------------------------------------------------------------------
// /login
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_requires_role_and_guild() {
    let server = offline_gate().await;
    for query in [
        vec![("guild", GUILD)],
        vec![("role", ROLE)],
        vec![],
        vec![("role", ""), ("guild", GUILD)],
    ] {
        let mut req = server.get("/login");
        for (k, v) in query {
            req = req.add_query_param(k, v);
        }
        let res = req.await;
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(res.text(), "Missing role or guild parameter");
    }
}

#[tokio::test]
async fn login_refuses_forbidden_role_names_with_ok_page() {
    let server = offline_gate().await;
    for role in crate::permissions::FORBIDDEN_PERMISSION_NAMES {
        for guild in [GUILD, "anything", "1:2", ":", "not-a-snowflake"] {
            let res = server
                .get("/login")
                .add_query_param("role", role)
                .add_query_param("guild", guild)
                .await;
            assert_eq!(res.status_code(), StatusCode::OK);
            let body = res.text();
            assert!(body.contains("Unsafe Role"), "{role} in {guild}");
            assert!(!body.contains("oauth2/authorize"));
        }
    }
}

#[tokio::test]
async fn login_refuses_delimiter_in_identifiers() {
    let server = offline_gate().await;
    let res = server
        .get("/login")
        .add_query_param("role", "1:2")
        .add_query_param("guild", GUILD)
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_takes_first_value_of_repeated_keys() {
    let server = offline_gate().await;
    let res = server
        .get("/login")
        .add_query_param("role", ROLE)
        .add_query_param("role", "124")
        .add_query_param("guild", GUILD)
        .add_query_param("guild", "789")
        .await;

    assert_eq!(res.status_code(), StatusCode::OK);
    let url = login_link(&res.text());
    assert_eq!(query_value(&url, "state").as_deref(), Some("123:456"));

    let res = server
        .get("/login")
        .add_query_param("role", "ADMINISTRATOR")
        .add_query_param("role", ROLE)
        .add_query_param("guild", GUILD)
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert!(res.text().contains("Unsafe Role"));
}

#[tokio::test]
async fn login_links_to_discord_with_state() {
    let server = offline_gate().await;
    let res = server
        .get("/login")
        .add_query_param("role", ROLE)
        .add_query_param("guild", GUILD)
        .await;

    assert_eq!(res.status_code(), StatusCode::OK);
    let url = login_link(&res.text());
    assert_eq!(url.path(), "/api/oauth2/authorize");
    assert_eq!(query_value(&url, "client_id").as_deref(), Some(CLIENT_ID));
    assert_eq!(query_value(&url, "redirect_uri").as_deref(), Some(REDIRECT_URI));
    assert_eq!(query_value(&url, "response_type").as_deref(), Some("code"));
    assert_eq!(query_value(&url, "state").as_deref(), Some("123:456"));

    let scope = query_value(&url, "scope").unwrap();
    let scopes: Vec<&str> = scope.split(' ').collect();
    assert!(scopes.contains(&"identify"));
    assert!(scopes.contains(&"guilds.join"));
}

#[tokio::test]
async fn login_state_round_trips_into_callback_parse() {
    let server = offline_gate().await;
    let res = server
        .get("/login")
        .add_query_param("role", ROLE)
        .add_query_param("guild", GUILD)
        .await;

    let state = query_value(&login_link(&res.text()), "state").unwrap();
    let token: StateToken = state.parse().unwrap();
    assert_eq!(token.role.as_str(), ROLE);
    assert_eq!(token.guild.as_str(), GUILD);
}

// ---------------------------------------------------------------------------
// /callback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn callback_requires_code_and_state() {
    let server = offline_gate().await;
    for query in [
        vec![("state", "123:456")],
        vec![("code", MEMBER)],
        vec![],
        vec![("code", ""), ("state", "123:456")],
    ] {
        let mut req = server.get("/callback");
        for (k, v) in query {
            req = req.add_query_param(k, v);
        }
        let res = req.await;
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(res.text(), "Missing code or state parameter");
    }
}

#[tokio::test]
async fn callback_rejects_malformed_state_before_calling_discord() {
    let server = offline_gate().await;
    for state in ["123", ":456", "123:", "1:2:3"] {
        let res = server
            .get("/callback")
            .add_query_param("code", MEMBER)
            .add_query_param("state", state)
            .await;
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST, "{state}");
        assert!(res.text().starts_with("invalid state parameter"));
    }
}

#[tokio::test]
async fn callback_takes_first_value_of_repeated_keys() {
    let server = offline_gate().await;
    let res = server
        .get("/callback")
        .add_query_param("code", MEMBER)
        .add_query_param("code", STRANGER)
        .add_query_param("state", "123")
        .add_query_param("state", "123:456")
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert!(res.text().starts_with("invalid state parameter"));

    let mock = discord();
    let server = gate(&mock, |_| {}).await;
    let res = server
        .get("/callback")
        .add_query_param("code", MEMBER)
        .add_query_param("code", STRANGER)
        .add_query_param("state", "123:456")
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert!(mock.has_grant(GUILD, MEMBER, ROLE));
}

#[tokio::test]
async fn callback_grants_role_to_member() {
    let mock = discord();
    let server = gate(&mock, |_| {}).await;

    let res = server
        .get("/callback")
        .add_query_param("code", MEMBER)
        .add_query_param("state", "123:456")
        .await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert!(res.text().contains("Role assigned successfully!"));
    assert!(mock.has_grant(GUILD, MEMBER, ROLE));
}

#[tokio::test]
async fn callback_grant_is_idempotent() {
    let mock = discord();
    let server = gate(&mock, |_| {}).await;

    for _ in 0..2 {
        let res = server
            .get("/callback")
            .add_query_param("code", MEMBER)
            .add_query_param("state", "123:456")
            .await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(res.text().contains("Role assigned successfully!"));
    }
    assert_eq!(mock.grant_calls(), 2);
    assert!(mock.has_grant(GUILD, MEMBER, ROLE));
}

#[tokio::test]
async fn callback_propagates_token_exchange_failure_with_detail() {
    let mock = discord();
    let server = gate(&mock, |cfg| cfg.client_secret = "wrong".into()).await;

    let res = server
        .get("/callback")
        .add_query_param("code", MEMBER)
        .add_query_param("state", "123:456")
        .await;

    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    let body = res.text();
    assert!(body.starts_with("Failed to fetch access token: "));
    assert!(body.contains("invalid_client"));
    assert_eq!(mock.grant_calls(), 0);
}

#[tokio::test]
async fn callback_propagates_rejected_code() {
    let mock = discord();
    let server = gate(&mock, |_| {}).await;

    let res = server
        .get("/callback")
        .add_query_param("code", REJECTED_CODE)
        .add_query_param("state", "123:456")
        .await;

    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert!(res.text().contains("invalid_grant"));
}

#[tokio::test]
async fn callback_propagates_identity_failure_with_detail() {
    let mock = discord();
    let server = gate(&mock, |_| {}).await;

    let res = server
        .get("/callback")
        .add_query_param("code", "REVOKED")
        .add_query_param("state", "123:456")
        .await;

    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    let body = res.text();
    assert!(body.starts_with("Failed to fetch user data: "));
    assert!(body.contains("401: Unauthorized"));
}

#[tokio::test]
async fn callback_reports_non_member_with_ok_page() {
    let mock = discord();
    let server = gate(&mock, |_| {}).await;

    let res = server
        .get("/callback")
        .add_query_param("code", STRANGER)
        .add_query_param("state", "123:456")
        .await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert!(res.text().contains("not a member"));
    assert_eq!(mock.grant_calls(), 0);
}

#[tokio::test]
async fn callback_treats_other_membership_failures_as_fatal() {
    let mock = discord().with_broken_guild(GUILD);
    let server = gate(&mock, |_| {}).await;

    let res = server
        .get("/callback")
        .add_query_param("code", MEMBER)
        .add_query_param("state", "123:456")
        .await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.text().starts_with("Failed to verify guild membership: "));
    assert_eq!(mock.grant_calls(), 0);
}

#[tokio::test]
async fn callback_propagates_role_grant_failure_with_detail() {
    let mock = discord();
    let server = gate(&mock, |_| {}).await;

    let res = server
        .get("/callback")
        .add_query_param("code", MEMBER)
        .add_query_param("state", "777:456")
        .await;

    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    let body = res.text();
    assert!(body.starts_with("Failed to assign role: "));
    assert!(body.contains("Unknown Role"));
}

#[tokio::test]
async fn callback_fails_with_bad_gateway_when_discord_is_unreachable() {
    let server = offline_gate().await;
    let res = server
        .get("/callback")
        .add_query_param("code", MEMBER)
        .add_query_param("state", "123:456")
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_GATEWAY);
}

// ---------------------------------------------------------------------------
// /callback with role permission verification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn verified_callback_refuses_administrator_role() {
    let mock = discord();
    let server = gate(&mock, |cfg| cfg.verify_role_permissions = true).await;

    let res = server
        .get("/callback")
        .add_query_param("code", MEMBER)
        .add_query_param("state", "999:456")
        .await;

    assert_eq!(res.status_code(), StatusCode::OK);
    let body = res.text();
    assert!(body.contains("Unsafe Role"));
    assert!(body.contains("ADMINISTRATOR"));
    assert_eq!(mock.grant_calls(), 0);
}

#[tokio::test]
async fn verified_callback_grants_harmless_role() {
    let mock = discord();
    let server = gate(&mock, |cfg| cfg.verify_role_permissions = true).await;

    let res = server
        .get("/callback")
        .add_query_param("code", MEMBER)
        .add_query_param("state", "123:456")
        .await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert!(res.text().contains("Role assigned successfully!"));
    assert!(mock.has_grant(GUILD, MEMBER, ROLE));
}

#[tokio::test]
async fn verified_callback_rejects_role_missing_from_guild() {
    let mock = discord();
    let server = gate(&mock, |cfg| cfg.verify_role_permissions = true).await;

    let res = server
        .get("/callback")
        .add_query_param("code", MEMBER)
        .add_query_param("state", "777:456")
        .await;

    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(res.text(), "role 777 does not exist in guild 456");
}

#[tokio::test]
async fn unverified_callback_still_grants_administrator_role() {
    let mock = discord();
    let server = gate(&mock, |_| {}).await;

    let res = server
        .get("/callback")
        .add_query_param("code", MEMBER)
        .add_query_param("state", "999:456")
        .await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert!(mock.has_grant(GUILD, MEMBER, ADMIN_ROLE));
}
