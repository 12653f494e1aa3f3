//! Local stand-in for the slice of the Discord REST API that `rolegate-auth`
//! talks to.
//!
//! Every route lives under `/api`, mirroring `https://discord.com/api`, so the
//! service only needs its `DISCORD_API_BASE` pointed at this server.
//!
//! Identities are derived from the authorization code, in the same spirit as
//! mock-oidc: exchanging code `"4242"` yields access token `"mock_4242"`, and
//! `/users/@me` answers with user id `"4242"`.  A few codes are reserved to
//! drive failure paths:
//!
//! | Code | Effect |
//! |------|--------|
//! | [`REJECTED_CODE`] | token endpoint answers `400 invalid_grant` |
//! | any non-numeric code | `/users/@me` answers `401 Unauthorized` |

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Form, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

/// Prefix of every access token handed out by the token endpoint.
pub const ACCESS_TOKEN_PREFIX: &str = "mock_";

/// Authorization code the token endpoint always refuses.
pub const REJECTED_CODE: &str = "INVALID";

/// A role as the mock guild directory knows it.
#[derive(Debug, Clone)]
pub struct MockRole {
    /// Role snowflake.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Permission bitmask (serialised as a decimal string, like Discord).
    pub permissions: u64,
}

impl MockRole {
    /// Convenience constructor.
    pub fn new(id: &str, name: &str, permissions: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            permissions,
        }
    }
}

#[derive(Debug, Default)]
struct Directory {
    /// `(guild_id, user_id)` pairs.
    members: HashSet<(String, String)>,
    /// guild_id → roles defined in that guild.
    roles: HashMap<String, Vec<MockRole>>,
    /// `(guild_id, user_id, role_id)` triples.
    grants: HashSet<(String, String, String)>,
    /// Number of successful role PUTs, including repeats.
    grant_calls: usize,
    /// Guilds whose member lookups fail with a 500.
    broken_guilds: HashSet<String>,
}

/// Shared handle to a mock Discord instance.
///
/// Cloning is cheap; all clones observe the same directory, so a test can keep
/// one handle for assertions while the router owns another.
#[derive(Debug, Clone)]
pub struct MockDiscord {
    client_id: String,
    client_secret: String,
    bot_token: String,
    directory: Arc<Mutex<Directory>>,
}

impl MockDiscord {
    /// Create an empty mock accepting the given application credentials.
    pub fn new(client_id: &str, client_secret: &str, bot_token: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            bot_token: bot_token.to_string(),
            directory: Arc::default(),
        }
    }

    /// Register `user` as a member of `guild`.
    pub fn with_member(self, guild: &str, user: &str) -> Self {
        self.directory()
            .members
            .insert((guild.to_string(), user.to_string()));
        self
    }

    /// Define a role inside `guild`.
    pub fn with_role(self, guild: &str, role: MockRole) -> Self {
        self.directory()
            .roles
            .entry(guild.to_string())
            .or_default()
            .push(role);
        self
    }

    /// Make every member lookup in `guild` fail with a 500.
    pub fn with_broken_guild(self, guild: &str) -> Self {
        self.directory().broken_guilds.insert(guild.to_string());
        self
    }

    /// Whether `role` has been granted to `user` in `guild`.
    pub fn has_grant(&self, guild: &str, user: &str, role: &str) -> bool {
        self.directory().grants.contains(&(
            guild.to_string(),
            user.to_string(),
            role.to_string(),
        ))
    }

    /// Number of successful role-assignment calls received so far.
    pub fn grant_calls(&self) -> usize {
        self.directory().grant_calls
    }

    /// Build the Axum router serving this mock under `/api`.
    pub fn router(&self) -> Router {
        let api = Router::new()
            .route("/oauth2/token", post(token))
            .route("/users/@me", get(current_user))
            .route("/guilds/{guild_id}/members/{user_id}", get(guild_member))
            .route("/guilds/{guild_id}/roles", get(guild_roles))
            .route(
                "/guilds/{guild_id}/members/{user_id}/roles/{role_id}",
                put(add_member_role),
            )
            .with_state(self.clone());

        Router::new().nest("/api", api)
    }

    fn directory(&self) -> MutexGuard<'_, Directory> {
        self.directory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_bot(&self, headers: &HeaderMap) -> bool {
        authorization(headers).and_then(|v| v.strip_prefix("Bot ")) == Some(self.bot_token.as_str())
    }
}

// --- Helpers ---

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

fn discord_error(status: StatusCode, message: &str, code: u32) -> Response {
    (status, Json(json!({ "message": message, "code": code }))).into_response()
}

fn unauthorized() -> Response {
    discord_error(StatusCode::UNAUTHORIZED, "401: Unauthorized", 0)
}

// --- Endpoints ---

#[derive(Debug, Deserialize)]
struct TokenRequest {
    client_id: Option<String>,
    client_secret: Option<String>,
    grant_type: Option<String>,
    code: Option<String>,
    redirect_uri: Option<String>,
}

async fn token(State(mock): State<MockDiscord>, Form(req): Form<TokenRequest>) -> Response {
    if req.client_id.as_deref() != Some(mock.client_id.as_str())
        || req.client_secret.as_deref() != Some(mock.client_secret.as_str())
    {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid_client" })),
        )
            .into_response();
    }

    if req.grant_type.as_deref() != Some("authorization_code") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "unsupported_grant_type" })),
        )
            .into_response();
    }

    let code = match (req.code, req.redirect_uri) {
        (Some(code), Some(_)) if code != REJECTED_CODE => code,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "invalid_grant",
                    "error_description": "Invalid \"code\" in request."
                })),
            )
                .into_response();
        }
    };

    Json(json!({
        "access_token": format!("{ACCESS_TOKEN_PREFIX}{code}"),
        "token_type": "Bearer",
        "expires_in": 604_800,
        "refresh_token": format!("refresh_{code}"),
        "scope": "identify guilds.join"
    }))
    .into_response()
}

async fn current_user(headers: HeaderMap) -> Response {
    let user_id = authorization(&headers)
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|t| t.strip_prefix(ACCESS_TOKEN_PREFIX))
        .filter(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()));

    match user_id {
        Some(id) => Json(json!({
            "id": id,
            "username": format!("user{id}"),
            "discriminator": "0",
            "avatar": null
        }))
        .into_response(),
        None => unauthorized(),
    }
}

async fn guild_member(
    State(mock): State<MockDiscord>,
    Path((guild_id, user_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !mock.is_bot(&headers) {
        return unauthorized();
    }

    let dir = mock.directory();
    if dir.broken_guilds.contains(&guild_id) {
        return discord_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", 0);
    }
    if !dir.members.contains(&(guild_id.clone(), user_id.clone())) {
        return discord_error(StatusCode::NOT_FOUND, "Unknown Member", 10007);
    }

    let roles: Vec<&String> = dir
        .grants
        .iter()
        .filter(|(g, u, _)| *g == guild_id && *u == user_id)
        .map(|(_, _, r)| r)
        .collect();

    Json(json!({
        "user": { "id": user_id },
        "roles": roles,
        "deaf": false,
        "mute": false
    }))
    .into_response()
}

async fn guild_roles(
    State(mock): State<MockDiscord>,
    Path(guild_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !mock.is_bot(&headers) {
        return unauthorized();
    }

    let dir = mock.directory();
    let Some(roles) = dir.roles.get(&guild_id) else {
        return discord_error(StatusCode::NOT_FOUND, "Unknown Guild", 10004);
    };

    let body: Vec<_> = roles
        .iter()
        .map(|r| {
            json!({
                "id": r.id,
                "name": r.name,
                "permissions": r.permissions.to_string()
            })
        })
        .collect();
    Json(body).into_response()
}

async fn add_member_role(
    State(mock): State<MockDiscord>,
    Path((guild_id, user_id, role_id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    if !mock.is_bot(&headers) {
        return unauthorized();
    }

    let mut dir = mock.directory();
    if !dir.members.contains(&(guild_id.clone(), user_id.clone())) {
        return discord_error(StatusCode::NOT_FOUND, "Unknown Member", 10007);
    }
    let role_known = dir
        .roles
        .get(&guild_id)
        .is_some_and(|roles| roles.iter().any(|r| r.id == role_id));
    if !role_known {
        return discord_error(StatusCode::NOT_FOUND, "Unknown Role", 10011);
    }

    dir.grants.insert((guild_id, user_id, role_id));
    dir.grant_calls += 1;
    StatusCode::NO_CONTENT.into_response()
}
