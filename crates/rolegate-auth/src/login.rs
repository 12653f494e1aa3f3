//! `GET /login` — first phase of the flow.
//!
//! Screens the requested role and renders a link to Discord's authorization
//! endpoint.  No Discord API call is made here.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Html;
use reqwest::Url;
use tracing::info;

use crate::AppState;
use crate::config::AppConfig;
use crate::discord::{OAUTH_SCOPES, api_url};
use crate::error::GateError;
use crate::ids::{GuildId, RoleId};
use crate::pages;
use crate::permissions::is_forbidden_name;
use crate::query::{QueryPairs, first};
use crate::state_token::StateToken;

/// Query of `GET /login`.
#[derive(Debug)]
pub struct LoginParams {
    role: Option<String>,
    guild: Option<String>,
}

impl From<QueryPairs> for LoginParams {
    fn from(pairs: QueryPairs) -> Self {
        Self {
            role: first(&pairs, "role"),
            guild: first(&pairs, "guild"),
        }
    }
}

/// Role and guild requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignmentRequest {
    /// Role to grant.
    pub role: RoleId,
    /// Guild the role belongs to.
    pub guild: GuildId,
}

impl TryFrom<LoginParams> for RoleAssignmentRequest {
    type Error = GateError;

    fn try_from(params: LoginParams) -> Result<Self, Self::Error> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        match (non_empty(params.role), non_empty(params.guild)) {
            (Some(role), Some(guild)) => Ok(Self {
                role: role.into(),
                guild: guild.into(),
            }),
            _ => Err(GateError::MissingParameter("Missing role or guild parameter")),
        }
    }
}

/// Build the Discord authorization URL for `state`.
pub fn authorization_url(config: &AppConfig, state: &StateToken) -> Url {
    let mut url = api_url(&config.api_base, &["oauth2", "authorize"]);
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", OAUTH_SCOPES)
        .append_pair("state", &state.to_string());
    url
}

/// `GET /login?role=<id>&guild=<id>`.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Html<String>, GateError> {
    let request = RoleAssignmentRequest::try_from(LoginParams::from(pairs))?;

    // The name check applies whatever the guild looks like.
    if is_forbidden_name(&request.role) {
        info!(role = %request.role, guild = %request.guild, "refused role with forbidden name");
        return Ok(pages::unsafe_role(&[request.role.as_str()]));
    }

    let token = StateToken::new(request.role, request.guild)?;
    let url = authorization_url(&state.config, &token);
    info!(role = %token.role, guild = %token.guild, "login link issued");
    Ok(pages::login(url.as_str()))
}
