//! `GET /callback` — second phase of the flow.
//!
//! Steps, each depending on the previous one:
//!
//! 1. exchange the authorization code for an access token
//! 2. identify the user with that token
//! 3. check guild membership with the bot token (404 ends the flow normally)
//! 4. optionally resolve the role's permission bitmask
//! 5. grant the role
//!
//! Any failing step ends the request with the error Discord reported.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Html;
use tracing::info;

use crate::AppState;
use crate::discord::DiscordClient;
use crate::error::GateError;
use crate::ids::UserId;
use crate::pages;
use crate::permissions::PermissionBits;
use crate::query::{QueryPairs, first};
use crate::state_token::StateToken;

/// `GET /callback?code=<code>&state=<role>:<guild>`.
pub async fn handle_callback(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Html<String>, GateError> {
    let non_empty = |key: &str| first(&pairs, key).filter(|s| !s.is_empty());
    let (Some(code), Some(raw_state)) = (non_empty("code"), non_empty("state")) else {
        return Err(GateError::MissingParameter("Missing code or state parameter"));
    };
    let token: StateToken = raw_state.parse()?;
    let discord = &state.discord;

    let access_token = discord.exchange_code(&code).await?;
    info!(role = %token.role, guild = %token.guild, "authorization code exchanged");

    let user = discord.current_user(&access_token).await?;
    drop(access_token);
    info!(
        user = %user.id,
        username = user.username.as_deref().unwrap_or(""),
        "user identified"
    );

    if !discord.is_member(&token.guild, &user.id).await? {
        info!(user = %user.id, guild = %token.guild, "user is not a guild member");
        return Ok(pages::not_member());
    }

    if state.config.verify_role_permissions {
        let sensitive = sensitive_permissions(discord, &token).await?;
        if !sensitive.is_empty() {
            info!(
                role = %token.role,
                guild = %token.guild,
                permissions = ?sensitive,
                "refused role carrying sensitive permissions"
            );
            return Ok(pages::unsafe_role(&sensitive));
        }
    }

    grant(discord, &token, &user.id).await?;
    Ok(pages::success())
}

/// Sensitive permissions carried by the requested role, per Discord.
async fn sensitive_permissions(
    discord: &DiscordClient,
    token: &StateToken,
) -> Result<Vec<&'static str>, GateError> {
    let roles = discord.guild_roles(&token.guild).await?;
    let role = roles
        .into_iter()
        .find(|r| r.id == token.role)
        .ok_or_else(|| GateError::UnknownRole {
            role: token.role.to_string(),
            guild: token.guild.to_string(),
        })?;

    let bits: PermissionBits = role
        .permissions
        .parse()
        .map_err(|_| GateError::MalformedPermissions(role.permissions.clone()))?;
    info!(role = %role.id, name = %role.name, "role permissions resolved");
    Ok(bits.sensitive())
}

async fn grant(discord: &DiscordClient, token: &StateToken, user: &UserId) -> Result<(), GateError> {
    discord
        .add_member_role(&token.guild, user, &token.role)
        .await?;
    info!(user = %user, role = %token.role, guild = %token.guild, "role granted");
    Ok(())
}
