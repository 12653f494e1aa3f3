//! Discord REST client.
//!
//! Wraps the handful of endpoints the role gate needs.  Calls made on behalf
//! of the user authenticate with the OAuth2 access token; guild-administrative
//! calls authenticate with the bot token.
//!
//! Every non-success status is turned into [`GateError::Upstream`] carrying
//! Discord's status and raw body, so callers propagate failures uniformly.

use std::fmt;

use axum::http::StatusCode;
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::AppConfig;
use crate::error::GateError;
use crate::ids::{GuildId, RoleId, UserId};

/// OAuth2 scopes requested at login.
pub const OAUTH_SCOPES: &str = "identify guilds.join";

/// Append path segments to the API base, percent-encoding each one.
pub fn api_url(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// OAuth2 bearer credential for a single user.
///
/// Used once to identify the user and then dropped.  `Debug` never prints it.
pub struct AccessToken(String);

impl AccessToken {
    fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// The parts of `GET /users/@me` the gate reads.
#[derive(Debug, Clone, Deserialize)]
pub struct UserIdentity {
    /// User snowflake.
    pub id: UserId,
    /// Username, only used for log output.
    #[serde(default)]
    pub username: Option<String>,
}

/// The parts of a guild role object the gate reads.
#[derive(Debug, Clone, Deserialize)]
pub struct GuildRole {
    /// Role snowflake.
    pub id: RoleId,
    /// Display name.
    pub name: String,
    /// Permission bitmask as a decimal string.
    pub permissions: String,
}

/// Client for the Discord REST API.
///
/// Holds one `reqwest::Client` for the lifetime of the process so connections
/// are pooled across requests.
pub struct DiscordClient {
    http: reqwest::Client,
    api_base: Url,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    bot_token: String,
}

impl DiscordClient {
    /// Build a client from the service configuration.
    pub fn new(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!(
                "DiscordBot (",
                env!("CARGO_PKG_NAME"),
                ", ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            bot_token: config.bot_token.clone(),
        })
    }

    fn bot_auth(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    /// `POST /oauth2/token` — exchange an authorization code for an access token.
    pub async fn exchange_code(&self, code: &str) -> Result<AccessToken, GateError> {
        let res = self
            .http
            .post(api_url(&self.api_base, &["oauth2", "token"]))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        let body: TokenResponse = read_json(res, "Failed to fetch access token").await?;
        Ok(AccessToken(body.access_token))
    }

    /// `GET /users/@me` — identify the user owning `token`.
    pub async fn current_user(&self, token: &AccessToken) -> Result<UserIdentity, GateError> {
        let res = self
            .http
            .get(api_url(&self.api_base, &["users", "@me"]))
            .bearer_auth(token.secret())
            .send()
            .await?;

        read_json(res, "Failed to fetch user data").await
    }

    /// `GET /guilds/{guild}/members/{user}` — whether `user` belongs to `guild`.
    ///
    /// A 404 means "not a member" and is returned as `Ok(false)`.
    pub async fn is_member(&self, guild: &GuildId, user: &UserId) -> Result<bool, GateError> {
        let res = self
            .http
            .get(api_url(
                &self.api_base,
                &["guilds", guild.as_str(), "members", user.as_str()],
            ))
            .header(AUTHORIZATION, self.bot_auth())
            .send()
            .await?;

        if res.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        ensure_success(res, "Failed to verify guild membership").await?;
        Ok(true)
    }

    /// `GET /guilds/{guild}/roles` — every role defined in `guild`.
    pub async fn guild_roles(&self, guild: &GuildId) -> Result<Vec<GuildRole>, GateError> {
        let res = self
            .http
            .get(api_url(&self.api_base, &["guilds", guild.as_str(), "roles"]))
            .header(AUTHORIZATION, self.bot_auth())
            .send()
            .await?;

        read_json(res, "Failed to fetch guild roles").await
    }

    /// `PUT /guilds/{guild}/members/{user}/roles/{role}` — grant a role.
    ///
    /// Idempotent on Discord's side: granting a role the member already has
    /// succeeds again.
    pub async fn add_member_role(
        &self,
        guild: &GuildId,
        user: &UserId,
        role: &RoleId,
    ) -> Result<(), GateError> {
        let res = self
            .http
            .put(api_url(
                &self.api_base,
                &[
                    "guilds",
                    guild.as_str(),
                    "members",
                    user.as_str(),
                    "roles",
                    role.as_str(),
                ],
            ))
            .header(AUTHORIZATION, self.bot_auth())
            .header(CONTENT_LENGTH, "0")
            .send()
            .await?;

        ensure_success(res, "Failed to assign role").await?;
        Ok(())
    }
}

/// Pass successful responses through; turn anything else into
/// [`GateError::Upstream`] with Discord's raw body as detail.
async fn ensure_success(
    res: reqwest::Response,
    context: &'static str,
) -> Result<reqwest::Response, GateError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let detail = res.text().await.unwrap_or_default();
    tracing::warn!(
        status = status.as_u16(),
        context,
        "Discord returned an error; its body is forwarded to the caller"
    );
    Err(GateError::Upstream {
        context,
        status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
        detail,
    })
}

async fn read_json<T: DeserializeOwned>(
    res: reqwest::Response,
    context: &'static str,
) -> Result<T, GateError> {
    let res = ensure_success(res, context).await?;
    let body = res.text().await?;
    Ok(serde_json::from_str(&body)?)
}
