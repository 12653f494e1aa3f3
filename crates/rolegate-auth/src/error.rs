//! Error types for the role gate.
//!
//! [`GateError`] covers every way a `/login` or `/callback` request can fail
//! and implements [`axum::response::IntoResponse`] so handlers can return
//! `Result<…, GateError>` directly.  Failures render as plain text, never as
//! HTML: the pages are reserved for outcomes the user is meant to read.
//!
//! [`ConfigError`] is only produced at startup.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that terminate a request.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// A required query parameter was absent or empty.
    #[error("{0}")]
    MissingParameter(&'static str),

    /// A role or guild identifier cannot be carried in a state token.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The `state` query parameter did not decode into a role and a guild.
    #[error("invalid state parameter: {0}")]
    InvalidState(String),

    /// The requested role does not exist in the requested guild.
    #[error("role {role} does not exist in guild {guild}")]
    UnknownRole {
        /// Requested role.
        role: String,
        /// Guild that was searched.
        guild: String,
    },

    /// Discord answered with a non-success status.
    ///
    /// The status is propagated to the caller together with Discord's raw
    /// response body.
    #[error("{context}: {detail}")]
    Upstream {
        /// Which step failed (e.g. `"Failed to fetch access token"`).
        context: &'static str,
        /// Status returned by Discord.
        status: StatusCode,
        /// Raw response body returned by Discord.
        detail: String,
    },

    /// Discord answered with a success status but an unusable body.
    #[error("unexpected response from Discord: {0}")]
    MalformedUpstream(#[from] serde_json::Error),

    /// Discord returned a permission bitmask that is not a decimal integer.
    #[error("unexpected permission bitmask from Discord: {0}")]
    MalformedPermissions(String),

    /// The HTTP call to Discord failed at the transport level.
    #[error("failed to reach Discord: {0}")]
    Transport(#[from] reqwest::Error),
}

impl GateError {
    /// HTTP status this error is rendered with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameter(_)
            | Self::InvalidIdentifier(_)
            | Self::InvalidState(_)
            | Self::UnknownRole { .. } => StatusCode::BAD_REQUEST,
            Self::Upstream { status, .. } => *status,
            Self::MalformedUpstream(_) | Self::MalformedPermissions(_) | Self::Transport(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        } else {
            tracing::warn!(%status, error = %message, "request rejected");
        }
        (status, message).into_response()
    }
}

/// Errors raised while building [`crate::config::AppConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    #[error("missing required environment variable {name}")]
    Missing {
        /// Primary variable name.
        name: &'static str,
    },

    /// An environment variable is set but cannot be used.
    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// The offending value.
        value: String,
        /// Human-readable explanation.
        reason: String,
    },
}
