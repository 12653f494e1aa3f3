//! HTML pages returned to the browser.
//!
//! These are the outcomes a person is expected to read: the login link and
//! the three terminal results of the flow.  Errors are plain text and are
//! rendered by [`crate::error::GateError`] instead.

use axum::response::Html;
use html_escape::{encode_double_quoted_attribute, encode_text};

const BOOTSTRAP_CSS: &str = "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css";

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <link href="{BOOTSTRAP_CSS}" rel="stylesheet">
  </head>
  <body class="bg-light text-center">
    <div class="container py-5">
{body}
    </div>
  </body>
</html>
"#,
        title = encode_text(title),
    ))
}

/// Page with a single button linking to Discord's authorization endpoint.
pub fn login(authorize_url: &str) -> Html<String> {
    layout(
        "Login",
        &format!(
            r#"      <h1 class="mb-4">Login to Discord</h1>
      <a href="{}" class="btn btn-primary btn-lg">Login with Discord</a>"#,
            encode_double_quoted_attribute(authorize_url)
        ),
    )
}

/// Page explaining that the requested role will not be granted.
///
/// `permissions` lists the offending permissions when they are known.
pub fn unsafe_role(permissions: &[&str]) -> Html<String> {
    let detail = if permissions.is_empty() {
        String::new()
    } else {
        format!(
            "\n      <p class=\"text-muted\">Sensitive permissions: {}</p>",
            encode_text(&permissions.join(", "))
        )
    };

    layout(
        "Unsafe Role",
        &format!(
            r#"      <h1 class="text-danger">Unsafe Role</h1>
      <p class="lead">The specified role has unsafe permissions and cannot be assigned.</p>{detail}"#
        ),
    )
}

/// Page telling the user to join the guild first.
pub fn not_member() -> Html<String> {
    layout(
        "Error",
        r#"      <h1 class="text-danger">Error</h1>
      <p class="lead">You are not a member of the specified server. Join the server before attempting to get a role.</p>"#,
    )
}

/// Page confirming the role was granted.
pub fn success() -> Html<String> {
    layout(
        "Success",
        r#"      <h1 class="text-success">Success</h1>
      <p class="lead">Role assigned successfully!</p>"#,
    )
}
