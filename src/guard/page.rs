use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::{error, warn};

/// What the guard drives once it has reached a verdict. Exactly one of the
/// two methods is called per guard run.
pub trait PageRenderer {
    /// Drop any loading overlay and let the page show.
    fn reveal(&mut self);

    /// Replace the whole page with the denial screen.
    fn deny(&mut self, reason: &str);
}

enum Verdict {
    Pending,
    Reveal,
    Deny(String),
}

/// Renders a module page from disk, or the denial screen in its place.
pub struct HtmlPage {
    path: PathBuf,
    verdict: Verdict,
}

impl HtmlPage {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            verdict: Verdict::Pending,
        }
    }

    pub async fn into_response(self) -> Response {
        match self.verdict {
            Verdict::Reveal => match tokio::fs::read_to_string(&self.path).await {
                Ok(body) => Html(body).into_response(),
                Err(e) => {
                    warn!(error = %e, path = %self.path.display(), "page not readable");
                    (StatusCode::NOT_FOUND, "page not found").into_response()
                }
            },
            Verdict::Deny(reason) => {
                (StatusCode::FORBIDDEN, Html(denial_screen(&reason))).into_response()
            }
            Verdict::Pending => {
                error!("guard finished without a verdict");
                (StatusCode::INTERNAL_SERVER_ERROR, "no verdict").into_response()
            }
        }
    }
}

impl PageRenderer for HtmlPage {
    fn reveal(&mut self) {
        self.verdict = Verdict::Reveal;
    }

    fn deny(&mut self, reason: &str) {
        self.verdict = Verdict::Deny(reason.to_string());
    }
}

/// Fixed full-page denial screen.
pub fn denial_screen(reason: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Access denied</title></head>
<body>
  <main class="access-denied">
    <h1>Access denied</h1>
    <p>{}</p>
    <p><a href="/">Back to dashboard</a></p>
  </main>
</body>
</html>
"#,
        escape_html(reason)
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
