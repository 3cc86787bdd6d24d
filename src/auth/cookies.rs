//! Netscape cookie file loading.
//!
//! The mirror talks to the platform as a logged-in browser session; the
//! operator exports that session's cookies (browser or extension tooling
//! produces the Netscape 7-field TAB-separated format) and points the CLI
//! at the file. Cookies live only in the run's in-memory jar.

use std::io::BufRead;
use std::sync::Arc;

use reqwest::cookie::Jar;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors while reading a cookie file.
#[derive(Debug, Error)]
pub enum CookieError {
    /// I/O error reading the cookie file.
    #[error("failed to read cookie file: {0}")]
    Io(#[from] std::io::Error),

    /// No valid cookies found in a non-empty file.
    #[error("no valid cookies found in file ({malformed_count} lines failed to parse)")]
    NoCookiesFound {
        /// Number of malformed lines encountered.
        malformed_count: usize,
    },
}

/// One parsed cookie. The value is kept private and redacted from Debug
/// output so it cannot end up in logs.
pub struct CookieLine {
    domain: String,
    path: String,
    secure: bool,
    name: String,
    value: String,
}

impl std::fmt::Debug for CookieLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieLine")
            .field("domain", &self.domain)
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Parses a Netscape-format cookie file.
///
/// Lines are `domain`, `tailmatch`, `path`, `secure`, `expires`, `name`,
/// `value` separated by TABs; comments and blank lines are skipped.
/// Malformed lines are skipped with a warning; expiry is ignored because
/// the jar only lives for one run.
///
/// # Errors
///
/// Returns [`CookieError::Io`] on read failure, or
/// [`CookieError::NoCookiesFound`] when a non-empty file yields nothing.
pub fn parse_netscape_cookies(reader: impl BufRead) -> Result<Vec<CookieLine>, CookieError> {
    let mut cookies = Vec::new();
    let mut malformed = 0usize;
    let mut data_lines = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        data_lines += 1;

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 7 {
            warn!(
                line = idx + 1,
                fields = fields.len(),
                "skipping malformed cookie line"
            );
            malformed += 1;
            continue;
        }

        cookies.push(CookieLine {
            domain: fields[0].to_string(),
            path: fields[2].to_string(),
            secure: fields[3].eq_ignore_ascii_case("true"),
            name: fields[5].to_string(),
            value: fields[6].to_string(),
        });
    }

    if cookies.is_empty() && data_lines > 0 {
        return Err(CookieError::NoCookiesFound {
            malformed_count: malformed,
        });
    }
    Ok(cookies)
}

/// Loads parsed cookies into a jar suitable for
/// `reqwest::ClientBuilder::cookie_provider`.
#[must_use]
pub fn load_cookies_into_jar(cookies: &[CookieLine]) -> Arc<Jar> {
    let jar = Arc::new(Jar::default());

    for cookie in cookies {
        let mut set_cookie = format!(
            "{}={}; Domain={}; Path={}",
            cookie.name, cookie.value, cookie.domain, cookie.path
        );
        if cookie.secure {
            set_cookie.push_str("; Secure");
        }

        let scheme = if cookie.secure { "https" } else { "http" };
        let host = cookie.domain.strip_prefix('.').unwrap_or(&cookie.domain);
        let origin = format!("{scheme}://{host}{}", cookie.path);

        if let Ok(url) = origin.parse::<url::Url>() {
            jar.add_cookie_str(&set_cookie, &url);
            debug!(domain = %cookie.domain, name = %cookie.name, "loaded cookie into jar");
        } else {
            warn!(domain = %cookie.domain, name = %cookie.name, "skipping cookie with unparseable domain");
        }
    }

    jar
}
