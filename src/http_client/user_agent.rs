//! Browser-like request headers.
//!
//! Third-party card sites block obvious bots, so every request presents
//! itself as a current desktop browser.

/// Desktop browser user agent sent with every request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Accept header for HTML page requests.
pub const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Accept header for image requests.
pub const ACCEPT_IMAGE: &str = "image/webp,image/png,image/jpeg,image/*;q=0.8,*/*;q=0.5";

/// Accept-Language header sent with every request.
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Resolve the user agent from config.
/// - None => browser user agent
/// - other => custom user agent string
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config {
        None => BROWSER_USER_AGENT.to_string(),
        Some(custom) => custom.to_string(),
    }
}

/// The Referer for a request: the origin of the requested URL.
pub fn referer_for(url: &url::Url) -> Option<String> {
    match url.origin() {
        origin @ url::Origin::Tuple(..) => Some(format!("{}/", origin.ascii_serialization())),
        url::Origin::Opaque(_) => None,
    }
}
