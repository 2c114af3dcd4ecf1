use cookie::time::{Duration, OffsetDateTime};
use cookie::{Cookie, SameSite};

/// Thirty days, the default cookie lifetime and codec staleness window.
pub const DEFAULT_MAX_AGE: i64 = 86400 * 30;

/// Configuration options for session cookies.
///
/// Stores hold a default set; every session takes its own copy when it is
/// created, so later changes to the store's options never reach sessions
/// that already exist.
///
/// `max_age` is in seconds: `0` produces a browser-session cookie and a
/// negative value deletes the session on the next save.
///
/// # Example
///
/// ```rust
/// use cookie_sessions::CookieOptions;
///
/// let cookie_options = CookieOptions::build()
///         .http_only(true)
///         .same_site(cookie::SameSite::Lax)
///         .secure(true)
///         .max_age(60)
///         .path("/");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: String,
    pub domain: Option<String>,
    pub max_age: i64,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: String::from("/"),
            domain: None,
            max_age: DEFAULT_MAX_AGE,
            secure: false,
            http_only: true,
            same_site: Some(SameSite::Lax),
        }
    }
}

impl CookieOptions {
    /// Creates a new `CookieOptions` with default values.
    pub fn build() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = seconds;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    pub fn without_same_site(mut self) -> Self {
        self.same_site = None;
        self
    }

    /// Whether a save with these options deletes the session.
    pub fn is_removal(&self) -> bool {
        self.max_age < 0
    }

    /// Builds the `Set-Cookie` cookie carrying `value` under `name`.
    pub fn to_cookie(&self, name: &str, value: String) -> Cookie<'static> {
        let cookie_builder = Cookie::build((name.to_owned(), value))
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only);

        let cookie_builder = if let Some(domain) = &self.domain {
            cookie_builder.domain(domain.clone())
        } else {
            cookie_builder
        };

        let cookie_builder = if let Some(same_site) = self.same_site {
            cookie_builder.same_site(same_site)
        } else {
            cookie_builder
        };

        let cookie_builder = match self.max_age {
            0 => cookie_builder,
            seconds if seconds > 0 => {
                let max_age = Duration::seconds(seconds);
                let cookie_builder = cookie_builder.max_age(max_age);
                // Past the representable date range only Max-Age is sent.
                match OffsetDateTime::now_utc().checked_add(max_age) {
                    Some(expires) => cookie_builder.expires(expires),
                    None => cookie_builder,
                }
            }
            _ => cookie_builder
                .max_age(Duration::ZERO)
                .expires(OffsetDateTime::UNIX_EPOCH),
        };

        cookie_builder.build()
    }

    /// Builds a cookie that makes the browser discard `name` immediately.
    pub fn to_removal_cookie(&self, name: &str) -> Cookie<'static> {
        let mut options = self.clone();
        options.max_age = -1;
        options.to_cookie(name, String::new())
    }
}
