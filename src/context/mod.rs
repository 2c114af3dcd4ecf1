//! The per-request object sessions are read from and written to.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cookie::time::Duration;
use cookie::{Cookie, CookieJar};
use http::{HeaderMap, HeaderValue, header};
use parking_lot::Mutex;

pub mod binding;
pub use binding::SharedRegistry;

use crate::store::Result;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`RequestContext`] for as long as the request lives.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cookies in, `Set-Cookie`s out, and a session registry, for one request.
///
/// Clones share state. When the last clone is dropped the request's registry
/// is detached from the process-wide [`binding`].
#[derive(Clone)]
pub struct RequestContext {
    inner: Arc<Inner>,
}

struct Inner {
    id: ContextId,
    request_cookies: CookieJar,
    response_cookies: Mutex<CookieJar>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        binding::clear(self.id);
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// A context for a request that carries no cookies.
    pub fn new() -> Self {
        Self::from_cookies(std::iter::empty())
    }

    pub fn from_cookies<I>(cookies: I) -> Self
    where
        I: IntoIterator<Item = Cookie<'static>>,
    {
        let mut request_cookies = CookieJar::new();
        for cookie in cookies {
            request_cookies.add_original(cookie);
        }

        Self {
            inner: Arc::new(Inner {
                id: ContextId::next(),
                request_cookies,
                response_cookies: Mutex::new(CookieJar::new()),
            }),
        }
    }

    /// Reads the request cookies from every `Cookie` header.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = Vec::new();
        for value in headers.get_all(header::COOKIE) {
            let Ok(value) = value.to_str() else {
                tracing::debug!("skipping non-ascii cookie header");
                continue;
            };
            for cookie in Cookie::split_parse(value.to_owned()) {
                match cookie {
                    Ok(cookie) => cookies.push(cookie),
                    Err(err) => tracing::debug!(err = %err, "skipping malformed cookie"),
                }
            }
        }

        Self::from_cookies(cookies)
    }

    /// The context a browser would send next: cookies set in this response
    /// replace the request's, and removal cookies are dropped.
    pub fn next_request(&self) -> Self {
        let mut cookies: Vec<Cookie<'static>> = self.inner.request_cookies.iter().cloned().collect();
        for set in self.response_cookies() {
            cookies.retain(|existing| existing.name() != set.name());
            let removed = set.max_age().is_some_and(|max_age| max_age <= Duration::ZERO);
            if !removed {
                cookies.push(Cookie::new(set.name().to_owned(), set.value().to_owned()));
            }
        }
        Self::from_cookies(cookies)
    }

    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    /// The value of the request cookie `name`.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.inner
            .request_cookies
            .get(name)
            .map(|cookie| cookie.value().to_owned())
    }

    /// Queues a `Set-Cookie`, replacing any queued earlier under the same name.
    pub fn set_cookie(&self, cookie: Cookie<'static>) {
        self.inner.response_cookies.lock().add(cookie);
    }

    pub fn response_cookie(&self, name: &str) -> Option<Cookie<'static>> {
        self.inner.response_cookies.lock().get(name).cloned()
    }

    pub fn response_cookies(&self) -> Vec<Cookie<'static>> {
        self.inner.response_cookies.lock().delta().cloned().collect()
    }

    /// Appends one `Set-Cookie` header per queued cookie.
    pub fn write_set_cookie_headers(&self, headers: &mut HeaderMap) {
        for cookie in self.response_cookies() {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(err) => {
                    tracing::error!(err = %err, name = cookie.name(), "cookie is not a valid header value");
                }
            }
        }
    }

    /// The session registry of this request, created on first use.
    pub fn registry(&self) -> SharedRegistry {
        binding::get_or_insert(self.inner.id)
    }

    /// Saves every session fetched during this request.
    pub fn save(&self) -> Result<()> {
        match binding::get(self.inner.id) {
            Some(registry) => registry.lock().save(self),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("id", &self.inner.id)
            .finish_non_exhaustive()
    }
}
