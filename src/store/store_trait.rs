use std::fmt::Debug;

use crate::{RequestContext, Session};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid character in cookie name: {0}")]
    InvalidCookieName(String),

    #[error("Encoding failed with: {0}")]
    Encode(String),

    #[error("Decoding failed with: {0}")]
    Decode(String),

    #[error("encoded value is {length} bytes, exceeding the maximum of {max}")]
    LengthExceeded { length: usize, max: usize },

    #[error("{0}")]
    Io(String),

    #[error("the store owning this session has been dropped")]
    StoreDropped,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The outcome of loading a session from a request.
///
/// A cookie that fails to decode still yields a usable, empty session; the
/// failure travels alongside it in [`Loaded::error`] so the caller decides
/// whether to treat it as fatal. Use [`Loaded::into_result`] to be strict.
#[derive(Clone, Debug)]
#[must_use = "a loaded session may carry a decode error that should be checked"]
pub struct Loaded {
    session: Session,
    error: Option<Error>,
}

impl Loaded {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            error: None,
        }
    }

    pub fn degraded(session: Session, error: Error) -> Self {
        Self {
            session,
            error: Some(error),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    pub fn into_parts(self) -> (Session, Option<Error>) {
        (self.session, self.error)
    }

    /// Fails with the decode error, if any, dropping the fresh session.
    pub fn into_result(self) -> Result<Session> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.session),
        }
    }
}

/// A strategy for persisting sessions between requests.
///
/// Implementors provide [`load`](Store::load), [`new_session`](Store::new_session)
/// and [`save`](Store::save); [`get`](Store::get) routes through the request's
/// [`Registry`](crate::Registry) so each cookie name is decoded at most once
/// per request.
pub trait Store: Debug + Send + Sync + 'static {
    /// Decodes the session stored for `name` in the request, without
    /// consulting the registry.
    ///
    /// A missing cookie is not an error. Fails only for an invalid cookie name.
    fn load(&self, ctx: &RequestContext, name: &str) -> Result<Loaded>;

    /// Creates an empty session carrying a copy of the store's current options
    /// and registers it for `name`, replacing any cached session.
    fn new_session(&self, ctx: &RequestContext, name: &str) -> Result<Session>;

    /// Persists `session` and writes its `Set-Cookie` to the response.
    ///
    /// A negative `max_age` deletes the session instead.
    fn save(&self, ctx: &RequestContext, session: &Session) -> Result<()>;

    /// Returns the session for `name`, decoding it on first access in this request.
    fn get(&self, ctx: &RequestContext, name: &str) -> Result<Loaded> {
        let registry = ctx.registry();
        let mut registry = registry.lock();
        registry.get(ctx, self, name)
    }
}
