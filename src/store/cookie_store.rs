use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::codec::{Codec, KeyPair};
use crate::store::{Loaded, Result, Store, validate_cookie_name};
use crate::{CookieOptions, RequestContext, Session};

/// A store that keeps the whole session inside a signed cookie.
///
/// Values are serialized, optionally encrypted, and authenticated with the
/// configured [`KeyPair`]s. Nothing is kept on the server, so the encoded
/// session must fit in [`Codec::max_length`] (4096 bytes by default).
///
/// ```rust
/// use cookie_sessions::{CookieStore, KeyPair, RequestContext, Store};
///
/// let store = CookieStore::new([KeyPair::new(b"hash-key".to_vec())]);
/// let ctx = RequestContext::new();
///
/// let session = store.get(&ctx, "session").unwrap().into_session();
/// session.insert("user", "alice").unwrap();
/// ctx.save().unwrap();
///
/// assert!(ctx.response_cookie("session").is_some());
/// ```
pub struct CookieStore {
    this: Weak<CookieStore>,
    codec: RwLock<Codec>,
    options: RwLock<CookieOptions>,
}

impl CookieStore {
    /// Creates a store signing with the first key pair and accepting any.
    ///
    /// Later pairs exist for rotation: cookies issued under an old pair still
    /// decode until it is removed.
    pub fn new(key_pairs: impl IntoIterator<Item = KeyPair>) -> Arc<Self> {
        let options = CookieOptions::default();
        let codec = Codec::new(key_pairs).with_max_age(options.max_age);
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            codec: RwLock::new(codec),
            options: RwLock::new(options),
        })
    }

    /// Limits the length of the encoded cookie value. `0` disables the check.
    pub fn max_length(&self, max_length: usize) {
        self.codec.write().set_max_length(max_length);
    }

    /// Sets the lifetime of new sessions and the age after which received
    /// cookies are rejected.
    pub fn set_max_age(&self, seconds: i64) {
        self.options.write().max_age = seconds;
        self.codec.write().set_max_age(seconds);
    }

    /// The options new sessions start from.
    pub fn options(&self) -> CookieOptions {
        self.options.read().clone()
    }

    /// Replaces the options for sessions created from now on. The codec's
    /// max age follows the new options.
    pub fn set_options(&self, options: CookieOptions) {
        self.codec.write().set_max_age(options.max_age);
        *self.options.write() = options;
    }

    fn blank(&self, name: &str) -> Session {
        let store: Weak<dyn Store> = self.this.clone();
        Session::new(name, self.options(), store)
    }
}

impl Store for CookieStore {
    #[tracing::instrument(name = "loading session from cookie", skip(self, ctx))]
    fn load(&self, ctx: &RequestContext, name: &str) -> Result<Loaded> {
        validate_cookie_name(name)?;

        let session = self.blank(name);
        let Some(token) = ctx.cookie(name) else {
            return Ok(Loaded::new(session));
        };

        let decoded = self.codec.read().decode_values(name, &token);
        match decoded {
            Ok(values) => {
                session.restore(values);
                Ok(Loaded::new(session))
            }
            Err(err) => {
                tracing::warn!(err = %err, "possibly suspicious activity: session cookie failed to decode");
                Ok(Loaded::degraded(session, err))
            }
        }
    }

    fn new_session(&self, ctx: &RequestContext, name: &str) -> Result<Session> {
        validate_cookie_name(name)?;

        let session = self.blank(name);
        ctx.registry().lock().insert(name, &Loaded::new(session.clone()));
        Ok(session)
    }

    #[tracing::instrument(name = "saving session to cookie", skip(self, ctx, session))]
    fn save(&self, ctx: &RequestContext, session: &Session) -> Result<()> {
        let snapshot = session.snapshot();

        if snapshot.options.is_removal() {
            ctx.set_cookie(snapshot.options.to_removal_cookie(&snapshot.name));
            return Ok(());
        }

        let token = self
            .codec
            .read()
            .encode_values(&snapshot.name, &snapshot.values)
            .inspect_err(|err| tracing::error!(err = %err, name = %snapshot.name, "failed to encode session"))?;

        ctx.set_cookie(snapshot.options.to_cookie(&snapshot.name, token));
        Ok(())
    }
}

impl fmt::Debug for CookieStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieStore")
            .field("codec", &*self.codec.read())
            .field("options", &*self.options.read())
            .finish()
    }
}
