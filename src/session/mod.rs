//! Session management for web applications.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

mod cookie_options;
mod id;

use crate::RequestContext;
use crate::store::{self, Error, Store, Values, deserialize_value, serialize_value};
pub use cookie_options::{CookieOptions, DEFAULT_MAX_AGE};
pub use id::Id;

type Result<T> = store::Result<T>;

/// The reserved field under which flashes are queued by default.
pub const FLASHES_KEY: &str = "_flash";

/// A one-time message for display on the next request.
///
/// Any serializable type can be queued as a flash; this is a ready-made
/// payload for the common "kind plus message" case.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: i64,
    pub message: String,
}

impl Flash {
    pub fn new(kind: i64, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A session bound to one cookie name.
///
/// `Session` is a cheap handle: clones share the same values and options,
/// which is how the request [`Registry`](crate::Registry) hands the same
/// session to every caller that asks for a name. The owning store is held
/// weakly and only used to save.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    name: String,
    id: Option<Id>,
    values: Values,
    options: CookieOptions,
    is_new: bool,
    store: Weak<dyn Store>,
}

impl Session {
    /// Creates a new, empty session.
    ///
    /// `options` is taken by value: the session owns its copy.
    pub fn new(name: &str, options: CookieOptions, store: Weak<dyn Store>) -> Self {
        let inner = Inner {
            name: name.to_owned(),
            id: None,
            values: Values::new(),
            options,
            is_new: true,
            store,
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Marks the session as restored from a request, replacing its values.
    pub(crate) fn restore(&self, values: Values) {
        let mut inner = self.inner.lock();
        inner.values = values;
        inner.is_new = false;
    }

    pub fn name(&self) -> String {
        self.inner.lock().name.clone()
    }

    /// The backing id, for stores that keep the payload outside the cookie.
    pub fn id(&self) -> Option<Id> {
        self.inner.lock().id
    }

    pub(crate) fn set_id(&self, id: Option<Id>) {
        self.inner.lock().id = id;
    }

    pub fn is_new(&self) -> bool {
        self.inner.lock().is_new
    }

    pub fn options(&self) -> CookieOptions {
        self.inner.lock().options.clone()
    }

    pub fn set_options(&self, options: CookieOptions) {
        self.inner.lock().options = options;
    }

    /// Sets the cookie lifetime. A negative value deletes the session on save.
    pub fn set_max_age(&self, seconds: i64) {
        self.inner.lock().options.max_age = seconds;
    }

    /// Retrieves a value, deserialized as `T`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use cookie_sessions::{CookieStore, KeyPair, RequestContext, Store};
    ///
    /// let store = CookieStore::new([KeyPair::new(b"hash-key".to_vec())]);
    /// let ctx = RequestContext::new();
    /// let session = store.get(&ctx, "session").unwrap().into_session();
    ///
    /// session.insert("count", &1u32).unwrap();
    /// let count: Option<u32> = session.get("count").unwrap();
    /// assert_eq!(count, Some(1));
    /// ```
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.inner.lock().values.get(key)
    }

    pub fn insert<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.inner.lock().values.insert(key, value)
    }

    /// Removes a field, returning whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.lock().values.contains_key(key)
    }

    pub fn clear(&self) {
        self.inner.lock().values.clear();
    }

    /// A snapshot of every value in the session.
    pub fn values(&self) -> Values {
        self.inner.lock().values.clone()
    }

    /// Drains the flashes queued under the default key.
    pub fn flashes<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.flashes_for(FLASHES_KEY)
    }

    /// Drains the flashes queued under `key`.
    ///
    /// The queue is removed before decoding, so a second call returns an
    /// empty list until new flashes are added.
    pub fn flashes_for<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        let raw = self.inner.lock().values.take_raw(key);
        let Some(raw) = raw else {
            return Ok(Vec::new());
        };

        let queue: Vec<Vec<u8>> = deserialize_value(&raw)?;
        queue.iter().map(|flash| deserialize_value(flash)).collect()
    }

    /// Queues a flash under the default key.
    pub fn add_flash<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        self.add_flash_for(FLASHES_KEY, value)
    }

    /// Queues a flash under `key`, after any already queued there.
    pub fn add_flash_for<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let flash = serialize_value(value)?;
        let mut inner = self.inner.lock();
        let mut queue: Vec<Vec<u8>> = inner.values.get(key)?.unwrap_or_default();
        queue.push(flash);
        inner.values.insert(key, &queue)
    }

    /// Saves the session through the store that created it.
    pub fn save(&self, ctx: &RequestContext) -> Result<()> {
        let store = self.store().ok_or(Error::StoreDropped)?;
        store.save(ctx, self)
    }

    pub fn store(&self) -> Option<Arc<dyn Store>> {
        self.inner.lock().store.upgrade()
    }

    /// Whether both handles refer to the same session.
    pub fn ptr_eq(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Everything a store needs to write the session, taken under one lock.
    pub(crate) fn snapshot(&self) -> Snapshot {
        let inner = self.inner.lock();
        Snapshot {
            name: inner.name.clone(),
            id: inner.id,
            values: inner.values.clone(),
            options: inner.options.clone(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Session")
            .field("name", &inner.name)
            .field("id", &inner.id)
            .field("fields", &inner.values.len())
            .field("options", &inner.options)
            .field("is_new", &inner.is_new)
            .finish()
    }
}

pub(crate) struct Snapshot {
    pub name: String,
    pub id: Option<Id>,
    pub values: Values,
    pub options: CookieOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached() -> Session {
        let store: Weak<crate::CookieStore> = Weak::new();
        Session::new("session-key", CookieOptions::default(), store)
    }

    #[test]
    fn new_session_is_empty() {
        let session = detached();
        assert!(session.is_new());
        assert!(session.values().is_empty());
        assert_eq!(session.name(), "session-key");
        assert_eq!(session.id(), None);
    }

    #[test]
    fn clones_share_state() {
        let session = detached();
        let other = session.clone();
        other.insert("foo", "bar").unwrap();
        assert_eq!(session.get::<String>("foo").unwrap(), Some("bar".into()));
        assert!(session.ptr_eq(&other));
        assert!(!session.ptr_eq(&detached()));
    }

    #[test]
    fn flashes_are_read_once() {
        let session = detached();
        assert!(session.flashes::<String>().unwrap().is_empty());

        session.add_flash("foo").unwrap();
        session.add_flash("bar").unwrap();
        session.add_flash_for("custom_key", "baz").unwrap();

        assert_eq!(session.flashes::<String>().unwrap(), ["foo", "bar"]);
        assert!(session.flashes::<String>().unwrap().is_empty());
        assert_eq!(session.flashes_for::<String>("custom_key").unwrap(), ["baz"]);
        assert!(session.flashes_for::<String>("custom_key").unwrap().is_empty());
    }

    #[test]
    fn typed_flashes() {
        let session = detached();
        session.add_flash(&Flash::new(42, "foo")).unwrap();
        assert_eq!(session.flashes::<Flash>().unwrap(), [Flash::new(42, "foo")]);
    }

    #[test]
    fn saving_without_a_store_fails() {
        let session = detached();
        let ctx = RequestContext::new();
        assert_eq!(session.save(&ctx), Err(Error::StoreDropped));
    }
}
