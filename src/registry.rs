//! Per-request cache of sessions keyed by cookie name.

use crate::store::{Error, Loaded, Result, Store, validate_cookie_name};
use crate::{RequestContext, Session};

#[derive(Debug)]
struct Entry {
    name: String,
    session: Session,
    error: Option<Error>,
}

/// Every session touched during one request.
///
/// The first lookup of a name decodes it through the store; later lookups
/// return the same [`Session`] handle and the same decode error, if any.
/// [`save`](Registry::save) writes them all back in the order they were
/// first requested.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached session for `name`, loading it from `store` on first use.
    ///
    /// An invalid name fails before the store is consulted and is not cached.
    pub fn get<S>(&mut self, ctx: &RequestContext, store: &S, name: &str) -> Result<Loaded>
    where
        S: Store + ?Sized,
    {
        validate_cookie_name(name)?;

        if let Some(entry) = self.entries.iter().find(|entry| entry.name == name) {
            tracing::debug!(name, "session served from request registry");
            return Ok(match &entry.error {
                Some(err) => Loaded::degraded(entry.session.clone(), err.clone()),
                None => Loaded::new(entry.session.clone()),
            });
        }

        let loaded = store.load(ctx, name)?;
        self.insert(name, &loaded);
        Ok(loaded)
    }

    /// Caches `loaded` under `name`, replacing any previous entry in place.
    pub fn insert(&mut self, name: &str, loaded: &Loaded) {
        let entry = Entry {
            name: name.to_owned(),
            session: loaded.session().clone(),
            error: loaded.error().cloned(),
        };

        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// Saves every registered session.
    ///
    /// Each session is attempted even when an earlier one fails; the first
    /// error is returned and the rest are logged.
    #[tracing::instrument(name = "saving request sessions", skip(self, ctx), fields(sessions = self.entries.len()))]
    pub fn save(&self, ctx: &RequestContext) -> Result<()> {
        let mut first_error = None;

        for entry in &self.entries {
            if let Err(err) = entry.session.save(ctx) {
                tracing::error!(err = %err, name = %entry.name, "failed to save session");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
