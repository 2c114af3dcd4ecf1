use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::codec::{Codec, DEFAULT_MAX_LENGTH, KeyPair};
use crate::store::{Error, Loaded, Result, Store, Values, validate_cookie_name};
use crate::{CookieOptions, Id, RequestContext, Session};

const FILE_PREFIX: &str = "session_";

/// A store that keeps session values in files, one per session.
///
/// Only the session [`Id`] travels in the cookie, signed like a
/// [`CookieStore`](crate::CookieStore) payload. Files are named
/// `session_<id>` inside the store directory and are readable by the
/// owner only. Every file access goes through one reader/writer lock, so
/// a session read never observes a partial write from this process.
pub struct FilesystemStore {
    this: Weak<FilesystemStore>,
    path: PathBuf,
    codec: RwLock<Codec>,
    options: RwLock<CookieOptions>,
    max_length: AtomicUsize,
    files: RwLock<()>,
}

impl FilesystemStore {
    /// Creates a store writing under `path`; an empty path means the system
    /// temporary directory.
    pub fn new(path: impl AsRef<Path>, key_pairs: impl IntoIterator<Item = KeyPair>) -> Arc<Self> {
        let path = path.as_ref();
        let path = if path.as_os_str().is_empty() {
            std::env::temp_dir()
        } else {
            path.to_path_buf()
        };

        let options = CookieOptions::default();
        let codec = Codec::new(key_pairs).with_max_age(options.max_age);
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            path,
            codec: RwLock::new(codec),
            options: RwLock::new(options),
            max_length: AtomicUsize::new(DEFAULT_MAX_LENGTH),
            files: RwLock::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Limits the size of a serialized session file. `0` disables the check.
    pub fn max_length(&self, max_length: usize) {
        self.max_length.store(max_length, Ordering::Relaxed);
    }

    /// Sets the lifetime of new sessions and the age after which received
    /// id cookies are rejected.
    pub fn set_max_age(&self, seconds: i64) {
        self.options.write().max_age = seconds;
        self.codec.write().set_max_age(seconds);
    }

    pub fn options(&self) -> CookieOptions {
        self.options.read().clone()
    }

    pub fn set_options(&self, options: CookieOptions) {
        self.codec.write().set_max_age(options.max_age);
        *self.options.write() = options;
    }

    /// The file backing the session with `id`.
    pub fn file_path(&self, id: &Id) -> PathBuf {
        self.path.join(format!("{FILE_PREFIX}{id}"))
    }

    fn blank(&self, name: &str) -> Session {
        let store: Weak<dyn Store> = self.this.clone();
        Session::new(name, self.options(), store)
    }

    /// Reads the file for `id`, refusing files over the length cap.
    fn read(&self, id: &Id) -> Result<Option<Vec<u8>>> {
        let _guard = self.files.read();
        let file = match fs::File::open(self.file_path(id)) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let max = self.max_length.load(Ordering::Relaxed);
        let mut contents = Vec::new();
        if max == 0 {
            (&file).read_to_end(&mut contents)?;
            return Ok(Some(contents));
        }

        let length = file.metadata()?.len();
        if length > max as u64 {
            return Err(Error::LengthExceeded {
                length: usize::try_from(length).unwrap_or(usize::MAX),
                max,
            });
        }
        file.take(max as u64 + 1).read_to_end(&mut contents)?;
        if contents.len() > max {
            return Err(Error::LengthExceeded {
                length: contents.len(),
                max,
            });
        }
        Ok(Some(contents))
    }

    fn write(&self, id: &Id, contents: &[u8]) -> io::Result<()> {
        let _guard = self.files.write();
        let mut file = owner_only().open(self.file_path(id))?;
        file.write_all(contents)?;
        file.sync_data()
    }

    fn erase(&self, id: &Id) -> io::Result<()> {
        let _guard = self.files.write();
        match fs::remove_file(self.file_path(id)) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(unix)]
fn owner_only() -> fs::OpenOptions {
    use std::os::unix::fs::OpenOptionsExt;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true).mode(0o600);
    options
}

#[cfg(not(unix))]
fn owner_only() -> fs::OpenOptions {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    options
}

impl Store for FilesystemStore {
    #[tracing::instrument(name = "loading session from file", skip(self, ctx))]
    fn load(&self, ctx: &RequestContext, name: &str) -> Result<Loaded> {
        validate_cookie_name(name)?;

        let session = self.blank(name);
        let Some(token) = ctx.cookie(name) else {
            return Ok(Loaded::new(session));
        };

        let id = match self.codec.read().decode(name, &token).and_then(|raw| parse_id(&raw)) {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(err = %err, "discarding session id cookie");
                return Ok(Loaded::degraded(session, err));
            }
        };

        let contents = match self.read(&id) {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                tracing::debug!(%id, "session file is gone, starting over");
                return Ok(Loaded::new(session));
            }
            Err(err) => {
                tracing::error!(err = %err, %id, "failed to read session file");
                return Ok(Loaded::degraded(session, err));
            }
        };

        match Values::from_bytes(&contents) {
            Ok(values) => {
                session.set_id(Some(id));
                session.restore(values);
                Ok(Loaded::new(session))
            }
            Err(err) => {
                tracing::warn!(err = %err, %id, "discarding unreadable session file");
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

    #[tracing::instrument(name = "saving session to file", skip(self, ctx, session))]
    fn save(&self, ctx: &RequestContext, session: &Session) -> Result<()> {
        let snapshot = session.snapshot();

        if snapshot.options.is_removal() {
            if let Some(id) = snapshot.id {
                self.erase(&id).inspect_err(|err| {
                    tracing::error!(err = %err, %id, "failed to remove session file")
                })?;
            }
            session.set_id(None);
            ctx.set_cookie(snapshot.options.to_removal_cookie(&snapshot.name));
            return Ok(());
        }

        let contents = snapshot.values.to_bytes()?;
        let max = self.max_length.load(Ordering::Relaxed);
        if max != 0 && contents.len() > max {
            return Err(Error::LengthExceeded {
                length: contents.len(),
                max,
            });
        }

        // Nothing touches disk or the session until the id cookie encodes.
        let id = snapshot.id.unwrap_or_else(Id::generate);
        let token = self.codec.read().encode(&snapshot.name, id.to_string().as_bytes())?;

        self.write(&id, &contents)
            .inspect_err(|err| tracing::error!(err = %err, %id, "failed to write session file"))?;
        session.set_id(Some(id));
        ctx.set_cookie(snapshot.options.to_cookie(&snapshot.name, token));
        Ok(())
    }
}

fn parse_id(raw: &[u8]) -> Result<Id> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| Error::Decode("invalid session id".into()))
}

impl fmt::Debug for FilesystemStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilesystemStore")
            .field("path", &self.path)
            .field("codec", &*self.codec.read())
            .field("options", &*self.options.read())
            .field("max_length", &self.max_length.load(Ordering::Relaxed))
            .finish()
    }
}
