//! # Cookie Sessions: signed-cookie and filesystem sessions for HTTP applications
//!
//! `cookie-sessions` stores per-user session data either entirely inside a
//! signed (and optionally encrypted) cookie, or in server-side files keyed by
//! an id carried in such a cookie. Each request gets a [`RequestContext`]; the
//! first time a handler asks a [`Store`] for a session name, the cookie is
//! decoded, and every later request for that name returns the same
//! [`Session`].
//!
//! # Quick Start
//!
//! Here's a basic example with [Axum](https://docs.rs/axum/latest/axum/) and the
//! [`CookieStore`]. This requires the `axum` feature (enabled by default).
//!
//! ```rust,no_run
//! use axum::{Router, extract::State, routing::get};
//! use cookie_sessions::{CookieStore, KeyPair, RequestContext, SessionLayer, Store};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = CookieStore::new([KeyPair::with_block_key(
//!         b"a-long-random-hash-key".to_vec(),
//!         b"a-long-random-block-key",
//!     )]);
//!
//!     let app = Router::new()
//!         .route("/", get(handler))
//!         .layer(SessionLayer::new())
//!         .with_state(store);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//!
//! async fn handler(State(store): State<Arc<CookieStore>>, ctx: RequestContext) -> String {
//!     let session = store.get(&ctx, "session").unwrap().into_session();
//!     let count: u32 = session.get("count").unwrap().unwrap_or(0) + 1;
//!     session.insert("count", &count).unwrap();
//!     format!("You've visited this page {} times", count)
//! }
//! ```
//!
//! [`SessionLayer`] saves every session the request touched after the handler
//! returns. Without the layer, call [`RequestContext::save`] yourself and copy
//! the cookies out with [`RequestContext::write_set_cookie_headers`].
//!
//! # Session Management
//!
//! ```rust
//! use cookie_sessions::{CookieStore, Flash, KeyPair, RequestContext, Store};
//!
//! let store = CookieStore::new([KeyPair::new(b"hash-key".to_vec())]);
//! let ctx = RequestContext::new();
//!
//! // A cookie that fails to decode still gives a usable empty session.
//! let (session, err) = store.get(&ctx, "session").unwrap().into_parts();
//! assert!(err.is_none());
//!
//! session.insert("user", "alice").unwrap();
//! session.add_flash(&Flash::new(1, "Welcome back")).unwrap();
//!
//! // Flashes are removed as they are read.
//! let flashes: Vec<Flash> = session.flashes().unwrap();
//! assert_eq!(flashes.len(), 1);
//!
//! // A negative max age deletes the cookie on save.
//! session.set_max_age(-1);
//! session.save(&ctx).unwrap();
//! ```
//!
//! # Stores
//!
//! ## CookieStore
//! Keeps the serialized session in the cookie itself. The encoded value is
//! limited to 4096 bytes by default; see [`CookieStore::max_length`].
//!
//! ## FilesystemStore
//! Keeps the serialized session in `session_<id>` files and only the signed id
//! in the cookie. An empty path means the system temporary directory.
//!
//! ```rust,no_run
//! use cookie_sessions::{FilesystemStore, KeyPair};
//!
//! let store = FilesystemStore::new("/var/lib/app/sessions", [KeyPair::new(b"hash-key".to_vec())]);
//! store.max_length(16 * 1024);
//! ```
//!
//! ## Key rotation
//! Stores accept several [`KeyPair`]s. The first signs new cookies; all of
//! them are tried when decoding, so old cookies keep working until their pair
//! is removed.
//!
//! ## Serialization
//! Session values are stored with one of two serialization backends:
//!
//! - [`rmp-serde`](https://crates.io/crates/rmp-serde) (MessagePack, default) - self-describing, so reading a value as the wrong type fails.
//! - [`bincode`](https://crates.io/crates/bincode) - Fast, compact binary serialization.
//!
//! ```toml
//! [dependencies]
//! cookie-sessions = { version = "0.1.0", default-features = false, features = ["axum", "bincode"] }
//! ```
//!
//! ## Cookie Configuration
//!
//! ```rust
//! use cookie_sessions::CookieOptions;
//! use cookie_sessions::cookie::SameSite;
//! let cookie_options = CookieOptions::build()
//!     .http_only(true)
//!     .same_site(SameSite::Strict)
//!     .secure(true) // Set to true in production
//!     .max_age(7200) // 2 hours
//!     .path("/")
//!     .domain("example.com");
//! ```
//!
//! ## Best Practices
//!
//! - Enable HTTPS in production and set `secure: true` in cookie options.
//! - Use hash keys of 32 or 64 random bytes, and a block key when the session
//!   holds anything the client should not read.
//! - Call [`context::binding::purge`] periodically if requests can be abandoned
//!   without their [`RequestContext`] being dropped.

pub use cookie;

pub mod codec;
pub use codec::{Codec, KeyPair};

pub mod context;
pub use context::RequestContext;

#[cfg(feature = "axum")]
mod extract;

mod registry;
pub use registry::Registry;

mod service;
pub use service::*;

mod session;
pub use session::*;

pub mod store;
pub use store::{CookieStore, Error, FilesystemStore, Loaded, Store, Values, validate_cookie_name};
