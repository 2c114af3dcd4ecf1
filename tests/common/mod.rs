#![allow(dead_code)]

use std::sync::Arc;

use cookie_sessions::{CookieStore, FilesystemStore, KeyPair, RequestContext};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub(crate) struct TestUser {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TestSession {
    pub user: TestUser,
    pub preferences: TestPreferences,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub(crate) struct TestPreferences {
    pub theme: String,
    pub language: String,
}

pub fn create_test_session() -> TestSession {
    TestSession {
        user: TestUser {
            id: 1,
            name: "Test User".to_string(),
        },
        preferences: TestPreferences {
            theme: "dark".to_string(),
            language: "en".to_string(),
        },
    }
}

pub fn hash_key() -> Vec<u8> {
    b"my-secret-hash-key-with-32-bytes".to_vec()
}

pub fn cookie_store() -> Arc<CookieStore> {
    CookieStore::new([KeyPair::new(hash_key())])
}

pub fn encrypted_cookie_store() -> Arc<CookieStore> {
    CookieStore::new([KeyPair::with_block_key(
        hash_key(),
        b"my-secret-block-key-of-32-bytes!",
    )])
}

pub fn filesystem_store(dir: &std::path::Path) -> Arc<FilesystemStore> {
    FilesystemStore::new(dir, [KeyPair::new(hash_key())])
}

/// The `Set-Cookie` header lines the response would carry.
pub fn set_cookie_headers(ctx: &RequestContext) -> Vec<String> {
    let mut headers = http::HeaderMap::new();
    ctx.write_set_cookie_headers(&mut headers);
    headers
        .get_all(http::header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_owned())
        .collect()
}
