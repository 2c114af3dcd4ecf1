//! Authenticated, optionally encrypted encoding of session payloads.
//!
//! A payload is turned into a cookie-safe token in four steps:
//!
//! 1. when the key pair has a block key, the payload is sealed with AES-256-GCM
//!    using the cookie name as associated data; otherwise it is base64 encoded,
//! 2. the current Unix timestamp is prepended,
//! 3. an HMAC-SHA256 tag over `name|timestamp|value` is appended,
//! 4. the whole `timestamp|value|tag` is URL-safe base64 encoded without padding.
//!
//! Decoding reverses the steps and rejects the token on any failure. Several
//! key pairs may be configured for rotation: the first one encodes, and
//! decoding tries each in order until one authenticates the token.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use cookie::time::OffsetDateTime;
use cookie::{Cookie, CookieJar, Key};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::session::DEFAULT_MAX_AGE;
use crate::store::{Error, Result, Values};

type HmacSha256 = Hmac<Sha256>;

/// The default cap on an encoded token, the practical size limit of a cookie.
pub const DEFAULT_MAX_LENGTH: usize = 4096;

/// How far in the future a timestamp may lie before the token is rejected.
const MAX_CLOCK_SKEW: i64 = 60;

/// Secret material for one generation of keys.
///
/// The hash key authenticates tokens and should be 32 or 64 random bytes. The
/// optional block key turns on encryption; any length is accepted, it is
/// stretched into an AES-256-GCM key.
#[derive(Clone)]
pub struct KeyPair {
    hash_key: Vec<u8>,
    block_key: Option<Key>,
}

impl KeyPair {
    /// A key pair that signs but does not encrypt.
    pub fn new(hash_key: impl Into<Vec<u8>>) -> Self {
        Self {
            hash_key: hash_key.into(),
            block_key: None,
        }
    }

    /// A key pair that signs and encrypts.
    pub fn with_block_key(hash_key: impl Into<Vec<u8>>, block_key: impl AsRef<[u8]>) -> Self {
        let master = Sha256::digest(block_key.as_ref());
        Self {
            hash_key: hash_key.into(),
            block_key: Some(Key::derive_from(&master)),
        }
    }

    pub fn encrypts(&self) -> bool {
        self.block_key.is_some()
    }

    fn mac(&self, name: &str, timestamp: &[u8], value: &[u8]) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.hash_key).ok()?;
        mac.update(name.as_bytes());
        mac.update(b"|");
        mac.update(timestamp);
        mac.update(b"|");
        mac.update(value);
        Some(mac)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("hash_key", &"[redacted]")
            .field("encrypts", &self.encrypts())
            .finish()
    }
}

/// Encodes and decodes session payloads with a list of [`KeyPair`]s.
///
/// The codec holds no mutable state; a shared reference may be used from
/// any number of threads.
#[derive(Clone, Debug)]
pub struct Codec {
    key_pairs: Vec<KeyPair>,
    max_length: usize,
    max_age: i64,
}

impl Codec {
    pub fn new(key_pairs: impl IntoIterator<Item = KeyPair>) -> Self {
        Self {
            key_pairs: key_pairs.into_iter().collect(),
            max_length: DEFAULT_MAX_LENGTH,
            max_age: DEFAULT_MAX_AGE,
        }
    }

    /// Caps the encoded token length. `0` disables the check.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Rejects tokens older than `seconds`. `0` disables the check.
    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = seconds;
        self
    }

    pub fn set_max_length(&mut self, max_length: usize) {
        self.max_length = max_length;
    }

    pub fn set_max_age(&mut self, seconds: i64) {
        self.max_age = seconds;
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn max_age(&self) -> i64 {
        self.max_age
    }

    pub fn encode(&self, name: &str, payload: &[u8]) -> Result<String> {
        self.encode_at(name, payload, OffsetDateTime::now_utc().unix_timestamp())
    }

    pub fn decode(&self, name: &str, token: &str) -> Result<Vec<u8>> {
        if self.max_length != 0 && token.len() > self.max_length {
            return Err(Error::Decode(format!(
                "value is {} bytes, longer than the maximum of {}",
                token.len(),
                self.max_length
            )));
        }
        if self.key_pairs.is_empty() {
            return Err(Error::Decode("no key pair configured".into()));
        }

        let raw = URL_SAFE_NO_PAD
            .decode(token.as_bytes())
            .map_err(|err| Error::Decode(err.to_string()))?;
        let mut parts = raw.splitn(3, |b| *b == b'|');
        let (Some(timestamp), Some(value), Some(tag)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::Decode("malformed value".into()));
        };

        for key_pair in &self.key_pairs {
            let Some(mac) = key_pair.mac(name, timestamp, value) else {
                continue;
            };
            if mac.verify_slice(tag).is_err() {
                continue;
            }

            self.check_timestamp(timestamp)?;
            return open(key_pair, name, value);
        }

        Err(Error::Decode("the value could not be authenticated".into()))
    }

    pub fn encode_values(&self, name: &str, values: &Values) -> Result<String> {
        self.encode(name, &values.to_bytes()?)
    }

    pub fn decode_values(&self, name: &str, token: &str) -> Result<Values> {
        Values::from_bytes(&self.decode(name, token)?)
    }

    fn encode_at(&self, name: &str, payload: &[u8], timestamp: i64) -> Result<String> {
        let key_pair = self
            .key_pairs
            .first()
            .ok_or_else(|| Error::Encode("no key pair configured".into()))?;

        let value = seal(key_pair, name, payload)?;
        let timestamp = timestamp.to_string();
        let tag = key_pair
            .mac(name, timestamp.as_bytes(), value.as_bytes())
            .ok_or_else(|| Error::Encode("invalid hash key".into()))?
            .finalize()
            .into_bytes();

        let mut raw = Vec::with_capacity(timestamp.len() + value.len() + tag.len() + 2);
        raw.extend_from_slice(timestamp.as_bytes());
        raw.push(b'|');
        raw.extend_from_slice(value.as_bytes());
        raw.push(b'|');
        raw.extend_from_slice(&tag);

        let encoded = URL_SAFE_NO_PAD.encode(raw);
        if self.max_length != 0 && encoded.len() > self.max_length {
            return Err(Error::LengthExceeded {
                length: encoded.len(),
                max: self.max_length,
            });
        }

        Ok(encoded)
    }

    fn check_timestamp(&self, timestamp: &[u8]) -> Result<()> {
        let timestamp = std::str::from_utf8(timestamp)
            .ok()
            .and_then(|t| t.parse::<i64>().ok())
            .ok_or_else(|| Error::Decode("invalid timestamp".into()))?;
        let now = OffsetDateTime::now_utc().unix_timestamp();

        if timestamp > now + MAX_CLOCK_SKEW {
            return Err(Error::Decode("timestamp is too new".into()));
        }
        if self.max_age != 0 && timestamp < now.saturating_sub(self.max_age) {
            return Err(Error::Decode("expired timestamp".into()));
        }

        Ok(())
    }
}

fn seal(key_pair: &KeyPair, name: &str, payload: &[u8]) -> Result<String> {
    let encoded = URL_SAFE_NO_PAD.encode(payload);
    let Some(key) = &key_pair.block_key else {
        return Ok(encoded);
    };

    let mut jar = CookieJar::new();
    jar.private_mut(key)
        .add(Cookie::new(name.to_owned(), encoded));
    jar.get(name)
        .map(|cookie| cookie.value().to_owned())
        .ok_or_else(|| Error::Encode("failed to encrypt value".into()))
}

fn open(key_pair: &KeyPair, name: &str, value: &[u8]) -> Result<Vec<u8>> {
    let value = std::str::from_utf8(value).map_err(|err| Error::Decode(err.to_string()))?;
    let encoded = match &key_pair.block_key {
        Some(key) => {
            let mut jar = CookieJar::new();
            jar.add_original(Cookie::new(name.to_owned(), value.to_owned()));
            jar.private(key)
                .get(name)
                .map(|cookie| cookie.value().to_owned())
                .ok_or_else(|| Error::Decode("failed to decrypt value".into()))?
        }
        None => value.to_owned(),
    };

    URL_SAFE_NO_PAD
        .decode(encoded.as_bytes())
        .map_err(|err| Error::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signing() -> KeyPair {
        KeyPair::new(b"12345678901234567890123456789012".to_vec())
    }

    fn encrypting() -> KeyPair {
        KeyPair::with_block_key(
            b"12345678901234567890123456789012".to_vec(),
            b"a block key of some length",
        )
    }

    fn now() -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }

    #[test]
    fn round_trip() {
        for key_pair in [signing(), encrypting()] {
            let codec = Codec::new([key_pair]);
            let token = codec.encode("session", b"hello world").unwrap();
            assert!(token.len() <= DEFAULT_MAX_LENGTH);
            assert_eq!(codec.decode("session", &token).unwrap(), b"hello world");
        }
    }

    #[test]
    fn values_round_trip() {
        let codec = Codec::new([encrypting()]);
        let mut values = Values::new();
        values.insert("foo", "bar").unwrap();
        values.insert("baz", &128i64).unwrap();

        let token = codec.encode_values("session", &values).unwrap();
        let decoded = codec.decode_values("session", &token).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(decoded.get::<i64>("baz").unwrap(), Some(128));
    }

    #[test]
    fn encryption_hides_the_payload() {
        let plain = Codec::new([signing()]);
        let sealed = Codec::new([encrypting()]);
        let payload = b"secret-payload-value";

        let raw = URL_SAFE_NO_PAD
            .decode(plain.encode("s", payload).unwrap())
            .unwrap();
        let needle = URL_SAFE_NO_PAD.encode(payload);
        assert!(String::from_utf8_lossy(&raw).contains(&needle));

        let raw = URL_SAFE_NO_PAD
            .decode(sealed.encode("s", payload).unwrap())
            .unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains(&needle));
    }

    #[test]
    fn flipping_any_character_fails() {
        for key_pair in [signing(), encrypting()] {
            let codec = Codec::new([key_pair]);
            let token = codec.encode("session", b"payload").unwrap();

            for i in 0..token.len() {
                let mut tampered = token.clone().into_bytes();
                tampered[i] = if tampered[i] == b'A' { b'B' } else { b'A' };
                let tampered = String::from_utf8(tampered).unwrap();
                assert!(
                    codec.decode("session", &tampered).is_err(),
                    "tampering at {i} went unnoticed"
                );
            }
        }
    }

    #[test]
    fn token_is_bound_to_the_cookie_name() {
        let codec = Codec::new([signing()]);
        let token = codec.encode("session", b"payload").unwrap();
        assert!(matches!(codec.decode("other", &token), Err(Error::Decode(_))));
    }

    #[test]
    fn rotation_tries_every_key_pair() {
        let old = KeyPair::new(b"old-hash-key".to_vec());
        let new = KeyPair::new(b"new-hash-key".to_vec());

        let token = Codec::new([old.clone()]).encode("s", b"v").unwrap();

        let rotated = Codec::new([new.clone(), old]);
        assert_eq!(rotated.decode("s", &token).unwrap(), b"v");

        let dropped = Codec::new([new]);
        let err = dropped.decode("s", &token).unwrap_err();
        assert_eq!(
            err,
            Error::Decode("the value could not be authenticated".into())
        );
    }

    #[test]
    fn stale_and_future_tokens_are_rejected() {
        let codec = Codec::new([signing()]).with_max_age(3600);

        let stale = codec.encode_at("s", b"v", now() - 7200).unwrap();
        assert_eq!(
            codec.decode("s", &stale),
            Err(Error::Decode("expired timestamp".into()))
        );

        let future = codec.encode_at("s", b"v", now() + 3600).unwrap();
        assert_eq!(
            codec.decode("s", &future),
            Err(Error::Decode("timestamp is too new".into()))
        );

        let negative = codec.clone().with_max_age(i64::MIN);
        let fresh = negative.encode("s", b"v").unwrap();
        assert_eq!(
            negative.decode("s", &fresh),
            Err(Error::Decode("expired timestamp".into()))
        );

        let unlimited = codec.clone().with_max_age(0);
        assert!(unlimited.decode("s", &stale).is_ok());
    }

    #[test]
    fn max_length_is_enforced_when_encoding() {
        let codec = Codec::new([signing()]).with_max_length(64);
        let payload = vec![7u8; 128];
        assert!(matches!(
            codec.encode("s", &payload),
            Err(Error::LengthExceeded { max: 64, .. })
        ));

        let codec = codec.with_max_length(0);
        let token = codec.encode("s", &payload).unwrap();
        assert_eq!(codec.decode("s", &token).unwrap(), payload);
    }

    #[test]
    fn malformed_input_is_an_error() {
        let codec = Codec::new([signing()]);
        for token in ["", "!!!", "bm90LWEtdG9rZW4", "aGVsbG98d29ybGQ"] {
            assert!(matches!(codec.decode("s", token), Err(Error::Decode(_))));
        }
    }

    #[test]
    fn no_key_pairs() {
        let codec = Codec::new(Vec::new());
        assert!(matches!(codec.encode("s", b"v"), Err(Error::Encode(_))));
        assert!(matches!(codec.decode("s", "abc"), Err(Error::Decode(_))));
    }

    #[test]
    fn debug_redacts_keys() {
        let rendered = format!("{:?}", signing());
        assert!(rendered.contains("[redacted]"));
        assert!(!rendered.contains("1234"));
    }
}
