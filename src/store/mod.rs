mod cookie_store;
mod filesystem;
mod store_trait;

pub use cookie_store::CookieStore;
pub use filesystem::FilesystemStore;
pub use store_trait::*;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::HashMap;

#[cfg(feature = "bincode")]
pub(crate) fn serialize_value<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, Error> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| Error::Encode(e.to_string()))
}

#[cfg(feature = "bincode")]
pub(crate) fn deserialize_value<T: DeserializeOwned>(value: &[u8]) -> Result<T, Error> {
    let (decoded, read) = bincode::serde::decode_from_slice(value, bincode::config::standard())
        .map_err(|e| Error::Decode(e.to_string()))?;
    if read != value.len() {
        return Err(Error::Decode(format!(
            "{} trailing bytes after value",
            value.len() - read
        )));
    }
    Ok(decoded)
}

#[cfg(feature = "messagepack")]
pub(crate) fn serialize_value<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, Error> {
    rmp_serde::to_vec(value).map_err(|e| Error::Encode(e.to_string()))
}

#[cfg(feature = "messagepack")]
pub(crate) fn deserialize_value<T: DeserializeOwned>(value: &[u8]) -> Result<T, Error> {
    rmp_serde::from_slice(value).map_err(|e| Error::Decode(e.to_string()))
}

/// The user payload of a session: serialized values keyed by field name.
///
/// Each value is stored in its serialized form and deserialized on access into
/// whatever type the caller asks for. Asking for a type the stored bytes do
/// not describe fails with [`Error::Decode`]; it never yields a default.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(HashMap<String, Vec<u8>>);

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>, Error> {
        self.0
            .get(field)
            .map(|bytes| deserialize_value(bytes))
            .transpose()
    }

    pub fn insert<T: Serialize + ?Sized>(&mut self, field: &str, value: &T) -> Result<(), Error> {
        let bytes = serialize_value(value)?;
        self.0.insert(field.to_owned(), bytes);
        Ok(())
    }

    pub fn remove(&mut self, field: &str) -> bool {
        self.0.remove(field).is_some()
    }

    pub(crate) fn take_raw(&mut self, field: &str) -> Option<Vec<u8>> {
        self.0.remove(field)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        serialize_value(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        deserialize_value(bytes)
    }
}

/// Checks `name` against the RFC 6265 token grammar.
///
/// The empty name, control characters, whitespace and the separators
/// `()<>@,;:\"/[]?={}` are all rejected.
pub fn validate_cookie_name(name: &str) -> Result<(), Error> {
    if !name.is_empty() && name.bytes().all(is_token_byte) {
        Ok(())
    } else {
        Err(Error::InvalidCookieName(name.to_owned()))
    }
}

fn is_token_byte(b: u8) -> bool {
    matches!(b, 0x21..=0x7e)
        && !matches!(
            b,
            b'(' | b')'
                | b'<'
                | b'>'
                | b'@'
                | b','
                | b';'
                | b':'
                | b'\\'
                | b'"'
                | b'/'
                | b'['
                | b']'
                | b'?'
                | b'='
                | b'{'
                | b'}'
        )
}
