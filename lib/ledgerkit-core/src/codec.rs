//! JSON encoding and decoding.
//!
//! - [`to_json`] / [`from_json`] move request and response values across the wire.
//! - [`Extensions`] captures keys a response carries but the schema does not declare.
//! - [`Decoded`] keeps the verbatim JSON text next to the typed value.

use std::fmt;
use std::ops::Deref;

use bytes::Bytes;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

use crate::Result;

/// Content type for request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// JSON content type (`application/json`).
    Json,
}

impl ContentType {
    /// Get the MIME type string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialize a value to JSON bytes.
///
/// Struct fields are written in declaration order. Omitted
/// [`Field`](crate::Field)s are skipped; required fields are not checked here,
/// the server is the authority on request validity.
///
/// # Errors
///
/// Returns [`Error::Encoding`](crate::Error::Encoding) if serialization fails,
/// e.g. a map with non-string keys.
///
/// # Example
///
/// ```
/// use ledgerkit_core::to_json;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Transfer { amount: i64, description: String }
///
/// let transfer = Transfer { amount: 100, description: "Rent".to_string() };
/// let bytes = to_json(&transfer).expect("serialize");
/// assert_eq!(bytes.as_ref(), br#"{"amount":100,"description":"Rent"}"#);
/// ```
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| crate::Error::encoding(e.to_string()))
}

/// Deserialize JSON bytes with path-aware error messages.
///
/// Uses `serde_path_to_error`, so a type mismatch reports the exact field
/// that failed (e.g. `account.balance`).
///
/// # Errors
///
/// Returns [`Error::Decode`](crate::Error::Decode) carrying the field path.
///
/// # Example
///
/// ```
/// use ledgerkit_core::from_json;
/// use serde::Deserialize;
///
/// #[derive(Debug, PartialEq, Deserialize)]
/// struct Balance { available: i64 }
///
/// let balance: Balance = from_json(br#"{"available":4200}"#).expect("deserialize");
/// assert_eq!(balance, Balance { available: 4200 });
/// ```
pub fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    let value = serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        crate::Error::decode(e.path().to_string(), e.inner().to_string())
    })?;
    deserializer
        .end()
        .map_err(|e| crate::Error::decode(".", e.to_string()))?;
    Ok(value)
}

// ============================================================================
// Extensions
// ============================================================================

/// JSON keys present in a response but unknown to the schema.
///
/// Declare it as `#[serde(flatten)] extra: Extensions` on a response struct:
/// every key without a typed field lands here in arrival order, and is written
/// back when the struct is serialized again.
///
/// # Example
///
/// ```
/// use ledgerkit_core::{Extensions, from_json, to_json};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Deserialize, Serialize)]
/// struct Account {
///     id: String,
///     #[serde(flatten)]
///     extra: Extensions,
/// }
///
/// let account: Account = from_json(br#"{"id":"acct_1","bank":"first"}"#).expect("decode");
/// assert_eq!(account.extra.get_as::<String>("bank").and_then(Result::ok).as_deref(), Some("first"));
/// assert_eq!(to_json(&account).expect("encode").as_ref(), br#"{"id":"acct_1","bank":"first"}"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Extensions(Map<String, Value>);

impl Extensions {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value of an unknown key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Decode an unknown key as `T`.
    ///
    /// Returns `None` when the key is absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<Result<T>> {
        self.0.get(key).map(|value| {
            T::deserialize(value).map_err(|e| crate::Error::decode(key, e.to_string()))
        })
    }

    /// Set a key, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Iterate keys and values in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of unknown keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the response carried no unknown keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the underlying map.
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Extensions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ============================================================================
// Decoded
// ============================================================================

/// A decoded value together with the JSON text it was decoded from.
///
/// Serializes as the inner value. The raw text is captured through
/// `serde_json`'s `RawValue`, which only works when decoding straight from
/// JSON text: use `Decoded<T>` as a top-level target or as a field of a
/// struct without `#[serde(flatten)]` members.
///
/// # Example
///
/// ```
/// use ledgerkit_core::{Decoded, from_json};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Card { last4: String }
///
/// let card: Decoded<Card> = from_json(br#"{ "last4": "4242" }"#).expect("decode");
/// assert_eq!(card.last4, "4242");
/// assert_eq!(card.raw_json(), r#"{ "last4": "4242" }"#);
/// ```
#[derive(Clone)]
pub struct Decoded<T> {
    value: T,
    raw: Box<RawValue>,
}

impl<T> Decoded<T> {
    /// The typed value.
    #[must_use]
    pub const fn get(&self) -> &T {
        &self.value
    }

    /// The JSON text exactly as received.
    #[must_use]
    pub fn raw_json(&self) -> &str {
        self.raw.get()
    }

    /// Consume into the typed value.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Consume into the typed value and the raw text.
    #[must_use]
    pub fn into_parts(self) -> (T, Box<RawValue>) {
        (self.value, self.raw)
    }
}

impl<T> Deref for Decoded<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for Decoded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoded")
            .field("value", &self.value)
            .field("raw", &self.raw.get())
            .finish()
    }
}

impl<T: PartialEq> PartialEq for Decoded<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Serialize> Serialize for Decoded<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Decoded<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let value = from_json(raw.get().as_bytes()).map_err(D::Error::custom)?;
        Ok(Self { value, raw })
    }
}
