//! Tri-state request and response fields.
//!
//! JSON distinguishes a key that is missing from a key that is `null`, and
//! partial-update endpoints depend on that distinction. [`Field`] keeps all
//! three states apart where a plain `Option` would collapse two of them.
//!
//! # Example
//!
//! ```
//! use ledgerkit_core::{Field, to_json};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct UpdateAccount {
//!     #[serde(default, skip_serializing_if = "Field::is_omitted")]
//!     name: Field<String>,
//!     #[serde(default, skip_serializing_if = "Field::is_omitted")]
//!     program_id: Field<String>,
//! }
//!
//! let update = UpdateAccount {
//!     name: Field::present("Payroll".to_string()),
//!     program_id: Field::null(),
//! };
//! let body = to_json(&update).expect("serialize");
//! assert_eq!(body.as_ref(), br#"{"name":"Payroll","program_id":null}"#);
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A value that may be omitted, explicitly null, or present.
///
/// Struct fields of this type are expected to carry
/// `#[serde(default, skip_serializing_if = "Field::is_omitted")]`, so that an
/// omitted field never reaches the wire and a missing key decodes as
/// [`Field::Omitted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field<T> {
    /// Absent from the serialized output.
    Omitted,
    /// Serialized as JSON `null`.
    Null,
    /// Serialized as the contained value.
    Present(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Omitted
    }
}

impl<T> Field<T> {
    /// An omitted field.
    #[must_use]
    pub const fn omitted() -> Self {
        Self::Omitted
    }

    /// An explicit null.
    #[must_use]
    pub const fn null() -> Self {
        Self::Null
    }

    /// A present value.
    #[must_use]
    pub const fn present(value: T) -> Self {
        Self::Present(value)
    }

    /// Maps `None` to [`Field::Null`] and `Some(v)` to [`Field::Present`].
    #[must_use]
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::Present)
    }

    /// Returns `true` if the field is omitted.
    #[must_use]
    pub const fn is_omitted(&self) -> bool {
        matches!(self, Self::Omitted)
    }

    /// Returns `true` if the field is an explicit null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` if the field holds a value.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// The contained value, if present.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Omitted | Self::Null => None,
        }
    }

    /// Consume into the contained value, if present.
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Omitted | Self::Null => None,
        }
    }

    /// Borrow the contained value without changing the state.
    #[must_use]
    pub const fn as_ref(&self) -> Field<&T> {
        match self {
            Self::Omitted => Field::Omitted,
            Self::Null => Field::Null,
            Self::Present(value) => Field::Present(value),
        }
    }

    /// Transform a present value, keeping omitted and null as they are.
    pub fn map<U, F>(self, f: F) -> Field<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Omitted => Field::Omitted,
            Self::Null => Field::Null,
            Self::Present(value) => Field::Present(f(value)),
        }
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Self::Present(value)
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            // Omitted only reaches a serializer when the owning struct lacks
            // `skip_serializing_if`; null is the closest faithful rendering.
            Self::Omitted | Self::Null => serializer.serialize_none(),
            Self::Present(value) => value.serialize(serializer),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Self::from_option)
    }
}
