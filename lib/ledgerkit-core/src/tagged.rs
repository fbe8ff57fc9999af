//! Polymorphic objects keyed by a discriminator field.
//!
//! The API describes a polymorphic value as one object with a discriminator
//! string and one optional sub-object per shape:
//!
//! ```json
//! { "category": "ach_transfer", "ach_transfer": { "amount": 100 }, "wire_transfer": null }
//! ```
//!
//! [`one_of!`](crate::one_of) turns that shape into a Rust enum, so two
//! populated sub-objects cannot be represented. Exclusivity is checked while
//! decoding.

use serde_json::{Map, Value};

/// Declare an enum decoded from a discriminated object.
///
/// Each variant wraps the type of one sub-object and names the tag that
/// selects it. The macro adds an `Other` variant that keeps unknown
/// discriminator values together with the whole object, so a newer server
/// never breaks decoding.
///
/// Decoding fails when two sub-objects are populated, when the discriminator
/// disagrees with the populated sub-object, or when a known discriminator has
/// no sub-object. Without a discriminator, the single populated sub-object
/// wins.
///
/// # Example
///
/// ```
/// use ledgerkit_core::{from_json, one_of, to_json};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// pub struct AchTransfer { pub amount: i64 }
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// pub struct WireTransfer { pub amount: i64, pub beneficiary: String }
///
/// one_of! {
///     /// How money moved.
///     #[derive(Debug, Clone, PartialEq)]
///     pub enum TransferSource tagged "category" {
///         /// An ACH transfer.
///         Ach(AchTransfer) = "ach_transfer",
///         /// A wire transfer.
///         Wire(WireTransfer) = "wire_transfer",
///     }
/// }
///
/// let json = br#"{"category":"ach_transfer","ach_transfer":{"amount":100},"wire_transfer":null}"#;
/// let source: TransferSource = from_json(json).expect("decode");
/// assert_eq!(source, TransferSource::Ach(AchTransfer { amount: 100 }));
/// assert_eq!(source.discriminator(), "ach_transfer");
/// assert_eq!(
///     to_json(&source).expect("encode").as_ref(),
///     br#"{"category":"ach_transfer","ach_transfer":{"amount":100}}"#
/// );
/// ```
#[macro_export]
macro_rules! one_of {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident tagged $disc:literal {
            $(
                $(#[$vmeta:meta])*
                $variant:ident($ty:ty) = $tag:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant($ty),
            )+
            /// A discriminator value unknown to this client.
            Other {
                /// The discriminator value as received.
                discriminator: ::std::string::String,
                /// The whole object as received.
                body: $crate::__private::serde_json::Map<
                    ::std::string::String,
                    $crate::__private::serde_json::Value,
                >,
            },
        }

        impl $name {
            /// Name of the discriminator field.
            pub const DISCRIMINATOR: &'static str = $disc;

            /// Discriminator value of this variant.
            #[must_use]
            pub fn discriminator(&self) -> &str {
                match self {
                    $( Self::$variant(_) => $tag, )+
                    Self::Other { discriminator, .. } => discriminator,
                }
            }
        }

        impl $crate::__private::serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
            where
                S: $crate::__private::serde::Serializer,
            {
                use $crate::__private::serde::ser::SerializeMap as _;

                match self {
                    $(
                        Self::$variant(value) => {
                            let mut map = serializer.serialize_map(Some(2))?;
                            map.serialize_entry($disc, $tag)?;
                            map.serialize_entry($tag, value)?;
                            map.end()
                        }
                    )+
                    Self::Other { body, .. } => {
                        $crate::__private::serde::Serialize::serialize(body, serializer)
                    }
                }
            }
        }

        impl<'de> $crate::__private::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
            where
                D: $crate::__private::serde::Deserializer<'de>,
            {
                use $crate::__private::serde::de::Error as _;

                let object = <$crate::__private::serde_json::Map<
                    ::std::string::String,
                    $crate::__private::serde_json::Value,
                > as $crate::__private::serde::Deserialize>::deserialize(deserializer)?;

                match $crate::__private::split_variant(object, $disc, &[$($tag),+])
                    .map_err(D::Error::custom)?
                {
                    $crate::__private::Variant::Known { tag, value } => match tag.as_str() {
                        $(
                            $tag => $crate::__private::serde_json::from_value::<$ty>(value)
                                .map(Self::$variant)
                                .map_err(|e| D::Error::custom(::std::format!("{}: {e}", $tag))),
                        )+
                        other => Err(D::Error::custom(::std::format!(
                            "unexpected variant `{other}`"
                        ))),
                    },
                    $crate::__private::Variant::Unknown { discriminator, object } => {
                        Ok(Self::Other { discriminator, body: object })
                    }
                }
            }
        }
    };
}

/// Outcome of splitting a discriminated object.
#[doc(hidden)]
#[derive(Debug, PartialEq)]
pub enum Variant {
    /// A known tag and its sub-object.
    Known {
        /// The selected tag.
        tag: String,
        /// The sub-object stored under the tag.
        value: Value,
    },
    /// An unknown discriminator value.
    Unknown {
        /// The discriminator value.
        discriminator: String,
        /// The whole object.
        object: Map<String, Value>,
    },
}

/// Pick the populated sub-object of a discriminated object.
#[doc(hidden)]
pub fn split_variant(
    mut object: Map<String, Value>,
    discriminator: &str,
    tags: &[&str],
) -> Result<Variant, String> {
    let populated: Vec<&str> = tags
        .iter()
        .copied()
        .filter(|tag| object.get(*tag).is_some_and(|value| !value.is_null()))
        .collect();
    if populated.len() > 1 {
        return Err(format!(
            "expected one populated variant, found {}",
            populated.join(", ")
        ));
    }

    let declared = match object.get(discriminator) {
        None | Some(Value::Null) => None,
        Some(Value::String(value)) => Some(value.clone()),
        Some(other) => {
            return Err(format!(
                "discriminator `{discriminator}` must be a string, found {other}"
            ));
        }
    };

    match (declared, populated.first().copied()) {
        (Some(declared), Some(tag)) if declared != tag => Err(format!(
            "discriminator `{declared}` does not match populated variant `{tag}`"
        )),
        (Some(declared), None) if !tags.contains(&declared.as_str()) => Ok(Variant::Unknown {
            discriminator: declared,
            object,
        }),
        (Some(declared), None) => Err(format!("missing `{declared}` object")),
        (_, Some(tag)) => {
            let value = object.remove(tag).unwrap_or(Value::Null);
            Ok(Variant::Known {
                tag: tag.to_string(),
                value,
            })
        }
        (None, None) => Err(format!("missing discriminator `{discriminator}`")),
    }
}
